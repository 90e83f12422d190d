use std::cmp::Ordering;

use crate::model::{Captain, RideClass};

use super::algorithm::CaptainSelector;

/// Highest rating average wins; more ratings break ties, then ledger order.
#[derive(Debug, Default, Clone, Copy)]
pub struct BestRated;

impl CaptainSelector for BestRated {
    fn select(&self, _class: RideClass, _pickup: &str, candidates: &[Captain]) -> Option<usize> {
        candidates
            .iter()
            .enumerate()
            .max_by(|(ia, a), (ib, b)| {
                a.rating
                    .average
                    .partial_cmp(&b.rating.average)
                    .unwrap_or(Ordering::Equal)
                    .then(a.rating.count.cmp(&b.rating.count))
                    .then(ib.cmp(ia))
            })
            .map(|(index, _)| index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::VehicleDetails;

    fn rated(id: &str, average: f64, count: u32) -> Captain {
        Captain::new(
            id,
            id,
            "9000000000",
            RideClass::Car,
            VehicleDetails { number: id.into(), model: "Swift".into() },
        )
        .with_rating(average, count)
    }

    #[test]
    fn prefers_average_then_volume_then_order() {
        let pool = vec![rated("a", 4.6, 10), rated("b", 4.9, 3), rated("c", 4.9, 30), rated("d", 4.9, 30)];
        assert_eq!(BestRated.select(RideClass::Car, "x", &pool), Some(2));
        assert_eq!(BestRated.select(RideClass::Car, "x", &pool[..2]), Some(1));
        assert_eq!(BestRated.select(RideClass::Car, "x", &[]), None);
    }
}
