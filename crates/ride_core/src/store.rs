//! Ride persistence seam.

use std::cmp::Reverse;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::{Result, RideError};
use crate::model::{Ride, RideStatus};

/// Selection for [`RideStore::list`]. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RideFilter {
    pub rider_id: Option<String>,
    pub captain_id: Option<String>,
    pub status: Option<RideStatus>,
}

impl RideFilter {
    pub fn for_rider(rider_id: impl Into<String>) -> Self {
        Self { rider_id: Some(rider_id.into()), ..Self::default() }
    }

    pub fn with_status(mut self, status: Option<RideStatus>) -> Self {
        self.status = status;
        self
    }

    pub fn matches(&self, ride: &Ride) -> bool {
        self.rider_id.as_ref().map_or(true, |id| ride.rider_id == *id)
            && self
                .captain_id
                .as_ref()
                .map_or(true, |id| ride.captain_id.as_ref() == Some(id))
            && self.status.map_or(true, |status| ride.status == status)
    }
}

/// Document-style ride storage keyed by ride code.
///
/// Writers serialize per ride outside the store; the store only has to make
/// each call atomic on its own.
pub trait RideStore: Send + Sync + std::fmt::Debug {
    /// Insert a new ride. Returns `false` without writing if the code is taken.
    fn insert(&self, ride: Ride) -> Result<bool>;

    fn get(&self, code: &str) -> Result<Option<Ride>>;

    /// Overwrite an existing ride.
    fn replace(&self, ride: Ride) -> Result<()>;

    /// Matching rides, newest first.
    fn list(&self, filter: &RideFilter) -> Result<Vec<Ride>>;
}

#[derive(Debug, Default)]
pub struct InMemoryRideStore {
    rides: DashMap<String, Ride>,
}

impl InMemoryRideStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rides.is_empty()
    }
}

impl RideStore for InMemoryRideStore {
    fn insert(&self, ride: Ride) -> Result<bool> {
        match self.rides.entry(ride.code.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(ride);
                Ok(true)
            }
        }
    }

    fn get(&self, code: &str) -> Result<Option<Ride>> {
        Ok(self.rides.get(code).map(|entry| entry.value().clone()))
    }

    fn replace(&self, ride: Ride) -> Result<()> {
        let mut entry = self
            .rides
            .get_mut(&ride.code)
            .ok_or_else(|| RideError::NotFound(format!("ride {}", ride.code)))?;
        *entry = ride;
        Ok(())
    }

    fn list(&self, filter: &RideFilter) -> Result<Vec<Ride>> {
        let mut rides: Vec<Ride> = self
            .rides
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        rides.sort_by_key(|ride| Reverse((ride.created_at, ride.code.clone())));
        Ok(rides)
    }
}
