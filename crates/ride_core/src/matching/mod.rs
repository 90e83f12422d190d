pub mod algorithm;
pub mod best_rated;
pub mod policy;
pub mod random;
pub mod simple;

pub use algorithm::CaptainSelector;
pub use best_rated::BestRated;
pub use policy::MatchingPolicy;
pub use random::RandomSelection;
pub use simple::FirstAvailable;
