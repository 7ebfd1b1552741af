pub mod reconcile;
pub use reconcile::ReconciliationEngine;

pub mod tracker;
pub use tracker::SeasonTracker;
