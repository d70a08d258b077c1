//! Read-time aggregates over ratings, likes, sales and favorites.
//!
//! Nothing here is cached: every figure is recomputed from the ledger on
//! each call, and viewer-dependent figures take the viewer explicitly.

mod service;
mod views;

pub use service::AggregationService;
pub use views::{FavoriteSeller, ProductMetrics, ProductView, Profile, average_score};
