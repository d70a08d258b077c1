//! Marketplace domain layer.
//!
//! This crate provides the services consumed by the HTTP boundary:
//! - `CartService`: the open/closed order lifecycle behind the cart
//! - `AggregationService`: ratings, likes, sales counts and favorites
//! - `CatalogService`: filtered and grouped product listings
//! - `IdentityProvider`: principal to customer resolution

pub mod aggregation;
pub mod cart;
pub mod catalog;
pub mod error;
pub mod identity;

pub use aggregation::{AggregationService, FavoriteSeller, ProductMetrics, ProductView, Profile};
pub use cart::{Cart, CartLine, CartRemoval, CartService, OrderSummary, PaymentTypeInput};
pub use catalog::{
    CatalogListing, CatalogService, CategoryGroup, Direction, OrderBy, ProductFilter,
    ProductListing,
};
pub use error::{DomainError, Result};
pub use identity::{IdentityProvider, LedgerIdentity};
