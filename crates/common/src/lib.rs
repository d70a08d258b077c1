//! Shared types for the marketplace workspace.
//!
//! Every record in the ledger is addressed by its own identifier type so a
//! `ProductId` can never be passed where an `OrderId` is expected.

mod money;
mod types;

pub use money::{Money, MoneyError};
pub use types::{
    CategoryId, CustomerId, FavoriteId, LineItemId, OrderId, PaymentId, ProductId,
    RatingId, RecommendationId, StoreId,
};
