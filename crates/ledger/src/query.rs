use common::{CategoryId, CustomerId};

use crate::VisibilityFilter;

/// Builder for product queries answered by the ledger.
///
/// Only the filters the storage layer can answer from the product rows
/// themselves live here; derived filters (number sold, price floors, name
/// matching) are composed by the catalog on top of the result.
#[derive(Debug, Clone, Default)]
pub struct ProductQuery {
    /// Soft-delete filter. Defaults to active products only.
    pub visibility: VisibilityFilter,

    /// Filter by category.
    pub category: Option<CategoryId>,

    /// Filter by seller.
    pub seller: Option<CustomerId>,

    /// Maximum number of products to return, newest first.
    pub limit: Option<usize>,
}

impl ProductQuery {
    /// Creates a query for all active products.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query for the products of a category.
    pub fn for_category(category: CategoryId) -> Self {
        Self {
            category: Some(category),
            ..Default::default()
        }
    }

    pub fn visibility(mut self, visibility: VisibilityFilter) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn category(mut self, category: CategoryId) -> Self {
        self.category = Some(category);
        self
    }

    pub fn seller(mut self, seller: CustomerId) -> Self {
        self.seller = Some(seller);
        self
    }

    /// Limits the result to the newest `limit` products.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}
