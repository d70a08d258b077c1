//! Catalog service: product listings, grouped browsing and seller-side
//! product management.

use common::{CategoryId, Money, ProductId};
use ledger::{Customer, LedgerStore, NewProduct, ProductQuery, VisibilityFilter};
use serde::{Deserialize, Serialize};

use crate::aggregation::{AggregationService, ProductView};
use crate::error::{DomainError, Result};

use super::filter::{Direction, ProductFilter};

/// Products shown per category in the grouped listing.
pub const PRODUCTS_PER_CATEGORY: usize = 5;

/// Upper bound on a product's price.
pub const MAX_PRICE: Money = Money::from_cents(1_750_000);

/// One category's newest products in the grouped listing.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryGroup {
    pub category: String,
    pub products: Vec<ProductView>,
}

/// Result of browsing the catalog. The two modes have different shapes:
/// a flat array when filters are given, an array of category groups
/// otherwise.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum CatalogListing {
    Filtered(Vec<ProductView>),
    Grouped(Vec<CategoryGroup>),
}

/// Fields a seller supplies to list a product.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductListing {
    pub name: String,
    pub price: Money,
    pub description: String,
    pub quantity: i64,
    pub location: String,
    pub category_id: CategoryId,
    #[serde(default)]
    pub image_path: Option<String>,
}

/// Service answering catalog queries. Enriched views come from the
/// aggregation service over the same ledger.
pub struct CatalogService<S: LedgerStore + Clone> {
    store: S,
    aggregation: AggregationService<S>,
}

impl<S: LedgerStore + Clone> CatalogService<S> {
    /// Creates a new catalog service over the given ledger.
    pub fn new(store: S) -> Self {
        Self {
            aggregation: AggregationService::new(store.clone()),
            store,
        }
    }

    /// Lists products. An empty filter groups the newest products by
    /// category; anything else yields a flat, filtered list.
    #[tracing::instrument(skip(self, viewer))]
    pub async fn browse(
        &self,
        filter: &ProductFilter,
        viewer: Option<&Customer>,
    ) -> Result<CatalogListing> {
        if filter.is_empty() {
            return Ok(CatalogListing::Grouped(self.grouped(viewer).await?));
        }
        Ok(CatalogListing::Filtered(self.filtered(filter, viewer).await?))
    }

    async fn filtered(
        &self,
        filter: &ProductFilter,
        viewer: Option<&Customer>,
    ) -> Result<Vec<ProductView>> {
        let ordering = filter.ordering()?;

        let query = match filter.category {
            Some(category) => ProductQuery::for_category(category),
            None => ProductQuery::new(),
        };
        // Newest first, so most-recent-N is a truncation.
        let mut products: Vec<_> = self
            .store
            .list_products(query)
            .await?
            .into_iter()
            .filter(|product| filter.admits(product))
            .collect();
        if let Some(count) = filter.most_recent {
            products.truncate(count);
        }

        let mut views = self.aggregation.product_views(products, viewer).await?;
        if let Some(min) = filter.min_number_sold {
            views.retain(|view| view.metrics.number_sold >= min);
        }

        if let Some((field, direction)) = ordering {
            views.sort_by(|a, b| {
                let ordering = field.compare(a, b);
                match direction {
                    Direction::Asc => ordering,
                    Direction::Desc => ordering.reverse(),
                }
            });
        }

        Ok(views)
    }

    async fn grouped(&self, viewer: Option<&Customer>) -> Result<Vec<CategoryGroup>> {
        let mut groups = Vec::new();
        for category in self.store.list_categories().await? {
            let query = ProductQuery::for_category(category.id).limit(PRODUCTS_PER_CATEGORY);
            let newest = self.store.list_products(query).await?;
            if newest.is_empty() {
                continue;
            }
            groups.push(CategoryGroup {
                category: category.name,
                products: self.aggregation.product_views(newest, viewer).await?,
            });
        }
        Ok(groups)
    }

    /// Lists a new product for `seller`, linking it to the seller's store
    /// when they have one.
    #[tracing::instrument(skip(self, seller, listing), fields(customer_id = %seller.id))]
    pub async fn create_product(
        &self,
        seller: &Customer,
        listing: ProductListing,
    ) -> Result<ProductView> {
        if listing.name.trim().is_empty() {
            return Err(DomainError::validation("Product name is required."));
        }
        if listing.price < Money::zero() || listing.price > MAX_PRICE {
            return Err(DomainError::validation(format!(
                "Price must be between {} and {MAX_PRICE}.",
                Money::zero()
            )));
        }
        let quantity = u32::try_from(listing.quantity)
            .map_err(|_| DomainError::validation("Quantity must not be negative."))?;

        self.store
            .get_category(listing.category_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Category not found."))?;

        let product = self
            .store
            .create_product(NewProduct {
                seller: seller.id,
                category: listing.category_id,
                name: listing.name,
                price: listing.price,
                description: listing.description,
                quantity,
                location: listing.location,
                image_path: listing.image_path,
            })
            .await?;

        if let Some(store) = self.store.store_for_owner(seller.id).await? {
            self.store.link_store_product(store.id, product.id).await?;
        }

        tracing::info!(product_id = %product.id, "product listed");
        self.aggregation.product_view(product, Some(seller)).await
    }

    /// Returns an active product with its metrics.
    #[tracing::instrument(skip(self, viewer))]
    pub async fn product(&self, id: ProductId, viewer: Option<&Customer>) -> Result<ProductView> {
        let product = self
            .store
            .get_product(id, VisibilityFilter::ActiveOnly)
            .await?
            .ok_or_else(|| DomainError::not_found("Product not found."))?;
        self.aggregation.product_view(product, viewer).await
    }

    /// Soft-deletes a product. Only its seller may do so; anyone else gets
    /// `NotFound`.
    #[tracing::instrument(skip(self, seller), fields(customer_id = %seller.id))]
    pub async fn delete_product(&self, seller: &Customer, id: ProductId) -> Result<()> {
        self.store
            .get_product(id, VisibilityFilter::ActiveOnly)
            .await?
            .filter(|product| product.seller == seller.id)
            .ok_or_else(|| DomainError::not_found("Product not found."))?;

        if !self.store.soft_delete_product(id).await? {
            return Err(DomainError::not_found("Product not found."));
        }

        tracing::info!(product_id = %id, "product hidden");
        Ok(())
    }

    /// Lists soft-deleted products.
    #[tracing::instrument(skip(self, viewer))]
    pub async fn deleted_products(&self, viewer: Option<&Customer>) -> Result<Vec<ProductView>> {
        let hidden = self
            .store
            .list_products(ProductQuery::new().visibility(VisibilityFilter::HiddenOnly))
            .await?;
        self.aggregation.product_views(hidden, viewer).await
    }
}
