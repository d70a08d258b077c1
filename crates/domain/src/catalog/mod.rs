//! Catalog queries over products.

mod filter;
mod service;

pub use filter::{Direction, OrderBy, ProductFilter};
pub use service::{
    CatalogListing, CatalogService, CategoryGroup, MAX_PRICE, PRODUCTS_PER_CATEGORY,
    ProductListing,
};
