use common::FavoriteId;
use ledger::{Customer, PaymentInstrument, Product, Rating, Recommendation, Store};
use serde::Serialize;

/// Derived figures shown next to a product.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProductMetrics {
    pub average_rating: f64,
    pub rating_count: u64,
    pub number_sold: u64,
    pub number_of_likes: u64,
    /// Whether the viewer likes the product. False for anonymous viewers.
    pub is_liked: bool,
    /// Whether the viewer has bought the product. False for anonymous viewers.
    pub can_be_rated: bool,
}

/// A product enriched with its metrics, serialized as one flat object.
#[derive(Debug, Clone, Serialize)]
pub struct ProductView {
    #[serde(flatten)]
    pub product: Product,
    #[serde(flatten)]
    pub metrics: ProductMetrics,
}

/// A favorited store with its owner's display name resolved.
#[derive(Debug, Clone, Serialize)]
pub struct FavoriteSeller {
    pub id: FavoriteId,
    pub store: Store,
    pub owner_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    #[serde(flatten)]
    pub customer: Customer,
    pub payment_types: Vec<PaymentInstrument>,
    pub recommends: Vec<Recommendation>,
    pub recommended: Vec<Recommendation>,
    pub store: Option<Store>,
}

/// Arithmetic mean of the scores; 0.0 when there are none.
pub fn average_score(ratings: &[Rating]) -> f64 {
    if ratings.is_empty() {
        return 0.0;
    }
    let total: u64 = ratings.iter().map(|r| u64::from(r.score)).sum();
    total as f64 / ratings.len() as f64
}
