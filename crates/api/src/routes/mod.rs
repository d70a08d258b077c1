//! HTTP route handlers and the state they share.

pub mod cart;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod payments;
pub mod products;
pub mod profile;
pub mod stores;

use std::str::FromStr;
use std::sync::Arc;

use domain::{AggregationService, CartService, CatalogService, IdentityProvider, LedgerIdentity};
use ledger::LedgerStore;

use crate::error::ApiError;

/// Shared application state.
pub struct AppState<S: LedgerStore + Clone> {
    pub cart: CartService<S>,
    pub aggregation: AggregationService<S>,
    pub catalog: CatalogService<S>,
    pub identity: Arc<dyn IdentityProvider>,
}

impl<S: LedgerStore + Clone + 'static> AppState<S> {
    /// Wires every service over one ledger, with identity resolved from the
    /// tokens stored in it.
    pub fn new(store: S) -> Self {
        let identity = Arc::new(LedgerIdentity::new(store.clone()));
        Self::with_identity(store, identity)
    }

    /// Wires the services over `store` with an external identity provider.
    pub fn with_identity(store: S, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            cart: CartService::new(store.clone()),
            aggregation: AggregationService::new(store.clone()),
            catalog: CatalogService::new(store),
            identity,
        }
    }

    /// Returns the underlying ledger.
    pub fn store(&self) -> &S {
        self.cart.store()
    }
}

/// Parses a path segment into a typed identifier.
fn parse_id<T>(raw: &str) -> Result<T, ApiError>
where
    T: FromStr<Err = uuid::Error>,
{
    raw.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))
}
