//! Resolution of an authenticated principal to a customer.

use async_trait::async_trait;
use ledger::{Customer, LedgerStore};

use crate::error::{DomainError, Result};

/// Resolves an opaque principal (an API token) to exactly one customer.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Fails with `Unauthenticated` when no customer matches.
    async fn current_customer(&self, principal: &str) -> Result<Customer>;
}

/// Identity provider backed by the tokens stored in the ledger.
pub struct LedgerIdentity<S: LedgerStore> {
    store: S,
}

impl<S: LedgerStore> LedgerIdentity<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: LedgerStore> IdentityProvider for LedgerIdentity<S> {
    #[tracing::instrument(skip_all)]
    async fn current_customer(&self, principal: &str) -> Result<Customer> {
        if principal.is_empty() {
            return Err(DomainError::Unauthenticated);
        }

        self.store
            .customer_by_token(principal)
            .await?
            .ok_or(DomainError::Unauthenticated)
    }
}
