//! Token authentication extractors.
//!
//! Clients present `Authorization: Token <key>`. The key is handed to the
//! configured [`IdentityProvider`](domain::IdentityProvider).

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use domain::DomainError;
use ledger::{Customer, LedgerStore};

use crate::error::ApiError;
use crate::routes::AppState;

const TOKEN_SCHEME: &str = "Token";

/// The customer making the request. Rejects with 401 when no valid token is
/// presented.
pub struct CurrentCustomer(pub Customer);

/// The customer making the request, if any. Anonymous requests pass; a
/// presented but unknown token is still rejected.
pub struct MaybeCustomer(pub Option<Customer>);

/// Outcome of reading the `Authorization` header.
#[derive(Debug, PartialEq)]
enum Credentials<'a> {
    Absent,
    Token(&'a str),
    Malformed,
}

fn credentials(headers: &HeaderMap) -> Credentials<'_> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Credentials::Absent;
    };
    let Ok(value) = value.to_str() else {
        return Credentials::Malformed;
    };

    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case(TOKEN_SCHEME) => {
            match token.trim() {
                "" => Credentials::Malformed,
                token => Credentials::Token(token),
            }
        }
        _ => Credentials::Malformed,
    }
}

async fn resolve<S: LedgerStore + Clone>(
    parts: &Parts,
    state: &AppState<S>,
) -> Result<Option<Customer>, ApiError> {
    let customer = match credentials(&parts.headers) {
        Credentials::Absent => return Ok(None),
        Credentials::Malformed => Err(DomainError::Unauthenticated),
        Credentials::Token(token) => state.identity.current_customer(token).await,
    };

    customer.map(Some).map_err(|err| {
        if matches!(err, DomainError::Unauthenticated) {
            metrics::counter!("auth_rejections_total").increment(1);
        }
        err.into()
    })
}

impl<S: LedgerStore + Clone + 'static> FromRequestParts<Arc<AppState<S>>> for CurrentCustomer {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState<S>>,
    ) -> Result<Self, Self::Rejection> {
        resolve(parts, state)
            .await?
            .map(CurrentCustomer)
            .ok_or_else(|| DomainError::Unauthenticated.into())
    }
}

impl<S: LedgerStore + Clone + 'static> FromRequestParts<Arc<AppState<S>>> for MaybeCustomer {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState<S>>,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybeCustomer(resolve(parts, state).await?))
    }
}
