//! The caller's own profile.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use domain::{FavoriteSeller, Profile};
use ledger::{LedgerStore, ProfileUpdate};

use super::AppState;
use crate::auth::CurrentCustomer;
use crate::error::ApiError;

/// GET /profile: customer record with payment types, recommendations and
/// store.
pub async fn get<S: LedgerStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentCustomer(customer): CurrentCustomer,
) -> Result<Json<Profile>, ApiError> {
    Ok(Json(state.aggregation.profile(&customer).await?))
}

/// PUT /profile: update address and phone number.
pub async fn update<S: LedgerStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentCustomer(customer): CurrentCustomer,
    Json(update): Json<ProfileUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    state.aggregation.update_profile(&customer, update).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /profile/favoritesellers
pub async fn favorite_sellers<S: LedgerStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentCustomer(customer): CurrentCustomer,
) -> Result<Json<Vec<FavoriteSeller>>, ApiError> {
    Ok(Json(state.aggregation.favorite_sellers(&customer).await?))
}
