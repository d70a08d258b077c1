//! Store catalogs and favorites.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use common::StoreId;
use domain::ProductView;
use ledger::LedgerStore;

use super::{AppState, parse_id};
use crate::auth::{CurrentCustomer, MaybeCustomer};
use crate::error::ApiError;

/// GET /stores/{id}/products: the store's active products.
pub async fn products<S: LedgerStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    MaybeCustomer(viewer): MaybeCustomer,
    Path(id): Path<String>,
) -> Result<Json<Vec<ProductView>>, ApiError> {
    let id = parse_id::<StoreId>(&id)?;
    Ok(Json(state.aggregation.store_catalog(id, viewer.as_ref()).await?))
}

/// GET /stores/{id}/sold: the store's products that have sold at least once.
pub async fn sold<S: LedgerStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    MaybeCustomer(viewer): MaybeCustomer,
    Path(id): Path<String>,
) -> Result<Json<Vec<ProductView>>, ApiError> {
    let id = parse_id::<StoreId>(&id)?;
    Ok(Json(
        state
            .aggregation
            .store_sold_catalog(id, viewer.as_ref())
            .await?,
    ))
}

/// POST /stores/{id}/favorite
#[tracing::instrument(skip(state, customer), fields(customer_id = %customer.id))]
pub async fn favorite<S: LedgerStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentCustomer(customer): CurrentCustomer,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id::<StoreId>(&id)?;
    state.aggregation.toggle_favorite(id, &customer, true).await?;
    Ok(StatusCode::CREATED)
}

/// DELETE /stores/{id}/favorite
#[tracing::instrument(skip(state, customer), fields(customer_id = %customer.id))]
pub async fn unfavorite<S: LedgerStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentCustomer(customer): CurrentCustomer,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id::<StoreId>(&id)?;
    state.aggregation.toggle_favorite(id, &customer, false).await?;
    Ok(StatusCode::NO_CONTENT)
}
