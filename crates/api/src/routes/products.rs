//! Product catalog endpoints, ratings, likes and recommendations.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use common::{CustomerId, ProductId};
use domain::{CatalogListing, ProductFilter, ProductListing, ProductView};
use ledger::{LedgerStore, Rating, Recommendation};
use serde::Deserialize;

use super::{AppState, parse_id};
use crate::auth::{CurrentCustomer, MaybeCustomer};
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct RateRequest {
    pub score: i64,
    #[serde(default)]
    pub rating_text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecommendRequest {
    pub customer: CustomerId,
}

/// GET /products: grouped by category when no filter is given, otherwise a
/// flat filtered list.
pub async fn list<S: LedgerStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    MaybeCustomer(viewer): MaybeCustomer,
    query: Result<Query<ProductFilter>, QueryRejection>,
) -> Result<Json<CatalogListing>, ApiError> {
    let Query(filter) = query?;
    let listing = state.catalog.browse(&filter, viewer.as_ref()).await?;
    Ok(Json(listing))
}

/// POST /products: list a new product for sale.
#[tracing::instrument(skip(state, seller, listing), fields(customer_id = %seller.id))]
pub async fn create<S: LedgerStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentCustomer(seller): CurrentCustomer,
    Json(listing): Json<ProductListing>,
) -> Result<(StatusCode, Json<ProductView>), ApiError> {
    let view = state.catalog.create_product(&seller, listing).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /products/{id}
pub async fn get<S: LedgerStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    MaybeCustomer(viewer): MaybeCustomer,
    Path(id): Path<String>,
) -> Result<Json<ProductView>, ApiError> {
    let id = parse_id::<ProductId>(&id)?;
    Ok(Json(state.catalog.product(id, viewer.as_ref()).await?))
}

/// DELETE /products/{id}: hide one of the caller's own products.
#[tracing::instrument(skip(state, seller), fields(customer_id = %seller.id))]
pub async fn delete<S: LedgerStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentCustomer(seller): CurrentCustomer,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id::<ProductId>(&id)?;
    state.catalog.delete_product(&seller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /products/deleted
pub async fn deleted<S: LedgerStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    MaybeCustomer(viewer): MaybeCustomer,
) -> Result<Json<Vec<ProductView>>, ApiError> {
    Ok(Json(state.catalog.deleted_products(viewer.as_ref()).await?))
}

/// GET /products/liked: products the caller has liked.
pub async fn liked<S: LedgerStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentCustomer(customer): CurrentCustomer,
) -> Result<Json<Vec<ProductView>>, ApiError> {
    Ok(Json(state.aggregation.liked_products(&customer).await?))
}

/// POST /products/{id}/rate-product
#[tracing::instrument(skip(state, customer, req), fields(customer_id = %customer.id))]
pub async fn rate<S: LedgerStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentCustomer(customer): CurrentCustomer,
    Path(id): Path<String>,
    Json(req): Json<RateRequest>,
) -> Result<(StatusCode, Json<Rating>), ApiError> {
    let id = parse_id::<ProductId>(&id)?;
    let rating = state
        .aggregation
        .add_rating(id, &customer, req.score, req.rating_text)
        .await?;
    Ok((StatusCode::CREATED, Json(rating)))
}

/// POST /products/{id}/like
#[tracing::instrument(skip(state, customer), fields(customer_id = %customer.id))]
pub async fn like<S: LedgerStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentCustomer(customer): CurrentCustomer,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id::<ProductId>(&id)?;
    state.aggregation.toggle_like(id, &customer, true).await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "message": "Product liked successfully." })),
    ))
}

/// DELETE /products/{id}/like
#[tracing::instrument(skip(state, customer), fields(customer_id = %customer.id))]
pub async fn unlike<S: LedgerStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentCustomer(customer): CurrentCustomer,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id::<ProductId>(&id)?;
    state.aggregation.toggle_like(id, &customer, false).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /products/{id}/recommend
#[tracing::instrument(skip(state, customer, req), fields(customer_id = %customer.id))]
pub async fn recommend<S: LedgerStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentCustomer(customer): CurrentCustomer,
    Path(id): Path<String>,
    Json(req): Json<RecommendRequest>,
) -> Result<(StatusCode, Json<Recommendation>), ApiError> {
    let id = parse_id::<ProductId>(&id)?;
    let recommendation = state
        .aggregation
        .recommend(id, &customer, req.customer)
        .await?;
    Ok((StatusCode::CREATED, Json(recommendation)))
}
