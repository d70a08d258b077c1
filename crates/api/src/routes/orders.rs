//! Closed-order history endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use common::{OrderId, PaymentId};
use domain::OrderSummary;
use ledger::LedgerStore;
use serde::Deserialize;

use super::{AppState, parse_id};
use crate::auth::CurrentCustomer;
use crate::error::ApiError;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub payment_id: Option<PaymentId>,
}

/// GET /orders: the customer's closed orders, optionally paid with one
/// payment type.
pub async fn list<S: LedgerStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentCustomer(customer): CurrentCustomer,
    query: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<Vec<OrderSummary>>, ApiError> {
    let Query(params) = query?;
    let orders = state
        .cart
        .list_closed_orders(&customer, params.payment_id)
        .await?;
    Ok(Json(orders))
}

/// GET /orders/{id}: one closed order of the customer.
pub async fn get<S: LedgerStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentCustomer(customer): CurrentCustomer,
    Path(id): Path<String>,
) -> Result<Json<OrderSummary>, ApiError> {
    let order = parse_id::<OrderId>(&id)?;
    Ok(Json(state.cart.closed_order(&customer, order).await?))
}
