//! Cart endpoints: the customer's open order.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use common::{LineItemId, OrderId, PaymentId, ProductId};
use domain::{Cart, CartRemoval, DomainError};
use ledger::{LedgerStore, LineItem};
use serde::Deserialize;

use super::{AppState, parse_id};
use crate::auth::CurrentCustomer;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    pub product_id: ProductId,
}

#[derive(Debug, Default, Deserialize)]
pub struct RemoveParams {
    #[serde(default)]
    pub empty: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct CheckoutRequest {
    #[serde(default)]
    pub payment_type: Option<String>,
}

/// POST /cart: add a product, opening an order when none is open.
#[tracing::instrument(skip(state, customer, req), fields(customer_id = %customer.id))]
pub async fn add<S: LedgerStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentCustomer(customer): CurrentCustomer,
    Json(req): Json<AddToCartRequest>,
) -> Result<(StatusCode, Json<LineItem>), ApiError> {
    let line_item = state.cart.add_to_cart(&customer, req.product_id).await?;
    Ok((StatusCode::CREATED, Json(line_item)))
}

/// GET /cart: the open order with its line items, size and total.
pub async fn view<S: LedgerStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentCustomer(customer): CurrentCustomer,
) -> Result<Json<Cart>, ApiError> {
    Ok(Json(state.cart.view_cart(&customer).await?))
}

/// DELETE /cart/{line_item_id}: remove one line item, or with `?empty=true`
/// discard the open order entirely.
#[tracing::instrument(skip(state, customer), fields(customer_id = %customer.id))]
pub async fn remove_line_item<S: LedgerStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentCustomer(customer): CurrentCustomer,
    Path(id): Path<String>,
    query: Result<Query<RemoveParams>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(params) = query?;
    let removal = if params.empty {
        CartRemoval::Empty
    } else {
        CartRemoval::LineItem(parse_id::<LineItemId>(&id)?)
    };

    state.cart.remove_from_cart(&customer, removal).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /cart/products/{product_id}: remove the oldest line holding the
/// product.
#[tracing::instrument(skip(state, customer), fields(customer_id = %customer.id))]
pub async fn remove_product<S: LedgerStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentCustomer(customer): CurrentCustomer,
    Path(product_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let product = parse_id::<ProductId>(&product_id)?;
    state
        .cart
        .remove_from_cart(&customer, CartRemoval::Product(product))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /cart/{order_id}: close the open order with a payment type.
#[tracing::instrument(skip(state, customer, req), fields(customer_id = %customer.id))]
pub async fn checkout<S: LedgerStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentCustomer(customer): CurrentCustomer,
    Path(order_id): Path<String>,
    Json(req): Json<CheckoutRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let order = parse_id::<OrderId>(&order_id)?;
    let payment = req
        .payment_type
        .map(|raw| {
            raw.parse::<PaymentId>()
                .map_err(|_| DomainError::validation("Invalid payment type."))
        })
        .transpose()?;

    state.cart.checkout(&customer, order, payment).await?;
    Ok(StatusCode::NO_CONTENT)
}
