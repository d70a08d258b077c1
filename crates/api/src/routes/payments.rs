//! Payment instruments of the caller.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use domain::PaymentTypeInput;
use ledger::{LedgerStore, PaymentInstrument};

use super::AppState;
use crate::auth::CurrentCustomer;
use crate::error::ApiError;

/// POST /payment-types
#[tracing::instrument(skip(state, customer, input), fields(customer_id = %customer.id))]
pub async fn create<S: LedgerStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentCustomer(customer): CurrentCustomer,
    Json(input): Json<PaymentTypeInput>,
) -> Result<(StatusCode, Json<PaymentInstrument>), ApiError> {
    let payment = state.cart.add_payment_type(&customer, input).await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

/// GET /payment-types
pub async fn list<S: LedgerStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentCustomer(customer): CurrentCustomer,
) -> Result<Json<Vec<PaymentInstrument>>, ApiError> {
    Ok(Json(state.cart.payment_types(&customer).await?))
}
