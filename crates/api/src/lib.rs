//! HTTP API server for the marketplace backend.
//!
//! Exposes the cart, catalog and aggregation services as REST endpoints
//! authenticated with `Authorization: Token <key>`, with structured logging
//! (tracing) and Prometheus metrics.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post};
use ledger::LedgerStore;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: LedgerStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        // Cart
        .route(
            "/cart",
            get(routes::cart::view::<S>).post(routes::cart::add::<S>),
        )
        .route(
            "/cart/{id}",
            delete(routes::cart::remove_line_item::<S>).put(routes::cart::checkout::<S>),
        )
        .route(
            "/cart/products/{product_id}",
            delete(routes::cart::remove_product::<S>),
        )
        // Closed orders
        .route("/orders", get(routes::orders::list::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        // Catalog
        .route(
            "/products",
            get(routes::products::list::<S>).post(routes::products::create::<S>),
        )
        .route("/products/deleted", get(routes::products::deleted::<S>))
        .route("/products/liked", get(routes::products::liked::<S>))
        .route(
            "/products/{id}",
            get(routes::products::get::<S>).delete(routes::products::delete::<S>),
        )
        .route(
            "/products/{id}/rate-product",
            post(routes::products::rate::<S>),
        )
        .route(
            "/products/{id}/like",
            post(routes::products::like::<S>).delete(routes::products::unlike::<S>),
        )
        .route(
            "/products/{id}/recommend",
            post(routes::products::recommend::<S>),
        )
        // Profile and stores
        .route(
            "/profile",
            get(routes::profile::get::<S>).put(routes::profile::update::<S>),
        )
        .route(
            "/profile/favoritesellers",
            get(routes::profile::favorite_sellers::<S>),
        )
        .route(
            "/stores/{id}/favorite",
            post(routes::stores::favorite::<S>).delete(routes::stores::unfavorite::<S>),
        )
        .route("/stores/{id}/products", get(routes::stores::products::<S>))
        .route("/stores/{id}/sold", get(routes::stores::sold::<S>))
        // Payment instruments
        .route(
            "/payment-types",
            get(routes::payments::list::<S>).post(routes::payments::create::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state over a ledger backend.
pub fn create_state<S: LedgerStore + Clone + 'static>(store: S) -> Arc<AppState<S>> {
    Arc::new(AppState::new(store))
}
