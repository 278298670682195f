mod health;
mod orders;
mod products;

use axum::{
    routing::{get, post},
    Router,
};

use crate::AppState;

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check))
        .route("/products", get(products::list_products))
        .route("/products/{id}", get(products::get_product))
        .route("/checkout/{product_id}", post(orders::checkout))
        .route("/webhook", post(orders::stripe_webhook))
        .route("/success", get(orders::success))
        .route("/orders", get(orders::get_orders))
}
