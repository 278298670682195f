use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    Router,
};
use sqlx::PgPool;
use tower_http::cors::CorsLayer;

use crate::{config::AppConfig, database, error::Result, routes, services::StripeClient};

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub stripe: StripeClient,
    pub stripe_public_key: String,
    pub currency: String,
    pub success_url: String,
    pub cancel_url: String,
}

pub async fn build(config: &AppConfig) -> Result<Router> {
    let pool = database::create_pool(&config.database).await?;

    let state = AppState {
        db: pool,
        stripe: StripeClient::new(&config.stripe),
        stripe_public_key: config.stripe.public_key.clone(),
        currency: config.stripe.currency.clone(),
        success_url: config.stripe.success_url.clone(),
        cancel_url: config.stripe.cancel_url.clone(),
    };

    let allowed_origins: Vec<HeaderValue> = config
        .cors
        .allowed_origins
        .iter()
        .map(|origin| {
            origin.parse::<HeaderValue>().map_err(|_| {
                crate::error::AppError::ConfigError(format!("Invalid CORS origin: {}", origin))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([http::header::CONTENT_TYPE])
        .allow_origin(allowed_origins);

    let app = routes::create_router()
        .layer(DefaultBodyLimit::max(config.server.max_body_size))
        .layer(cors)
        .with_state(state);

    Ok(app)
}
