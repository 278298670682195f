use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Detail view carries the publishable key so the frontend can start the
/// hosted-checkout redirect without a separate config round-trip.
#[derive(Debug, Serialize)]
pub struct ProductDetailResponse {
    pub product: Product,
    #[serde(rename = "stripePublicKey")]
    pub stripe_public_key: String,
}
