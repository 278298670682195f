use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// DB models

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrderDetail {
    pub id: i32,
    pub customer_email: String,
    pub product_id: i32,
    pub stripe_session_id: String,
    pub quantity: i32,
    /// Total in minor currency units (unit price x 100 x quantity).
    pub amount: i64,
    pub has_paid: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Request types

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub email: String,
    pub quantity: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct SuccessParams {
    pub session_id: Option<String>,
}

// Response types

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    #[serde(rename = "sessionId")]
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub status: &'static str,
    pub order: OrderDetail,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderHistoryItem {
    pub id: i32,
    pub customer_email: String,
    pub product_id: i32,
    pub product_name: String,
    pub stripe_session_id: String,
    pub quantity: i32,
    pub amount: i64,
    pub has_paid: bool,
    pub created_at: DateTime<Utc>,
}

// Stripe webhook payload

#[derive(Debug, Deserialize)]
pub struct StripeWebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

/// The slice of a checkout-session object the webhook receiver cares about.
#[derive(Debug, Deserialize)]
pub struct StripeSessionObject {
    pub id: String,
    pub payment_status: Option<String>,
    pub customer_email: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkout_request_quantity_defaults_to_none() {
        let request: CheckoutRequest =
            serde_json::from_str(r#"{"email": "shopper@example.com"}"#).unwrap();
        assert_eq!(request.email, "shopper@example.com");
        assert!(request.quantity.is_none());
    }

    #[test]
    fn parses_checkout_completed_event() {
        let body = r#"{
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": {
                "object": {
                    "id": "cs_test_123",
                    "object": "checkout.session",
                    "payment_status": "paid",
                    "customer_email": "shopper@example.com",
                    "amount_total": 4900
                }
            }
        }"#;

        let event: StripeWebhookEvent = serde_json::from_str(body).unwrap();
        assert_eq!(event.event_type, "checkout.session.completed");

        let session: StripeSessionObject = serde_json::from_value(event.data.object).unwrap();
        assert_eq!(session.id, "cs_test_123");
        assert_eq!(session.payment_status.as_deref(), Some("paid"));
        assert_eq!(session.customer_email.as_deref(), Some("shopper@example.com"));
    }

    #[test]
    fn session_object_without_id_is_rejected() {
        let object = serde_json::json!({ "payment_status": "paid" });
        assert!(serde_json::from_value::<StripeSessionObject>(object).is_err());
    }

    #[test]
    fn checkout_response_uses_session_id_key() {
        let response = CheckoutResponse {
            session_id: "cs_test_123".to_string(),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["sessionId"], "cs_test_123");
    }
}
