use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::config::StripeConfig;
use crate::error::{AppError, Result};

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Signed payloads older than this are rejected to limit replay.
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

type HmacSha256 = Hmac<Sha256>;

/// Checkout session as returned by the provider. Creation responses carry
/// `url`; retrieval responses carry the payment fields.
#[derive(Debug, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
    pub payment_status: Option<String>,
    pub customer_email: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StripeClient {
    client: reqwest::Client,
    secret_key: String,
    webhook_secret: String,
}

impl StripeClient {
    pub fn new(config: &StripeConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            secret_key: config.secret_key.clone(),
            webhook_secret: config.webhook_secret.clone(),
        }
    }

    /// Creates a hosted checkout session for a single line item with ad-hoc
    /// price data.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_checkout_session(
        &self,
        customer_email: &str,
        product_name: &str,
        product_description: Option<&str>,
        currency: &str,
        unit_amount: i64,
        quantity: i32,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<CheckoutSession> {
        let unit_amount = unit_amount.to_string();
        let quantity = quantity.to_string();

        let mut form: Vec<(&str, &str)> = vec![
            ("mode", "payment"),
            ("customer_email", customer_email),
            ("payment_method_types[0]", "card"),
            ("line_items[0][price_data][currency]", currency),
            ("line_items[0][price_data][unit_amount]", &unit_amount),
            ("line_items[0][price_data][product_data][name]", product_name),
            ("line_items[0][quantity]", &quantity),
            ("success_url", success_url),
            ("cancel_url", cancel_url),
        ];
        if let Some(description) = product_description {
            form.push((
                "line_items[0][price_data][product_data][description]",
                description,
            ));
        }

        let response = self
            .client
            .post(format!("{}/checkout/sessions", STRIPE_API_BASE))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&form)
            .send()
            .await
            .map_err(|e| AppError::PaymentError(format!("Stripe request failed: {}", e)))?;

        Self::parse_session_response(response).await
    }

    /// Fetches an existing checkout session by id.
    pub async fn retrieve_checkout_session(&self, session_id: &str) -> Result<CheckoutSession> {
        let response = self
            .client
            .get(format!(
                "{}/checkout/sessions/{}",
                STRIPE_API_BASE, session_id
            ))
            .basic_auth(&self.secret_key, None::<&str>)
            .send()
            .await
            .map_err(|e| AppError::PaymentError(format!("Stripe request failed: {}", e)))?;

        Self::parse_session_response(response).await
    }

    async fn parse_session_response(response: reqwest::Response) -> Result<CheckoutSession> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Stripe API error ({}): {}", status, body);
            return Err(AppError::PaymentError(format!(
                "Stripe API returned {}",
                status
            )));
        }

        let session = response
            .json::<CheckoutSession>()
            .await
            .map_err(|e| AppError::PaymentError(format!("Invalid Stripe response: {}", e)))?;

        Ok(session)
    }

    /// Verifies a `stripe-signature` header (`t=<unix>,v1=<hex>`): the
    /// signature is HMAC-SHA256 over `"{t}.{body}"` keyed with the webhook
    /// secret, compared in constant time, with a replay window on `t`.
    pub fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> Result<bool> {
        let (timestamp_str, sig_v1) = parse_signature_header(signature)
            .ok_or_else(|| AppError::BadRequest("Malformed signature header".to_string()))?;

        let timestamp: i64 = timestamp_str
            .parse()
            .map_err(|_| AppError::BadRequest("Malformed signature timestamp".to_string()))?;

        let age = chrono::Utc::now().timestamp() - timestamp;
        if age > SIGNATURE_TOLERANCE_SECS {
            tracing::warn!("Webhook signature too old ({}s)", age);
            return Ok(false);
        }
        // small allowance for clock skew
        if age < -60 {
            tracing::warn!("Webhook signature timestamp in the future ({}s)", age);
            return Ok(false);
        }

        let mut mac = HmacSha256::new_from_slice(self.webhook_secret.as_bytes())
            .map_err(|_| AppError::InternalError("Invalid webhook secret".to_string()))?;
        mac.update(timestamp_str.as_bytes());
        mac.update(b".");
        mac.update(payload);
        let expected = hex::encode(mac.finalize().into_bytes());

        // hex length is not secret; the contents are compared in constant time
        if expected.len() != sig_v1.len() {
            return Ok(false);
        }

        Ok(expected.as_bytes().ct_eq(sig_v1.as_bytes()).into())
    }
}

fn parse_signature_header(signature: &str) -> Option<(&str, &str)> {
    let mut timestamp = None;
    let mut sig_v1 = None;

    for part in signature.split(',') {
        if let Some(t) = part.strip_prefix("t=") {
            timestamp = Some(t);
        } else if let Some(s) = part.strip_prefix("v1=") {
            sig_v1 = Some(s);
        }
    }

    Some((timestamp?, sig_v1?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StripeConfig;

    fn test_client(webhook_secret: &str) -> StripeClient {
        StripeClient::new(&StripeConfig {
            public_key: "pk_test".to_string(),
            secret_key: "sk_test".to_string(),
            webhook_secret: webhook_secret.to_string(),
            currency: "usd".to_string(),
            success_url: "http://localhost/success".to_string(),
            cancel_url: "http://localhost/cancel".to_string(),
        })
    }

    fn sign(secret: &str, timestamp: i64, payload: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        format!(
            "t={},v1={}",
            timestamp,
            hex::encode(mac.finalize().into_bytes())
        )
    }

    #[test]
    fn accepts_correctly_signed_payload() {
        let client = test_client("whsec_test");
        let payload = br#"{"type":"checkout.session.completed"}"#;
        let header = sign("whsec_test", chrono::Utc::now().timestamp(), payload);

        assert!(client.verify_webhook_signature(payload, &header).unwrap());
    }

    #[test]
    fn rejects_tampered_payload() {
        let client = test_client("whsec_test");
        let header = sign(
            "whsec_test",
            chrono::Utc::now().timestamp(),
            br#"{"amount":100}"#,
        );

        assert!(!client
            .verify_webhook_signature(br#"{"amount":999}"#, &header)
            .unwrap());
    }

    #[test]
    fn rejects_signature_from_wrong_secret() {
        let client = test_client("whsec_real");
        let payload = b"{}";
        let header = sign("whsec_forged", chrono::Utc::now().timestamp(), payload);

        assert!(!client.verify_webhook_signature(payload, &header).unwrap());
    }

    #[test]
    fn rejects_stale_timestamp() {
        let client = test_client("whsec_test");
        let payload = b"{}";
        let stale = chrono::Utc::now().timestamp() - SIGNATURE_TOLERANCE_SECS - 10;
        let header = sign("whsec_test", stale, payload);

        assert!(!client.verify_webhook_signature(payload, &header).unwrap());
    }

    #[test]
    fn rejects_malformed_header() {
        let client = test_client("whsec_test");

        assert!(client.verify_webhook_signature(b"{}", "v1=abc").is_err());
        assert!(client.verify_webhook_signature(b"{}", "t=123").is_err());
        assert!(client.verify_webhook_signature(b"{}", "nonsense").is_err());
        assert!(client
            .verify_webhook_signature(b"{}", "t=notanumber,v1=abc")
            .is_err());
    }

    #[test]
    fn parses_signature_header_parts_in_any_order() {
        assert_eq!(
            parse_signature_header("v1=aabb,t=1700000000"),
            Some(("1700000000", "aabb"))
        );
        assert_eq!(
            parse_signature_header("t=1700000000,v1=aabb,v0=ignored"),
            Some(("1700000000", "aabb"))
        );
    }
}
