use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use rust_decimal::{prelude::ToPrimitive, Decimal};

use crate::{
    error::{AppError, Result},
    models::{
        CheckoutRequest, CheckoutResponse, OrderHistoryItem, StripeSessionObject,
        StripeWebhookEvent, SuccessParams, SuccessResponse,
    },
    queries::{order_queries, product_queries},
    AppState,
};

/// Unit amount is trunc(price * 100); the order total multiplies it by the
/// quantity. Both in minor currency units.
fn line_amounts(price: Decimal, quantity: i32) -> Option<(i64, i64)> {
    let unit_amount = (price * Decimal::from(100)).trunc().to_i64()?;
    let total = unit_amount.checked_mul(i64::from(quantity))?;
    Some((unit_amount, total))
}

pub async fn checkout(
    State(state): State<AppState>,
    Path(product_id): Path<i32>,
    Json(payload): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>> {
    if payload.email.trim().is_empty() || !payload.email.contains('@') {
        return Err(AppError::BadRequest("A valid email is required".to_string()));
    }

    let quantity = payload.quantity.unwrap_or(1);
    if quantity < 1 {
        return Err(AppError::BadRequest(
            "Quantity must be at least 1".to_string(),
        ));
    }

    let product = product_queries::find_by_id(&state.db, product_id)
        .await?
        .ok_or(AppError::NotFound("Product not found".to_string()))?;

    let (unit_amount, amount) = line_amounts(product.price, quantity)
        .filter(|(unit, _)| *unit > 0)
        .ok_or_else(|| AppError::InternalError("Could not compute order amount".to_string()))?;

    // The provider substitutes the placeholder with the real session id
    // when it redirects the customer back.
    let success_url = format!("{}?session_id={{CHECKOUT_SESSION_ID}}", state.success_url);

    let session = state
        .stripe
        .create_checkout_session(
            &payload.email,
            &product.name,
            product.description.as_deref(),
            &state.currency,
            unit_amount,
            quantity,
            &success_url,
            &state.cancel_url,
        )
        .await?;

    order_queries::create_order(
        &state.db,
        &payload.email,
        product.id,
        &session.id,
        quantity,
        amount,
    )
    .await?;

    tracing::info!(
        session_id = %session.id,
        product_id = product.id,
        quantity,
        amount,
        "Created checkout session"
    );

    Ok(Json(CheckoutResponse {
        session_id: session.id,
    }))
}

pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let signature = match headers.get("stripe-signature").and_then(|v| v.to_str().ok()) {
        Some(sig) => sig,
        None => {
            tracing::warn!("Webhook rejected: missing stripe-signature header");
            return StatusCode::BAD_REQUEST;
        }
    };

    match state.stripe.verify_webhook_signature(&body, signature) {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!("Webhook rejected: invalid signature");
            return StatusCode::BAD_REQUEST;
        }
        Err(e) => {
            tracing::warn!("Webhook rejected: {}", e);
            return StatusCode::BAD_REQUEST;
        }
    }

    let event: StripeWebhookEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!("Cannot parse webhook body: {}", e);
            return StatusCode::BAD_REQUEST;
        }
    };

    if event.event_type != "checkout.session.completed" {
        tracing::debug!("Ignoring webhook event type {}", event.event_type);
        return StatusCode::OK;
    }

    let session: StripeSessionObject = match serde_json::from_value(event.data.object) {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!("Cannot parse checkout session object: {}", e);
            return StatusCode::BAD_REQUEST;
        }
    };

    match order_queries::find_by_session_id(&state.db, &session.id).await {
        Ok(Some(order)) => {
            tracing::info!(
                session_id = %session.id,
                order_id = order.id,
                product_id = order.product_id,
                customer_email = %order.customer_email,
                quantity = order.quantity,
                amount = order.amount,
                already_paid = order.has_paid,
                "Checkout completed, marking order as paid"
            );

            if let Err(e) = order_queries::mark_paid_by_session_id(&state.db, &session.id).await {
                tracing::error!("Failed to mark order {} as paid: {:?}", order.id, e);
                return StatusCode::INTERNAL_SERVER_ERROR;
            }

            StatusCode::OK
        }
        Ok(None) => {
            // Not fatal: the session may belong to another environment
            tracing::warn!("No order found for checkout session {}", session.id);
            StatusCode::OK
        }
        Err(e) => {
            tracing::error!("Failed to look up order for session {}: {:?}", session.id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Redundant confirmation path: the customer lands here after checkout, the
/// session is re-fetched from the provider and the matching order marked
/// paid whether or not the webhook already did.
pub async fn success(
    State(state): State<AppState>,
    Query(params): Query<SuccessParams>,
) -> Result<Json<SuccessResponse>> {
    // 404 before any provider round-trip when the parameter is absent
    let session_id = params
        .session_id
        .ok_or(AppError::NotFound("Missing session_id".to_string()))?;

    let session = state.stripe.retrieve_checkout_session(&session_id).await?;

    let order = order_queries::mark_paid_by_session_id(&state.db, &session.id)
        .await?
        .ok_or(AppError::NotFound("Order not found".to_string()))?;

    tracing::info!(
        session_id = %session.id,
        order_id = order.id,
        "Order confirmed via success page"
    );

    Ok(Json(SuccessResponse {
        status: "paid",
        order,
    }))
}

pub async fn get_orders(State(state): State<AppState>) -> Result<Json<Vec<OrderHistoryItem>>> {
    let orders = order_queries::list_orders(&state.db).await?;

    Ok(Json(orders))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_is_price_times_hundred_times_quantity() {
        let (unit, total) = line_amounts(Decimal::new(1999, 2), 3).unwrap();
        assert_eq!(unit, 1999);
        assert_eq!(total, 5997);
    }

    #[test]
    fn single_quantity_total_equals_unit_amount() {
        let (unit, total) = line_amounts(Decimal::new(1800, 2), 1).unwrap();
        assert_eq!(unit, 1800);
        assert_eq!(total, unit);
    }

    #[test]
    fn sub_cent_prices_truncate() {
        let (unit, _) = line_amounts(Decimal::new(19999, 3), 2).unwrap();
        assert_eq!(unit, 1999);
    }

    #[test]
    fn overflowing_amount_is_rejected() {
        assert!(line_amounts(Decimal::from(i64::MAX), 2).is_none());
    }
}
