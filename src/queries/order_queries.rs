use sqlx::PgPool;

use crate::{
    error::Result,
    models::{OrderDetail, OrderHistoryItem},
};

pub async fn create_order(
    pool: &PgPool,
    customer_email: &str,
    product_id: i32,
    stripe_session_id: &str,
    quantity: i32,
    amount: i64,
) -> Result<OrderDetail> {
    let order = sqlx::query_as::<_, OrderDetail>(
        "INSERT INTO order_details (customer_email, product_id, stripe_session_id, quantity, amount)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING *",
    )
    .bind(customer_email)
    .bind(product_id)
    .bind(stripe_session_id)
    .bind(quantity)
    .bind(amount)
    .fetch_one(pool)
    .await?;

    Ok(order)
}

pub async fn find_by_session_id(pool: &PgPool, session_id: &str) -> Result<Option<OrderDetail>> {
    let order = sqlx::query_as::<_, OrderDetail>(
        "SELECT * FROM order_details WHERE stripe_session_id = $1",
    )
    .bind(session_id)
    .fetch_optional(pool)
    .await?;

    Ok(order)
}

/// Marks the order for this checkout session as paid. The update only ever
/// sets the flag to true, so repeated provider callbacks are safe no-ops.
pub async fn mark_paid_by_session_id(
    pool: &PgPool,
    session_id: &str,
) -> Result<Option<OrderDetail>> {
    let order = sqlx::query_as::<_, OrderDetail>(
        "UPDATE order_details
         SET has_paid = TRUE,
             updated_at = CASE WHEN has_paid THEN updated_at ELSE NOW() END
         WHERE stripe_session_id = $1
         RETURNING *",
    )
    .bind(session_id)
    .fetch_optional(pool)
    .await?;

    Ok(order)
}

pub async fn list_orders(pool: &PgPool) -> Result<Vec<OrderHistoryItem>> {
    let orders = sqlx::query_as::<_, OrderHistoryItem>(
        "SELECT o.id, o.customer_email, o.product_id, p.name AS product_name,
                o.stripe_session_id, o.quantity, o.amount, o.has_paid, o.created_at
         FROM order_details o
         JOIN products p ON p.id = o.product_id
         ORDER BY o.created_at DESC",
    )
    .fetch_all(pool)
    .await?;

    Ok(orders)
}
