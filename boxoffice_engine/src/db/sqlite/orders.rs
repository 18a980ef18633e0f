use chrono::{DateTime, Utc};
use log::*;
use sqlx::SqliteConnection;

use super::ConditionalUpdate;
use crate::{
    bxo_api::errors::TicketingError,
    db_types::{NewOrder, NewOrderLine, Order, OrderCode, OrderLine, OrderStatusType},
};

const LINE_COLUMNS: &str = r#"
    SELECT
        order_lines.id,
        order_lines.order_id,
        order_lines.tier_id,
        ticket_tiers.name AS tier_name,
        order_lines.quantity,
        order_lines.unit_price,
        order_lines.currency
    FROM order_lines JOIN ticket_tiers ON ticket_tiers.id = order_lines.tier_id
"#;

/// Inserts the order header only. Lines are inserted separately with [`insert_line`] so that the caller can interleave
/// the inventory holds. This is not atomic: run it inside a transaction and pass `&mut *tx` as the connection.
pub async fn insert_order(order: &NewOrder, conn: &mut SqliteConnection) -> Result<Order, TicketingError> {
    let order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_code,
                event_id,
                buyer_name,
                buyer_email,
                buyer_phone,
                status,
                total_price,
                currency,
                created_at,
                expires_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $9)
            RETURNING *;
        "#,
    )
    .bind(order.order_code.as_str())
    .bind(order.event_id)
    .bind(order.buyer_name.as_str())
    .bind(order.buyer_email.as_str())
    .bind(order.buyer_phone.as_deref())
    .bind(OrderStatusType::Pending)
    .bind(order.total_price)
    .bind(order.currency.as_str())
    .bind(order.created_at)
    .bind(order.expires_at)
    .fetch_one(conn)
    .await?;
    Ok(order)
}

pub async fn insert_line(
    order_id: i64,
    line: &NewOrderLine,
    conn: &mut SqliteConnection,
) -> Result<OrderLine, TicketingError> {
    let id: i64 = sqlx::query_scalar(
        r#"
            INSERT INTO order_lines (order_id, tier_id, quantity, unit_price, currency)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id;
        "#,
    )
    .bind(order_id)
    .bind(line.tier_id)
    .bind(line.quantity)
    .bind(line.unit_price)
    .bind(line.currency.as_str())
    .fetch_one(&mut *conn)
    .await?;
    let line = sqlx::query_as(&format!("{LINE_COLUMNS} WHERE order_lines.id = $1")).bind(id).fetch_one(conn).await?;
    Ok(line)
}

pub async fn fetch_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, TicketingError> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(order_id).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_order_by_code(
    code: &OrderCode,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, TicketingError> {
    let order =
        sqlx::query_as("SELECT * FROM orders WHERE order_code = $1").bind(code.as_str()).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_lines(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<OrderLine>, TicketingError> {
    let lines = sqlx::query_as(&format!("{LINE_COLUMNS} WHERE order_lines.order_id = $1 ORDER BY order_lines.id"))
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(lines)
}

/// Pending orders whose hold window has closed.
pub async fn fetch_overdue(now: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<Vec<Order>, TicketingError> {
    let orders = sqlx::query_as("SELECT * FROM orders WHERE status = $1 AND expires_at < $2 ORDER BY expires_at")
        .bind(OrderStatusType::Pending)
        .bind(now)
        .fetch_all(conn)
        .await?;
    Ok(orders)
}

/// `Pending → Paid`. The hold window is not consulted here: a payment the provider has confirmed is honoured even if
/// it lands after the order's nominal expiry, provided the sweeper has not expired the order first.
pub async fn mark_paid(
    order_id: i64,
    paid_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, TicketingError> {
    let order = ConditionalUpdate::transition("orders", OrderStatusType::Pending, OrderStatusType::Paid)?
        .set("paid_at", paid_at)
        .set("updated_at", paid_at)
        .where_id(order_id)
        .fetch_one(conn)
        .await?;
    Ok(order)
}

pub async fn mark_cancelled(
    order_id: i64,
    reason: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, TicketingError> {
    let order = ConditionalUpdate::transition("orders", OrderStatusType::Pending, OrderStatusType::Cancelled)?
        .set("cancel_reason", reason.to_string())
        .set("cancelled_at", now)
        .set("updated_at", now)
        .where_id(order_id)
        .fetch_one(conn)
        .await?;
    Ok(order)
}

/// `Pending → Expired`, but only once `expires_at` has passed.
pub async fn mark_expired(
    order_id: i64,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, TicketingError> {
    let order = ConditionalUpdate::transition("orders", OrderStatusType::Pending, OrderStatusType::Expired)?
        .set("updated_at", now)
        .where_id(order_id)
        .and("expires_at <", now)
        .fetch_one(conn)
        .await?;
    Ok(order)
}

pub async fn set_payment_reference(
    order_id: i64,
    reference: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), TicketingError> {
    let updated = ConditionalUpdate::table("orders")
        .set("payment_reference", reference.to_string())
        .set("updated_at", now)
        .where_id(order_id)
        .execute(conn)
        .await?;
    if !updated {
        return Err(TicketingError::OrderNotFound(order_id.to_string()));
    }
    trace!("🗃️ Order {order_id} now carries payment reference {reference}");
    Ok(())
}
