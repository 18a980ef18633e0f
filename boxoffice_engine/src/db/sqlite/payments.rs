use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use super::ConditionalUpdate;
use crate::{
    bxo_api::errors::TicketingError,
    db_types::{NewPayment, Payment, PaymentStatus},
};

pub async fn insert_payment(payment: NewPayment, conn: &mut SqliteConnection) -> Result<Payment, TicketingError> {
    let payment = sqlx::query_as(
        r#"
            INSERT INTO payments (
                order_id,
                provider,
                amount,
                currency,
                status,
                reference,
                authorization_url,
                provider_response,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
            RETURNING *;
        "#,
    )
    .bind(payment.order_id)
    .bind(payment.provider)
    .bind(payment.amount)
    .bind(payment.currency)
    .bind(PaymentStatus::Pending)
    .bind(payment.reference)
    .bind(payment.authorization_url)
    .bind(payment.provider_response)
    .bind(payment.created_at)
    .fetch_one(conn)
    .await?;
    Ok(payment)
}

pub async fn fetch_payment(payment_id: i64, conn: &mut SqliteConnection) -> Result<Option<Payment>, TicketingError> {
    let payment = sqlx::query_as("SELECT * FROM payments WHERE id = $1").bind(payment_id).fetch_optional(conn).await?;
    Ok(payment)
}

pub async fn fetch_by_reference(
    reference: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, TicketingError> {
    let payment =
        sqlx::query_as("SELECT * FROM payments WHERE reference = $1").bind(reference).fetch_optional(conn).await?;
    Ok(payment)
}

pub async fn fetch_for_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Payment>, TicketingError> {
    let payments = sqlx::query_as("SELECT * FROM payments WHERE order_id = $1 ORDER BY id")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(payments)
}

/// Stores the latest raw provider payload against a payment that is still pending.
pub async fn record_response(
    payment_id: i64,
    response: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, TicketingError> {
    let updated = ConditionalUpdate::table("payments")
        .set("provider_response", response.to_string())
        .set("updated_at", now)
        .where_id(payment_id)
        .and("status =", PaymentStatus::Pending)
        .execute(conn)
        .await?;
    Ok(updated)
}

pub async fn mark_webhook_received(
    payment_id: i64,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, TicketingError> {
    let updated = ConditionalUpdate::table("payments")
        .set("webhook_received_at", now)
        .set("updated_at", now)
        .where_id(payment_id)
        .execute(conn)
        .await?;
    Ok(updated)
}

/// `Pending → Completed`. Exactly one caller can win this for a given payment.
pub async fn mark_completed(
    payment_id: i64,
    response: &str,
    paid_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, TicketingError> {
    let payment = ConditionalUpdate::transition("payments", PaymentStatus::Pending, PaymentStatus::Completed)?
        .set("provider_response", response.to_string())
        .set("paid_at", paid_at)
        .set("updated_at", paid_at)
        .where_id(payment_id)
        .fetch_one(conn)
        .await?;
    Ok(payment)
}

/// `Pending → Failed`
pub async fn mark_failed(
    payment_id: i64,
    response: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, TicketingError> {
    let updated = ConditionalUpdate::transition("payments", PaymentStatus::Pending, PaymentStatus::Failed)?
        .set("provider_response", response.to_string())
        .set("updated_at", now)
        .where_id(payment_id)
        .execute(conn)
        .await?;
    Ok(updated)
}
