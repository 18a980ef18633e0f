use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use super::ConditionalUpdate;
use crate::{
    bxo_api::errors::TicketingError,
    db_types::{Event, NewEvent, NewTicketTier, TicketTier},
};

pub async fn insert_event(
    event: NewEvent,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Event, TicketingError> {
    let event = sqlx::query_as(
        r#"
            INSERT INTO events (name, venue, starts_at, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING *;
        "#,
    )
    .bind(event.name)
    .bind(event.venue)
    .bind(event.starts_at)
    .bind(event.status)
    .bind(now)
    .fetch_one(conn)
    .await?;
    Ok(event)
}

pub async fn fetch_event(event_id: i64, conn: &mut SqliteConnection) -> Result<Option<Event>, TicketingError> {
    let event = sqlx::query_as("SELECT * FROM events WHERE id = $1").bind(event_id).fetch_optional(conn).await?;
    Ok(event)
}

pub async fn insert_tier(
    tier: NewTicketTier,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<TicketTier, TicketingError> {
    let tier = sqlx::query_as(
        r#"
            INSERT INTO ticket_tiers (
                event_id,
                name,
                price,
                currency,
                quota,
                hold_minutes,
                sales_start,
                sales_end,
                is_active,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
            RETURNING *;
        "#,
    )
    .bind(tier.event_id)
    .bind(tier.name)
    .bind(tier.price)
    .bind(tier.currency)
    .bind(tier.quota)
    .bind(tier.hold_minutes)
    .bind(tier.sales_start)
    .bind(tier.sales_end)
    .bind(tier.is_active)
    .bind(now)
    .fetch_one(conn)
    .await?;
    Ok(tier)
}

pub async fn fetch_tier(tier_id: i64, conn: &mut SqliteConnection) -> Result<Option<TicketTier>, TicketingError> {
    let tier = sqlx::query_as("SELECT * FROM ticket_tiers WHERE id = $1").bind(tier_id).fetch_optional(conn).await?;
    Ok(tier)
}

pub async fn fetch_tiers_for_event(
    event_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<TicketTier>, TicketingError> {
    let tiers = sqlx::query_as("SELECT * FROM ticket_tiers WHERE event_id = $1 ORDER BY id")
        .bind(event_id)
        .fetch_all(conn)
        .await?;
    Ok(tiers)
}

/// Moves `quantity` units of the tier into `held`, provided that many are still free. This is the only place that
/// capacity is taken, and it is a single conditional write, so concurrent callers can never push a tier past its
/// quota.
pub async fn take_capacity(
    tier_id: i64,
    quantity: i64,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, TicketingError> {
    let taken = ConditionalUpdate::table("ticket_tiers")
        .increment("held", quantity)
        .set("updated_at", now)
        .where_id(tier_id)
        .and("quota - held - sold >=", quantity)
        .execute(conn)
        .await?;
    Ok(taken)
}

/// Applies a held/sold adjustment after a hold leaves `Active`.
pub async fn adjust_counters(
    tier_id: i64,
    held_delta: i64,
    sold_delta: i64,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), TicketingError> {
    let updated = ConditionalUpdate::table("ticket_tiers")
        .increment("held", held_delta)
        .increment("sold", sold_delta)
        .set("updated_at", now)
        .where_id(tier_id)
        .execute(conn)
        .await?;
    if updated {
        Ok(())
    } else {
        Err(TicketingError::TierNotFound(tier_id))
    }
}
