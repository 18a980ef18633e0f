use chrono::{DateTime, Utc};
use log::*;
use sqlx::SqliteConnection;

use super::{catalog, ConditionalUpdate};
use crate::{
    bxo_api::errors::TicketingError,
    db_types::{HoldStatus, InventoryHold, NewHold},
};

/// Takes capacity from the tier and records the hold. If the tier cannot cover the quantity, nothing is written.
pub async fn reserve(
    hold: NewHold,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<InventoryHold, TicketingError> {
    if hold.quantity <= 0 {
        return Err(TicketingError::ValidationError(format!("Cannot hold {} units", hold.quantity)));
    }
    if !catalog::take_capacity(hold.tier_id, hold.quantity, now, conn).await? {
        debug!("🗃️ Tier {} cannot cover a hold of {} units", hold.tier_id, hold.quantity);
        return Err(TicketingError::InsufficientInventory { tier_id: hold.tier_id, requested: hold.quantity });
    }
    let hold = sqlx::query_as(
        r#"
            INSERT INTO inventory_holds (
                order_id,
                order_line_id,
                tier_id,
                quantity,
                status,
                expires_at,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING *;
        "#,
    )
    .bind(hold.order_id)
    .bind(hold.order_line_id)
    .bind(hold.tier_id)
    .bind(hold.quantity)
    .bind(HoldStatus::Active)
    .bind(hold.expires_at)
    .bind(now)
    .fetch_one(conn)
    .await?;
    Ok(hold)
}

/// Moves the hold out of `Active` and returns its units to the tier (or, for `Confirmed`, converts them to sold).
/// Returns `None` if the hold was no longer active.
pub async fn transition(
    hold_id: i64,
    to: HoldStatus,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<InventoryHold>, TicketingError> {
    let hold = ConditionalUpdate::transition("inventory_holds", HoldStatus::Active, to)?
        .set("updated_at", now)
        .where_id(hold_id)
        .fetch_one::<InventoryHold>(conn)
        .await?;
    if let Some(hold) = &hold {
        settle_counters(hold, now, conn).await?;
    }
    Ok(hold)
}

/// As [`transition`], for every active hold of the order.
pub async fn transition_for_order(
    order_id: i64,
    to: HoldStatus,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<InventoryHold>, TicketingError> {
    let holds = ConditionalUpdate::transition("inventory_holds", HoldStatus::Active, to)?
        .set("updated_at", now)
        .where_eq("order_id", order_id)
        .fetch_all::<InventoryHold>(conn)
        .await?;
    for hold in &holds {
        settle_counters(hold, now, conn).await?;
    }
    trace!("🗃️ {} holds of order {order_id} moved to {to}", holds.len());
    Ok(holds)
}

/// Expires the hold if it is still active and its expiry time has passed.
pub async fn expire_if_due(
    hold_id: i64,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<InventoryHold>, TicketingError> {
    let hold = ConditionalUpdate::transition("inventory_holds", HoldStatus::Active, HoldStatus::Expired)?
        .set("updated_at", now)
        .where_id(hold_id)
        .and("expires_at <", now)
        .fetch_one::<InventoryHold>(conn)
        .await?;
    if let Some(hold) = &hold {
        settle_counters(hold, now, conn).await?;
    }
    Ok(hold)
}

async fn settle_counters(
    hold: &InventoryHold,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), TicketingError> {
    let (held, sold) = match hold.status {
        HoldStatus::Confirmed => (-hold.quantity, hold.quantity),
        HoldStatus::Released | HoldStatus::Expired => (-hold.quantity, 0),
        HoldStatus::Active => return Ok(()),
    };
    catalog::adjust_counters(hold.tier_id, held, sold, now, conn).await
}

pub async fn fetch_hold(hold_id: i64, conn: &mut SqliteConnection) -> Result<Option<InventoryHold>, TicketingError> {
    let hold = sqlx::query_as("SELECT * FROM inventory_holds WHERE id = $1").bind(hold_id).fetch_optional(conn).await?;
    Ok(hold)
}

pub async fn fetch_holds_for_order(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<InventoryHold>, TicketingError> {
    let holds = sqlx::query_as("SELECT * FROM inventory_holds WHERE order_id = $1 ORDER BY id")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(holds)
}

/// Active holds whose expiry time is before `now`.
pub async fn fetch_expired_active(
    now: DateTime<Utc>,
    tier_id: Option<i64>,
    conn: &mut SqliteConnection,
) -> Result<Vec<InventoryHold>, TicketingError> {
    let holds = sqlx::query_as(
        r#"
            SELECT * FROM inventory_holds
            WHERE status = $1 AND expires_at < $2 AND ($3 IS NULL OR tier_id = $3)
            ORDER BY expires_at;
        "#,
    )
    .bind(HoldStatus::Active)
    .bind(now)
    .bind(tier_id)
    .fetch_all(conn)
    .await?;
    Ok(holds)
}
