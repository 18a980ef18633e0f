use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;

use crate::{
    bxo_api::errors::TicketingError,
    db_types::{InventoryHold, NewHold},
    traits::{CatalogManagement, InventoryManagement},
};

/// `InventoryApi` manages time-boxed holds against ticket tier capacity.
///
/// Capacity is only ever taken by a single conditional write, and every transition out of `Active` is a
/// compare-and-swap, so any number of API instances (in one process or many) can share a database.
pub struct InventoryApi<B> {
    db: B,
}

impl<B> Debug for InventoryApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InventoryApi")
    }
}

impl<B> InventoryApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> InventoryApi<B>
where B: InventoryManagement + CatalogManagement
{
    /// Holds `hold.quantity` units of the tier until `hold.expires_at`. Fails with
    /// [`TicketingError::InsufficientInventory`], and no side effects, if the tier cannot cover the request.
    pub async fn reserve(&self, hold: NewHold, now: DateTime<Utc>) -> Result<InventoryHold, TicketingError> {
        if hold.expires_at <= now {
            return Err(TicketingError::ValidationError("A hold must expire in the future".into()));
        }
        self.db.fetch_tier(hold.tier_id).await?.ok_or(TicketingError::TierNotFound(hold.tier_id))?;
        self.db.reserve(hold, now).await
    }

    /// Units of the tier that are neither held nor sold.
    pub async fn available(&self, tier_id: i64) -> Result<i64, TicketingError> {
        let tier = self.db.fetch_tier(tier_id).await?.ok_or(TicketingError::TierNotFound(tier_id))?;
        Ok(tier.available())
    }

    /// Returns `false` if the hold had already left `Active`.
    pub async fn release(&self, hold_id: i64, now: DateTime<Utc>) -> Result<bool, TicketingError> {
        self.db.release_hold(hold_id, now).await
    }

    /// Returns `false` if the hold had already left `Active`.
    pub async fn confirm(&self, hold_id: i64, now: DateTime<Utc>) -> Result<bool, TicketingError> {
        self.db.confirm_hold(hold_id, now).await
    }

    /// Returns `false` if the hold had already left `Active`.
    pub async fn expire(&self, hold_id: i64, now: DateTime<Utc>) -> Result<bool, TicketingError> {
        self.db.expire_hold(hold_id, now).await
    }

    /// Expires every active hold whose window closed before `now` and returns its units to the tier. Safe to run
    /// concurrently with itself, with `reserve`, and with payment completion.
    pub async fn reap_expired(&self, now: DateTime<Utc>) -> Result<Vec<InventoryHold>, TicketingError> {
        let reaped = self.db.reap_expired_holds(now, None).await?;
        if !reaped.is_empty() {
            info!("🔄️ {} expired holds returned to inventory", reaped.len());
        }
        Ok(reaped)
    }

    pub async fn holds_for_order(&self, order_id: i64) -> Result<Vec<InventoryHold>, TicketingError> {
        self.db.fetch_holds_for_order(order_id).await
    }
}
