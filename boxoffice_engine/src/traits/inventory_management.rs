use chrono::{DateTime, Utc};

use crate::{
    bxo_api::errors::TicketingError,
    db_types::{InventoryHold, NewHold},
};

/// Tier-level capacity accounting.
///
/// Every transition here is a conditional write: a hold only moves out of `Active` once, and the tier counters move
/// in the same unit of work as the hold that owns them. Calling a transition on a hold that has already left
/// `Active` returns `Ok(false)` and changes nothing.
#[allow(async_fn_in_trait)]
pub trait InventoryManagement {
    /// Reserves `hold.quantity` units of the tier. Fails with [`TicketingError::InsufficientInventory`] and no side
    /// effects if fewer units remain.
    async fn reserve(&self, hold: NewHold, now: DateTime<Utc>) -> Result<InventoryHold, TicketingError>;

    /// `Active → Released`, returning the units to the tier.
    async fn release_hold(&self, hold_id: i64, now: DateTime<Utc>) -> Result<bool, TicketingError>;

    /// `Active → Confirmed`, moving the units from held to sold.
    async fn confirm_hold(&self, hold_id: i64, now: DateTime<Utc>) -> Result<bool, TicketingError>;

    /// `Active → Expired`, returning the units to the tier.
    async fn expire_hold(&self, hold_id: i64, now: DateTime<Utc>) -> Result<bool, TicketingError>;

    /// Expires every active hold whose expiry time is before `now`, optionally restricted to one tier.
    /// Returns the holds that this call expired.
    async fn reap_expired_holds(
        &self,
        now: DateTime<Utc>,
        tier_id: Option<i64>,
    ) -> Result<Vec<InventoryHold>, TicketingError>;

    async fn fetch_hold(&self, hold_id: i64) -> Result<Option<InventoryHold>, TicketingError>;

    async fn fetch_holds_for_order(&self, order_id: i64) -> Result<Vec<InventoryHold>, TicketingError>;
}
