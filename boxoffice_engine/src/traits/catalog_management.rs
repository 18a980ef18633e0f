use crate::{
    bxo_api::errors::TicketingError,
    db_types::{Event, NewEvent, NewTicketTier, TicketTier},
};

/// Read access to the event catalog, plus the minimal write access needed to seed it.
#[allow(async_fn_in_trait)]
pub trait CatalogManagement {
    async fn insert_event(&self, event: NewEvent) -> Result<Event, TicketingError>;

    async fn fetch_event(&self, event_id: i64) -> Result<Option<Event>, TicketingError>;

    async fn insert_tier(&self, tier: NewTicketTier) -> Result<TicketTier, TicketingError>;

    async fn fetch_tier(&self, tier_id: i64) -> Result<Option<TicketTier>, TicketingError>;

    async fn fetch_tiers_for_event(&self, event_id: i64) -> Result<Vec<TicketTier>, TicketingError>;
}
