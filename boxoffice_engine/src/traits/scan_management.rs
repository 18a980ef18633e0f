use chrono::{DateTime, Utc};

use crate::{
    bxo_api::errors::TicketingError,
    db_types::{NewValidation, ScanSession, TicketId, TicketValidation},
};

#[allow(async_fn_in_trait)]
pub trait ScanManagement {
    /// Opens a session for the scanner, closing any session the scanner still has open.
    async fn start_session(
        &self,
        scanner_id: &str,
        event_id: i64,
        now: DateTime<Utc>,
    ) -> Result<ScanSession, TicketingError>;

    /// Closes the session. Closing an already closed session is a no-op.
    async fn end_session(&self, session_id: i64, now: DateTime<Utc>) -> Result<ScanSession, TicketingError>;

    async fn fetch_session(&self, session_id: i64) -> Result<Option<ScanSession>, TicketingError>;

    /// Appends to the validation ledger and bumps the session counters in one unit of work.
    async fn record_validation(&self, validation: NewValidation) -> Result<TicketValidation, TicketingError>;

    /// Admits a ticket. The `Active → Redeemed` compare-and-swap, the `valid` ledger entry and the session tally are
    /// one unit of work: either all of them land or none do. Exactly one concurrent caller gets `Some`; the others get
    /// `None` and nothing is written for them.
    async fn redeem_and_record(
        &self,
        ticket_id: &TicketId,
        validation: NewValidation,
    ) -> Result<Option<TicketValidation>, TicketingError>;

    async fn fetch_validations_for_ticket(&self, ticket_id: &TicketId)
        -> Result<Vec<TicketValidation>, TicketingError>;

    async fn fetch_validations_for_session(&self, session_id: i64) -> Result<Vec<TicketValidation>, TicketingError>;
}
