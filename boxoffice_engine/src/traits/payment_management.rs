use chrono::{DateTime, Utc};

use crate::{
    bxo_api::{errors::TicketingError, ticket_issuer::TicketIssuer},
    db_types::{NewPayment, Payment},
    traits::PaymentCompletion,
};

#[allow(async_fn_in_trait)]
pub trait PaymentManagement {
    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment, TicketingError>;

    async fn fetch_payment(&self, payment_id: i64) -> Result<Option<Payment>, TicketingError>;

    async fn fetch_payment_by_reference(&self, reference: &str) -> Result<Option<Payment>, TicketingError>;

    async fn fetch_payments_for_order(&self, order_id: i64) -> Result<Vec<Payment>, TicketingError>;

    /// Stores the latest provider payload against a pending payment without changing its status.
    async fn record_provider_response(
        &self,
        payment_id: i64,
        response: &str,
        now: DateTime<Utc>,
    ) -> Result<(), TicketingError>;

    async fn mark_webhook_received(&self, payment_id: i64, now: DateTime<Utc>) -> Result<(), TicketingError>;

    /// `Pending → Failed`. Returns false if the payment had already left `Pending`.
    async fn fail_payment(&self, payment_id: i64, response: &str, now: DateTime<Utc>) -> Result<bool, TicketingError>;

    /// The exactly-once completion unit of work:
    ///
    /// 1. `Pending → Completed` on the payment, as a conditional write. Losing this write means another caller has
    ///    already completed it, and [`PaymentCompletion::AlreadyCompleted`] is returned with that caller's tickets.
    /// 2. `Pending → Paid` on the order.
    /// 3. `Active → Confirmed` on every hold of the order.
    /// 4. One ticket per purchased unit, as produced by `issuer`.
    ///
    /// If any step fails, the whole unit is rolled back and the payment stays `Pending`.
    async fn complete_payment(
        &self,
        payment_id: i64,
        response: &str,
        paid_at: DateTime<Utc>,
        issuer: &TicketIssuer,
    ) -> Result<PaymentCompletion, TicketingError>;
}
