//! `SqliteDatabase` is the concrete box office backend.
//!
//! It composes the low-level functions in the sibling modules into the units of work the engine traits describe. Reads
//! go straight to the pool. Every write that returns rows opens a transaction, performs its first write, and commits,
//! even when it is a single statement: the commit is what makes the row visible to the other pooled connections. A
//! lost compare-and-swap rolls the transaction back and re-reads from the pool to report what won.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use sqlx::SqlitePool;

use super::{catalog, db_url, holds, new_pool, orders, payments, scans, tickets};
use crate::{
    bxo_api::{errors::TicketingError, ticket_issuer::TicketIssuer},
    db_types::{
        Event,
        HoldStatus,
        InventoryHold,
        NewEvent,
        NewHold,
        NewOrder,
        NewPayment,
        NewTicketTier,
        NewValidation,
        Order,
        OrderCode,
        OrderLine,
        OrderStatusType,
        Payment,
        PaymentStatus,
        ScanSession,
        Ticket,
        TicketId,
        TicketTier,
        TicketValidation,
    },
    traits::{
        CatalogManagement,
        CreatedOrder,
        InventoryManagement,
        OrderManagement,
        PaymentCompletion,
        PaymentManagement,
        ScanManagement,
        TicketManagement,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({})", self.url)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the URL in `BXO_DATABASE_URL`
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Applies any outstanding schema migrations. Migrations that have already run are skipped.
    pub async fn migrate(&self) -> Result<(), TicketingError> {
        sqlx::migrate!("./src/db/sqlite/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| TicketingError::DatabaseError(format!("Migration failed. {e}")))?;
        debug!("🗃️ Database schema is up to date");
        Ok(())
    }

    async fn hold_exists(&self, hold_id: i64) -> Result<(), TicketingError> {
        let mut conn = self.pool.acquire().await?;
        match holds::fetch_hold(hold_id, &mut conn).await? {
            Some(_) => Ok(()),
            None => Err(TicketingError::HoldNotFound(hold_id)),
        }
    }

    async fn move_hold(&self, hold_id: i64, to: HoldStatus, now: DateTime<Utc>) -> Result<bool, TicketingError> {
        let mut tx = self.pool.begin().await?;
        let moved = holds::transition(hold_id, to, now, &mut tx).await?;
        tx.commit().await?;
        if moved.is_none() {
            // Already terminal is a no-op; only a missing hold is an error.
            self.hold_exists(hold_id).await?;
            trace!("🗃️ Hold {hold_id} is no longer active. {to} is a no-op");
        }
        Ok(moved.is_some())
    }

    /// Explains why a `Pending → X` order transition did not apply.
    async fn order_not_pending(&self, order_id: i64) -> Result<Order, TicketingError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order(order_id, &mut conn).await?;
        order.ok_or_else(|| TicketingError::OrderNotFound(order_id.to_string()))
    }

    /// Resolves a lost `Pending → Completed` race by reading what the winner left behind.
    async fn completion_lost(&self, payment_id: i64) -> Result<PaymentCompletion, TicketingError> {
        let mut conn = self.pool.acquire().await?;
        let payment = payments::fetch_payment(payment_id, &mut conn)
            .await?
            .ok_or_else(|| TicketingError::PaymentNotFound(payment_id.to_string()))?;
        match payment.status {
            PaymentStatus::Completed => {
                let tickets = tickets::fetch_for_order(payment.order_id, &mut conn).await?;
                debug!("🗃️ Payment {payment_id} was already completed with {} tickets", tickets.len());
                Ok(PaymentCompletion::AlreadyCompleted { payment, tickets })
            },
            status => Err(TicketingError::PaymentNotPending { id: payment_id, status }),
        }
    }
}

impl CatalogManagement for SqliteDatabase {
    async fn insert_event(&self, event: NewEvent) -> Result<Event, TicketingError> {
        let mut tx = self.pool.begin().await?;
        let event = catalog::insert_event(event, Utc::now(), &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Event #{} '{}' saved", event.id, event.name);
        Ok(event)
    }

    async fn fetch_event(&self, event_id: i64) -> Result<Option<Event>, TicketingError> {
        let mut conn = self.pool.acquire().await?;
        catalog::fetch_event(event_id, &mut conn).await
    }

    async fn insert_tier(&self, tier: NewTicketTier) -> Result<TicketTier, TicketingError> {
        let mut tx = self.pool.begin().await?;
        let tier = catalog::insert_tier(tier, Utc::now(), &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Tier #{} '{}' saved for event #{} with quota {}", tier.id, tier.name, tier.event_id, tier.quota);
        Ok(tier)
    }

    async fn fetch_tier(&self, tier_id: i64) -> Result<Option<TicketTier>, TicketingError> {
        let mut conn = self.pool.acquire().await?;
        catalog::fetch_tier(tier_id, &mut conn).await
    }

    async fn fetch_tiers_for_event(&self, event_id: i64) -> Result<Vec<TicketTier>, TicketingError> {
        let mut conn = self.pool.acquire().await?;
        catalog::fetch_tiers_for_event(event_id, &mut conn).await
    }
}

impl InventoryManagement for SqliteDatabase {
    async fn reserve(&self, hold: NewHold, now: DateTime<Utc>) -> Result<InventoryHold, TicketingError> {
        let mut tx = self.pool.begin().await?;
        let hold = holds::reserve(hold, now, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Hold #{} of {} units on tier {} taken", hold.id, hold.quantity, hold.tier_id);
        Ok(hold)
    }

    async fn release_hold(&self, hold_id: i64, now: DateTime<Utc>) -> Result<bool, TicketingError> {
        self.move_hold(hold_id, HoldStatus::Released, now).await
    }

    async fn confirm_hold(&self, hold_id: i64, now: DateTime<Utc>) -> Result<bool, TicketingError> {
        self.move_hold(hold_id, HoldStatus::Confirmed, now).await
    }

    async fn expire_hold(&self, hold_id: i64, now: DateTime<Utc>) -> Result<bool, TicketingError> {
        self.move_hold(hold_id, HoldStatus::Expired, now).await
    }

    /// Each candidate is expired in its own transaction, guarded on still being active and overdue. Several reapers
    /// (or a reaper and a payment completion) can work the same candidates; each hold moves at most once.
    async fn reap_expired_holds(
        &self,
        now: DateTime<Utc>,
        tier_id: Option<i64>,
    ) -> Result<Vec<InventoryHold>, TicketingError> {
        let candidates = {
            let mut conn = self.pool.acquire().await?;
            holds::fetch_expired_active(now, tier_id, &mut conn).await?
        };
        let mut reaped = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let mut tx = self.pool.begin().await?;
            match holds::expire_if_due(candidate.id, now, &mut tx).await? {
                Some(hold) => {
                    tx.commit().await?;
                    reaped.push(hold);
                },
                None => {
                    tx.rollback().await?;
                    trace!("🗃️ Hold #{} moved on before it could be reaped", candidate.id);
                },
            }
        }
        if !reaped.is_empty() {
            debug!("🗃️ Reaped {} expired holds", reaped.len());
        }
        Ok(reaped)
    }

    async fn fetch_hold(&self, hold_id: i64) -> Result<Option<InventoryHold>, TicketingError> {
        let mut conn = self.pool.acquire().await?;
        holds::fetch_hold(hold_id, &mut conn).await
    }

    async fn fetch_holds_for_order(&self, order_id: i64) -> Result<Vec<InventoryHold>, TicketingError> {
        let mut conn = self.pool.acquire().await?;
        holds::fetch_holds_for_order(order_id, &mut conn).await
    }
}

impl OrderManagement for SqliteDatabase {
    /// Writes the order, its lines and one hold per line in a single transaction. If any line cannot be covered, the
    /// transaction is dropped and nothing of the order is visible.
    async fn create_order(&self, order: NewOrder) -> Result<CreatedOrder, TicketingError> {
        let mut tx = self.pool.begin().await?;
        let header = orders::insert_order(&order, &mut tx).await?;
        let mut lines = Vec::with_capacity(order.lines.len());
        let mut order_holds = Vec::with_capacity(order.lines.len());
        for new_line in &order.lines {
            let line = orders::insert_line(header.id, new_line, &mut tx).await?;
            let hold = NewHold {
                order_id: header.id,
                order_line_id: line.id,
                tier_id: line.tier_id,
                quantity: line.quantity,
                expires_at: header.expires_at,
            };
            let hold = holds::reserve(hold, order.created_at, &mut tx).await?;
            lines.push(line);
            order_holds.push(hold);
        }
        tx.commit().await?;
        debug!("🗃️ Order {} saved with {} lines, held until {}", header.order_code, lines.len(), header.expires_at);
        Ok(CreatedOrder { order: header, lines, holds: order_holds })
    }

    async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, TicketingError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order(order_id, &mut conn).await
    }

    async fn fetch_order_by_code(&self, code: &OrderCode) -> Result<Option<Order>, TicketingError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_by_code(code, &mut conn).await
    }

    async fn fetch_order_lines(&self, order_id: i64) -> Result<Vec<OrderLine>, TicketingError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_lines(order_id, &mut conn).await
    }

    async fn cancel_order(&self, order_id: i64, reason: &str, now: DateTime<Utc>) -> Result<Order, TicketingError> {
        let mut tx = self.pool.begin().await?;
        let Some(order) = orders::mark_cancelled(order_id, reason, now, &mut tx).await? else {
            tx.rollback().await?;
            let order = self.order_not_pending(order_id).await?;
            return Err(TicketingError::OrderNotPending { code: order.order_code.to_string(), status: order.status });
        };
        let released = holds::transition_for_order(order_id, HoldStatus::Released, now, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order {} cancelled ({reason}). {} holds released", order.order_code, released.len());
        Ok(order)
    }

    async fn expire_order(&self, order_id: i64, now: DateTime<Utc>) -> Result<Order, TicketingError> {
        let mut tx = self.pool.begin().await?;
        let Some(order) = orders::mark_expired(order_id, now, &mut tx).await? else {
            tx.rollback().await?;
            let order = self.order_not_pending(order_id).await?;
            return match order.status {
                OrderStatusType::Pending => Err(TicketingError::OrderNotExpired(order.order_code.to_string())),
                status => Err(TicketingError::OrderNotPending { code: order.order_code.to_string(), status }),
            };
        };
        let expired = holds::transition_for_order(order_id, HoldStatus::Expired, now, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order {} expired. {} holds returned to inventory", order.order_code, expired.len());
        Ok(order)
    }

    async fn fetch_overdue_orders(&self, now: DateTime<Utc>) -> Result<Vec<Order>, TicketingError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_overdue(now, &mut conn).await
    }

    async fn set_payment_reference(
        &self,
        order_id: i64,
        reference: &str,
        now: DateTime<Utc>,
    ) -> Result<(), TicketingError> {
        let mut conn = self.pool.acquire().await?;
        orders::set_payment_reference(order_id, reference, now, &mut conn).await
    }
}

impl PaymentManagement for SqliteDatabase {
    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment, TicketingError> {
        let mut tx = self.pool.begin().await?;
        let payment = payments::insert_payment(payment, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Payment #{} ({}) saved for order #{}", payment.id, payment.reference, payment.order_id);
        Ok(payment)
    }

    async fn fetch_payment(&self, payment_id: i64) -> Result<Option<Payment>, TicketingError> {
        let mut conn = self.pool.acquire().await?;
        payments::fetch_payment(payment_id, &mut conn).await
    }

    async fn fetch_payment_by_reference(&self, reference: &str) -> Result<Option<Payment>, TicketingError> {
        let mut conn = self.pool.acquire().await?;
        payments::fetch_by_reference(reference, &mut conn).await
    }

    async fn fetch_payments_for_order(&self, order_id: i64) -> Result<Vec<Payment>, TicketingError> {
        let mut conn = self.pool.acquire().await?;
        payments::fetch_for_order(order_id, &mut conn).await
    }

    async fn record_provider_response(
        &self,
        payment_id: i64,
        response: &str,
        now: DateTime<Utc>,
    ) -> Result<(), TicketingError> {
        let mut conn = self.pool.acquire().await?;
        if !payments::record_response(payment_id, response, now, &mut conn).await? {
            trace!("🗃️ Payment {payment_id} is settled. Provider response not recorded");
        }
        Ok(())
    }

    async fn mark_webhook_received(&self, payment_id: i64, now: DateTime<Utc>) -> Result<(), TicketingError> {
        let mut conn = self.pool.acquire().await?;
        if payments::mark_webhook_received(payment_id, now, &mut conn).await? {
            Ok(())
        } else {
            Err(TicketingError::PaymentNotFound(payment_id.to_string()))
        }
    }

    async fn fail_payment(&self, payment_id: i64, response: &str, now: DateTime<Utc>) -> Result<bool, TicketingError> {
        let mut conn = self.pool.acquire().await?;
        payments::mark_failed(payment_id, response, now, &mut conn).await
    }

    /// The idempotent completion unit.
    ///
    /// In one transaction:
    /// 1. `Pending → Completed` on the payment. Losing this race means another caller already did (or is doing) the
    ///    rest; the winner's result is read back and returned as [`PaymentCompletion::AlreadyCompleted`].
    /// 2. `Pending → Paid` on the order.
    /// 3. Every active hold of the order becomes confirmed, moving its units from held to sold.
    /// 4. The ticket batch is issued and written.
    ///
    /// A failure at any step drops the transaction, leaving the payment pending so that a later verification can try
    /// again.
    async fn complete_payment(
        &self,
        payment_id: i64,
        response: &str,
        paid_at: DateTime<Utc>,
        issuer: &TicketIssuer,
    ) -> Result<PaymentCompletion, TicketingError> {
        let mut tx = self.pool.begin().await?;
        let Some(payment) = payments::mark_completed(payment_id, response, paid_at, &mut tx).await? else {
            tx.rollback().await?;
            return self.completion_lost(payment_id).await;
        };
        let Some(order) = orders::mark_paid(payment.order_id, paid_at, &mut tx).await? else {
            tx.rollback().await?;
            let order = self.order_not_pending(payment.order_id).await?;
            error!(
                "🗃️ Payment {} ({}) succeeded at the provider, but order {} is {}. The payment is left pending and \
                 needs manual reconciliation.",
                payment.id, payment.reference, order.order_code, order.status
            );
            return Err(TicketingError::PaymentCompletionFailed {
                id: payment_id,
                reason: format!("order {} is {}", order.order_code, order.status),
            });
        };
        let confirmed = holds::transition_for_order(order.id, HoldStatus::Confirmed, paid_at, &mut tx).await?;
        let lines = orders::fetch_lines(order.id, &mut tx).await?;
        if let Some(line) = lines.iter().find(|l| !confirmed.iter().any(|h| h.order_line_id == l.id)) {
            tx.rollback().await?;
            error!(
                "🗃️ Payment {} ({}) succeeded at the provider, but the hold for line {} of order {} had already \
                 lapsed. The payment is left pending and needs manual reconciliation.",
                payment.id, payment.reference, line.id, order.order_code
            );
            return Err(TicketingError::PaymentCompletionFailed {
                id: payment_id,
                reason: format!("inventory for line {} of order {} is no longer held", line.id, order.order_code),
            });
        }
        let batch = issuer.issue_for_order(&order, &lines, paid_at)?;
        let tickets = tickets::insert_batch(batch, &mut tx).await?;
        tx.commit().await?;
        info!(
            "🗃️ Payment {} completed. Order {} is paid and {} tickets were issued",
            payment.id,
            order.order_code,
            tickets.len()
        );
        Ok(PaymentCompletion::Completed { payment, order, tickets })
    }
}

impl TicketManagement for SqliteDatabase {
    async fn fetch_ticket(&self, ticket_id: &TicketId) -> Result<Option<Ticket>, TicketingError> {
        let mut conn = self.pool.acquire().await?;
        tickets::fetch_ticket(ticket_id, &mut conn).await
    }

    async fn fetch_tickets_for_order(&self, order_id: i64) -> Result<Vec<Ticket>, TicketingError> {
        let mut conn = self.pool.acquire().await?;
        tickets::fetch_for_order(order_id, &mut conn).await
    }
}

impl ScanManagement for SqliteDatabase {
    async fn start_session(
        &self,
        scanner_id: &str,
        event_id: i64,
        now: DateTime<Utc>,
    ) -> Result<ScanSession, TicketingError> {
        let mut tx = self.pool.begin().await?;
        scans::close_sessions_for_scanner(scanner_id, now, &mut tx).await?;
        let session = scans::insert_session(scanner_id, event_id, now, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Scan session #{} started for scanner {scanner_id} at event #{event_id}", session.id);
        Ok(session)
    }

    async fn end_session(&self, session_id: i64, now: DateTime<Utc>) -> Result<ScanSession, TicketingError> {
        let mut tx = self.pool.begin().await?;
        if let Some(session) = scans::close_session(session_id, now, &mut tx).await? {
            tx.commit().await?;
            debug!("🗃️ Scan session #{session_id} closed after {} scans", session.total_scans);
            return Ok(session);
        }
        tx.rollback().await?;
        self.fetch_session(session_id).await?.ok_or(TicketingError::SessionNotFound(session_id))
    }

    async fn fetch_session(&self, session_id: i64) -> Result<Option<ScanSession>, TicketingError> {
        let mut conn = self.pool.acquire().await?;
        scans::fetch_session(session_id, &mut conn).await
    }

    async fn record_validation(&self, validation: NewValidation) -> Result<TicketValidation, TicketingError> {
        let mut tx = self.pool.begin().await?;
        let session_id = validation.session_id;
        let record = scans::insert_validation(validation, &mut tx).await?;
        scans::tally_scan(session_id, record.outcome.is_valid(), &mut tx).await?;
        tx.commit().await?;
        trace!("🗃️ Validation #{} recorded: {}", record.id, record.outcome);
        Ok(record)
    }

    async fn redeem_and_record(
        &self,
        ticket_id: &TicketId,
        validation: NewValidation,
    ) -> Result<Option<TicketValidation>, TicketingError> {
        let mut tx = self.pool.begin().await?;
        if !tickets::redeem(ticket_id, &validation.scanner_id, validation.created_at, &mut tx).await? {
            tx.rollback().await?;
            return Ok(None);
        }
        let session_id = validation.session_id;
        let record = scans::insert_validation(validation, &mut tx).await?;
        scans::tally_scan(session_id, true, &mut tx).await?;
        tx.commit().await?;
        trace!("🗃️ Ticket {ticket_id} redeemed. Validation #{} recorded", record.id);
        Ok(Some(record))
    }

    async fn fetch_validations_for_ticket(
        &self,
        ticket_id: &TicketId,
    ) -> Result<Vec<TicketValidation>, TicketingError> {
        let mut conn = self.pool.acquire().await?;
        scans::fetch_validations_for_ticket(ticket_id, &mut conn).await
    }

    async fn fetch_validations_for_session(&self, session_id: i64) -> Result<Vec<TicketValidation>, TicketingError> {
        let mut conn = self.pool.acquire().await?;
        scans::fetch_validations_for_session(session_id, &mut conn).await
    }
}
