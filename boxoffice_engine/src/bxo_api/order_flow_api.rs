use std::{collections::BTreeSet, fmt::Debug};

use boxoffice_common::Amount;
use chrono::{DateTime, Utc};
use log::*;

use crate::{
    bxo_api::{
        errors::TicketingError,
        order_objects::{OrderPolicy, OrderRequest, OrderSummary, SweepResult},
    },
    db_types::{EventStatus, NewOrder, NewOrderLine, Order, OrderCode, TicketTier},
    events::{EventProducers, OrderAnnulledEvent},
    helpers::new_order_code,
    traits::{
        CatalogManagement,
        CreatedOrder,
        InventoryManagement,
        OrderManagement,
        PaymentManagement,
        TicketManagement,
    },
};

// Attempts per order: one retry after a lazy reap, one after an order code collision
const CREATE_ATTEMPTS: usize = 3;

/// `OrderFlowApi` drives orders through their lifecycle: creation with inventory holds, cancellation, and expiry.
///
/// Payment and issuance are handled by [`crate::PaymentReconciler`], which takes over once an order is paid.
pub struct OrderFlowApi<B> {
    db: B,
    policy: OrderPolicy,
    producers: EventProducers,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi ({:?})", self.policy)
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, policy: OrderPolicy, producers: EventProducers) -> Self {
        Self { db, policy, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn policy(&self) -> &OrderPolicy {
        &self.policy
    }
}

impl<B> OrderFlowApi<B>
where B: CatalogManagement + InventoryManagement + OrderManagement
{
    /// Creates a pending order with one inventory hold per line.
    ///
    /// The event must be published and every tier active, within its sales window and part of the event. Either
    /// every line is held, or the call fails with no trace of the order left behind.
    ///
    /// If a tier looks sold out, its overdue holds are reaped and the order is tried once more, so abandoned
    /// checkouts free their inventory without waiting for the sweep.
    pub async fn create_order(
        &self,
        request: OrderRequest,
        now: DateTime<Utc>,
    ) -> Result<CreatedOrder, TicketingError> {
        let lines = request.normalized_lines(self.policy.max_tickets_per_order)?;
        let event_id = request.event_id;
        let event = self.db.fetch_event(event_id).await?.ok_or(TicketingError::EventNotFound(event_id))?;
        if event.status != EventStatus::Published {
            return Err(TicketingError::NotOnSale(format!("Event '{}' is {}", event.name, event.status)));
        }
        let mut tiers = Vec::with_capacity(lines.len());
        for line in &lines {
            let tier = self.db.fetch_tier(line.tier_id).await?.ok_or(TicketingError::TierNotFound(line.tier_id))?;
            if tier.event_id != event.id {
                return Err(TicketingError::InvalidOrder(format!(
                    "Tier {} belongs to event {}, not {}",
                    tier.id, tier.event_id, event.id
                )));
            }
            if !tier.is_on_sale(now) {
                return Err(TicketingError::NotOnSale(format!("Tier '{}' is not on sale", tier.name)));
            }
            tiers.push((tier, line.quantity));
        }
        let currency = order_currency(&tiers)?;
        let total_price = tiers.iter().map(|(tier, quantity)| tier.price * *quantity).sum::<Amount>();
        let window = self.policy.hold_window(tiers.iter().map(|(tier, _)| tier.hold_minutes));
        let new_lines = tiers
            .iter()
            .map(|(tier, quantity)| NewOrderLine {
                tier_id: tier.id,
                quantity: *quantity,
                unit_price: tier.price,
                currency: tier.currency.clone(),
            })
            .collect::<Vec<_>>();

        let mut reaped_tiers = BTreeSet::new();
        let mut last_error = None;
        for _ in 0..CREATE_ATTEMPTS {
            let order = NewOrder {
                order_code: new_order_code(),
                event_id: event.id,
                buyer_name: request.buyer.name.trim().to_string(),
                buyer_email: request.buyer.email.trim().to_string(),
                buyer_phone: request.buyer.phone.clone(),
                total_price,
                currency: currency.clone(),
                created_at: now,
                expires_at: now + window,
                lines: new_lines.clone(),
            };
            match self.db.create_order(order).await {
                Ok(created) => {
                    info!(
                        "🔄️ Order {} created for {} ticket(s) totalling {total_price} {currency}. Held until {}",
                        created.order.order_code,
                        created.lines.iter().map(|l| l.quantity).sum::<i64>(),
                        created.order.expires_at
                    );
                    return Ok(created);
                },
                Err(TicketingError::InsufficientInventory { tier_id, requested }) => {
                    if !reaped_tiers.insert(tier_id) || !self.reap_tier(tier_id, now).await? {
                        debug!("🔄️ Tier {tier_id} cannot cover {requested} more ticket(s)");
                        return Err(TicketingError::InsufficientInventory { tier_id, requested });
                    }
                    last_error = Some(TicketingError::InsufficientInventory { tier_id, requested });
                },
                Err(TicketingError::Conflict(msg)) => {
                    warn!("🔄️ Order code collision ({msg}). Trying again with a new code");
                    last_error = Some(TicketingError::Conflict(msg));
                },
                Err(e) => return Err(e),
            }
        }
        Err(last_error.unwrap_or_else(|| TicketingError::InvalidOrder("The order could not be placed".into())))
    }

    /// Lazily expires overdue holds on the tier, and the orders they belong to. Returns whether anything was freed.
    async fn reap_tier(&self, tier_id: i64, now: DateTime<Utc>) -> Result<bool, TicketingError> {
        let reaped = self.db.reap_expired_holds(now, Some(tier_id)).await?;
        if reaped.is_empty() {
            return Ok(false);
        }
        debug!("🔄️ Lazily reaped {} overdue holds on tier {tier_id}", reaped.len());
        let order_ids = reaped.iter().map(|h| h.order_id).collect::<BTreeSet<_>>();
        for order_id in order_ids {
            match self.expire_order(order_id, now).await {
                Ok(_) => {},
                Err(TicketingError::OrderNotPending { .. }) => {},
                Err(e) => warn!("🔄️ Could not expire order #{order_id} after reaping its holds: {e}"),
            }
        }
        Ok(true)
    }

    /// Cancels a pending order and releases its holds. Orders that have left `Pending` are not touched.
    pub async fn cancel_order(
        &self,
        code: &OrderCode,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Order, TicketingError> {
        let order = self.fetch_order_by_code(code).await?;
        let order = self.db.cancel_order(order.id, reason, now).await?;
        info!("🔄️ Order {code} cancelled: {reason}");
        self.producers.publish_order_annulled(OrderAnnulledEvent::new(order.clone())).await;
        Ok(order)
    }

    /// Expires a pending order whose hold window has passed, and returns its holds to inventory.
    pub async fn expire_order(&self, order_id: i64, now: DateTime<Utc>) -> Result<Order, TicketingError> {
        let order = self.db.expire_order(order_id, now).await?;
        info!("🔄️ Order {} expired unpaid", order.order_code);
        self.producers.publish_order_annulled(OrderAnnulledEvent::new(order.clone())).await;
        Ok(order)
    }

    /// One pass of the expiry sweep: expire every overdue pending order, then reap any active holds still past their
    /// window. Orders that race with a payment or a cancellation are skipped.
    pub async fn expire_overdue(&self, now: DateTime<Utc>) -> Result<SweepResult, TicketingError> {
        let overdue = self.db.fetch_overdue_orders(now).await?;
        let mut result = SweepResult::default();
        for order in overdue {
            match self.expire_order(order.id, now).await {
                Ok(order) => result.expired_orders.push(order),
                Err(TicketingError::OrderNotPending { code, status }) => {
                    debug!("🔄️ Order {code} became {status} before it could be expired");
                },
                Err(e) => warn!("🔄️ Could not expire order {}: {e}", order.order_code),
            }
        }
        result.reaped_holds = self.db.reap_expired_holds(now, None).await?;
        if !result.is_empty() {
            info!(
                "🔄️ Sweep expired {} orders and reaped {} stray holds",
                result.expired_orders.len(),
                result.reaped_holds.len()
            );
        }
        Ok(result)
    }

    pub async fn fetch_order_by_code(&self, code: &OrderCode) -> Result<Order, TicketingError> {
        self.db.fetch_order_by_code(code).await?.ok_or_else(|| TicketingError::OrderNotFound(code.to_string()))
    }
}

impl<B> OrderFlowApi<B>
where B: OrderManagement + PaymentManagement + TicketManagement
{
    pub async fn order_summary(&self, code: &OrderCode) -> Result<OrderSummary, TicketingError> {
        let order =
            self.db.fetch_order_by_code(code).await?.ok_or_else(|| TicketingError::OrderNotFound(code.to_string()))?;
        let lines = self.db.fetch_order_lines(order.id).await?;
        let payments = self.db.fetch_payments_for_order(order.id).await?;
        let tickets = self.db.fetch_tickets_for_order(order.id).await?;
        Ok(OrderSummary { order, lines, payments, tickets })
    }
}

fn order_currency(tiers: &[(TicketTier, i64)]) -> Result<String, TicketingError> {
    let mut currencies = tiers.iter().map(|(tier, _)| tier.currency.as_str()).collect::<BTreeSet<_>>();
    match (currencies.pop_first(), currencies.is_empty()) {
        (Some(currency), true) => Ok(currency.to_string()),
        (Some(_), false) => Err(TicketingError::InvalidOrder("All tickets in an order must share a currency".into())),
        (None, _) => Err(TicketingError::InvalidOrder("An order needs at least one line".into())),
    }
}
