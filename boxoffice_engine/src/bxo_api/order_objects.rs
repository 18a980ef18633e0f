use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::{
    bxo_api::errors::TicketingError,
    db_types::{InventoryHold, Order, OrderLine, Payment, Ticket},
};

pub const DEFAULT_HOLD_DURATION_MINUTES: i64 = 15;
pub const DEFAULT_MAX_TICKETS_PER_ORDER: i64 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuyerInfo {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRequest {
    pub tier_id: i64,
    pub quantity: i64,
}

/// A buyer's request to purchase tickets for one event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub event_id: i64,
    pub buyer: BuyerInfo,
    pub lines: Vec<LineRequest>,
}

impl OrderRequest {
    /// Checks the request shape and folds repeated tiers into one line, keeping the order in which tiers first
    /// appear.
    pub fn normalized_lines(&self, max_tickets: i64) -> Result<Vec<LineRequest>, TicketingError> {
        if self.buyer.name.trim().is_empty() {
            return Err(TicketingError::ValidationError("Buyer name is required".into()));
        }
        let email = self.buyer.email.trim();
        if email.len() < 3 || !email.contains('@') {
            return Err(TicketingError::ValidationError(format!("'{email}' is not a valid email address")));
        }
        if self.lines.is_empty() {
            return Err(TicketingError::InvalidOrder("An order needs at least one line".into()));
        }
        let mut merged: Vec<LineRequest> = Vec::with_capacity(self.lines.len());
        let mut total = 0i64;
        for line in &self.lines {
            if line.quantity <= 0 {
                return Err(TicketingError::InvalidOrder(format!(
                    "Quantity for tier {} must be positive, not {}",
                    line.tier_id, line.quantity
                )));
            }
            // The running total never exceeds `max_tickets`, so neither can any merged line
            total = match total.checked_add(line.quantity) {
                Some(sum) if sum <= max_tickets => sum,
                _ => {
                    let requested = total.saturating_add(line.quantity);
                    return Err(TicketingError::InvalidOrder(format!(
                        "An order may contain at most {max_tickets} tickets, but {requested} were requested"
                    )));
                },
            };
            match merged.iter_mut().find(|l| l.tier_id == line.tier_id) {
                Some(existing) => existing.quantity += line.quantity,
                None => merged.push(*line),
            }
        }
        Ok(merged)
    }
}

/// Limits applied to every new order.
#[derive(Debug, Clone, Copy)]
pub struct OrderPolicy {
    /// Default hold window. A tier can shorten or lengthen it with its own `hold_minutes`.
    pub hold_duration: Duration,
    pub max_tickets_per_order: i64,
}

impl Default for OrderPolicy {
    fn default() -> Self {
        Self {
            hold_duration: Duration::minutes(DEFAULT_HOLD_DURATION_MINUTES),
            max_tickets_per_order: DEFAULT_MAX_TICKETS_PER_ORDER,
        }
    }
}

impl OrderPolicy {
    pub fn new(hold_duration: Duration, max_tickets_per_order: i64) -> Self {
        Self { hold_duration, max_tickets_per_order }
    }

    /// The window for an order spanning tiers with the given overrides: the shortest applicable window wins.
    pub fn hold_window<I>(&self, tier_overrides: I) -> Duration
    where I: IntoIterator<Item = Option<i64>> {
        tier_overrides
            .into_iter()
            .map(|minutes| minutes.map(Duration::minutes).unwrap_or(self.hold_duration))
            .min()
            .unwrap_or(self.hold_duration)
    }
}

/// Everything known about an order, for the order lookup endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSummary {
    pub order: Order,
    pub lines: Vec<OrderLine>,
    pub payments: Vec<Payment>,
    pub tickets: Vec<Ticket>,
}

/// The result of one pass of the expiry sweep.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepResult {
    pub expired_orders: Vec<Order>,
    pub reaped_holds: Vec<InventoryHold>,
}

impl SweepResult {
    pub fn is_empty(&self) -> bool {
        self.expired_orders.is_empty() && self.reaped_holds.is_empty()
    }
}
