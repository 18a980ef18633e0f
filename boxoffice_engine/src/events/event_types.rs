use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderStatusType, Ticket};

/// Published once per order, after the payment completion unit that issued the tickets has committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketsIssuedEvent {
    pub order: Order,
    pub tickets: Vec<Ticket>,
}

impl TicketsIssuedEvent {
    pub fn new(order: Order, tickets: Vec<Ticket>) -> Self {
        Self { order, tickets }
    }
}

/// An order left `Pending` without being paid, i.e. it was cancelled or it expired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAnnulledEvent {
    pub order: Order,
    pub status: OrderStatusType,
}

impl OrderAnnulledEvent {
    pub fn new(order: Order) -> Self {
        let status = order.status;
        Self { order, status }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventType {
    TicketsIssued(TicketsIssuedEvent),
    OrderAnnulled(OrderAnnulledEvent),
}
