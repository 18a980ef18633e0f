use serde::{Deserialize, Serialize};

use crate::db_types::{InventoryHold, Order, OrderLine, Payment, Ticket};

/// The result of writing an order, its lines and their holds in one unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedOrder {
    pub order: Order,
    pub lines: Vec<OrderLine>,
    pub holds: Vec<InventoryHold>,
}

/// The result of attempting the payment-complete + ticket-issuance unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PaymentCompletion {
    /// This call won the transition. The tickets were created by this call.
    Completed { payment: Payment, order: Order, tickets: Vec<Ticket> },
    /// Another call already completed the payment. The tickets are the ones it created.
    AlreadyCompleted { payment: Payment, tickets: Vec<Ticket> },
}

impl PaymentCompletion {
    pub fn payment(&self) -> &Payment {
        match self {
            Self::Completed { payment, .. } | Self::AlreadyCompleted { payment, .. } => payment,
        }
    }

    pub fn tickets(&self) -> &[Ticket] {
        match self {
            Self::Completed { tickets, .. } | Self::AlreadyCompleted { tickets, .. } => tickets,
        }
    }

    pub fn is_first_completion(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}
