use thiserror::Error;

use crate::{
    db_types::{IllegalTransition, OrderStatusType, PaymentStatus},
    traits::GatewayError,
};

/// Broad classes of failure. Callers (e.g. the HTTP layer) branch on these rather than on individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or unacceptable input
    Validation,
    NotFound,
    /// Collision with an existing resource
    Conflict,
    /// The request is well-formed but the current state does not allow it
    BusinessRule,
    /// The payment provider failed or could not be reached
    Provider,
    /// Storage or other internal failure
    Backend,
}

#[derive(Debug, Error)]
pub enum TicketingError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Invalid order: {0}")]
    InvalidOrder(String),
    #[error("Invalid request: {0}")]
    ValidationError(String),
    #[error("Order {0} does not exist")]
    OrderNotFound(String),
    #[error("Payment {0} does not exist")]
    PaymentNotFound(String),
    #[error("Ticket {0} does not exist")]
    TicketNotFound(String),
    #[error("Event {0} does not exist")]
    EventNotFound(i64),
    #[error("Ticket tier {0} does not exist")]
    TierNotFound(i64),
    #[error("Inventory hold {0} does not exist")]
    HoldNotFound(i64),
    #[error("Scan session {0} does not exist")]
    SessionNotFound(i64),
    #[error("Not enough inventory in tier {tier_id} for {requested} ticket(s)")]
    InsufficientInventory { tier_id: i64, requested: i64 },
    #[error("Not on sale: {0}")]
    NotOnSale(String),
    #[error("Order {code} is {status}, not Pending")]
    OrderNotPending { code: String, status: OrderStatusType },
    #[error("Order {0} has not reached its expiry time yet")]
    OrderNotExpired(String),
    #[error("Payment not allowed: {0}")]
    PaymentNotAllowed(String),
    #[error("Payment {id} is {status}, not Pending")]
    PaymentNotPending { id: i64, status: PaymentStatus },
    #[error("Payment {id} could not be completed: {reason}")]
    PaymentCompletionFailed { id: i64, reason: String },
    #[error("Scan session {0} is closed")]
    SessionNotActive(i64),
    #[error("{0}")]
    IllegalTransition(#[from] IllegalTransition),
    #[error("Duplicate record: {0}")]
    Conflict(String),
    #[error("Payment provider error: {0}")]
    GatewayError(#[from] GatewayError),
    #[error("Could not issue tickets: {0}")]
    IssuanceError(String),
}

impl TicketingError {
    pub fn kind(&self) -> ErrorKind {
        use crate::traits::GatewayError as Gateway;
        use TicketingError::*;
        match self {
            DatabaseError(_) | IssuanceError(_) => ErrorKind::Backend,
            InvalidOrder(_) | ValidationError(_) => ErrorKind::Validation,
            OrderNotFound(_) | PaymentNotFound(_) | TicketNotFound(_) | EventNotFound(_) | TierNotFound(_) |
            HoldNotFound(_) | SessionNotFound(_) => ErrorKind::NotFound,
            Conflict(_) => ErrorKind::Conflict,
            InsufficientInventory { .. } |
            NotOnSale(_) |
            OrderNotPending { .. } |
            OrderNotExpired(_) |
            PaymentNotAllowed(_) |
            PaymentNotPending { .. } |
            PaymentCompletionFailed { .. } |
            SessionNotActive(_) |
            IllegalTransition(_) => ErrorKind::BusinessRule,
            GatewayError(Gateway::InvalidWebhook(_) | Gateway::UnknownProvider(_)) => ErrorKind::Validation,
            GatewayError(_) => ErrorKind::Provider,
        }
    }
}

impl From<sqlx::Error> for TicketingError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Database(err) if err.is_unique_violation() => Self::Conflict(err.message().to_string()),
            _ => Self::DatabaseError(e.to_string()),
        }
    }
}
