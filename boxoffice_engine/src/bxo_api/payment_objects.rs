use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Payment, PaymentStatus, Ticket},
    traits::PaymentCompletion,
};

/// What a buyer needs to go and pay: the provider's checkout page or instructions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentHandle {
    pub payment: Payment,
    pub redirect_url: Option<String>,
    pub instructions: Option<String>,
}

/// The local state of a payment after a verification round with the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VerifyOutcome {
    /// The payment is complete. `first_completion` is true only for the call that performed the transition.
    Completed { payment: Payment, tickets: Vec<Ticket>, first_completion: bool },
    Failed { payment: Payment },
    /// The provider has not settled the payment yet.
    Pending { payment: Payment },
}

impl VerifyOutcome {
    pub fn payment(&self) -> &Payment {
        match self {
            Self::Completed { payment, .. } | Self::Failed { payment } | Self::Pending { payment } => payment,
        }
    }

    pub fn status(&self) -> PaymentStatus {
        match self {
            Self::Completed { .. } => PaymentStatus::Completed,
            Self::Failed { .. } => PaymentStatus::Failed,
            Self::Pending { .. } => PaymentStatus::Pending,
        }
    }

    pub fn tickets(&self) -> &[Ticket] {
        match self {
            Self::Completed { tickets, .. } => tickets,
            _ => &[],
        }
    }
}

impl From<PaymentCompletion> for VerifyOutcome {
    fn from(completion: PaymentCompletion) -> Self {
        match completion {
            PaymentCompletion::Completed { payment, tickets, .. } => {
                Self::Completed { payment, tickets, first_completion: true }
            },
            PaymentCompletion::AlreadyCompleted { payment, tickets } => {
                Self::Completed { payment, tickets, first_completion: false }
            },
        }
    }
}

/// What happened in response to a provider webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookOutcome {
    pub event_name: String,
    pub reference: String,
    /// Present when the event was a success notification and triggered a verification.
    pub verification: Option<VerifyOutcome>,
}
