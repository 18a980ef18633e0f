use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{TicketId, ValidationOutcome};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartSessionRequest {
    pub scanner_id: String,
    pub event_id: i64,
}

/// A scanned code, submitted against an active scan session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationRequest {
    pub event_id: i64,
    pub code: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// The answer shown at the gate. Every scan gets one of three answers: `valid`, `already_validated`, or neither
/// (invalid, with the outcome saying why).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResponse {
    pub valid: bool,
    pub already_validated: bool,
    pub message: String,
    pub outcome: ValidationOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    /// For `already_validated`, when the ticket was first redeemed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redeemed_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub ticket_id: Option<TicketId>,
}

impl ValidationResponse {
    pub fn valid(ticket_id: TicketId, serial_number: String) -> Self {
        Self {
            valid: true,
            already_validated: false,
            message: format!("Ticket {serial_number} admitted"),
            outcome: ValidationOutcome::Valid,
            serial_number: Some(serial_number),
            redeemed_at: None,
            ticket_id: Some(ticket_id),
        }
    }

    pub fn already_redeemed(ticket_id: TicketId, serial_number: String, redeemed_at: Option<DateTime<Utc>>) -> Self {
        let message = match redeemed_at {
            Some(at) => format!("Ticket {serial_number} was already used at {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
            None => format!("Ticket {serial_number} was already used"),
        };
        Self {
            valid: false,
            already_validated: true,
            message,
            outcome: ValidationOutcome::AlreadyRedeemed,
            serial_number: Some(serial_number),
            redeemed_at,
            ticket_id: Some(ticket_id),
        }
    }

    pub fn invalid<S: Into<String>>(outcome: ValidationOutcome, message: S) -> Self {
        Self {
            valid: false,
            already_validated: false,
            message: message.into(),
            outcome,
            serial_number: None,
            redeemed_at: None,
            ticket_id: None,
        }
    }

    pub fn for_ticket(mut self, ticket_id: TicketId, serial_number: String) -> Self {
        self.ticket_id = Some(ticket_id);
        self.serial_number = Some(serial_number);
        self
    }
}
