use std::fmt::Display;

use boxoffice_common::Amount;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::PaystackApiError;

/// The webhook event name Paystack sends once a charge has gone through.
pub const CHARGE_SUCCESS_EVENT: &str = "charge.success";

/// Every Paystack response is wrapped in this envelope.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaystackResponse<T> {
    pub status: bool,
    pub message: String,
    pub data: Option<T>,
}

impl<T> PaystackResponse<T> {
    pub fn into_data(self) -> Result<T, PaystackApiError> {
        match (self.status, self.data) {
            (true, Some(data)) => Ok(data),
            (true, None) => Err(PaystackApiError::RestResponseError(format!("Empty response. {}", self.message))),
            (false, _) => Err(PaystackApiError::Rejected(self.message)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InitializeTransaction {
    pub email: String,
    /// In the minor unit of `currency`
    pub amount: Amount,
    pub currency: String,
    pub reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InitializedTransaction {
    pub authorization_url: String,
    pub access_code: String,
    pub reference: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Success,
    Failed,
    Abandoned,
    Reversed,
    Ongoing,
    Pending,
    Processing,
    Queued,
    #[serde(other)]
    Unknown,
}

impl TransactionStatus {
    /// A terminal status that will never become a success.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed | Self::Abandoned | Self::Reversed)
    }
}

impl Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Abandoned => "abandoned",
            Self::Reversed => "reversed",
            Self::Ongoing => "ongoing",
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Queued => "queued",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VerifiedTransaction {
    pub reference: String,
    pub status: TransactionStatus,
    pub amount: Amount,
    pub currency: String,
    pub paid_at: Option<DateTime<Utc>>,
    pub gateway_response: Option<String>,
}

/// A decoded webhook delivery. Only the event name and transaction reference are interpreted; the full payload is
/// kept for auditing.
#[derive(Debug, Clone)]
pub struct WebhookEvent {
    pub event: String,
    pub reference: String,
    pub raw: Value,
}

impl WebhookEvent {
    pub fn from_slice(body: &[u8]) -> Result<Self, PaystackApiError> {
        let raw: Value = serde_json::from_slice(body).map_err(|e| PaystackApiError::JsonError(e.to_string()))?;
        let event = raw["event"]
            .as_str()
            .ok_or_else(|| PaystackApiError::JsonError("'event' does not exist in webhook payload".to_string()))?
            .to_string();
        let reference = raw["data"]["reference"]
            .as_str()
            .ok_or_else(|| PaystackApiError::JsonError("'data.reference' is missing from webhook payload".to_string()))?
            .to_string();
        Ok(Self { event, reference, raw })
    }

    pub fn is_charge_success(&self) -> bool {
        self.event == CHARGE_SUCCESS_EVENT
    }
}
