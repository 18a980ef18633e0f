use serde::{Deserialize, Serialize};

pub const DEFAULT_CANCEL_REASON: &str = "Cancelled by buyer";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CancelOrderRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

impl CancelOrderRequest {
    pub fn reason(&self) -> &str {
        self.reason.as_deref().map(str::trim).filter(|r| !r.is_empty()).unwrap_or(DEFAULT_CANCEL_REASON)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitiatePaymentRequest {
    /// The provider to pay with, e.g. `paystack`
    pub provider: String,
}
