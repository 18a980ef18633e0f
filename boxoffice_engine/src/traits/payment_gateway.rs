use boxoffice_common::Amount;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("No payment provider named '{0}' is configured")]
    UnknownProvider(String),
    #[error("The payment provider did not respond in time")]
    Timeout,
    #[error("The payment provider rejected the request: {0}")]
    Rejected(String),
    #[error("Could not communicate with the payment provider: {0}")]
    CommunicationError(String),
    #[error("Invalid webhook payload: {0}")]
    InvalidWebhook(String),
}

/// The buyer-facing details a provider needs to start a checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub amount: Amount,
    pub currency: String,
    /// Our reference for the transaction. Providers echo it back in webhooks and verification responses.
    pub reference: String,
    pub customer_name: String,
    pub customer_email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutHandle {
    pub provider_reference: String,
    /// Where to send the buyer, for hosted checkouts
    pub redirect_url: Option<String>,
    /// Out-of-band payment instructions, for providers that don't redirect
    pub instructions: Option<String>,
    pub raw_response: Value,
}

/// The provider's status vocabulary, collapsed to the three states the reconciler acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderStatus {
    Completed,
    Failed,
    Pending,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderVerification {
    pub status: ProviderStatus,
    pub amount: Option<Amount>,
    pub currency: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub raw_response: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookNotification {
    pub event_name: String,
    pub reference: String,
    /// True only for the provider's "payment succeeded" event
    pub is_success: bool,
    pub raw_response: Value,
}

/// Adapter over one or more external payment providers, addressed by name.
#[allow(async_fn_in_trait)]
pub trait PaymentGateway {
    async fn initiate(&self, provider: &str, request: CheckoutRequest) -> Result<CheckoutHandle, GatewayError>;

    async fn verify_by_reference(&self, provider: &str, reference: &str)
        -> Result<ProviderVerification, GatewayError>;

    /// Authenticates (where the provider supports it) and decodes a raw webhook delivery.
    fn decode_webhook(
        &self,
        provider: &str,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookNotification, GatewayError>;
}
