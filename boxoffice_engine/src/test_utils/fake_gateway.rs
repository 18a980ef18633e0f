use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
        Mutex,
    },
    time::Duration,
};

use chrono::Utc;
use serde_json::{json, Value};

use crate::traits::{
    CheckoutHandle,
    CheckoutRequest,
    GatewayError,
    PaymentGateway,
    ProviderStatus,
    ProviderVerification,
    WebhookNotification,
};

pub const FAKE_PROVIDER: &str = "fake";
pub const FAKE_SIGNATURE: &str = "fake-signature";
const SUCCESS_EVENT: &str = "charge.success";

/// A scriptable in-memory payment provider.
///
/// Statuses are set per reference with [`FakeGateway::set_status`]; unknown references report `Pending`. A delay can
/// be injected to exercise provider timeouts. Clones share state.
#[derive(Clone, Default)]
pub struct FakeGateway {
    statuses: Arc<Mutex<HashMap<String, ProviderStatus>>>,
    delay: Arc<Mutex<Option<Duration>>>,
    initiate_calls: Arc<AtomicUsize>,
    verify_calls: Arc<AtomicUsize>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_status(&self, reference: &str, status: ProviderStatus) {
        if let Ok(mut statuses) = self.statuses.lock() {
            statuses.insert(reference.to_string(), status);
        }
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        if let Ok(mut d) = self.delay.lock() {
            *d = delay;
        }
    }

    pub fn initiate_calls(&self) -> usize {
        self.initiate_calls.load(Ordering::SeqCst)
    }

    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }

    /// A webhook body in the shape [`FakeGateway::decode_webhook`] understands.
    pub fn webhook_body(event: &str, reference: &str) -> Vec<u8> {
        json!({ "event": event, "data": { "reference": reference } }).to_string().into_bytes()
    }

    async fn maybe_stall(&self) {
        let delay = self.delay.lock().ok().and_then(|d| *d);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn check_provider(provider: &str) -> Result<(), GatewayError> {
        if provider == FAKE_PROVIDER {
            Ok(())
        } else {
            Err(GatewayError::UnknownProvider(provider.to_string()))
        }
    }
}

impl PaymentGateway for FakeGateway {
    async fn initiate(&self, provider: &str, request: CheckoutRequest) -> Result<CheckoutHandle, GatewayError> {
        Self::check_provider(provider)?;
        self.initiate_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_stall().await;
        Ok(CheckoutHandle {
            provider_reference: request.reference.clone(),
            redirect_url: Some(format!("https://pay.example.com/checkout/{}", request.reference)),
            instructions: None,
            raw_response: json!({ "reference": request.reference, "amount": request.amount.value() }),
        })
    }

    async fn verify_by_reference(&self, provider: &str, reference: &str) -> Result<ProviderVerification, GatewayError> {
        Self::check_provider(provider)?;
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_stall().await;
        let scripted = self.statuses.lock().ok().and_then(|s| s.get(reference).copied());
        let status = scripted.unwrap_or(ProviderStatus::Pending);
        let paid_at = (status == ProviderStatus::Completed).then(Utc::now);
        Ok(ProviderVerification {
            status,
            amount: None,
            currency: None,
            paid_at,
            raw_response: json!({ "reference": reference, "status": format!("{status:?}") }),
        })
    }

    fn decode_webhook(
        &self,
        provider: &str,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookNotification, GatewayError> {
        Self::check_provider(provider)?;
        if signature != Some(FAKE_SIGNATURE) {
            return Err(GatewayError::InvalidWebhook("bad signature".into()));
        }
        let raw: Value = serde_json::from_slice(payload).map_err(|e| GatewayError::InvalidWebhook(e.to_string()))?;
        let event_name = raw["event"].as_str().unwrap_or_default().to_string();
        let reference = raw["data"]["reference"]
            .as_str()
            .ok_or_else(|| GatewayError::InvalidWebhook("missing reference".into()))?
            .to_string();
        Ok(WebhookNotification { is_success: event_name == SUCCESS_EVENT, event_name, reference, raw_response: raw })
    }
}
