use boxoffice_engine::traits::{
    CheckoutHandle,
    CheckoutRequest,
    GatewayError,
    ProviderStatus,
    ProviderVerification,
    WebhookNotification,
};
use log::*;
use paystack_tools::{
    InitializeTransaction,
    PaystackApi,
    PaystackApiError,
    PaystackConfig,
    TransactionStatus,
    VerifiedTransaction,
    WebhookEvent,
};
use serde_json::{json, Value};

pub const PAYSTACK: &str = "paystack";

/// Adapts the Paystack client to the engine's provider vocabulary.
#[derive(Clone)]
pub struct PaystackGateway {
    api: PaystackApi,
    check_signatures: bool,
}

impl PaystackGateway {
    pub fn new(config: PaystackConfig, check_signatures: bool) -> Result<Self, PaystackApiError> {
        let api = PaystackApi::new(config)?;
        Ok(Self { api, check_signatures })
    }

    pub async fn initiate(&self, request: CheckoutRequest) -> Result<CheckoutHandle, GatewayError> {
        let transaction = InitializeTransaction {
            email: request.customer_email,
            amount: request.amount,
            currency: request.currency,
            reference: request.reference,
            callback_url: None,
            metadata: Some(json!({ "customer_name": request.customer_name })),
        };
        let result = self.api.initialize_transaction(transaction).await.map_err(gateway_error)?;
        let raw_response = serde_json::to_value(&result).unwrap_or_default();
        Ok(CheckoutHandle {
            provider_reference: result.reference,
            redirect_url: Some(result.authorization_url),
            instructions: None,
            raw_response,
        })
    }

    pub async fn verify(&self, reference: &str) -> Result<ProviderVerification, GatewayError> {
        let (transaction, raw) = self.api.verify_transaction(reference).await.map_err(gateway_error)?;
        Ok(verification_from(transaction, raw))
    }

    pub fn decode_webhook(&self, payload: &[u8], signature: Option<&str>) -> Result<WebhookNotification, GatewayError> {
        let event = if self.check_signatures {
            self.api.decode_webhook(payload, signature)
        } else {
            trace!("💳️ Skipping the Paystack webhook signature check");
            WebhookEvent::from_slice(payload)
        }
        .map_err(|e| GatewayError::InvalidWebhook(e.to_string()))?;
        Ok(notification_from(event))
    }
}

pub fn provider_status(status: TransactionStatus) -> ProviderStatus {
    match status {
        TransactionStatus::Success => ProviderStatus::Completed,
        s if s.is_failure() => ProviderStatus::Failed,
        _ => ProviderStatus::Pending,
    }
}

fn verification_from(transaction: VerifiedTransaction, raw: Value) -> ProviderVerification {
    ProviderVerification {
        status: provider_status(transaction.status),
        amount: Some(transaction.amount),
        currency: Some(transaction.currency),
        paid_at: transaction.paid_at,
        raw_response: raw,
    }
}

fn notification_from(event: WebhookEvent) -> WebhookNotification {
    let is_success = event.is_charge_success();
    WebhookNotification { event_name: event.event, reference: event.reference, is_success, raw_response: event.raw }
}

fn gateway_error(e: PaystackApiError) -> GatewayError {
    match e {
        PaystackApiError::Timeout => GatewayError::Timeout,
        PaystackApiError::Rejected(message) => GatewayError::Rejected(message),
        PaystackApiError::QueryError { status, message } if (400..500).contains(&status) => {
            GatewayError::Rejected(format!("Error {status}. {message}"))
        },
        other => GatewayError::CommunicationError(other.to_string()),
    }
}

#[cfg(test)]
mod test {
    use boxoffice_common::{Amount, Secret};
    use paystack_tools::webhook_signature;

    use super::*;

    const SECRET: &str = "sk_test_box_office";

    fn gateway(check_signatures: bool) -> PaystackGateway {
        let config = PaystackConfig { secret_key: Secret::new(SECRET.to_string()), ..Default::default() };
        PaystackGateway::new(config, check_signatures).unwrap()
    }

    fn charge_success(reference: &str) -> Vec<u8> {
        json!({ "event": "charge.success", "data": { "reference": reference, "status": "success" } })
            .to_string()
            .into_bytes()
    }

    #[test]
    fn status_vocabulary() {
        assert_eq!(provider_status(TransactionStatus::Success), ProviderStatus::Completed);
        assert_eq!(provider_status(TransactionStatus::Failed), ProviderStatus::Failed);
        assert_eq!(provider_status(TransactionStatus::Abandoned), ProviderStatus::Failed);
        assert_eq!(provider_status(TransactionStatus::Reversed), ProviderStatus::Failed);
        assert_eq!(provider_status(TransactionStatus::Ongoing), ProviderStatus::Pending);
        assert_eq!(provider_status(TransactionStatus::Queued), ProviderStatus::Pending);
        assert_eq!(provider_status(TransactionStatus::Unknown), ProviderStatus::Pending);
    }

    #[test]
    fn verification_keeps_the_raw_payload() {
        let transaction = VerifiedTransaction {
            reference: "BXO-REF-1".into(),
            status: TransactionStatus::Success,
            amount: Amount::from(250_000),
            currency: "NGN".into(),
            paid_at: None,
            gateway_response: Some("Approved".into()),
        };
        let raw = json!({ "status": true, "data": { "reference": "BXO-REF-1" } });
        let verification = verification_from(transaction, raw.clone());
        assert_eq!(verification.status, ProviderStatus::Completed);
        assert_eq!(verification.amount, Some(Amount::from(250_000)));
        assert_eq!(verification.raw_response, raw);
    }

    #[test]
    fn signed_webhooks_are_decoded() {
        let body = charge_success("BXO-REF-1");
        let signature = webhook_signature(SECRET, &body);
        let notification = gateway(true).decode_webhook(&body, Some(&signature)).unwrap();
        assert_eq!(notification.event_name, "charge.success");
        assert_eq!(notification.reference, "BXO-REF-1");
        assert!(notification.is_success);
    }

    #[test]
    fn forged_webhooks_are_rejected() {
        let body = charge_success("BXO-REF-1");
        let forged = webhook_signature("sk_test_someone_else", &body);
        let gateway = gateway(true);
        assert!(matches!(gateway.decode_webhook(&body, Some(&forged)), Err(GatewayError::InvalidWebhook(_))));
        assert!(matches!(gateway.decode_webhook(&body, None), Err(GatewayError::InvalidWebhook(_))));
    }

    #[test]
    fn unsigned_webhooks_pass_when_checks_are_off() {
        let body = json!({ "event": "charge.failed", "data": { "reference": "BXO-REF-2" } }).to_string();
        let notification = gateway(false).decode_webhook(body.as_bytes(), None).unwrap();
        assert_eq!(notification.reference, "BXO-REF-2");
        assert!(!notification.is_success);
        let garbage = gateway(false).decode_webhook(b"not json", None);
        assert!(matches!(garbage, Err(GatewayError::InvalidWebhook(_))));
    }

    #[test]
    fn client_errors_are_rejections() {
        assert!(matches!(gateway_error(PaystackApiError::Timeout), GatewayError::Timeout));
        let bad_request = PaystackApiError::QueryError { status: 400, message: "Invalid currency".into() };
        assert!(matches!(gateway_error(bad_request), GatewayError::Rejected(_)));
        let outage = PaystackApiError::QueryError { status: 503, message: "Service unavailable".into() };
        assert!(matches!(gateway_error(outage), GatewayError::CommunicationError(_)));
    }
}
