//! Connections to the outside world: payment providers and the ticket notification hook.
pub mod notifications;
#[cfg(feature = "paystack")]
pub mod paystack;

use boxoffice_engine::traits::{
    CheckoutHandle,
    CheckoutRequest,
    GatewayError,
    PaymentGateway,
    ProviderVerification,
    WebhookNotification,
};
use log::*;

use crate::{config::ServerConfig, errors::ServerError};

/// Routes provider calls to the configured provider adapters by name. A provider without credentials is not
/// configured, and calls naming it fail with [`GatewayError::UnknownProvider`].
#[derive(Clone, Default)]
pub struct PaymentProviders {
    #[cfg(feature = "paystack")]
    paystack: Option<paystack::PaystackGateway>,
}

impl PaymentProviders {
    pub fn from_config(config: &ServerConfig) -> Result<Self, ServerError> {
        #[allow(unused_mut)]
        let mut providers = Self::default();
        #[cfg(feature = "paystack")]
        if config.paystack.secret_key.reveal().is_empty() {
            warn!("💳️ Paystack has no secret key, so it is disabled");
        } else {
            let gateway = paystack::PaystackGateway::new(config.paystack.clone(), config.webhook_signature_checks)
                .map_err(|e| ServerError::InitializeError(format!("Could not configure Paystack. {e}")))?;
            providers.paystack = Some(gateway);
        }
        let names = providers.names();
        if names.is_empty() {
            warn!("💳️ No payment providers are configured. Orders can be placed but not paid.");
        } else {
            info!("💳️ Payment providers: {}", names.join(", "));
        }
        Ok(providers)
    }

    pub fn names(&self) -> Vec<&'static str> {
        #[allow(unused_mut)]
        let mut names = Vec::new();
        #[cfg(feature = "paystack")]
        if self.paystack.is_some() {
            names.push(paystack::PAYSTACK);
        }
        names
    }

    #[cfg(feature = "paystack")]
    fn paystack(&self) -> Result<&paystack::PaystackGateway, GatewayError> {
        self.paystack.as_ref().ok_or_else(|| GatewayError::UnknownProvider(paystack::PAYSTACK.to_string()))
    }
}

impl PaymentGateway for PaymentProviders {
    async fn initiate(&self, provider: &str, request: CheckoutRequest) -> Result<CheckoutHandle, GatewayError> {
        match provider {
            #[cfg(feature = "paystack")]
            paystack::PAYSTACK => self.paystack()?.initiate(request).await,
            _ => Err(GatewayError::UnknownProvider(provider.to_string())),
        }
    }

    async fn verify_by_reference(&self, provider: &str, reference: &str) -> Result<ProviderVerification, GatewayError> {
        match provider {
            #[cfg(feature = "paystack")]
            paystack::PAYSTACK => self.paystack()?.verify(reference).await,
            _ => Err(GatewayError::UnknownProvider(provider.to_string())),
        }
    }

    fn decode_webhook(
        &self,
        provider: &str,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookNotification, GatewayError> {
        match provider {
            #[cfg(feature = "paystack")]
            paystack::PAYSTACK => self.paystack()?.decode_webhook(payload, signature),
            _ => {
                trace!("💳️ Dropping a {}-byte webhook (signed: {}) for {provider}", payload.len(), signature.is_some());
                Err(GatewayError::UnknownProvider(provider.to_string()))
            },
        }
    }
}
