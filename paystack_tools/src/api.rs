use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    config::PaystackConfig,
    data_objects::{InitializeTransaction, InitializedTransaction, PaystackResponse, VerifiedTransaction, WebhookEvent},
    helpers::verify_webhook_signature,
    PaystackApiError,
};

#[derive(Clone)]
pub struct PaystackApi {
    config: PaystackConfig,
    client: Arc<Client>,
}

impl PaystackApi {
    pub fn new(config: PaystackConfig) -> Result<Self, PaystackApiError> {
        let mut headers = HeaderMap::with_capacity(2);
        let val = HeaderValue::from_str(&format!("Bearer {}", config.secret_key.reveal()))
            .map_err(|e| PaystackApiError::Initialization(e.to_string()))?;
        headers.insert(AUTHORIZATION, val);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| PaystackApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &PaystackConfig {
        &self.config
    }

    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<B>,
    ) -> Result<T, PaystackApiError> {
        let url = self.url(path);
        trace!("Sending REST query: {method} {url}");
        let mut req = self.client.request(method, url);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                PaystackApiError::Timeout
            } else {
                PaystackApiError::RestRequestError(e.to_string())
            }
        })?;
        if response.status().is_success() {
            trace!("REST query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| PaystackApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| PaystackApiError::RestResponseError(e.to_string()))?;
            Err(PaystackApiError::QueryError { status, message })
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    /// Starts a hosted checkout. The buyer must be sent to the returned `authorization_url`.
    pub async fn initialize_transaction(
        &self,
        mut request: InitializeTransaction,
    ) -> Result<InitializedTransaction, PaystackApiError> {
        if request.callback_url.is_none() {
            request.callback_url = self.config.callback_url.clone();
        }
        debug!("Initializing transaction {} for {} {}", request.reference, request.amount, request.currency);
        let result = self
            .rest_query::<PaystackResponse<InitializedTransaction>, _>(
                Method::POST,
                "/transaction/initialize",
                Some(request),
            )
            .await?
            .into_data()?;
        info!("Initialized transaction {}", result.reference);
        Ok(result)
    }

    /// Fetches the authoritative status of a transaction, along with the raw provider payload.
    pub async fn verify_transaction(
        &self,
        reference: &str,
    ) -> Result<(VerifiedTransaction, serde_json::Value), PaystackApiError> {
        let path = format!("/transaction/verify/{reference}");
        debug!("Verifying transaction {reference}");
        let raw = self.rest_query::<serde_json::Value, ()>(Method::GET, &path, None).await?;
        let envelope = serde_json::from_value::<PaystackResponse<VerifiedTransaction>>(raw.clone())
            .map_err(|e| PaystackApiError::JsonError(e.to_string()))?;
        let tx = envelope.into_data()?;
        info!("Transaction {reference} has status {}", tx.status);
        Ok((tx, raw))
    }

    /// Authenticates a webhook body against the `x-paystack-signature` header and decodes it.
    pub fn decode_webhook(&self, body: &[u8], signature: Option<&str>) -> Result<WebhookEvent, PaystackApiError> {
        let signature = signature.ok_or(PaystackApiError::InvalidWebhookSignature)?;
        if !verify_webhook_signature(self.config.secret_key.reveal(), body, signature) {
            warn!("Webhook signature check failed");
            return Err(PaystackApiError::InvalidWebhookSignature);
        }
        WebhookEvent::from_slice(body)
    }
}
