use std::time::Duration;

use boxoffice_common::Secret;
use log::*;

pub const DEFAULT_PAYSTACK_BASE_URL: &str = "https://api.paystack.co";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
pub struct PaystackConfig {
    pub base_url: String,
    pub secret_key: Secret<String>,
    /// Where the hosted checkout page sends the buyer once they are done.
    pub callback_url: Option<String>,
    /// Upper bound on every request to the provider.
    pub timeout: Duration,
}

impl Default for PaystackConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_PAYSTACK_BASE_URL.to_string(),
            secret_key: Secret::default(),
            callback_url: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl PaystackConfig {
    pub fn new_from_env_or_default() -> Self {
        let base_url = std::env::var("BXO_PAYSTACK_BASE_URL").unwrap_or_else(|_| {
            debug!("BXO_PAYSTACK_BASE_URL not set, using {DEFAULT_PAYSTACK_BASE_URL}");
            DEFAULT_PAYSTACK_BASE_URL.to_string()
        });
        let secret_key = Secret::new(std::env::var("BXO_PAYSTACK_SECRET_KEY").unwrap_or_else(|_| {
            warn!("BXO_PAYSTACK_SECRET_KEY not set, using (probably useless) default");
            "sk_test_00000000000000".to_string()
        }));
        let callback_url = std::env::var("BXO_PAYSTACK_CALLBACK_URL").ok();
        let timeout = std::env::var("BXO_PROVIDER_TIMEOUT_SECS")
            .ok()
            .and_then(|s| {
                s.parse::<u64>().map_err(|e| warn!("Invalid value for BXO_PROVIDER_TIMEOUT_SECS: {e}")).ok()
            })
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT);
        Self { base_url, secret_key, callback_url, timeout }
    }
}
