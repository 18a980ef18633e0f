use std::{env, fmt::Display, str::FromStr};

use boxoffice_common::{parse_boolean_flag, Secret};
use boxoffice_engine::{
    helpers::CodeSigner,
    order_objects::{DEFAULT_HOLD_DURATION_MINUTES, DEFAULT_MAX_TICKETS_PER_ORDER},
    OrderPolicy,
    TicketIssuer,
};
use chrono::Duration;
use log::*;
#[cfg(feature = "paystack")]
use paystack_tools::PaystackConfig;
use rand::{distributions::Alphanumeric, thread_rng, Rng};

const DEFAULT_BXO_HOST: &str = "127.0.0.1";
const DEFAULT_BXO_PORT: u16 = 8370;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;
const DEFAULT_CODE_VALIDITY_DAYS: i64 = 365;
const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 15;
#[cfg(feature = "paystack")]
const DEFAULT_PAYSTACK_BASE_URL: &str = "https://api.paystack.co";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// The default time an order holds its tickets while the buyer pays. Tiers can override it.
    pub hold_duration: Duration,
    pub max_tickets_per_order: i64,
    /// How often the expiry worker looks for overdue orders and stray holds.
    pub sweep_interval: std::time::Duration,
    /// The MAC key for redemption codes. Changing it invalidates every ticket already issued.
    pub code_signing_secret: Secret<String>,
    /// How long a redemption code stays valid after it is issued.
    pub code_validity: Duration,
    /// Upper bound on every call to a payment provider.
    pub provider_timeout: std::time::Duration,
    /// If false, provider webhooks are accepted without checking their signatures. **DANGER**
    pub webhook_signature_checks: bool,
    /// If set, ticket batches are posted to this endpoint (a mail relay, typically) once they are issued.
    pub notification_url: Option<String>,
    #[cfg(feature = "paystack")]
    pub paystack: PaystackConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_BXO_HOST.to_string(),
            port: DEFAULT_BXO_PORT,
            database_url: String::default(),
            hold_duration: Duration::minutes(DEFAULT_HOLD_DURATION_MINUTES),
            max_tickets_per_order: DEFAULT_MAX_TICKETS_PER_ORDER,
            sweep_interval: std::time::Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            code_signing_secret: random_signing_secret(),
            code_validity: Duration::days(DEFAULT_CODE_VALIDITY_DAYS),
            provider_timeout: std::time::Duration::from_secs(DEFAULT_PROVIDER_TIMEOUT_SECS),
            webhook_signature_checks: true,
            notification_url: None,
            #[cfg(feature = "paystack")]
            paystack: PaystackConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from any variable source. `lookup` returns the value of a `BXO_` variable, if set.
    pub fn from_lookup<F>(lookup: F) -> Self
    where F: Fn(&str) -> Option<String> {
        let host = lookup("BXO_HOST").unwrap_or_else(|| DEFAULT_BXO_HOST.into());
        let port = parse_var(&lookup, "BXO_PORT", DEFAULT_BXO_PORT);
        let database_url = lookup("BXO_DATABASE_URL").unwrap_or_else(|| {
            error!("🪛️ BXO_DATABASE_URL is not set. Please set it to the URL for the box office database.");
            String::default()
        });
        let hold_minutes = parse_positive(&lookup, "BXO_HOLD_DURATION_MINUTES", DEFAULT_HOLD_DURATION_MINUTES);
        let max_tickets_per_order =
            parse_positive(&lookup, "BXO_MAX_TICKETS_PER_ORDER", DEFAULT_MAX_TICKETS_PER_ORDER);
        let sweep_secs = parse_positive(&lookup, "BXO_SWEEP_INTERVAL_SECS", DEFAULT_SWEEP_INTERVAL_SECS);
        let validity_days = parse_positive(&lookup, "BXO_CODE_VALIDITY_DAYS", DEFAULT_CODE_VALIDITY_DAYS);
        let timeout_secs = parse_positive(&lookup, "BXO_PROVIDER_TIMEOUT_SECS", DEFAULT_PROVIDER_TIMEOUT_SECS);
        let code_signing_secret = match lookup("BXO_CODE_SIGNING_SECRET") {
            Some(s) if !s.trim().is_empty() => Secret::new(s),
            _ => random_signing_secret(),
        };
        let webhook_signature_checks = parse_boolean_flag(lookup("BXO_WEBHOOK_SIGNATURE_CHECKS"), true);
        if !webhook_signature_checks {
            warn!(
                "🚨️🚨️🚨️ Webhook signature checks are DISABLED. Anyone can tell the server that a payment succeeded. \
                 Set BXO_WEBHOOK_SIGNATURE_CHECKS=1 in production. 🚨️🚨️🚨️"
            );
        }
        let notification_url = lookup("BXO_NOTIFICATION_URL").filter(|s| !s.trim().is_empty());
        if notification_url.is_none() {
            info!("🪛️ BXO_NOTIFICATION_URL is not set. Issued tickets will not be forwarded anywhere.");
        }
        let provider_timeout = std::time::Duration::from_secs(timeout_secs);
        Self {
            host,
            port,
            database_url,
            hold_duration: Duration::minutes(hold_minutes),
            max_tickets_per_order,
            sweep_interval: std::time::Duration::from_secs(sweep_secs),
            code_signing_secret,
            code_validity: Duration::days(validity_days),
            provider_timeout,
            webhook_signature_checks,
            notification_url,
            #[cfg(feature = "paystack")]
            paystack: paystack_config(&lookup, provider_timeout),
        }
    }

    pub fn order_policy(&self) -> OrderPolicy {
        OrderPolicy::new(self.hold_duration, self.max_tickets_per_order)
    }

    pub fn code_signer(&self) -> CodeSigner {
        CodeSigner::new(self.code_signing_secret.clone(), self.code_validity)
    }

    pub fn ticket_issuer(&self) -> TicketIssuer {
        TicketIssuer::new(self.code_signer())
    }
}

#[cfg(feature = "paystack")]
fn paystack_config<F>(lookup: &F, timeout: std::time::Duration) -> PaystackConfig
where F: Fn(&str) -> Option<String> {
    let base_url = lookup("BXO_PAYSTACK_BASE_URL").unwrap_or_else(|| DEFAULT_PAYSTACK_BASE_URL.to_string());
    let secret_key = lookup("BXO_PAYSTACK_SECRET_KEY").unwrap_or_else(|| {
        warn!("🪛️ BXO_PAYSTACK_SECRET_KEY is not set. Paystack payments and webhooks will be rejected.");
        String::default()
    });
    let callback_url = lookup("BXO_PAYSTACK_CALLBACK_URL");
    PaystackConfig { base_url, secret_key: Secret::new(secret_key), callback_url, timeout }
}

fn random_signing_secret() -> Secret<String> {
    warn!(
        "🚨️🚨️🚨️ BXO_CODE_SIGNING_SECRET has not been set. I'm using a random value for this session. Tickets issued \
         now will NOT scan after a restart. Do not run in production like this. 🚨️🚨️🚨️"
    );
    let secret = thread_rng().sample_iter(&Alphanumeric).take(48).map(char::from).collect::<String>();
    Secret::new(secret)
}

fn parse_var<T, F>(lookup: &F, name: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => {
            debug!("🪛️ {name} is not set. Using the default value of {default}.");
            default
        },
        Some(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            warn!("🪛️ {s} is not a valid value for {name}. {e} Using the default, {default}, instead.");
            default
        }),
    }
}

fn parse_positive<T, F>(lookup: &F, name: &str, default: T) -> T
where
    T: FromStr + Display + PartialOrd + Default + Copy,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    let value = parse_var(lookup, name, default);
    if value > T::default() {
        value
    } else {
        warn!("🪛️ {name} must be greater than zero. Using the default, {default}, instead.");
        default
    }
}
