//! A small client for a hosted-checkout payment provider with the Paystack API shape.
//!
//! Only the three calls the box office needs are covered: initialising a transaction (which yields a redirect URL for
//! the buyer), verifying a transaction by its reference, and authenticating + decoding webhook deliveries.
mod api;
mod config;
mod data_objects;
mod error;
mod helpers;

pub use api::PaystackApi;
pub use config::PaystackConfig;
pub use data_objects::{
    InitializeTransaction,
    InitializedTransaction,
    PaystackResponse,
    TransactionStatus,
    VerifiedTransaction,
    WebhookEvent,
    CHARGE_SUCCESS_EVENT,
};
pub use error::PaystackApiError;
pub use helpers::{verify_webhook_signature, webhook_signature};
