//! Box Office Engine
//!
//! The box office engine sells finite-capacity event tickets under concurrent demand and admits their holders at the
//! venue. This library contains the whole order-to-redemption pipeline. It is independent of any web framework and
//! of any particular payment provider.
//!
//! The library is divided into these sections:
//! 1. Database management ([`mod@db`]). SQLite is the supported backend. You should never need to access the database
//!    directly. Instead, use the public API. The exception is the data types stored in the database, which are
//!    defined in the [`db_types`] module and are public.
//! 2. The backend contracts ([`traits`]). A backend implements these traits to serve the APIs. The payment provider
//!    contract, [`traits::PaymentGateway`], lives here too.
//! 3. The public API ([`bxo_api`]): inventory holds, the order flow, payment reconciliation, ticket issuance and
//!    redemption.
//!
//! The engine also publishes events ([`events`]) when tickets are issued, or when an order is cancelled or expires.
//! Hooks subscribe to these and run on their own tasks, so a slow or failing hook (e.g. sending the ticket email)
//! never affects a sale.
mod db;

pub mod bxo_api;
pub mod db_types;
pub mod events;
pub mod helpers;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use bxo_api::{
    errors::{ErrorKind, TicketingError},
    inventory_api::InventoryApi,
    order_flow_api::OrderFlowApi,
    order_objects::{self, OrderPolicy},
    payment_objects,
    payment_reconciler::PaymentReconciler,
    redemption_objects,
    redemption_validator::RedemptionValidator,
    ticket_issuer::TicketIssuer,
};
#[cfg(feature = "sqlite")]
pub use db::sqlite::{db_url, SqliteDatabase};
