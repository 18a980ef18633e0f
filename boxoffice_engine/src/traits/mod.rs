//! # Backend and collaborator contracts
//!
//! The box office engine is written against these traits rather than against a concrete database or payment
//! provider.
//!
//! ## Storage
//! * [`CatalogManagement`] reads events and ticket tiers (and seeds them).
//! * [`InventoryManagement`] reserves, confirms, releases and expires tier capacity.
//! * [`OrderManagement`] writes orders together with their holds, and moves orders out of `Pending`.
//! * [`PaymentManagement`] records payment attempts and owns the exactly-once completion unit of work.
//! * [`TicketManagement`] reads tickets and performs the single redemption write.
//! * [`ScanManagement`] manages scan sessions and the append-only validation ledger.
//!
//! Every "transition if still in state X" write behind these traits is a conditional write, so the traits can be
//! called concurrently from any number of tasks or processes sharing the same store.
//!
//! ## Payment providers
//! [`PaymentGateway`] is the adapter over external payment providers.
mod catalog_management;
mod data_objects;
mod inventory_management;
mod order_management;
mod payment_gateway;
mod payment_management;
mod scan_management;
mod ticket_management;

pub use catalog_management::CatalogManagement;
pub use data_objects::{CreatedOrder, PaymentCompletion};
pub use inventory_management::InventoryManagement;
pub use order_management::OrderManagement;
pub use payment_gateway::{
    CheckoutHandle,
    CheckoutRequest,
    GatewayError,
    PaymentGateway,
    ProviderStatus,
    ProviderVerification,
    WebhookNotification,
};
pub use payment_management::PaymentManagement;
pub use scan_management::ScanManagement;
pub use ticket_management::TicketManagement;
