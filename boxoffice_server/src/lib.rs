//! # Box office server
//! This crate hosts the HTTP server for the box office. It is responsible for:
//! * Taking orders and holding their tickets while the buyer pays.
//! * Starting payments with the payment providers, verifying them, and receiving their webhooks.
//! * Issuing tickets once a payment is confirmed, and posting them to the notification relay.
//! * Running scan sessions for the door scanners and validating tickets at the venue.
//! * Expiring orders that were never paid, on a timer.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `GET /health`: A health check route that returns a 200 OK response.
//! * `POST /orders`: Place an order.
//! * `GET /orders/{code}`: The order, its lines, payments and tickets.
//! * `POST /orders/{code}/cancel`: Cancel a pending order.
//! * `POST /orders/{code}/payments`: Start a payment for an order.
//! * `GET /payments/{id}`: A payment record.
//! * `POST /payments/{id}/verify`: Ask the provider for the payment's status.
//! * `POST /webhooks/{provider}`: Provider webhooks.
//! * `POST /scan_sessions`: Open a scan session.
//! * `GET /scan_sessions/{id}`: A scan session with its counters.
//! * `POST /scan_sessions/{id}/end`: Close a scan session.
//! * `POST /scan_sessions/{id}/validate`: Validate a scanned ticket.
//! * `GET /scan_sessions/{id}/validations`: The validations recorded in a session.
//! * `GET /tickets/{id}/validations`: Every scan of a ticket.

pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod expiry_worker;
pub mod integrations;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
