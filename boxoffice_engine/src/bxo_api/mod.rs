//! # Box office engine public API
//!
//! The `bxo_api` module exposes the programmatic API of the box office engine, one struct per stage of the
//! order-to-redemption pipeline:
//!
//! * [`inventory_api`] holds ticket tier capacity against orders, and reaps holds whose window has passed.
//! * [`order_flow_api`] creates, cancels and expires orders.
//! * [`payment_reconciler`] starts payments with a provider and reconciles their outcome, issuing tickets exactly once.
//! * [`ticket_issuer`] turns a paid order into tickets with signed redemption codes.
//! * [`redemption_validator`] checks scanned codes at the venue and redeems each ticket at most once.
//!
//! # API usage
//!
//! Every API is created by supplying a database backend that implements the backend traits it needs. The backends are
//! cheap to clone (they wrap a connection pool), so one backend is usually shared by all the APIs.
//!
//! ```rust,ignore
//! use boxoffice_engine::{OrderFlowApi, OrderPolicy, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! let api = OrderFlowApi::new(db, OrderPolicy::default(), producers);
//! let created = api.create_order(request, Utc::now()).await?;
//! ```
pub mod errors;
pub mod inventory_api;
pub mod order_flow_api;
pub mod order_objects;
pub mod payment_objects;
pub mod payment_reconciler;
pub mod redemption_objects;
pub mod redemption_validator;
pub mod ticket_issuer;
