//! Helpers for tests of the engine and of crates built on it. Compiled with the `test_utils` feature.
mod fake_gateway;
pub mod prepare_env;
mod seed;

pub use fake_gateway::{FakeGateway, FAKE_PROVIDER, FAKE_SIGNATURE};
pub use seed::{buyer, order_request, seed_event, test_issuer, test_signer};
