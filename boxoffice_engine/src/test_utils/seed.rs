use boxoffice_common::{Amount, Secret};
use chrono::{Duration, Utc};

use crate::{
    bxo_api::order_objects::{BuyerInfo, LineRequest, OrderRequest},
    db_types::{Event, EventStatus, NewEvent, NewTicketTier, TicketTier},
    helpers::CodeSigner,
    traits::CatalogManagement,
    SqliteDatabase,
    TicketIssuer,
};

pub const TEST_SIGNING_SECRET: &str = "box-office-test-secret";

pub fn test_signer() -> CodeSigner {
    CodeSigner::new(Secret::new(TEST_SIGNING_SECRET.to_string()), Duration::days(30))
}

pub fn test_issuer() -> TicketIssuer {
    TicketIssuer::new(test_signer())
}

pub fn buyer(name: &str) -> BuyerInfo {
    let email = format!("{}@example.com", name.to_lowercase().replace(' ', "."));
    BuyerInfo { name: name.to_string(), email, phone: None }
}

pub fn order_request(event_id: i64, lines: &[(i64, i64)]) -> OrderRequest {
    OrderRequest {
        event_id,
        buyer: buyer("Ada Obi"),
        lines: lines.iter().map(|&(tier_id, quantity)| LineRequest { tier_id, quantity }).collect(),
    }
}

/// Creates a published event a week from now with one tier per `(name, price, quota)`. Prices are in major units.
pub async fn seed_event(db: &SqliteDatabase, tiers: &[(&str, i64, i64)]) -> (Event, Vec<TicketTier>) {
    let starts_at = Utc::now() + Duration::days(7);
    let event = NewEvent::new("Afrobeats Live", starts_at).with_venue("Eko Hotel").with_status(EventStatus::Published);
    let event = db.insert_event(event).await.expect("Error inserting event");
    let mut result = Vec::with_capacity(tiers.len());
    for &(name, price, quota) in tiers {
        let tier = NewTicketTier::new(event.id, name, Amount::from_major(price), quota);
        result.push(db.insert_tier(tier).await.expect("Error inserting tier"));
    }
    (event, result)
}
