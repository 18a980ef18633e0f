use boxoffice_common::Amount;
use boxoffice_engine::{
    db_types::{EventStatus, NewEvent, NewTicketTier},
    traits::CatalogManagement,
};
use chrono::{Duration, Utc};
use cucumber::given;

use crate::cucumber::{BoxOfficeSystem, BoxOfficeWorld};

#[given("a fresh install")]
async fn fresh_database(world: &mut BoxOfficeWorld) {
    let system = BoxOfficeSystem::new().await;
    world.system = Some(system);
    world.now = Utc::now();
}

#[given(expr = "an event with a {string} tier of {int} ticket(s) at {int}")]
async fn event_with_tier(world: &mut BoxOfficeWorld, name: String, quota: i64, price: i64) {
    let db = &world.system().db;
    let event = match &world.event {
        Some(event) => event.clone(),
        None => {
            let event = NewEvent::new("Lagos Jazz Night", world.now + Duration::days(14))
                .with_venue("Terra Kulture")
                .with_status(EventStatus::Published);
            db.insert_event(event).await.expect("Error inserting event")
        },
    };
    let tier = NewTicketTier::new(event.id, name.as_str(), Amount::from_major(price), quota);
    let tier = db.insert_tier(tier).await.expect("Error inserting tier");
    world.event = Some(event);
    world.tiers.insert(name, tier);
}
