use boxoffice_engine::{
    db_types::HoldStatus,
    test_utils::order_request,
    traits::{CatalogManagement, InventoryManagement},
    TicketingError,
};
use chrono::Utc;
use futures_util::future::join_all;
use log::*;
use tokio::runtime::Runtime;

use crate::support::TestSystem;

mod support;

const NUM_ORDERS: usize = 30;

#[test]
fn burst_orders_never_oversell() {
    info!("🚀️ Starting order burst test");
    let sys = Runtime::new().unwrap();
    sys.block_on(async move {
        let system = TestSystem::new().await;
        let (event, tiers) = system.seed(&[("Regular", 50, 10)]).await;
        let tier_id = tiers[0].id;
        let now = Utc::now();
        let requests = (0..NUM_ORDERS).map(|i| {
            let quantity = (i % 2 + 1) as i64;
            system.orders.create_order(order_request(event.id, &[(tier_id, quantity)]), now)
        });
        let results = join_all(requests).await;
        let mut held = 0;
        for result in results {
            match result {
                Ok(created) => held += created.holds.iter().map(|h| h.quantity).sum::<i64>(),
                Err(TicketingError::InsufficientInventory { tier_id: t, .. }) => assert_eq!(t, tier_id),
                Err(e) => panic!("Unexpected error: {e}"),
            }
        }
        assert!(held <= 10, "{held} tickets held against a quota of 10");
        // Requests are for 1 or 2 tickets, so at most one unit can be left over
        assert!(held >= 9, "only {held} tickets held");
        let tier = system.db.fetch_tier(tier_id).await.unwrap().unwrap();
        assert_eq!(tier.held, held);
        assert_eq!(tier.sold, 0);
        system.tear_down().await;
    });
    info!("🚀️ test complete");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn last_ticket_goes_to_exactly_one_buyer() {
    let system = TestSystem::new().await;
    let (event, tiers) = system.seed(&[("Front row", 200, 1)]).await;
    let tier_id = tiers[0].id;
    let now = Utc::now();
    let (a, b) = tokio::join!(
        system.orders.create_order(order_request(event.id, &[(tier_id, 1)]), now),
        system.orders.create_order(order_request(event.id, &[(tier_id, 1)]), now),
    );
    let (winner, loser) = match (a, b) {
        (Ok(w), Err(l)) | (Err(l), Ok(w)) => (w, l),
        (a, b) => panic!("Expected exactly one success, got {a:?} and {b:?}"),
    };
    assert!(matches!(loser, TicketingError::InsufficientInventory { requested: 1, .. }));
    let holds = system.db.fetch_holds_for_order(winner.order.id).await.unwrap();
    assert_eq!(holds.len(), 1);
    assert_eq!(holds[0].status, HoldStatus::Active);
    let tier = system.db.fetch_tier(tier_id).await.unwrap().unwrap();
    assert_eq!((tier.held, tier.available()), (1, 0));
    system.tear_down().await;
}

#[tokio::test]
async fn a_failed_line_leaves_no_trace() {
    let system = TestSystem::new().await;
    let (event, tiers) = system.seed(&[("Regular", 50, 5), ("VIP", 150, 1)]).await;
    let now = Utc::now();
    let err = system
        .orders
        .create_order(order_request(event.id, &[(tiers[0].id, 3), (tiers[1].id, 2)]), now)
        .await
        .unwrap_err();
    assert!(matches!(err, TicketingError::InsufficientInventory { tier_id, requested: 2 } if tier_id == tiers[1].id));
    let regular = system.db.fetch_tier(tiers[0].id).await.unwrap().unwrap();
    assert_eq!(regular.held, 0, "the hold on the first line must have been rolled back");
    let orders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders").fetch_one(system.db.pool()).await.unwrap();
    assert_eq!(orders, 0);
    system.tear_down().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn new_catalog_rows_are_visible_to_every_connection() {
    let system = TestSystem::new().await;
    for round in 0..25 {
        let (event, tiers) = system.seed(&[("Regular", 50, 10), ("VIP", 200, 2)]).await;
        let events = (0..4).map(|_| system.db.fetch_event(event.id));
        assert!(join_all(events).await.into_iter().all(|e| e.unwrap().is_some()), "event missing in round {round}");
        for tier in &tiers {
            let readers = (0..4).map(|_| system.db.fetch_tier(tier.id));
            for seen in join_all(readers).await {
                assert_eq!(seen.unwrap().map(|t| t.id), Some(tier.id), "tier missing in round {round}");
            }
        }
    }
    system.tear_down().await;
}
