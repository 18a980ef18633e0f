use std::collections::HashSet;

use boxoffice_engine::{
    db_types::{OrderStatusType, ValidationOutcome},
    order_objects::{LineRequest, OrderRequest},
    payment_objects::VerifyOutcome,
    redemption_objects::ValidationRequest,
    test_utils::{buyer, FAKE_PROVIDER},
    traits::{
        CatalogManagement,
        CreatedOrder,
        OrderManagement,
        PaymentManagement,
        ProviderStatus,
        ScanManagement,
        TicketManagement,
    },
    TicketingError,
};
use chrono::Duration;
use cucumber::{given, then, when};

use crate::cucumber::BoxOfficeWorld;

fn request(world: &BoxOfficeWorld, who: &str, lines: &[(i64, &str)]) -> OrderRequest {
    let event_id = world.event.as_ref().expect("No event has been set up").id;
    let lines =
        lines.iter().map(|&(quantity, tier)| LineRequest { tier_id: world.tier(tier).id, quantity }).collect();
    OrderRequest { event_id, buyer: buyer(who), lines }
}

async fn place_order(world: &mut BoxOfficeWorld, who: String, lines: &[(i64, &str)]) {
    let request = request(world, &who, lines);
    let created = world.system().orders.create_order(request, world.now).await.expect("Error placing order");
    world.orders.insert(who, created);
}

#[when(expr = "'{word}' orders {int} {string} ticket(s)")]
async fn order_tickets(world: &mut BoxOfficeWorld, who: String, quantity: i64, tier: String) {
    place_order(world, who, &[(quantity, &tier)]).await;
}

#[when(expr = "'{word}' orders {int} {string} and {int} {string} ticket(s)")]
async fn order_two_tiers(world: &mut BoxOfficeWorld, who: String, q1: i64, tier1: String, q2: i64, tier2: String) {
    place_order(world, who, &[(q1, &tier1), (q2, &tier2)]).await;
}

#[then(expr = "'{word}' cannot order {int} {string} ticket(s)")]
async fn cannot_order(world: &mut BoxOfficeWorld, who: String, quantity: i64, tier: String) {
    let request = request(world, &who, &[(quantity, &tier)]);
    let result = world.system().orders.create_order(request, world.now).await;
    assert!(
        matches!(result, Err(TicketingError::InsufficientInventory { .. })),
        "Expected the tier to be sold out, got {result:?}"
    );
}

#[when(expr = "'{word}' and '{word}' race for {int} {string} ticket(s)")]
async fn race_for_tickets(world: &mut BoxOfficeWorld, first: String, second: String, quantity: i64, tier: String) {
    let a = request(world, &first, &[(quantity, &tier)]);
    let b = request(world, &second, &[(quantity, &tier)]);
    let orders = &world.system().orders;
    let (a, b) = tokio::join!(orders.create_order(a, world.now), orders.create_order(b, world.now));
    world.race = vec![a, b];
}

#[then("exactly one order succeeds")]
async fn one_winner(world: &mut BoxOfficeWorld) {
    assert_eq!(world.race.iter().filter(|r| r.is_ok()).count(), 1, "Race results: {:?}", world.race);
}

#[then("the loser is told the tier is sold out")]
async fn loser_sold_out(world: &mut BoxOfficeWorld) {
    let loser = world.race.iter().find(|r| r.is_err()).expect("Nobody lost the race");
    assert!(matches!(loser, Err(TicketingError::InsufficientInventory { .. })), "Unexpected result: {loser:?}");
}

#[then(expr = "{string} has {int} held and {int} sold")]
async fn tier_counters(world: &mut BoxOfficeWorld, tier: String, held: i64, sold: i64) {
    let tier_id = world.tier(&tier).id;
    let tier = world.system().db.fetch_tier(tier_id).await.expect("Error fetching tier").expect("Tier vanished");
    assert_eq!((tier.held, tier.sold), (held, sold), "Counters for '{}'", tier.name);
    assert!(tier.held + tier.sold <= tier.quota);
}

#[when(expr = "{int} minutes pass")]
async fn time_passes(world: &mut BoxOfficeWorld, minutes: i64) {
    world.now += Duration::minutes(minutes);
}

#[when("the expiry sweep runs")]
async fn sweep(world: &mut BoxOfficeWorld) {
    world.system().orders.expire_overdue(world.now).await.expect("Error running the expiry sweep");
}

#[then(expr = "the order for '{word}' is {word}")]
async fn order_status(world: &mut BoxOfficeWorld, who: String, status: String) {
    let expected = status.parse::<OrderStatusType>().expect("Not an order status");
    let id = world.order_for(&who).order.id;
    let order = world.system().db.fetch_order(id).await.expect("Error fetching order").expect("Order vanished");
    assert_eq!(order.status, expected);
}

async fn start_payment(world: &BoxOfficeWorld, who: &str) -> i64 {
    let CreatedOrder { order, .. } = world.order_for(who);
    let system = world.system();
    let handle =
        system.payments.initiate_payment(&order.order_code, FAKE_PROVIDER, world.now).await.expect("Error paying");
    system.gateway.set_status(&handle.payment.reference, ProviderStatus::Completed);
    handle.payment.id
}

#[when(expr = "'{word}' pays for the order")]
async fn pay(world: &mut BoxOfficeWorld, who: String) {
    let payment_id = start_payment(world, &who).await;
    let outcome = world.system().payments.verify_payment(payment_id, world.now).await.expect("Error verifying");
    let VerifyOutcome::Completed { tickets, first_completion: true, .. } = outcome else {
        panic!("Expected a first completion, got {outcome:?}");
    };
    world.tickets.insert(who, tickets);
}

#[when(expr = "the payment for '{word}' is verified {int} more times")]
async fn verify_again(world: &mut BoxOfficeWorld, who: String, times: usize) {
    let order_id = world.order_for(&who).order.id;
    let system = world.system();
    let payments = system.db.fetch_payments_for_order(order_id).await.expect("Error fetching payments");
    for _ in 0..times {
        let outcome = system.payments.verify_payment(payments[0].id, world.now).await.expect("Error verifying");
        assert!(matches!(outcome, VerifyOutcome::Completed { first_completion: false, .. }), "{outcome:?}");
    }
}

#[then(expr = "'{word}' holds {int} ticket(s) with distinct serial numbers")]
async fn holds_tickets(world: &mut BoxOfficeWorld, who: String, count: usize) {
    let order_id = world.order_for(&who).order.id;
    let tickets = world.system().db.fetch_tickets_for_order(order_id).await.expect("Error fetching tickets");
    assert_eq!(tickets.len(), count);
    let serials = tickets.iter().map(|t| t.serial_number.as_str()).collect::<HashSet<_>>();
    assert_eq!(serials.len(), count);
}

#[when(expr = "'{word}' cancels the order")]
async fn cancel(world: &mut BoxOfficeWorld, who: String) {
    let code = world.order_for(&who).order.order_code.clone();
    world.system().orders.cancel_order(&code, "Cancelled by buyer", world.now).await.expect("Error cancelling");
}

#[then(expr = "'{word}' cannot cancel the order")]
async fn cannot_cancel(world: &mut BoxOfficeWorld, who: String) {
    let code = world.order_for(&who).order.order_code.clone();
    let result = world.system().orders.cancel_order(&code, "Cancelled by buyer", world.now).await;
    assert!(matches!(result, Err(TicketingError::OrderNotPending { .. })), "{result:?}");
}

#[then(expr = "'{word}' cannot pay for the order")]
async fn cannot_pay(world: &mut BoxOfficeWorld, who: String) {
    let code = world.order_for(&who).order.order_code.clone();
    let result = world.system().payments.initiate_payment(&code, FAKE_PROVIDER, world.now).await;
    assert!(matches!(result, Err(TicketingError::PaymentNotAllowed(_))), "{result:?}");
}

#[then(expr = "the order for '{word}' cannot be expired")]
async fn cannot_expire(world: &mut BoxOfficeWorld, who: String) {
    let id = world.order_for(&who).order.id;
    let result = world.system().db.expire_order(id, world.now).await;
    assert!(result.is_err(), "{result:?}");
}

#[given(expr = "scanner '{word}' opens a session")]
async fn open_session(world: &mut BoxOfficeWorld, scanner: String) {
    let event_id = world.event.as_ref().expect("No event has been set up").id;
    let session =
        world.system().validator.start_session(&scanner, event_id, world.now).await.expect("Error opening session");
    world.sessions.insert(scanner, session);
}

#[when(expr = "scanner '{word}' scans ticket {int} of '{word}'")]
async fn scan_ticket(world: &mut BoxOfficeWorld, scanner: String, index: usize, who: String) {
    let session_id = world.sessions.get(&scanner).expect("Scanner has no session").id;
    let tickets = world.tickets.get(&who).expect("Buyer has no tickets");
    let request = ValidationRequest {
        event_id: tickets[index - 1].event_id,
        code: tickets[index - 1].redemption_code.clone(),
        notes: None,
    };
    let response =
        world.system().validator.validate(session_id, request, world.now).await.expect("Error validating ticket");
    world.last_scan = Some(response);
}

#[then("the scan is valid")]
async fn scan_is_valid(world: &mut BoxOfficeWorld) {
    let scan = world.last_scan.as_ref().expect("Nothing was scanned");
    assert!(scan.valid && !scan.already_validated, "{scan:?}");
}

#[then("the scan reports an earlier redemption")]
async fn scan_already_validated(world: &mut BoxOfficeWorld) {
    let scan = world.last_scan.as_ref().expect("Nothing was scanned");
    assert!(!scan.valid && scan.already_validated, "{scan:?}");
    assert_eq!(scan.outcome, ValidationOutcome::AlreadyRedeemed);
    assert!(scan.redeemed_at.is_some());
}

#[then(expr = "ticket {int} of '{word}' has {int} validation record(s), {int} of them valid")]
async fn validation_records(world: &mut BoxOfficeWorld, index: usize, who: String, total: usize, valid: usize) {
    let tickets = world.tickets.get(&who).expect("Buyer has no tickets");
    let records = world
        .system()
        .db
        .fetch_validations_for_ticket(&tickets[index - 1].id)
        .await
        .expect("Error fetching validations");
    assert_eq!(records.len(), total);
    assert_eq!(records.iter().filter(|r| r.outcome.is_valid()).count(), valid);
}
