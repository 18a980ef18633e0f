use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use boxoffice_common::Amount;
use boxoffice_engine::{
    db_types::{Event, EventStatus, Order, OrderCode, OrderLine, OrderStatusType},
    events::EventProducers,
    test_utils::order_request,
    OrderFlowApi,
    OrderPolicy,
    TicketingError,
};
use chrono::{Duration, TimeZone, Utc};

use super::{
    helpers::{json, send_request},
    mocks::MockBackend,
};
use crate::{
    data_objects::DEFAULT_CANCEL_REASON,
    errors::json_error_handler,
    routes::{CancelOrderRoute, CreateOrderRoute, OrderSummaryRoute},
};

#[actix_web::test]
async fn fetch_order_summary() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend.expect_fetch_order_by_code().returning(|code| Ok(Some(sample_order(code.as_str(), OrderStatusType::Paid))));
    backend.expect_fetch_order_lines().returning(|order_id| Ok(vec![sample_line(order_id)]));
    backend.expect_fetch_payments_for_order().returning(|_| Ok(vec![]));
    backend.expect_fetch_tickets_for_order().returning(|_| Ok(vec![]));
    let req = TestRequest::get().uri("/orders/BXOK7M2Q9XZ");
    let (status, body) = send_request(req, configure(backend)).await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["order"]["order_code"], "BXOK7M2Q9XZ");
    assert_eq!(body["order"]["status"], "Paid");
    assert_eq!(body["lines"][0]["tier_name"], "Regular");
    assert_eq!(body["lines"][0]["quantity"], 2);
    assert!(body["payments"].as_array().unwrap().is_empty());
}

#[actix_web::test]
async fn unknown_orders_are_not_found() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend.expect_fetch_order_by_code().returning(|_| Ok(None));
    let req = TestRequest::get().uri("/orders/BXONOSUCHONE");
    let (status, body) = send_request(req, configure(backend)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json(&body)["error"], "Order BXONOSUCHONE does not exist");
}

#[actix_web::test]
async fn malformed_order_bodies_are_rejected() {
    let _ = env_logger::try_init().ok();
    let req = TestRequest::post()
        .uri("/orders")
        .insert_header(("content-type", "application/json"))
        .set_payload(r#"{"event_id": "seven", "lines": []}"#);
    let (status, body) = send_request(req, configure(MockBackend::new())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let message = json(&body)["error"].as_str().unwrap().to_string();
    assert!(message.starts_with("Could not read request body"), "{message}");
}

#[actix_web::test]
async fn order_limits_are_checked_before_touching_the_database() {
    let _ = env_logger::try_init().ok();
    // No expectations: any backend call fails the test
    let req = TestRequest::post().uri("/orders").set_json(order_request(1, &[(1, 6), (2, 5)]));
    let (status, body) = send_request(req, configure(MockBackend::new())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        json(&body)["error"],
        "Invalid order: An order may contain at most 10 tickets, but 11 were requested"
    );
    let req = TestRequest::post().uri("/orders").set_json(order_request(1, &[(1, i64::MAX), (2, 1)]));
    let (status, _) = send_request(req, configure(MockBackend::new())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn draft_events_are_not_on_sale() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend.expect_fetch_event().returning(|event_id| Ok(Some(sample_event(event_id, EventStatus::Draft))));
    let req = TestRequest::post().uri("/orders").set_json(order_request(3, &[(1, 2)]));
    let (status, body) = send_request(req, configure(backend)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json(&body)["error"], "Not on sale: Event 'Afrobeats Live' is Draft");
}

#[actix_web::test]
async fn paid_orders_cannot_be_cancelled() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend.expect_fetch_order_by_code().returning(|code| Ok(Some(sample_order(code.as_str(), OrderStatusType::Paid))));
    backend.expect_cancel_order().times(1).returning(|_, _, _| {
        Err(TicketingError::OrderNotPending { code: "BXOK7M2Q9XZ".into(), status: OrderStatusType::Paid })
    });
    let req = TestRequest::post().uri("/orders/BXOK7M2Q9XZ/cancel").set_json(serde_json::json!({"reason": "Oops"}));
    let (status, body) = send_request(req, configure(backend)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json(&body)["error"], "Order BXOK7M2Q9XZ is Paid, not Pending");
}

#[actix_web::test]
async fn cancel_without_a_body_uses_the_default_reason() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend
        .expect_fetch_order_by_code()
        .returning(|code| Ok(Some(sample_order(code.as_str(), OrderStatusType::Pending))));
    backend
        .expect_cancel_order()
        .withf(|id, reason, _| *id == 41 && reason.to_string() == DEFAULT_CANCEL_REASON)
        .times(1)
        .returning(|_, reason, now| {
            let mut order = sample_order("BXOK7M2Q9XZ", OrderStatusType::Cancelled);
            order.cancel_reason = Some(reason.to_string());
            order.cancelled_at = Some(now);
            Ok(order)
        });
    let req = TestRequest::post().uri("/orders/BXOK7M2Q9XZ/cancel");
    let (status, body) = send_request(req, configure(backend)).await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["status"], "Cancelled");
    assert_eq!(body["cancel_reason"], DEFAULT_CANCEL_REASON);
}

fn configure(backend: MockBackend) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg: &mut ServiceConfig| {
        let policy = OrderPolicy::new(Duration::minutes(15), 10);
        let api = OrderFlowApi::new(backend, policy, EventProducers::default());
        cfg.service(CreateOrderRoute::<MockBackend>::new())
            .service(OrderSummaryRoute::<MockBackend>::new())
            .service(CancelOrderRoute::<MockBackend>::new())
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .app_data(web::Data::new(api));
    }
}

fn sample_event(id: i64, status: EventStatus) -> Event {
    let created_at = Utc.with_ymd_and_hms(2024, 10, 1, 9, 0, 0).unwrap();
    Event {
        id,
        name: "Afrobeats Live".into(),
        venue: Some("Eko Hotel".into()),
        starts_at: Utc.with_ymd_and_hms(2024, 12, 20, 19, 0, 0).unwrap(),
        status,
        created_at,
        updated_at: created_at,
    }
}

fn sample_order(code: &str, status: OrderStatusType) -> Order {
    let created_at = Utc.with_ymd_and_hms(2024, 10, 19, 13, 30, 0).unwrap();
    Order {
        id: 41,
        order_code: OrderCode::from(code),
        event_id: 3,
        buyer_name: "Ada Obi".into(),
        buyer_email: "ada.obi@example.com".into(),
        buyer_phone: None,
        status,
        total_price: Amount::from_major(200),
        currency: "NGN".into(),
        payment_reference: None,
        cancel_reason: None,
        created_at,
        expires_at: created_at + Duration::minutes(15),
        paid_at: (status == OrderStatusType::Paid).then_some(created_at + Duration::minutes(4)),
        cancelled_at: None,
        updated_at: created_at,
    }
}

fn sample_line(order_id: i64) -> OrderLine {
    OrderLine {
        id: 7,
        order_id,
        tier_id: 1,
        tier_name: "Regular".into(),
        quantity: 2,
        unit_price: Amount::from_major(100),
        currency: "NGN".into(),
    }
}
