use actix_web::{http::StatusCode, test, test::TestRequest, web, web::ServiceConfig, App};
use boxoffice_engine::{
    events::EventProducers,
    test_utils::{
        order_request,
        prepare_env::{drop_database, prepare_test_env, random_db_path},
        seed_event,
        test_issuer,
        test_signer,
        FakeGateway,
        FAKE_PROVIDER,
        FAKE_SIGNATURE,
    },
    traits::ProviderStatus,
    OrderFlowApi,
    OrderPolicy,
    PaymentReconciler,
    RedemptionValidator,
    SqliteDatabase,
};
use chrono::Duration;
use serde_json::json as body;

use super::helpers::{call, json};
use crate::{
    errors::json_error_handler,
    routes::{
        signature_header,
        CreateOrderRoute,
        EndSessionRoute,
        InitiatePaymentRoute,
        OrderSummaryRoute,
        PaymentRoute,
        PaymentWebhookRoute,
        ScanSessionRoute,
        SessionValidationsRoute,
        StartSessionRoute,
        TicketValidationsRoute,
        ValidateTicketRoute,
        VerifyPaymentRoute,
    },
};

fn configure(db: SqliteDatabase, gateway: FakeGateway) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg: &mut ServiceConfig| {
        let policy = OrderPolicy::new(Duration::minutes(15), 10);
        let orders_api = OrderFlowApi::new(db.clone(), policy, EventProducers::default());
        let payments_api = PaymentReconciler::new(db.clone(), gateway, test_issuer(), EventProducers::default());
        let scan_api = RedemptionValidator::new(db, test_signer());
        cfg.app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(payments_api))
            .app_data(web::Data::new(scan_api))
            .service(CreateOrderRoute::<SqliteDatabase>::new())
            .service(OrderSummaryRoute::<SqliteDatabase>::new())
            .service(InitiatePaymentRoute::<SqliteDatabase, FakeGateway>::new())
            .service(PaymentRoute::<SqliteDatabase, FakeGateway>::new())
            .service(VerifyPaymentRoute::<SqliteDatabase, FakeGateway>::new())
            .service(PaymentWebhookRoute::<SqliteDatabase, FakeGateway>::new())
            .service(StartSessionRoute::<SqliteDatabase>::new())
            .service(ScanSessionRoute::<SqliteDatabase>::new())
            .service(EndSessionRoute::<SqliteDatabase>::new())
            .service(ValidateTicketRoute::<SqliteDatabase>::new())
            .service(SessionValidationsRoute::<SqliteDatabase>::new())
            .service(TicketValidationsRoute::<SqliteDatabase>::new());
    }
}

async fn setup() -> (String, SqliteDatabase) {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error connecting to the test database");
    (url, db)
}

#[actix_web::test]
async fn order_to_admission() {
    let (url, db) = setup().await;
    let (event, tiers) = seed_event(&db, &[("Regular", 100, 50), ("VIP", 250, 5)]).await;
    let gateway = FakeGateway::new();
    let service = test::init_service(App::new().configure(configure(db.clone(), gateway.clone()))).await;

    // Place the order
    let req = TestRequest::post().uri("/orders").set_json(order_request(event.id, &[(tiers[0].id, 2)]));
    let (status, created) = call(&service, req).await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    let created = json(&created);
    let code = created["order"]["order_code"].as_str().unwrap().to_string();
    assert_eq!(created["order"]["status"], "Pending");
    assert_eq!(created["holds"].as_array().unwrap().len(), 1);

    // Start paying
    let req = TestRequest::post().uri(&format!("/orders/{code}/payments")).set_json(body!({ "provider": "fake" }));
    let (status, handle) = call(&service, req).await;
    assert_eq!(status, StatusCode::CREATED, "{handle}");
    let handle = json(&handle);
    let payment_id = handle["payment"]["id"].as_i64().unwrap();
    let reference = handle["payment"]["reference"].as_str().unwrap().to_string();
    assert!(handle["redirect_url"].as_str().unwrap().ends_with(&reference));
    assert_eq!(gateway.initiate_calls(), 1);

    // Nothing settled yet
    let req = TestRequest::post().uri(&format!("/payments/{payment_id}/verify"));
    let (status, outcome) = call(&service, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&outcome)["status"], "pending");

    // The provider settles and tells us
    gateway.set_status(&reference, ProviderStatus::Completed);
    let req = TestRequest::post()
        .uri(&format!("/webhooks/{FAKE_PROVIDER}"))
        .insert_header((signature_header(FAKE_PROVIDER), FAKE_SIGNATURE))
        .set_payload(FakeGateway::webhook_body("charge.success", &reference));
    let (status, webhook) = call(&service, req).await;
    assert_eq!(status, StatusCode::OK, "{webhook}");
    let webhook = json(&webhook);
    assert_eq!(webhook["verification"]["status"], "completed");
    assert_eq!(webhook["verification"]["first_completion"], true);
    assert_eq!(webhook["verification"]["tickets"].as_array().unwrap().len(), 2);

    // A second verification reports the same tickets without asking the provider again
    let calls = gateway.verify_calls();
    let req = TestRequest::post().uri(&format!("/payments/{payment_id}/verify"));
    let (status, outcome) = call(&service, req).await;
    assert_eq!(status, StatusCode::OK);
    let outcome = json(&outcome);
    assert_eq!(outcome["status"], "completed");
    assert_eq!(outcome["first_completion"], false);
    assert_eq!(outcome["tickets"].as_array().unwrap().len(), 2);
    assert_eq!(gateway.verify_calls(), calls);

    let (status, summary) = call(&service, TestRequest::get().uri(&format!("/orders/{code}"))).await;
    assert_eq!(status, StatusCode::OK);
    let summary = json(&summary);
    assert_eq!(summary["order"]["status"], "Paid");
    assert_eq!(summary["payments"][0]["status"], "Completed");
    let tickets = summary["tickets"].as_array().unwrap().clone();
    assert_eq!(tickets.len(), 2);
    let ticket_id = tickets[0]["id"].as_str().unwrap().to_string();
    let redemption_code = tickets[0]["redemption_code"].as_str().unwrap().to_string();

    // At the door
    let req =
        TestRequest::post().uri("/scan_sessions").set_json(body!({ "scanner_id": "gate-1", "event_id": event.id }));
    let (status, session) = call(&service, req).await;
    assert_eq!(status, StatusCode::CREATED, "{session}");
    let session_id = json(&session)["id"].as_i64().unwrap();

    let scan = body!({ "event_id": event.id, "code": redemption_code });
    let req = TestRequest::post().uri(&format!("/scan_sessions/{session_id}/validate")).set_json(&scan);
    let (status, first) = call(&service, req).await;
    assert_eq!(status, StatusCode::OK);
    let first = json(&first);
    assert_eq!(first["valid"], true);
    assert_eq!(first["outcome"], "valid");

    let req = TestRequest::post().uri(&format!("/scan_sessions/{session_id}/validate")).set_json(&scan);
    let (status, second) = call(&service, req).await;
    assert_eq!(status, StatusCode::OK);
    let second = json(&second);
    assert_eq!(second["valid"], false);
    assert_eq!(second["already_validated"], true);
    assert_eq!(second["outcome"], "already_redeemed");

    let req = TestRequest::post()
        .uri(&format!("/scan_sessions/{session_id}/validate"))
        .set_json(body!({ "event_id": event.id, "code": "not-a-ticket" }));
    let (status, garbage) = call(&service, req).await;
    assert_eq!(status, StatusCode::OK);
    let garbage = json(&garbage);
    assert_eq!(garbage["valid"], false);
    assert_eq!(garbage["already_validated"], false);

    let (status, session) = call(&service, TestRequest::get().uri(&format!("/scan_sessions/{session_id}"))).await;
    assert_eq!(status, StatusCode::OK);
    let session = json(&session);
    assert_eq!(session["total_scans"], 3);
    assert_eq!(session["valid_scans"], 1);
    assert_eq!(session["invalid_scans"], 2);

    let req = TestRequest::get().uri(&format!("/scan_sessions/{session_id}/validations"));
    let (status, ledger) = call(&service, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&ledger).as_array().unwrap().len(), 3);

    let req = TestRequest::get().uri(&format!("/tickets/{ticket_id}/validations"));
    let (status, ledger) = call(&service, req).await;
    assert_eq!(status, StatusCode::OK);
    let ledger = json(&ledger);
    assert_eq!(ledger.as_array().unwrap().len(), 2);
    assert_eq!(ledger[0]["outcome"], "valid");
    assert_eq!(ledger[1]["outcome"], "already_redeemed");

    // Closed sessions refuse further scans
    let (status, _) = call(&service, TestRequest::post().uri(&format!("/scan_sessions/{session_id}/end"))).await;
    assert_eq!(status, StatusCode::OK);
    let req = TestRequest::post().uri(&format!("/scan_sessions/{session_id}/validate")).set_json(&scan);
    let (status, _) = call(&service, req).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    db.close().await;
    drop_database(&url).await;
}

#[actix_web::test]
async fn forged_webhooks_are_rejected() {
    let (url, db) = setup().await;
    let (event, tiers) = seed_event(&db, &[("Regular", 100, 50)]).await;
    let gateway = FakeGateway::new();
    let service = test::init_service(App::new().configure(configure(db.clone(), gateway.clone()))).await;

    let req = TestRequest::post().uri("/orders").set_json(order_request(event.id, &[(tiers[0].id, 1)]));
    let (status, created) = call(&service, req).await;
    assert_eq!(status, StatusCode::CREATED);
    let code = json(&created)["order"]["order_code"].as_str().unwrap().to_string();
    let req = TestRequest::post().uri(&format!("/orders/{code}/payments")).set_json(body!({ "provider": "fake" }));
    let (status, handle) = call(&service, req).await;
    assert_eq!(status, StatusCode::CREATED);
    let reference = json(&handle)["payment"]["reference"].as_str().unwrap().to_string();
    gateway.set_status(&reference, ProviderStatus::Completed);

    let req = TestRequest::post()
        .uri(&format!("/webhooks/{FAKE_PROVIDER}"))
        .insert_header((signature_header(FAKE_PROVIDER), "definitely-real"))
        .set_payload(FakeGateway::webhook_body("charge.success", &reference));
    let (status, body) = call(&service, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(gateway.verify_calls(), 0);

    let (_, summary) = call(&service, TestRequest::get().uri(&format!("/orders/{code}"))).await;
    let summary = json(&summary);
    assert_eq!(summary["order"]["status"], "Pending");
    assert!(summary["tickets"].as_array().unwrap().is_empty());

    let req = TestRequest::post().uri("/webhooks/stripe").set_payload("{}");
    let (status, _) = call(&service, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    db.close().await;
    drop_database(&url).await;
}

#[actix_web::test]
async fn oversold_tiers_are_refused() {
    let (url, db) = setup().await;
    let (event, tiers) = seed_event(&db, &[("VIP", 250, 3)]).await;
    let service = test::init_service(App::new().configure(configure(db.clone(), FakeGateway::new()))).await;

    let req = TestRequest::post().uri("/orders").set_json(order_request(event.id, &[(tiers[0].id, 2)]));
    let (status, _) = call(&service, req).await;
    assert_eq!(status, StatusCode::CREATED);
    let req = TestRequest::post().uri("/orders").set_json(order_request(event.id, &[(tiers[0].id, 2)]));
    let (status, body) = call(&service, req).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{body}");
    let req = TestRequest::post().uri("/orders").set_json(order_request(event.id, &[(tiers[0].id, 1)]));
    let (status, _) = call(&service, req).await;
    assert_eq!(status, StatusCode::CREATED);

    let req = TestRequest::post().uri("/orders/BXONOSUCHONE/payments").set_json(body!({ "provider": "fake" }));
    let (status, _) = call(&service, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    db.close().await;
    drop_database(&url).await;
}
