#![allow(dead_code)]
use std::time::Duration;

use boxoffice_engine::{
    db_types::{Event, Ticket, TicketTier},
    events::EventProducers,
    payment_objects::VerifyOutcome,
    test_utils::{
        order_request,
        prepare_env::{drop_database, prepare_test_env, random_db_path},
        seed_event,
        test_issuer,
        test_signer,
        FakeGateway,
        FAKE_PROVIDER,
    },
    traits::{CreatedOrder, ProviderStatus},
    InventoryApi,
    OrderFlowApi,
    OrderPolicy,
    PaymentReconciler,
    RedemptionValidator,
    SqliteDatabase,
};
use chrono::{DateTime, Utc};

pub struct TestSystem {
    pub url: String,
    pub db: SqliteDatabase,
    pub gateway: FakeGateway,
    pub inventory: InventoryApi<SqliteDatabase>,
    pub orders: OrderFlowApi<SqliteDatabase>,
    pub payments: PaymentReconciler<SqliteDatabase, FakeGateway>,
    pub validator: RedemptionValidator<SqliteDatabase>,
}

impl TestSystem {
    pub async fn new() -> Self {
        Self::with_producers(EventProducers::default()).await
    }

    pub async fn with_producers(producers: EventProducers) -> Self {
        let url = random_db_path();
        prepare_test_env(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 10).await.expect("Error creating database");
        let gateway = FakeGateway::new();
        Self {
            inventory: InventoryApi::new(db.clone()),
            orders: OrderFlowApi::new(db.clone(), OrderPolicy::default(), producers.clone()),
            payments: PaymentReconciler::new(db.clone(), gateway.clone(), test_issuer(), producers)
                .with_provider_timeout(Duration::from_millis(250)),
            validator: RedemptionValidator::new(db.clone(), test_signer()),
            url,
            db,
            gateway,
        }
    }

    pub async fn seed(&self, tiers: &[(&str, i64, i64)]) -> (Event, Vec<TicketTier>) {
        seed_event(&self.db, tiers).await
    }

    pub async fn order(&self, event_id: i64, lines: &[(i64, i64)], now: DateTime<Utc>) -> CreatedOrder {
        self.orders.create_order(order_request(event_id, lines), now).await.expect("Error creating order")
    }

    /// Creates an order, starts a payment, and has the provider report success. Returns the order and its tickets.
    pub async fn paid_order(&self, event_id: i64, lines: &[(i64, i64)]) -> (CreatedOrder, Vec<Ticket>) {
        let now = Utc::now();
        let created = self.order(event_id, lines, now).await;
        let handle =
            self.payments.initiate_payment(&created.order.order_code, FAKE_PROVIDER, now).await.expect("initiate");
        self.gateway.set_status(&handle.payment.reference, ProviderStatus::Completed);
        let outcome = self.payments.verify_payment(handle.payment.id, now).await.expect("verify");
        let VerifyOutcome::Completed { tickets, .. } = outcome else {
            panic!("Payment did not complete: {outcome:?}");
        };
        (created, tickets)
    }

    pub async fn tear_down(self) {
        self.db.close().await;
        drop_database(&self.url).await;
    }
}
