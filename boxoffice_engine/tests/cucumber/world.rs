use std::{collections::HashMap, fmt::Debug};

use boxoffice_engine::{
    db_types::{Event, ScanSession, Ticket, TicketTier},
    events::EventProducers,
    redemption_objects::ValidationResponse,
    test_utils::{
        prepare_env::{create_database, random_db_path, run_migrations},
        test_issuer,
        test_signer,
        FakeGateway,
    },
    traits::CreatedOrder,
    OrderFlowApi,
    OrderPolicy,
    PaymentReconciler,
    RedemptionValidator,
    SqliteDatabase,
    TicketingError,
};
use chrono::{DateTime, Utc};
use cucumber::World;
use log::*;

#[derive(Default, Debug, World)]
pub struct BoxOfficeWorld {
    pub system: Option<BoxOfficeSystem>,
    /// The scenario clock. Steps that move time forward advance this rather than sleeping.
    pub now: DateTime<Utc>,
    pub event: Option<Event>,
    pub tiers: HashMap<String, TicketTier>,
    pub orders: HashMap<String, CreatedOrder>,
    pub tickets: HashMap<String, Vec<Ticket>>,
    pub sessions: HashMap<String, ScanSession>,
    pub race: Vec<Result<CreatedOrder, TicketingError>>,
    pub last_scan: Option<ValidationResponse>,
}

pub struct BoxOfficeSystem {
    pub db_path: String,
    pub db: SqliteDatabase,
    pub gateway: FakeGateway,
    pub orders: OrderFlowApi<SqliteDatabase>,
    pub payments: PaymentReconciler<SqliteDatabase, FakeGateway>,
    pub validator: RedemptionValidator<SqliteDatabase>,
}

impl Debug for BoxOfficeSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BoxOfficeSystem({})", self.db_path)
    }
}

impl BoxOfficeWorld {
    pub fn system(&self) -> &BoxOfficeSystem {
        self.system.as_ref().expect("System not initialised. Start the scenario with 'Given a fresh install'")
    }

    pub fn tier(&self, name: &str) -> &TicketTier {
        self.tiers.get(name).unwrap_or_else(|| panic!("No tier named '{name}'"))
    }

    pub fn order_for(&self, buyer: &str) -> &CreatedOrder {
        self.orders.get(buyer).unwrap_or_else(|| panic!("'{buyer}' has not placed an order"))
    }
}

impl BoxOfficeSystem {
    pub async fn new() -> Self {
        let url = prepare_test_env().await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database");
        debug!("Created database: {url}");
        let gateway = FakeGateway::new();
        let producers = EventProducers::default();
        Self {
            orders: OrderFlowApi::new(db.clone(), OrderPolicy::default(), producers.clone()),
            payments: PaymentReconciler::new(db.clone(), gateway.clone(), test_issuer(), producers),
            validator: RedemptionValidator::new(db.clone(), test_signer()),
            db_path: url,
            db,
            gateway,
        }
    }
}

pub async fn prepare_test_env() -> String {
    let path = random_db_path();
    create_database(&path).await;
    run_migrations(&path).await;
    path
}
