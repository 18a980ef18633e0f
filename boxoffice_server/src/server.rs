use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use boxoffice_engine::{events::EventProducers, OrderFlowApi, PaymentReconciler, RedemptionValidator, SqliteDatabase};

use crate::{
    config::ServerConfig,
    errors::{json_error_handler, ServerError},
    expiry_worker::start_expiry_worker,
    integrations::{notifications::create_event_handlers, PaymentProviders},
    routes::{
        health,
        CancelOrderRoute,
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

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(format!("Could not migrate the database. {e}")))?;
    let providers = PaymentProviders::from_config(&config)?;
    let handlers = create_event_handlers(&config)?;
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let sweeper = OrderFlowApi::new(db.clone(), config.order_policy(), producers.clone());
    let _worker = start_expiry_worker(sweeper, config.sweep_interval);
    let srv = create_server_instance(config, db, providers, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    providers: PaymentProviders,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let host = config.host.clone();
    let port = config.port;
    let srv = HttpServer::new(move || {
        let orders_api = OrderFlowApi::new(db.clone(), config.order_policy(), producers.clone());
        let payments_api =
            PaymentReconciler::new(db.clone(), providers.clone(), config.ticket_issuer(), producers.clone())
                .with_provider_timeout(config.provider_timeout);
        let scan_api = RedemptionValidator::new(db.clone(), config.code_signer());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("bxo::access_log"))
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(payments_api))
            .app_data(web::Data::new(scan_api))
            .service(health)
            .service(CreateOrderRoute::<SqliteDatabase>::new())
            .service(OrderSummaryRoute::<SqliteDatabase>::new())
            .service(CancelOrderRoute::<SqliteDatabase>::new())
            .service(InitiatePaymentRoute::<SqliteDatabase, PaymentProviders>::new())
            .service(PaymentRoute::<SqliteDatabase, PaymentProviders>::new())
            .service(VerifyPaymentRoute::<SqliteDatabase, PaymentProviders>::new())
            .service(PaymentWebhookRoute::<SqliteDatabase, PaymentProviders>::new())
            .service(StartSessionRoute::<SqliteDatabase>::new())
            .service(ScanSessionRoute::<SqliteDatabase>::new())
            .service(EndSessionRoute::<SqliteDatabase>::new())
            .service(ValidateTicketRoute::<SqliteDatabase>::new())
            .service(SessionValidationsRoute::<SqliteDatabase>::new())
            .service(TicketValidationsRoute::<SqliteDatabase>::new())
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    Ok(srv)
}
