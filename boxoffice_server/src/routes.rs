//! Request handler definitions
//!
//! Define each route and its handler here. Handlers are thin: they extract the request, call the engine API held in
//! the app data, and serialise the result. Engine errors become HTTP errors via [`ServerError`].
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests:
//! ```nocompile
//!     fn my_handler() -> impl Responder {
//!         std::thread::sleep(Duration::from_secs(5)); // <-- Bad practice! Will cause the current worker thread to
//! hang!
//!     }
//! ```
//! For this reason, any long, non-cpu-bound operation (e.g. I/O, database operations, etc.) should be expressed as
//! futures or asynchronous functions. Async handlers get executed concurrently by worker threads and thus don’t block
//! execution:
//!
//! ```nocompile
//!     async fn my_handler() -> impl Responder {
//!         tokio::time::sleep(Duration::from_secs(5)).await; // <-- Ok. Worker thread will handle other requests here
//!     }
//! ```
use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use boxoffice_engine::{
    db_types::{OrderCode, TicketId},
    order_objects::OrderRequest,
    redemption_objects::{StartSessionRequest, ValidationRequest},
    traits::{
        CatalogManagement,
        InventoryManagement,
        OrderManagement,
        PaymentGateway,
        PaymentManagement,
        ScanManagement,
        TicketManagement,
    },
    OrderFlowApi,
    PaymentReconciler,
    RedemptionValidator,
};
use chrono::Utc;
use log::*;

use crate::{
    data_objects::{CancelOrderRequest, InitiatePaymentRequest},
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >(
            $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+
        );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! {
        impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory
            for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

/// What the order routes need from a backend.
pub trait OrderBackend:
    CatalogManagement + InventoryManagement + OrderManagement + PaymentManagement + TicketManagement {
}

impl<T> OrderBackend for T where
    T: CatalogManagement + InventoryManagement + OrderManagement + PaymentManagement + TicketManagement
{
}

/// What the payment routes need from a backend.
pub trait PaymentBackend: OrderManagement + PaymentManagement + TicketManagement {}

impl<T> PaymentBackend for T where T: OrderManagement + PaymentManagement + TicketManagement {}

/// What the scanner routes need from a backend.
pub trait ScanBackend: CatalogManagement + ScanManagement + TicketManagement {}

impl<T> ScanBackend for T where T: CatalogManagement + ScanManagement + TicketManagement {}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(create_order => Post "/orders" impl OrderBackend);
/// Places an order.
///
/// The body is an [`OrderRequest`]: the event, the buyer, and one line per ticket tier. On success every line is held
/// for the order's hold window and the response (201) carries the order, its lines and the holds. Nothing is held if
/// any line cannot be filled.
pub async fn create_order<B: OrderBackend>(
    body: web::Json<OrderRequest>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let request = body.into_inner();
    debug!("💻️ Order request for event #{} from {}", request.event_id, request.buyer.email);
    let created = api.create_order(request, Utc::now()).await.map_err(|e| {
        debug!("💻️ Could not create order. {e}");
        e
    })?;
    Ok(HttpResponse::Created().json(created))
}

route!(order_summary => Get "/orders/{code}" impl OrderBackend);
/// The order with its lines, payments and (once paid) tickets.
pub async fn order_summary<B: OrderBackend>(
    path: web::Path<String>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let code = OrderCode::from(path.into_inner());
    trace!("💻️ GET order {code}");
    let summary = api.order_summary(&code).await?;
    Ok(HttpResponse::Ok().json(summary))
}

route!(cancel_order => Post "/orders/{code}/cancel" impl OrderBackend);
/// Cancels a pending order and releases its tickets. The body (optional) may give a `reason`.
///
/// Paid, expired or already cancelled orders are left alone and the request fails with 422.
pub async fn cancel_order<B: OrderBackend>(
    path: web::Path<String>,
    body: Option<web::Json<CancelOrderRequest>>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let code = OrderCode::from(path.into_inner());
    let request = body.map(web::Json::into_inner).unwrap_or_default();
    info!("💻️ Cancel request for order {code}. Reason: {}", request.reason());
    let order = api.cancel_order(&code, request.reason(), Utc::now()).await.map_err(|e| {
        debug!("💻️ Could not cancel order {code}. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(order))
}

//----------------------------------------------   Payments  ----------------------------------------------------
route!(initiate_payment => Post "/orders/{code}/payments" impl PaymentBackend, PaymentGateway);
/// Starts a payment for the order with the provider named in the body.
///
/// The response (201) carries the payment record and where to send the buyer. The order must still be pending and
/// inside its hold window.
pub async fn initiate_payment<B: PaymentBackend, G: PaymentGateway>(
    path: web::Path<String>,
    body: web::Json<InitiatePaymentRequest>,
    api: web::Data<PaymentReconciler<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let code = OrderCode::from(path.into_inner());
    let provider = body.into_inner().provider;
    debug!("💻️ Payment request for order {code} with {provider}");
    let handle = api.initiate_payment(&code, &provider, Utc::now()).await.map_err(|e| {
        debug!("💻️ Could not start a payment for order {code}. {e}");
        e
    })?;
    Ok(HttpResponse::Created().json(handle))
}

route!(payment => Get "/payments/{id}" impl PaymentBackend, PaymentGateway);
pub async fn payment<B: PaymentBackend, G: PaymentGateway>(
    path: web::Path<i64>,
    api: web::Data<PaymentReconciler<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let payment = api.fetch_payment(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(payment))
}

route!(verify_payment => Post "/payments/{id}/verify" impl PaymentBackend, PaymentGateway);
/// Asks the provider for the payment's status and applies it.
///
/// Safe to call any number of times: a completed payment reports its tickets without contacting the provider again,
/// and tickets are only ever issued once.
pub async fn verify_payment<B: PaymentBackend, G: PaymentGateway>(
    path: web::Path<i64>,
    api: web::Data<PaymentReconciler<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let payment_id = path.into_inner();
    debug!("💻️ Verify request for payment #{payment_id}");
    let outcome = api.verify_payment(payment_id, Utc::now()).await.map_err(|e| {
        debug!("💻️ Could not verify payment #{payment_id}. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(outcome))
}

route!(payment_webhook => Post "/webhooks/{provider}" impl PaymentBackend, PaymentGateway);
/// Receives a provider webhook.
///
/// The raw body is handed to the provider adapter along with the `x-{provider}-signature` header, so the signature is
/// checked against exactly the bytes the provider sent. A success notification converges on the same verification as
/// `POST /payments/{id}/verify`.
pub async fn payment_webhook<B: PaymentBackend, G: PaymentGateway>(
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Bytes,
    api: web::Data<PaymentReconciler<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let provider = path.into_inner();
    let header = signature_header(&provider);
    let signature = req.headers().get(header.as_str()).and_then(|v| v.to_str().ok());
    trace!("💻️ Webhook from {provider} ({} bytes, signed: {})", body.len(), signature.is_some());
    let outcome = api.handle_webhook(&provider, &body, signature, Utc::now()).await.map_err(|e| {
        warn!("💻️ Webhook from {provider} was not processed. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(outcome))
}

/// The header a provider puts its webhook signature in.
pub fn signature_header(provider: &str) -> String {
    format!("x-{}-signature", provider.to_ascii_lowercase())
}

//----------------------------------------------   Scanning  ----------------------------------------------------
route!(start_session => Post "/scan_sessions" impl ScanBackend);
/// Opens a scan session for a scanner at an event. Any session the scanner still has open is closed.
pub async fn start_session<B: ScanBackend>(
    body: web::Json<StartSessionRequest>,
    api: web::Data<RedemptionValidator<B>>,
) -> Result<HttpResponse, ServerError> {
    let StartSessionRequest { scanner_id, event_id } = body.into_inner();
    debug!("💻️ Scanner {scanner_id} is starting a session for event #{event_id}");
    let session = api.start_session(&scanner_id, event_id, Utc::now()).await?;
    Ok(HttpResponse::Created().json(session))
}

route!(scan_session => Get "/scan_sessions/{id}" impl ScanBackend);
pub async fn scan_session<B: ScanBackend>(
    path: web::Path<i64>,
    api: web::Data<RedemptionValidator<B>>,
) -> Result<HttpResponse, ServerError> {
    let session = api.fetch_session(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(session))
}

route!(end_session => Post "/scan_sessions/{id}/end" impl ScanBackend);
pub async fn end_session<B: ScanBackend>(
    path: web::Path<i64>,
    api: web::Data<RedemptionValidator<B>>,
) -> Result<HttpResponse, ServerError> {
    let session = api.end_session(path.into_inner(), Utc::now()).await?;
    Ok(HttpResponse::Ok().json(session))
}

route!(validate_ticket => Post "/scan_sessions/{id}/validate" impl ScanBackend);
/// Checks a scanned code and admits its holder at most once.
///
/// Every well-formed scan against an active session gets a 200 with a definite answer: `valid`, `already_validated`,
/// or neither (with the reason in `outcome` and `message`). Errors are reserved for sessions that are missing, closed
/// or for another event.
pub async fn validate_ticket<B: ScanBackend>(
    path: web::Path<i64>,
    body: web::Json<ValidationRequest>,
    api: web::Data<RedemptionValidator<B>>,
) -> Result<HttpResponse, ServerError> {
    let session_id = path.into_inner();
    let response = api.validate(session_id, body.into_inner(), Utc::now()).await?;
    trace!("💻️ Session #{session_id} scan result: {}", response.outcome);
    Ok(HttpResponse::Ok().json(response))
}

route!(session_validations => Get "/scan_sessions/{id}/validations" impl ScanBackend);
/// The validation ledger for a session, oldest first.
pub async fn session_validations<B: ScanBackend>(
    path: web::Path<i64>,
    api: web::Data<RedemptionValidator<B>>,
) -> Result<HttpResponse, ServerError> {
    let session = api.fetch_session(path.into_inner()).await?;
    let validations = api.db().fetch_validations_for_session(session.id).await?;
    Ok(HttpResponse::Ok().json(validations))
}

route!(ticket_validations => Get "/tickets/{id}/validations" impl ScanBackend);
/// Every scan of one ticket, oldest first.
pub async fn ticket_validations<B: ScanBackend>(
    path: web::Path<String>,
    api: web::Data<RedemptionValidator<B>>,
) -> Result<HttpResponse, ServerError> {
    let ticket_id = TicketId::from(path.into_inner());
    let validations = api.db().fetch_validations_for_ticket(&ticket_id).await?;
    Ok(HttpResponse::Ok().json(validations))
}
