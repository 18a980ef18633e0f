//! Records stored by the box office backend, and the closed status enumerations that govern their life cycles.
//!
//! Every status type implements [`Lifecycle`], which is the single source of truth for which transitions are legal.
//! The storage layer refuses to even attempt an illegal transition (see `ConditionalUpdate::transition`), so the only
//! way a transition can fail at write time is by losing a race.
use std::{fmt::Display, str::FromStr};

use boxoffice_common::Amount;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid {kind}: {value}")]
pub struct ConversionError {
    kind: &'static str,
    value: String,
}

impl ConversionError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self { kind, value: value.to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Illegal {kind} transition: {from} → {to}")]
pub struct IllegalTransition {
    pub kind: &'static str,
    pub from: String,
    pub to: String,
}

/// A closed state machine over a status column.
pub trait Lifecycle: Copy + Display + PartialEq {
    const KIND: &'static str;

    fn can_become(&self, next: Self) -> bool;

    fn is_terminal(&self) -> bool;

    /// Returns `next` if the transition is legal.
    fn transition(self, next: Self) -> Result<Self, IllegalTransition> {
        if self.can_become(next) {
            Ok(next)
        } else {
            Err(IllegalTransition { kind: Self::KIND, from: self.to_string(), to: next.to_string() })
        }
    }
}

macro_rules! status_strings {
    ($name:ident, $kind:literal, $($variant:ident),+) => {
        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => f.write_str(stringify!($variant)),)+
                }
            }
        }

        impl FromStr for $name {
            type Err = ConversionError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $(stringify!($variant) => Ok(Self::$variant),)+
                    s => Err(ConversionError::new($kind, s)),
                }
            }
        }
    };
}

//--------------------------------------     OrderCode       ---------------------------------------------------------
/// The human-readable order reference shown to buyers, e.g. `BXO7KQ2M9PA`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderCode(pub String);

impl OrderCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for OrderCode {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderCode {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

//--------------------------------------      TicketId       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct TicketId(pub String);

impl TicketId {
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for TicketId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for TicketId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

//--------------------------------------     EventStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum EventStatus {
    Draft,
    Published,
    Cancelled,
}

status_strings!(EventStatus, "event status", Draft, Published, Cancelled);

//--------------------------------------        Event        ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub name: String,
    pub venue: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub status: EventStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewEvent {
    pub name: String,
    pub venue: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub status: EventStatus,
}

impl NewEvent {
    pub fn new<S: Into<String>>(name: S, starts_at: DateTime<Utc>) -> Self {
        Self { name: name.into(), venue: None, starts_at, status: EventStatus::Published }
    }

    pub fn with_venue<S: Into<String>>(mut self, venue: S) -> Self {
        self.venue = Some(venue.into());
        self
    }

    pub fn with_status(mut self, status: EventStatus) -> Self {
        self.status = status;
        self
    }
}

//--------------------------------------     TicketTier      ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TicketTier {
    pub id: i64,
    pub event_id: i64,
    pub name: String,
    pub price: Amount,
    pub currency: String,
    pub quota: i64,
    /// Units under an active hold
    pub held: i64,
    /// Units consumed by paid orders
    pub sold: i64,
    /// Overrides the configured hold window for orders that include this tier.
    pub hold_minutes: Option<i64>,
    pub sales_start: Option<DateTime<Utc>>,
    pub sales_end: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TicketTier {
    pub fn available(&self) -> i64 {
        self.quota - self.held - self.sold
    }

    pub fn is_on_sale(&self, now: DateTime<Utc>) -> bool {
        self.is_active &&
            self.sales_start.map(|t| t <= now).unwrap_or(true) &&
            self.sales_end.map(|t| now < t).unwrap_or(true)
    }
}

#[derive(Debug, Clone)]
pub struct NewTicketTier {
    pub event_id: i64,
    pub name: String,
    pub price: Amount,
    pub currency: String,
    pub quota: i64,
    pub hold_minutes: Option<i64>,
    pub sales_start: Option<DateTime<Utc>>,
    pub sales_end: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl NewTicketTier {
    pub fn new<S: Into<String>>(event_id: i64, name: S, price: Amount, quota: i64) -> Self {
        Self {
            event_id,
            name: name.into(),
            price,
            currency: boxoffice_common::DEFAULT_CURRENCY_CODE.to_string(),
            quota,
            hold_minutes: None,
            sales_start: None,
            sales_end: None,
            is_active: true,
        }
    }

    pub fn with_currency<S: Into<String>>(mut self, currency: S) -> Self {
        self.currency = currency.into();
        self
    }

    pub fn with_hold_minutes(mut self, minutes: i64) -> Self {
        self.hold_minutes = Some(minutes);
        self
    }

    pub fn with_sales_window(mut self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        self.sales_start = start;
        self.sales_end = end;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

//--------------------------------------   OrderStatusType   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum OrderStatusType {
    /// Inventory is held and the order is waiting for payment.
    Pending,
    /// A payment completed and tickets were issued.
    Paid,
    /// Cancelled by the buyer or an operator before payment.
    Cancelled,
    /// The hold window passed without a payment.
    Expired,
}

status_strings!(OrderStatusType, "order status", Pending, Paid, Cancelled, Expired);

impl Lifecycle for OrderStatusType {
    const KIND: &'static str = "order";

    fn can_become(&self, next: Self) -> bool {
        use OrderStatusType::*;
        matches!((self, next), (Pending, Paid) | (Pending, Cancelled) | (Pending, Expired))
    }

    fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

//--------------------------------------        Order        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_code: OrderCode,
    pub event_id: i64,
    pub buyer_name: String,
    pub buyer_email: String,
    pub buyer_phone: Option<String>,
    pub status: OrderStatusType,
    pub total_price: Amount,
    pub currency: String,
    pub payment_reference: Option<String>,
    pub cancel_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// An order can take a payment while it is pending *and* its hold window is still open.
    pub fn can_be_paid(&self, now: DateTime<Utc>) -> bool {
        self.status == OrderStatusType::Pending && now <= self.expires_at
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == OrderStatusType::Pending && now > self.expires_at
    }
}

/// A fully validated order, ready to be written along with its lines and holds.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_code: OrderCode,
    pub event_id: i64,
    pub buyer_name: String,
    pub buyer_email: String,
    pub buyer_phone: Option<String>,
    pub total_price: Amount,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub lines: Vec<NewOrderLine>,
}

//--------------------------------------      OrderLine      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: i64,
    pub order_id: i64,
    pub tier_id: i64,
    pub tier_name: String,
    pub quantity: i64,
    /// The tier price at the time the order was created
    pub unit_price: Amount,
    pub currency: String,
}

impl OrderLine {
    pub fn line_total(&self) -> Amount {
        self.unit_price * self.quantity
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderLine {
    pub tier_id: i64,
    pub quantity: i64,
    pub unit_price: Amount,
    pub currency: String,
}

//--------------------------------------     HoldStatus      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum HoldStatus {
    Active,
    Confirmed,
    Released,
    Expired,
}

status_strings!(HoldStatus, "hold status", Active, Confirmed, Released, Expired);

impl Lifecycle for HoldStatus {
    const KIND: &'static str = "hold";

    fn can_become(&self, next: Self) -> bool {
        use HoldStatus::*;
        matches!((self, next), (Active, Confirmed) | (Active, Released) | (Active, Expired))
    }

    fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }
}

//--------------------------------------    InventoryHold    ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct InventoryHold {
    pub id: i64,
    pub order_id: i64,
    pub order_line_id: i64,
    pub tier_id: i64,
    pub quantity: i64,
    pub status: HoldStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewHold {
    pub order_id: i64,
    pub order_line_id: i64,
    pub tier_id: i64,
    pub quantity: i64,
    pub expires_at: DateTime<Utc>,
}

//--------------------------------------    PaymentStatus    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

status_strings!(PaymentStatus, "payment status", Pending, Completed, Failed);

impl Lifecycle for PaymentStatus {
    const KIND: &'static str = "payment";

    fn can_become(&self, next: Self) -> bool {
        use PaymentStatus::*;
        matches!((self, next), (Pending, Completed) | (Pending, Failed))
    }

    fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

//--------------------------------------       Payment       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub order_id: i64,
    pub provider: String,
    pub amount: Amount,
    pub currency: String,
    pub status: PaymentStatus,
    /// The transaction reference shared with the provider
    pub reference: String,
    pub authorization_url: Option<String>,
    /// The last raw payload received from the provider, kept for auditing.
    pub provider_response: Option<String>,
    pub webhook_received_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub order_id: i64,
    pub provider: String,
    pub amount: Amount,
    pub currency: String,
    pub reference: String,
    pub authorization_url: Option<String>,
    pub provider_response: Option<String>,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------    TicketStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum TicketStatus {
    Active,
    Redeemed,
    Voided,
}

status_strings!(TicketStatus, "ticket status", Active, Redeemed, Voided);

impl Lifecycle for TicketStatus {
    const KIND: &'static str = "ticket";

    fn can_become(&self, next: Self) -> bool {
        use TicketStatus::*;
        matches!((self, next), (Active, Redeemed) | (Active, Voided))
    }

    fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }
}

//--------------------------------------       Ticket        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub order_id: i64,
    pub order_line_id: i64,
    pub event_id: i64,
    pub tier_id: i64,
    pub serial_number: String,
    pub redemption_code: String,
    pub status: TicketStatus,
    pub issued_at: DateTime<Utc>,
    pub redeemed_at: Option<DateTime<Utc>>,
    /// The scanner that redeemed the ticket
    pub redeemed_by: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTicket {
    pub id: TicketId,
    pub order_id: i64,
    pub order_line_id: i64,
    pub event_id: i64,
    pub tier_id: i64,
    pub serial_number: String,
    pub redemption_code: String,
    pub issued_at: DateTime<Utc>,
}

//--------------------------------------    SessionStatus    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum SessionStatus {
    Active,
    Closed,
}

status_strings!(SessionStatus, "session status", Active, Closed);

impl Lifecycle for SessionStatus {
    const KIND: &'static str = "scan session";

    fn can_become(&self, next: Self) -> bool {
        matches!((self, next), (Self::Active, Self::Closed))
    }

    fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

//--------------------------------------     ScanSession     ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct ScanSession {
    pub id: i64,
    pub scanner_id: String,
    pub event_id: i64,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub total_scans: i64,
    pub valid_scans: i64,
    pub invalid_scans: i64,
}

impl ScanSession {
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }
}

//--------------------------------------  ValidationOutcome  ---------------------------------------------------------
/// The recorded result of a single redemption attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ValidationOutcome {
    Valid,
    AlreadyRedeemed,
    InvalidSignature,
    MalformedClaims,
    CodeExpired,
    WrongEvent,
    NotFound,
    Voided,
    InvalidStatus,
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::AlreadyRedeemed => "already_redeemed",
            Self::InvalidSignature => "invalid_signature",
            Self::MalformedClaims => "malformed_claims",
            Self::CodeExpired => "code_expired",
            Self::WrongEvent => "wrong_event",
            Self::NotFound => "not_found",
            Self::Voided => "voided",
            Self::InvalidStatus => "invalid_status",
        }
    }
}

impl Display for ValidationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

//--------------------------------------  TicketValidation   ---------------------------------------------------------
/// One row of the append-only redemption ledger.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct TicketValidation {
    pub id: i64,
    /// `None` when the scanned code could not be tied to a ticket
    pub ticket_id: Option<TicketId>,
    pub scanner_id: String,
    pub session_id: i64,
    pub outcome: ValidationOutcome,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewValidation {
    pub ticket_id: Option<TicketId>,
    pub scanner_id: String,
    pub session_id: i64,
    pub outcome: ValidationOutcome,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}
