use chrono::{DateTime, Utc};

use crate::{
    bxo_api::errors::TicketingError,
    db_types::{NewOrder, Order, OrderCode, OrderLine},
    traits::CreatedOrder,
};

#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    /// Writes the order, its lines and one hold per line in a single unit of work. If any line cannot be reserved,
    /// nothing is written and [`TicketingError::InsufficientInventory`] names the first tier that ran short.
    async fn create_order(&self, order: NewOrder) -> Result<CreatedOrder, TicketingError>;

    async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, TicketingError>;

    async fn fetch_order_by_code(&self, code: &OrderCode) -> Result<Option<Order>, TicketingError>;

    async fn fetch_order_lines(&self, order_id: i64) -> Result<Vec<OrderLine>, TicketingError>;

    /// `Pending → Cancelled`, releasing all active holds in the same unit of work.
    async fn cancel_order(&self, order_id: i64, reason: &str, now: DateTime<Utc>) -> Result<Order, TicketingError>;

    /// `Pending → Expired` if `now` is past the order's expiry, expiring all active holds in the same unit of work.
    async fn expire_order(&self, order_id: i64, now: DateTime<Utc>) -> Result<Order, TicketingError>;

    /// Pending orders whose hold window closed before `now`.
    async fn fetch_overdue_orders(&self, now: DateTime<Utc>) -> Result<Vec<Order>, TicketingError>;

    /// Records the reference of the latest payment attempt on the order.
    async fn set_payment_reference(&self, order_id: i64, reference: &str, now: DateTime<Utc>)
        -> Result<(), TicketingError>;
}
