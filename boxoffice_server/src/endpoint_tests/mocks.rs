use boxoffice_engine::{
    db_types::{
        Event,
        InventoryHold,
        NewEvent,
        NewHold,
        NewOrder,
        NewPayment,
        NewTicketTier,
        Order,
        OrderCode,
        OrderLine,
        Payment,
        Ticket,
        TicketId,
        TicketTier,
    },
    traits::{
        CatalogManagement,
        CreatedOrder,
        InventoryManagement,
        OrderManagement,
        PaymentCompletion,
        PaymentManagement,
        TicketManagement,
    },
    TicketIssuer,
    TicketingError,
};
use chrono::{DateTime, Utc};
use mockall::mock;

mock! {
    pub Backend {}
    impl CatalogManagement for Backend {
        async fn insert_event(&self, event: NewEvent) -> Result<Event, TicketingError>;
        async fn fetch_event(&self, event_id: i64) -> Result<Option<Event>, TicketingError>;
        async fn insert_tier(&self, tier: NewTicketTier) -> Result<TicketTier, TicketingError>;
        async fn fetch_tier(&self, tier_id: i64) -> Result<Option<TicketTier>, TicketingError>;
        async fn fetch_tiers_for_event(&self, event_id: i64) -> Result<Vec<TicketTier>, TicketingError>;
    }
    impl InventoryManagement for Backend {
        async fn reserve(&self, hold: NewHold, now: DateTime<Utc>) -> Result<InventoryHold, TicketingError>;
        async fn release_hold(&self, hold_id: i64, now: DateTime<Utc>) -> Result<bool, TicketingError>;
        async fn confirm_hold(&self, hold_id: i64, now: DateTime<Utc>) -> Result<bool, TicketingError>;
        async fn expire_hold(&self, hold_id: i64, now: DateTime<Utc>) -> Result<bool, TicketingError>;
        async fn reap_expired_holds(
            &self,
            now: DateTime<Utc>,
            tier_id: Option<i64>,
        ) -> Result<Vec<InventoryHold>, TicketingError>;
        async fn fetch_hold(&self, hold_id: i64) -> Result<Option<InventoryHold>, TicketingError>;
        async fn fetch_holds_for_order(&self, order_id: i64) -> Result<Vec<InventoryHold>, TicketingError>;
    }
    impl OrderManagement for Backend {
        async fn create_order(&self, order: NewOrder) -> Result<CreatedOrder, TicketingError>;
        async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, TicketingError>;
        async fn fetch_order_by_code(&self, code: &OrderCode) -> Result<Option<Order>, TicketingError>;
        async fn fetch_order_lines(&self, order_id: i64) -> Result<Vec<OrderLine>, TicketingError>;
        async fn cancel_order(&self, order_id: i64, reason: &str, now: DateTime<Utc>) -> Result<Order, TicketingError>;
        async fn expire_order(&self, order_id: i64, now: DateTime<Utc>) -> Result<Order, TicketingError>;
        async fn fetch_overdue_orders(&self, now: DateTime<Utc>) -> Result<Vec<Order>, TicketingError>;
        async fn set_payment_reference(
            &self,
            order_id: i64,
            reference: &str,
            now: DateTime<Utc>,
        ) -> Result<(), TicketingError>;
    }
    impl PaymentManagement for Backend {
        async fn insert_payment(&self, payment: NewPayment) -> Result<Payment, TicketingError>;
        async fn fetch_payment(&self, payment_id: i64) -> Result<Option<Payment>, TicketingError>;
        async fn fetch_payment_by_reference(&self, reference: &str) -> Result<Option<Payment>, TicketingError>;
        async fn fetch_payments_for_order(&self, order_id: i64) -> Result<Vec<Payment>, TicketingError>;
        async fn record_provider_response(
            &self,
            payment_id: i64,
            response: &str,
            now: DateTime<Utc>,
        ) -> Result<(), TicketingError>;
        async fn mark_webhook_received(&self, payment_id: i64, now: DateTime<Utc>) -> Result<(), TicketingError>;
        async fn fail_payment(
            &self,
            payment_id: i64,
            response: &str,
            now: DateTime<Utc>,
        ) -> Result<bool, TicketingError>;
        async fn complete_payment(
            &self,
            payment_id: i64,
            response: &str,
            paid_at: DateTime<Utc>,
            issuer: &TicketIssuer,
        ) -> Result<PaymentCompletion, TicketingError>;
    }
    impl TicketManagement for Backend {
        async fn fetch_ticket(&self, ticket_id: &TicketId) -> Result<Option<Ticket>, TicketingError>;
        async fn fetch_tickets_for_order(&self, order_id: i64) -> Result<Vec<Ticket>, TicketingError>;
    }
}
