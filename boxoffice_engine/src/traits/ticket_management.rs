use crate::{
    bxo_api::errors::TicketingError,
    db_types::{Ticket, TicketId},
};

#[allow(async_fn_in_trait)]
pub trait TicketManagement {
    async fn fetch_ticket(&self, ticket_id: &TicketId) -> Result<Option<Ticket>, TicketingError>;

    async fn fetch_tickets_for_order(&self, order_id: i64) -> Result<Vec<Ticket>, TicketingError>;
}
