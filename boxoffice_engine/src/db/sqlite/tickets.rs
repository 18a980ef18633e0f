use chrono::{DateTime, Utc};
use log::*;
use sqlx::{QueryBuilder, SqliteConnection};

use super::ConditionalUpdate;
use crate::{
    bxo_api::errors::TicketingError,
    db_types::{NewTicket, Ticket, TicketId, TicketStatus},
};

/// Writes a batch of freshly issued tickets in one statement. A serial number that already exists fails the whole
/// batch with a unique violation.
pub async fn insert_batch(tickets: Vec<NewTicket>, conn: &mut SqliteConnection) -> Result<Vec<Ticket>, TicketingError> {
    if tickets.is_empty() {
        return Ok(Vec::new());
    }
    let mut builder = QueryBuilder::new(
        "INSERT INTO tickets (id, order_id, order_line_id, event_id, tier_id, serial_number, redemption_code, status, \
         issued_at, updated_at) ",
    );
    builder.push_values(tickets, |mut row, ticket| {
        row.push_bind(ticket.id)
            .push_bind(ticket.order_id)
            .push_bind(ticket.order_line_id)
            .push_bind(ticket.event_id)
            .push_bind(ticket.tier_id)
            .push_bind(ticket.serial_number)
            .push_bind(ticket.redemption_code)
            .push_bind(TicketStatus::Active)
            .push_bind(ticket.issued_at)
            .push_bind(ticket.issued_at);
    });
    builder.push(" RETURNING *");
    trace!("🗃️ Executing query: {}", builder.sql());
    let tickets = builder.build_query_as::<Ticket>().fetch_all(conn).await?;
    Ok(tickets)
}

pub async fn fetch_ticket(id: &TicketId, conn: &mut SqliteConnection) -> Result<Option<Ticket>, TicketingError> {
    let ticket = sqlx::query_as("SELECT * FROM tickets WHERE id = $1").bind(id.as_str()).fetch_optional(conn).await?;
    Ok(ticket)
}

pub async fn fetch_for_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Ticket>, TicketingError> {
    let tickets = sqlx::query_as("SELECT * FROM tickets WHERE order_id = $1 ORDER BY order_line_id, serial_number")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(tickets)
}

/// `Active → Redeemed`. Of any number of concurrent scans of the same ticket, exactly one sees `true`.
pub async fn redeem(
    id: &TicketId,
    scanner_id: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, TicketingError> {
    let redeemed = ConditionalUpdate::transition("tickets", TicketStatus::Active, TicketStatus::Redeemed)?
        .set("redeemed_at", now)
        .set("redeemed_by", scanner_id.to_string())
        .set("updated_at", now)
        .where_id(id.as_str().to_string())
        .execute(conn)
        .await?;
    Ok(redeemed)
}
