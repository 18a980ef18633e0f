use chrono::{DateTime, Utc};
use log::*;
use sqlx::SqliteConnection;

use super::ConditionalUpdate;
use crate::{
    bxo_api::errors::TicketingError,
    db_types::{NewValidation, ScanSession, SessionStatus, TicketId, TicketValidation},
};

/// Closes whatever session the scanner still has open. Returns the number of sessions closed.
pub async fn close_sessions_for_scanner(
    scanner_id: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<u64, TicketingError> {
    let result = sqlx::query(
        "UPDATE scan_sessions SET status = $1, ended_at = $2 WHERE scanner_id = $3 AND status = $4",
    )
    .bind(SessionStatus::Closed)
    .bind(now)
    .bind(scanner_id)
    .bind(SessionStatus::Active)
    .execute(conn)
    .await?;
    if result.rows_affected() > 0 {
        debug!("🗃️ Closed {} stale scan session(s) for scanner {scanner_id}", result.rows_affected());
    }
    Ok(result.rows_affected())
}

pub async fn insert_session(
    scanner_id: &str,
    event_id: i64,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<ScanSession, TicketingError> {
    let session = sqlx::query_as(
        r#"
            INSERT INTO scan_sessions (scanner_id, event_id, status, started_at)
            VALUES ($1, $2, $3, $4)
            RETURNING *;
        "#,
    )
    .bind(scanner_id)
    .bind(event_id)
    .bind(SessionStatus::Active)
    .bind(now)
    .fetch_one(conn)
    .await?;
    Ok(session)
}

pub async fn close_session(
    session_id: i64,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<ScanSession>, TicketingError> {
    let session = ConditionalUpdate::transition("scan_sessions", SessionStatus::Active, SessionStatus::Closed)?
        .set("ended_at", now)
        .where_id(session_id)
        .fetch_one(conn)
        .await?;
    Ok(session)
}

pub async fn fetch_session(
    session_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<ScanSession>, TicketingError> {
    let session =
        sqlx::query_as("SELECT * FROM scan_sessions WHERE id = $1").bind(session_id).fetch_optional(conn).await?;
    Ok(session)
}

pub async fn insert_validation(
    validation: NewValidation,
    conn: &mut SqliteConnection,
) -> Result<TicketValidation, TicketingError> {
    let validation = sqlx::query_as(
        r#"
            INSERT INTO ticket_validations (ticket_id, scanner_id, session_id, outcome, notes, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(validation.ticket_id)
    .bind(validation.scanner_id)
    .bind(validation.session_id)
    .bind(validation.outcome)
    .bind(validation.notes)
    .bind(validation.created_at)
    .fetch_one(conn)
    .await?;
    Ok(validation)
}

/// Counts one more scan against the session.
pub async fn tally_scan(session_id: i64, valid: bool, conn: &mut SqliteConnection) -> Result<(), TicketingError> {
    let (valid, invalid) = if valid { (1, 0) } else { (0, 1) };
    let updated = ConditionalUpdate::table("scan_sessions")
        .increment("total_scans", 1)
        .increment("valid_scans", valid)
        .increment("invalid_scans", invalid)
        .where_id(session_id)
        .execute(conn)
        .await?;
    if updated {
        Ok(())
    } else {
        Err(TicketingError::SessionNotFound(session_id))
    }
}

pub async fn fetch_validations_for_ticket(
    ticket_id: &TicketId,
    conn: &mut SqliteConnection,
) -> Result<Vec<TicketValidation>, TicketingError> {
    let validations = sqlx::query_as("SELECT * FROM ticket_validations WHERE ticket_id = $1 ORDER BY id")
        .bind(ticket_id.as_str())
        .fetch_all(conn)
        .await?;
    Ok(validations)
}

pub async fn fetch_validations_for_session(
    session_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<TicketValidation>, TicketingError> {
    let validations = sqlx::query_as("SELECT * FROM ticket_validations WHERE session_id = $1 ORDER BY id")
        .bind(session_id)
        .fetch_all(conn)
        .await?;
    Ok(validations)
}
