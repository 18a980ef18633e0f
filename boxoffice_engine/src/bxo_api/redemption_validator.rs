//! Ticket validation at the venue.
//!
//! A scan is checked in a fixed order, stopping at the first failure:
//!
//! 1. The code's MAC and algorithm (`invalid_signature`).
//! 2. The decoded claims (`malformed_claims`), and the code's own expiry (`code_expired`).
//! 3. The request's and the code's event against the scan session's event (`wrong_event`).
//! 4. The ticket row (`not_found`).
//! 5. The ticket status (`already_redeemed`, `voided`, `invalid_status`).
//! 6. The `Active → Redeemed` compare-and-swap, written together with its ledger entry. Of any number of concurrent
//!    scans of one code, exactly one wins; the rest re-read the ticket and report `already_redeemed`.
//!
//! Every attempt, successful or not, is appended to the validation ledger and counted against the scan session.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;

use crate::{
    bxo_api::{
        errors::TicketingError,
        redemption_objects::{ValidationRequest, ValidationResponse},
    },
    db_types::{NewValidation, ScanSession, Ticket, TicketId, TicketStatus, ValidationOutcome},
    helpers::{CodeSigner, RedemptionClaims, RedemptionCodeError},
    traits::{CatalogManagement, ScanManagement, TicketManagement},
};

pub struct RedemptionValidator<B> {
    db: B,
    signer: CodeSigner,
}

impl<B> Debug for RedemptionValidator<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RedemptionValidator")
    }
}

impl<B> RedemptionValidator<B> {
    pub fn new(db: B, signer: CodeSigner) -> Self {
        Self { db, signer }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> RedemptionValidator<B>
where B: CatalogManagement + ScanManagement + TicketManagement
{
    /// Opens a scan session for the scanner at the event. Any session the scanner still had open is closed first.
    pub async fn start_session(
        &self,
        scanner_id: &str,
        event_id: i64,
        now: DateTime<Utc>,
    ) -> Result<ScanSession, TicketingError> {
        let scanner_id = scanner_id.trim();
        if scanner_id.is_empty() {
            return Err(TicketingError::ValidationError("A scanner id is required".into()));
        }
        self.db.fetch_event(event_id).await?.ok_or(TicketingError::EventNotFound(event_id))?;
        let session = self.db.start_session(scanner_id, event_id, now).await?;
        info!("🎟️ Scanner {scanner_id} opened session #{} for event #{event_id}", session.id);
        Ok(session)
    }

    /// Closes the session. Ending a session that is already closed returns it unchanged.
    pub async fn end_session(&self, session_id: i64, now: DateTime<Utc>) -> Result<ScanSession, TicketingError> {
        let session = self.db.end_session(session_id, now).await?;
        info!(
            "🎟️ Session #{session_id} closed: {} scans, {} valid, {} invalid",
            session.total_scans, session.valid_scans, session.invalid_scans
        );
        Ok(session)
    }

    pub async fn fetch_session(&self, session_id: i64) -> Result<ScanSession, TicketingError> {
        self.db.fetch_session(session_id).await?.ok_or(TicketingError::SessionNotFound(session_id))
    }

    /// Validates a scanned code and, if it is good, redeems the ticket.
    ///
    /// Problems with the scan itself, including a request for an event other than the session's, always produce a
    /// recorded answer. Errors are reserved for a session that cannot accept scans (missing or closed) and for storage
    /// failures. A storage failure never leaves a ticket redeemed without its `valid` ledger entry.
    pub async fn validate(
        &self,
        session_id: i64,
        request: ValidationRequest,
        now: DateTime<Utc>,
    ) -> Result<ValidationResponse, TicketingError> {
        let session = self.fetch_session(session_id).await?;
        if !session.is_active() {
            return Err(TicketingError::SessionNotActive(session_id));
        }
        let response = if session.event_id == request.event_id {
            self.check(&session, request.code.trim(), now).await?
        } else {
            ScanCheck::Refused(ValidationResponse::invalid(
                ValidationOutcome::WrongEvent,
                format!("This session scans event #{}, not event #{}", session.event_id, request.event_id),
            ))
        };
        let response = match response {
            ScanCheck::Refused(response) => {
                self.record(&session, &response, request.notes, now).await?;
                response
            },
            ScanCheck::Admissible(ticket) => self.admit(&session, ticket, request.notes, now).await?,
        };
        match response.outcome {
            ValidationOutcome::Valid => debug!("🎟️ {} ({session_id}): {}", session.scanner_id, response.message),
            _ => info!("🎟️ {} ({session_id}) rejected a scan: {}", session.scanner_id, response.message),
        }
        Ok(response)
    }

    async fn check(
        &self,
        session: &ScanSession,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<ScanCheck, TicketingError> {
        let claims = match self.signer.verify(code, now) {
            Ok(claims) => claims,
            Err(RedemptionCodeError::Expired(claims)) => {
                let response = ValidationResponse::invalid(
                    ValidationOutcome::CodeExpired,
                    format!("The code for ticket {} has expired", claims.serial_number),
                );
                return self.attach_known_ticket(response, &claims).await.map(ScanCheck::Refused);
            },
            Err(RedemptionCodeError::MalformedClaims(e)) => {
                let message = format!("Unreadable code: {e}");
                return Ok(ScanCheck::Refused(ValidationResponse::invalid(ValidationOutcome::MalformedClaims, message)));
            },
            Err(e @ (RedemptionCodeError::InvalidSignature(_) | RedemptionCodeError::SigningError(_))) => {
                trace!("🎟️ Code rejected: {e}");
                let message = "This is not a genuine ticket";
                let response = ValidationResponse::invalid(ValidationOutcome::InvalidSignature, message);
                return Ok(ScanCheck::Refused(response));
            },
        };
        if claims.event_id != session.event_id {
            let response = ValidationResponse::invalid(
                ValidationOutcome::WrongEvent,
                format!("Ticket {} is for a different event", claims.serial_number),
            );
            return self.attach_known_ticket(response, &claims).await.map(ScanCheck::Refused);
        }
        let ticket_id = TicketId::from(claims.ticket_id.clone());
        let Some(ticket) = self.db.fetch_ticket(&ticket_id).await? else {
            return Ok(ScanCheck::Refused(ValidationResponse::invalid(
                ValidationOutcome::NotFound,
                format!("Ticket {} does not exist", claims.serial_number),
            )));
        };
        if ticket.serial_number != claims.serial_number || ticket.order_line_id != claims.order_line_id {
            return Ok(ScanCheck::Refused(ValidationResponse::invalid(
                ValidationOutcome::MalformedClaims,
                format!("The code does not match ticket {}", ticket.serial_number),
            )));
        }
        if ticket.status != TicketStatus::Active {
            return Ok(ScanCheck::Refused(status_response(ticket)));
        }
        Ok(ScanCheck::Admissible(ticket))
    }

    /// Redeems an active ticket together with its ledger entry.
    async fn admit(
        &self,
        session: &ScanSession,
        ticket: Ticket,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<ValidationResponse, TicketingError> {
        let response = ValidationResponse::valid(ticket.id.clone(), ticket.serial_number.clone());
        let validation = new_validation(session, &response, notes.clone(), now);
        if self.db.redeem_and_record(&ticket.id, validation).await?.is_some() {
            return Ok(response);
        }
        // Lost the race to another scanner: report what the winner wrote
        let ticket = self
            .db
            .fetch_ticket(&ticket.id)
            .await?
            .ok_or_else(|| TicketingError::TicketNotFound(ticket.id.to_string()))?;
        trace!("🎟️ Ticket {} was redeemed concurrently by {:?}", ticket.serial_number, ticket.redeemed_by);
        let response = status_response(ticket);
        self.record(session, &response, notes, now).await?;
        Ok(response)
    }

    async fn record(
        &self,
        session: &ScanSession,
        response: &ValidationResponse,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), TicketingError> {
        self.db.record_validation(new_validation(session, response, notes, now)).await?;
        Ok(())
    }

    /// Links a rejected scan to its ticket in the ledger, if the ticket exists.
    async fn attach_known_ticket(
        &self,
        response: ValidationResponse,
        claims: &RedemptionClaims,
    ) -> Result<ValidationResponse, TicketingError> {
        let ticket_id = TicketId::from(claims.ticket_id.clone());
        let response = match self.db.fetch_ticket(&ticket_id).await? {
            Some(ticket) => response.for_ticket(ticket.id, ticket.serial_number),
            None => response,
        };
        Ok(response)
    }
}

/// Where a scan stands once the code and the ticket have been checked.
enum ScanCheck {
    /// The answer is already known and only needs recording.
    Refused(ValidationResponse),
    /// The ticket is active; admitting it is a race against other scanners.
    Admissible(Ticket),
}

fn new_validation(
    session: &ScanSession,
    response: &ValidationResponse,
    notes: Option<String>,
    now: DateTime<Utc>,
) -> NewValidation {
    NewValidation {
        ticket_id: response.ticket_id.clone(),
        scanner_id: session.scanner_id.clone(),
        session_id: session.id,
        outcome: response.outcome,
        notes,
        created_at: now,
    }
}

fn status_response(ticket: Ticket) -> ValidationResponse {
    match ticket.status {
        TicketStatus::Redeemed => {
            ValidationResponse::already_redeemed(ticket.id, ticket.serial_number, ticket.redeemed_at)
        },
        TicketStatus::Voided => ValidationResponse::invalid(
            ValidationOutcome::Voided,
            format!("Ticket {} has been voided", ticket.serial_number),
        )
        .for_ticket(ticket.id, ticket.serial_number),
        TicketStatus::Active => ValidationResponse::invalid(
            ValidationOutcome::InvalidStatus,
            format!("Ticket {} could not be redeemed", ticket.serial_number),
        )
        .for_ticket(ticket.id, ticket.serial_number),
    }
}
