//! # Redemption code format
//!
//! Every ticket carries a self-contained, signed redemption code. Scanners present the code back to the server, which
//! can detect tampering without touching the database. The database is only consulted to find out whether the ticket
//! has already been used.
//!
//! The code is a compact JWT signed with HS256 under the server's code signing secret. Its claims are the ticket id,
//! event id, serial number and order line id, plus the standard `iat` and `exp` timestamps. Token handling is
//! delegated to `jwt_compact`.
//!
//! Only `HS256` is ever accepted. A header naming any other algorithm (including `none`) is rejected as an invalid
//! signature before the token is validated, and the signature segment must be the canonical encoding of the MAC.
use base64::{encode_config, URL_SAFE_NO_PAD};
use boxoffice_common::Secret;
use chrono::{DateTime, Duration, TimeZone, Utc};
use jwt_compact::{
    alg::{Hs256, Hs256Key},
    AlgorithmExt,
    Claims,
    Header,
    TimeOptions,
    UntrustedToken,
    ValidationError,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const ALGORITHM: &str = "HS256";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RedemptionCodeError {
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),
    #[error("Malformed claims: {0}")]
    MalformedClaims(String),
    #[error("The code for ticket {} expired at {}", .0.ticket_id, .0.exp)]
    Expired(RedemptionClaims),
    #[error("Could not sign redemption code: {0}")]
    SigningError(String),
}

/// The facts a redemption code binds together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedemptionClaims {
    pub ticket_id: String,
    pub event_id: i64,
    pub serial_number: String,
    pub order_line_id: i64,
    /// Issued at (unix seconds)
    pub iat: i64,
    /// Expires at (unix seconds)
    pub exp: i64,
}

/// The private part of the token claims. `iat` and `exp` travel as registered claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TicketClaims {
    ticket_id: String,
    event_id: i64,
    serial_number: String,
    order_line_id: i64,
}

impl RedemptionClaims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.exp, 0).single()
    }

    fn issued_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.iat, 0).single()
    }

    fn from_token(claims: Claims<TicketClaims>) -> Result<Self, RedemptionCodeError> {
        let iat = claims.issued_at.ok_or_else(|| RedemptionCodeError::MalformedClaims("iat is missing".into()))?;
        let exp = claims.expiration.ok_or_else(|| RedemptionCodeError::MalformedClaims("exp is missing".into()))?;
        let TicketClaims { ticket_id, event_id, serial_number, order_line_id } = claims.custom;
        Ok(Self { ticket_id, event_id, serial_number, order_line_id, iat: iat.timestamp(), exp: exp.timestamp() })
    }

    fn check_fields(&self) -> Result<(), RedemptionCodeError> {
        if self.ticket_id.trim().is_empty() {
            return Err(RedemptionCodeError::MalformedClaims("ticket_id is empty".into()));
        }
        if self.serial_number.trim().is_empty() {
            return Err(RedemptionCodeError::MalformedClaims("serial_number is empty".into()));
        }
        if self.event_id <= 0 || self.order_line_id <= 0 {
            return Err(RedemptionCodeError::MalformedClaims("event_id and order_line_id must be positive".into()));
        }
        if self.exp < self.iat {
            return Err(RedemptionCodeError::MalformedClaims("exp precedes iat".into()));
        }
        Ok(())
    }
}

/// Signs and verifies redemption codes with a server-held secret.
#[derive(Debug, Clone)]
pub struct CodeSigner {
    secret: Secret<String>,
    validity: Duration,
}

impl CodeSigner {
    pub fn new(secret: Secret<String>, validity: Duration) -> Self {
        Self { secret, validity }
    }

    pub fn validity(&self) -> Duration {
        self.validity
    }

    /// Builds the claims for a ticket issued at `issued_at`, valid for the configured period.
    pub fn claims_for(
        &self,
        ticket_id: &str,
        event_id: i64,
        serial_number: &str,
        order_line_id: i64,
        issued_at: DateTime<Utc>,
    ) -> RedemptionClaims {
        RedemptionClaims {
            ticket_id: ticket_id.to_string(),
            event_id,
            serial_number: serial_number.to_string(),
            order_line_id,
            iat: issued_at.timestamp(),
            exp: (issued_at + self.validity).timestamp(),
        }
    }

    pub fn sign(&self, claims: &RedemptionClaims) -> Result<String, RedemptionCodeError> {
        let (Some(issued_at), Some(expires_at)) = (claims.issued_at(), claims.expires_at()) else {
            return Err(RedemptionCodeError::SigningError("iat or exp is out of range".into()));
        };
        let mut token_claims = Claims::new(TicketClaims {
            ticket_id: claims.ticket_id.clone(),
            event_id: claims.event_id,
            serial_number: claims.serial_number.clone(),
            order_line_id: claims.order_line_id,
        });
        token_claims.issued_at = Some(issued_at);
        token_claims.expiration = Some(expires_at);
        let header = Header::empty().with_token_type("JWT");
        Hs256.token(&header, &token_claims, &self.key()).map_err(|e| RedemptionCodeError::SigningError(e.to_string()))
    }

    /// Verifies the code and returns its claims.
    ///
    /// Authentic codes whose `exp` is before `now` produce [`RedemptionCodeError::Expired`], which carries the
    /// claims so that the caller can still tie the attempt to a ticket.
    pub fn verify(&self, code: &str, now: DateTime<Utc>) -> Result<RedemptionClaims, RedemptionCodeError> {
        let code = code.trim();
        let untrusted = UntrustedToken::new(code)
            .map_err(|e| RedemptionCodeError::InvalidSignature(format!("poorly formatted code: {e}")))?;
        if untrusted.algorithm() != ALGORITHM {
            let alg = untrusted.algorithm();
            return Err(RedemptionCodeError::InvalidSignature(format!("algorithm {alg} is not accepted")));
        }
        let signature = code.rsplit('.').next().unwrap_or_default();
        if encode_config(untrusted.signature_bytes(), URL_SAFE_NO_PAD) != signature {
            return Err(RedemptionCodeError::InvalidSignature("non-canonical signature encoding".into()));
        }
        let (_, token_claims) = Hs256
            .validator::<TicketClaims>(&self.key())
            .validate(&untrusted)
            .map_err(|e| match e {
                ValidationError::MalformedClaims(e) => RedemptionCodeError::MalformedClaims(e.to_string()),
                e => RedemptionCodeError::InvalidSignature(e.to_string()),
            })?
            .into_parts();

        let options = TimeOptions::new(Duration::zero(), move || now);
        let expiry = token_claims.validate_expiration(&options).map(|_| ()).map_err(|e| match e {
            ValidationError::Expired => None,
            e => Some(RedemptionCodeError::MalformedClaims(e.to_string())),
        });
        let claims = RedemptionClaims::from_token(token_claims)?;
        claims.check_fields()?;
        match expiry {
            Ok(()) => Ok(claims),
            Err(None) => Err(RedemptionCodeError::Expired(claims)),
            Err(Some(e)) => Err(e),
        }
    }

    fn key(&self) -> Hs256Key {
        Hs256Key::new(self.secret.reveal().as_bytes())
    }
}
