use chrono::{DateTime, Utc};
use log::*;

use crate::{
    bxo_api::errors::TicketingError,
    db_types::{NewTicket, Order, OrderLine, TicketId},
    helpers::{ticket_serial, CodeSigner, RedemptionClaims, RedemptionCodeError},
};

/// Materialises one ticket per purchased unit, each with its own signed redemption code.
///
/// The issuer does no I/O. It runs inside the payment completion unit of work, which writes the batch it produces.
/// Serial numbers are derived from the order code, line id and unit index, so issuing twice for the same order
/// produces the same serials and the second batch collides with the first on the unique serial index.
#[derive(Debug, Clone)]
pub struct TicketIssuer {
    signer: CodeSigner,
}

impl TicketIssuer {
    pub fn new(signer: CodeSigner) -> Self {
        Self { signer }
    }

    pub fn signer(&self) -> &CodeSigner {
        &self.signer
    }

    pub fn issue_for_order(
        &self,
        order: &Order,
        lines: &[OrderLine],
        issued_at: DateTime<Utc>,
    ) -> Result<Vec<NewTicket>, TicketingError> {
        let count = lines.iter().map(|l| l.quantity.max(0)).sum::<i64>();
        let mut tickets = Vec::with_capacity(usize::try_from(count).unwrap_or_default());
        for line in lines {
            if line.order_id != order.id {
                return Err(TicketingError::IssuanceError(format!(
                    "Line {} belongs to order {}, not {}",
                    line.id, line.order_id, order.id
                )));
            }
            for index in 0..line.quantity {
                let id = TicketId::random();
                let serial_number = ticket_serial(&order.order_code, line.id, index);
                let claims = self.signer.claims_for(id.as_str(), order.event_id, &serial_number, line.id, issued_at);
                let redemption_code = self.sign(&claims)?;
                tickets.push(NewTicket {
                    id,
                    order_id: order.id,
                    order_line_id: line.id,
                    event_id: order.event_id,
                    tier_id: line.tier_id,
                    serial_number,
                    redemption_code,
                    issued_at,
                });
            }
        }
        debug!("🎟️ {} tickets prepared for order {}", tickets.len(), order.order_code);
        Ok(tickets)
    }

    fn sign(&self, claims: &RedemptionClaims) -> Result<String, TicketingError> {
        self.signer.sign(claims).map_err(|e: RedemptionCodeError| TicketingError::IssuanceError(e.to_string()))
    }
}
