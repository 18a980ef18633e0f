//! Payment initiation and reconciliation.
//!
//! The provider is the authority on whether money moved. [`PaymentReconciler`] asks it (on an explicit verify call, or
//! because a webhook said so) and applies the answer locally exactly once. Webhooks and polling converge on
//! [`PaymentReconciler::verify_payment`], and the completion step is a single compare-and-swap guarded transaction,
//! so duplicate or concurrent notifications can never issue a second batch of tickets.
use std::{fmt::Debug, future::Future, time::Duration};

use boxoffice_common::Amount;
use chrono::{DateTime, Utc};
use log::*;

use crate::{
    bxo_api::{
        errors::TicketingError,
        payment_objects::{PaymentHandle, VerifyOutcome, WebhookOutcome},
        ticket_issuer::TicketIssuer,
    },
    db_types::{NewPayment, Order, OrderCode, OrderStatusType, Payment, PaymentStatus},
    events::{EventProducers, TicketsIssuedEvent},
    helpers::payment_reference,
    traits::{
        CheckoutRequest,
        GatewayError,
        OrderManagement,
        PaymentCompletion,
        PaymentGateway,
        PaymentManagement,
        ProviderStatus,
        TicketManagement,
    },
};

pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(15);

pub struct PaymentReconciler<B, G> {
    db: B,
    gateway: G,
    issuer: TicketIssuer,
    producers: EventProducers,
    provider_timeout: Duration,
}

impl<B, G> Debug for PaymentReconciler<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentReconciler (timeout {:?})", self.provider_timeout)
    }
}

impl<B, G> PaymentReconciler<B, G> {
    pub fn new(db: B, gateway: G, issuer: TicketIssuer, producers: EventProducers) -> Self {
        Self { db, gateway, issuer, producers, provider_timeout: DEFAULT_PROVIDER_TIMEOUT }
    }

    /// Upper bound on any single call to the provider. A call that runs over is treated as a
    /// [`GatewayError::Timeout`] and leaves local state untouched.
    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, GatewayError>
    where F: Future<Output = Result<T, GatewayError>> {
        match tokio::time::timeout(self.provider_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout),
        }
    }
}

impl<B, G> PaymentReconciler<B, G>
where
    B: OrderManagement + PaymentManagement + TicketManagement,
    G: PaymentGateway,
{
    /// Starts a payment for the order with the named provider.
    ///
    /// Nothing is written locally until the provider has accepted the checkout, so a failed or timed-out call can
    /// simply be retried.
    pub async fn initiate_payment(
        &self,
        code: &OrderCode,
        provider: &str,
        now: DateTime<Utc>,
    ) -> Result<PaymentHandle, TicketingError> {
        let order =
            self.db.fetch_order_by_code(code).await?.ok_or_else(|| TicketingError::OrderNotFound(code.to_string()))?;
        check_payable(&order, now)?;
        let reference = payment_reference(&order.order_code);
        let request = CheckoutRequest {
            amount: order.total_price,
            currency: order.currency.clone(),
            reference: reference.clone(),
            customer_name: order.buyer_name.clone(),
            customer_email: order.buyer_email.clone(),
        };
        trace!("💳️ Initiating {provider} payment {reference} for order {code}");
        let handle = self.bounded(self.gateway.initiate(provider, request)).await.map_err(|e| {
            warn!("💳️ {provider} could not start payment {reference} for order {code}: {e}");
            e
        })?;
        let payment = NewPayment {
            order_id: order.id,
            provider: provider.to_string(),
            amount: order.total_price,
            currency: order.currency.clone(),
            reference: handle.provider_reference.clone(),
            authorization_url: handle.redirect_url.clone(),
            provider_response: Some(handle.raw_response.to_string()),
            created_at: now,
        };
        let payment = self.db.insert_payment(payment).await?;
        self.db.set_payment_reference(order.id, &payment.reference, now).await?;
        info!("💳️ Payment #{} ({}) started with {provider} for order {code}", payment.id, payment.reference);
        Ok(PaymentHandle { payment, redirect_url: handle.redirect_url, instructions: handle.instructions })
    }

    /// Reconciles a payment with its provider.
    ///
    /// * Already completed: returns the existing tickets without contacting the provider.
    /// * Already failed: returned as is. Failure is terminal.
    /// * Pending: the provider's status decides. On success the payment is completed and the tickets issued in one
    ///   unit of work. Only the caller that wins the completion publishes the tickets-issued event.
    pub async fn verify_payment(&self, payment_id: i64, now: DateTime<Utc>) -> Result<VerifyOutcome, TicketingError> {
        let payment = self.fetch_payment(payment_id).await?;
        match payment.status {
            PaymentStatus::Completed => return self.already_completed(payment).await,
            PaymentStatus::Failed => {
                debug!("💳️ Payment {payment_id} has already failed. Nothing to verify");
                return Ok(VerifyOutcome::Failed { payment });
            },
            PaymentStatus::Pending => {},
        }
        let verification = self
            .bounded(self.gateway.verify_by_reference(&payment.provider, &payment.reference))
            .await
            .map_err(|e| {
                warn!("💳️ Could not verify payment {} with {}: {e}", payment.reference, payment.provider);
                e
            })?;
        let raw = verification.raw_response.to_string();
        match verification.status {
            ProviderStatus::Completed => {
                if let Some(reason) = amount_mismatch(&payment, verification.amount, verification.currency.as_deref()) {
                    error!("💳️ Payment {} was settled for the wrong amount: {reason}", payment.reference);
                    self.db.record_provider_response(payment_id, &raw, now).await?;
                    return Err(TicketingError::PaymentCompletionFailed { id: payment_id, reason });
                }
                let paid_at = verification.paid_at.unwrap_or(now);
                let completion = self.db.complete_payment(payment_id, &raw, paid_at, &self.issuer).await?;
                if let PaymentCompletion::Completed { order, tickets, .. } = &completion {
                    let event = TicketsIssuedEvent::new(order.clone(), tickets.clone());
                    self.producers.publish_tickets_issued(event).await;
                }
                Ok(completion.into())
            },
            ProviderStatus::Failed => {
                if self.db.fail_payment(payment_id, &raw, now).await? {
                    info!("💳️ Payment {} failed at {}", payment.reference, payment.provider);
                }
                let payment = self.fetch_payment(payment_id).await?;
                match payment.status {
                    PaymentStatus::Completed => self.already_completed(payment).await,
                    _ => Ok(VerifyOutcome::Failed { payment }),
                }
            },
            ProviderStatus::Pending => {
                trace!("💳️ Payment {} is still pending at {}", payment.reference, payment.provider);
                self.db.record_provider_response(payment_id, &raw, now).await?;
                let payment = self.fetch_payment(payment_id).await?;
                match payment.status {
                    PaymentStatus::Completed => self.already_completed(payment).await,
                    PaymentStatus::Failed => Ok(VerifyOutcome::Failed { payment }),
                    PaymentStatus::Pending => Ok(VerifyOutcome::Pending { payment }),
                }
            },
        }
    }

    /// Handles a provider webhook. The payload is authenticated and decoded by the provider adapter; only the
    /// provider's success event triggers a verification, which then follows exactly the same path as a poll.
    pub async fn handle_webhook(
        &self,
        provider: &str,
        payload: &[u8],
        signature: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<WebhookOutcome, TicketingError> {
        let notification = self.gateway.decode_webhook(provider, payload, signature).map_err(|e| {
            warn!("💳️ Rejected a {provider} webhook: {e}");
            e
        })?;
        debug!("💳️ {provider} webhook '{}' for {}", notification.event_name, notification.reference);
        let payment = self
            .db
            .fetch_payment_by_reference(&notification.reference)
            .await?
            .ok_or_else(|| TicketingError::PaymentNotFound(notification.reference.clone()))?;
        if payment.provider != provider {
            return Err(TicketingError::ValidationError(format!(
                "Payment {} belongs to {}, not {provider}",
                payment.reference, payment.provider
            )));
        }
        self.db.mark_webhook_received(payment.id, now).await?;
        let verification =
            if notification.is_success { Some(self.verify_payment(payment.id, now).await?) } else { None };
        Ok(WebhookOutcome { event_name: notification.event_name, reference: notification.reference, verification })
    }

    pub async fn fetch_payment(&self, payment_id: i64) -> Result<Payment, TicketingError> {
        self.db.fetch_payment(payment_id).await?.ok_or_else(|| TicketingError::PaymentNotFound(payment_id.to_string()))
    }

    async fn already_completed(&self, payment: Payment) -> Result<VerifyOutcome, TicketingError> {
        let tickets = self.db.fetch_tickets_for_order(payment.order_id).await?;
        debug!("💳️ Payment {} is already complete with {} tickets", payment.reference, tickets.len());
        Ok(VerifyOutcome::Completed { payment, tickets, first_completion: false })
    }
}

fn check_payable(order: &Order, now: DateTime<Utc>) -> Result<(), TicketingError> {
    if order.can_be_paid(now) {
        return Ok(());
    }
    let reason = match order.status {
        OrderStatusType::Pending => format!("the hold on order {} lapsed at {}", order.order_code, order.expires_at),
        status => format!("order {} is {status}", order.order_code),
    };
    Err(TicketingError::PaymentNotAllowed(reason))
}

fn amount_mismatch(payment: &Payment, amount: Option<Amount>, currency: Option<&str>) -> Option<String> {
    if let Some(amount) = amount {
        if amount != payment.amount {
            return Some(format!("expected {}, provider reports {amount}", payment.amount));
        }
    }
    match currency {
        Some(currency) if !currency.eq_ignore_ascii_case(&payment.currency) => {
            Some(format!("expected {}, provider reports {currency}", payment.currency))
        },
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use chrono::Duration;

    use super::*;

    fn payment() -> Payment {
        let now = Utc::now();
        Payment {
            id: 1,
            order_id: 1,
            provider: "paystack".into(),
            amount: Amount::from_major(150),
            currency: "NGN".into(),
            status: PaymentStatus::Pending,
            reference: "BXOK7M2Q9XZ-0000beef".into(),
            authorization_url: None,
            provider_response: None,
            webhook_received_at: None,
            paid_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn settled_amount_must_match() {
        let p = payment();
        assert!(amount_mismatch(&p, Some(Amount::from_major(150)), Some("ngn")).is_none());
        assert!(amount_mismatch(&p, None, None).is_none());
        assert!(amount_mismatch(&p, Some(Amount::from_major(149)), Some("NGN")).is_some());
        assert!(amount_mismatch(&p, Some(Amount::from_major(150)), Some("USD")).is_some());
    }

    #[test]
    fn lapsed_orders_cannot_be_paid() {
        let now = Utc::now();
        let mut order = Order {
            id: 1,
            order_code: OrderCode::from("BXOK7M2Q9XZ"),
            event_id: 1,
            buyer_name: "Ada".into(),
            buyer_email: "ada@example.com".into(),
            buyer_phone: None,
            status: OrderStatusType::Pending,
            total_price: Amount::from_major(150),
            currency: "NGN".into(),
            payment_reference: None,
            cancel_reason: None,
            created_at: now - Duration::minutes(20),
            expires_at: now - Duration::minutes(5),
            paid_at: None,
            cancelled_at: None,
            updated_at: now,
        };
        assert!(matches!(check_payable(&order, now), Err(TicketingError::PaymentNotAllowed(_))));
        order.expires_at = now + Duration::minutes(5);
        assert!(check_payable(&order, now).is_ok());
        order.status = OrderStatusType::Paid;
        assert!(matches!(check_payable(&order, now), Err(TicketingError::PaymentNotAllowed(_))));
    }
}
