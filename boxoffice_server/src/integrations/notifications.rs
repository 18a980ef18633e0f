use std::time::Duration;

use boxoffice_engine::events::{EventHandlers, EventHooks, OrderAnnulledEvent, TicketsIssuedEvent};
use futures::FutureExt;
use log::*;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::{config::ServerConfig, errors::ServerError};

const NOTIFICATION_EVENT_BUFFER_SIZE: usize = 64;

/// The payload posted to the notification endpoint for every batch of issued tickets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketNotification {
    pub order_code: String,
    pub event_id: i64,
    pub buyer_name: String,
    pub buyer_email: String,
    pub tickets: Vec<IssuedTicket>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedTicket {
    pub serial_number: String,
    pub tier_id: i64,
    pub redemption_code: String,
}

impl From<&TicketsIssuedEvent> for TicketNotification {
    fn from(event: &TicketsIssuedEvent) -> Self {
        let order = &event.order;
        let tickets = event
            .tickets
            .iter()
            .map(|t| IssuedTicket {
                serial_number: t.serial_number.clone(),
                tier_id: t.tier_id,
                redemption_code: t.redemption_code.clone(),
            })
            .collect();
        Self {
            order_code: order.order_code.to_string(),
            event_id: order.event_id,
            buyer_name: order.buyer_name.clone(),
            buyer_email: order.buyer_email.clone(),
            tickets,
        }
    }
}

/// Posts issued tickets to a relay (typically a mailer) as JSON.
#[derive(Clone)]
pub struct TicketNotifier {
    client: Client,
    url: String,
}

impl TicketNotifier {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, ServerError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServerError::InitializeError(format!("Could not build the notification client. {e}")))?;
        Ok(Self { client, url: url.to_string() })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn notify(&self, notification: &TicketNotification) -> Result<(), ServerError> {
        let response = self
            .client
            .post(&self.url)
            .json(notification)
            .send()
            .await
            .map_err(|e| ServerError::BackendError(format!("Notification request failed. {e}")))?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ServerError::BackendError(format!("Notification endpoint replied {status}. {body}")))
        }
    }
}

/// Builds the event handlers for the server's hooks:
/// * When tickets are issued, they are posted to `BXO_NOTIFICATION_URL` (if set). Failures are logged and dropped;
///   the sale stands regardless.
/// * Cancelled and expired orders are logged.
pub fn create_event_handlers(config: &ServerConfig) -> Result<EventHandlers, ServerError> {
    let mut hooks = EventHooks::default();
    if let Some(url) = &config.notification_url {
        let notifier = TicketNotifier::new(url, config.provider_timeout)?;
        info!("📬️ Issued tickets will be posted to {url}");
        hooks.on_tickets_issued(move |ev| {
            let notifier = notifier.clone();
            async move {
                let notification = TicketNotification::from(&ev);
                match notifier.notify(&notification).await {
                    Ok(()) => info!(
                        "📬️ {} tickets for order {} sent to {}",
                        notification.tickets.len(),
                        notification.order_code,
                        notifier.url()
                    ),
                    Err(e) => error!("📬️ Could not deliver the tickets for order {}. {e}", notification.order_code),
                }
            }
            .boxed()
        });
    }
    hooks.on_order_annulled(|ev| {
        let OrderAnnulledEvent { order, status } = ev;
        async move {
            info!(
                "📬️ Order {} is {status}. Its {} {} worth of tickets is back on sale.",
                order.order_code, order.total_price, order.currency
            );
        }
        .boxed()
    });
    Ok(EventHandlers::new(NOTIFICATION_EVENT_BUFFER_SIZE, hooks))
}
