use std::time::Duration;

use boxoffice_engine::{db_types::Order, OrderFlowApi, SqliteDatabase};
use chrono::Utc;
use log::*;
use tokio::task::JoinHandle;

/// Starts the expiry worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Every `interval`, overdue pending orders are expired (returning their tickets to inventory) and any holds still
/// active past their window are reaped. Buyers trying to pay a lapsed order are refused long before this runs, so the
/// interval only controls how quickly abandoned tickets go back on sale.
pub fn start_expiry_worker(api: OrderFlowApi<SqliteDatabase>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        info!("🕰️ Order expiry worker started. Sweeping every {}s", interval.as_secs());
        loop {
            timer.tick().await;
            trace!("🕰️ Running order expiry sweep");
            match api.expire_overdue(Utc::now()).await {
                Ok(result) if result.is_empty() => trace!("🕰️ Nothing to expire"),
                Ok(result) => {
                    info!(
                        "🕰️ {} orders expired, {} stray holds reaped",
                        result.expired_orders.len(),
                        result.reaped_holds.len()
                    );
                    debug!("🕰️ Expired orders: {}", order_list(&result.expired_orders));
                },
                Err(e) => {
                    error!("🕰️ Error running the order expiry sweep: {e}");
                },
            }
        }
    })
}

fn order_list(orders: &[Order]) -> String {
    orders
        .iter()
        .map(|o| format!("[{}] {} ({})", o.id, o.order_code, o.buyer_email))
        .collect::<Vec<String>>()
        .join(", ")
}
