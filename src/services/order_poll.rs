//! Polls the backend until a just-completed order materializes.
//!
//! Order creation is asynchronous relative to checkout completion (a backend
//! event-processing step), so an immediate miss is not a failure. The poller
//! retries on a fixed interval with no upper bound; the handle owns the task
//! and aborts it on drop, so a caller going away deterministically stops the
//! timer.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::commerce::CommerceApi;
use crate::models::{Order, OrderId};

/// Latest observation of the polled order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OrderFetch {
    pub order: Option<Order>,
    pub loading: bool,
}

#[derive(Clone)]
pub struct OrderPoller {
    api: Arc<dyn CommerceApi>,
    interval: Duration,
}

impl OrderPoller {
    pub fn new(api: Arc<dyn CommerceApi>, interval: Duration) -> Self {
        Self { api, interval }
    }

    /// Starts polling for `order_id`. At most one timer exists per handle;
    /// starting a poll for a different id means dropping the old handle,
    /// which aborts its task.
    pub fn start(&self, order_id: OrderId) -> OrderPollHandle {
        let (tx, rx) = watch::channel(OrderFetch {
            order: None,
            loading: true,
        });
        let api = self.api.clone();
        let interval = self.interval;
        let id = order_id.clone();

        let task = tokio::spawn(async move {
            loop {
                match api.order_by_id(&id).await {
                    Ok(Some(order)) => {
                        debug!(order_id = %id, "order materialized");
                        let _ = tx.send(OrderFetch {
                            order: Some(order),
                            loading: false,
                        });
                        break;
                    }
                    Ok(None) => {
                        counter!("order_poll_attempts_total", 1);
                        let _ = tx.send(OrderFetch {
                            order: None,
                            loading: false,
                        });
                    }
                    Err(err) => {
                        // Transient backend trouble is retried on the same
                        // cadence as an absent order.
                        warn!(order_id = %id, error = %err, "order fetch failed, retrying");
                    }
                }
                tokio::time::sleep(interval).await;
            }
        });

        OrderPollHandle {
            order_id,
            rx,
            task,
        }
    }
}

/// Owns the polling task for one order id.
pub struct OrderPollHandle {
    order_id: OrderId,
    rx: watch::Receiver<OrderFetch>,
    task: JoinHandle<()>,
}

impl OrderPollHandle {
    pub fn order_id(&self) -> &OrderId {
        &self.order_id
    }

    /// Most recent observation without waiting.
    pub fn latest(&self) -> OrderFetch {
        self.rx.borrow().clone()
    }

    /// Waits until the order materializes. Returns `None` only if the polling
    /// task ended without producing one (it was aborted).
    pub async fn wait(&mut self) -> Option<Order> {
        loop {
            if let Some(order) = self.rx.borrow().order.clone() {
                return Some(order);
            }
            if self.rx.changed().await.is_err() {
                return None;
            }
        }
    }
}

impl Drop for OrderPollHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
