#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal_macros::dec;
use serde_json::json;
use tokio::sync::mpsc;

use storefront_checkout::commerce::{CommerceApi, CompletionData, FetchPolicy, FieldError};
use storefront_checkout::config::AppConfig;
use storefront_checkout::errors::CheckoutError;
use storefront_checkout::events::{process_events, EventSender};
use storefront_checkout::models::{
    Checkout, CheckoutId, CheckoutLine, Money, Order, OrderId, OrderLine,
};
use storefront_checkout::AppState;

/// In-memory commerce backend with scriptable behavior and call counters.
#[derive(Default)]
pub struct MockCommerceApi {
    pub checkouts: Mutex<HashMap<CheckoutId, Checkout>>,
    pub orders: Mutex<HashMap<OrderId, Order>>,
    /// Scripted results for `checkout_complete`, consumed front to back.
    /// When empty, completion falls back to consuming the stored checkout.
    complete_script: Mutex<VecDeque<Result<CompletionData, CheckoutError>>>,
    /// Number of `order_by_id` calls that see the order as absent before it
    /// materializes.
    order_absent_for: AtomicUsize,
    /// Artificial latency inside `checkout_complete`.
    complete_delay: Mutex<Option<Duration>>,

    pub checkout_fetches: AtomicUsize,
    pub complete_calls: AtomicUsize,
    pub order_calls: AtomicUsize,
    pub init_calls: Mutex<HashMap<String, usize>>,
}

impl MockCommerceApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn put_checkout(&self, checkout: Checkout) {
        self.checkouts
            .lock()
            .unwrap()
            .insert(checkout.id.clone(), checkout);
    }

    pub fn put_order(&self, order: Order) {
        self.orders.lock().unwrap().insert(order.id.clone(), order);
    }

    pub fn script_complete(&self, result: Result<CompletionData, CheckoutError>) {
        self.complete_script.lock().unwrap().push_back(result);
    }

    pub fn set_order_absent_for(&self, calls: usize) {
        self.order_absent_for.store(calls, Ordering::SeqCst);
    }

    pub fn set_complete_delay(&self, delay: Duration) {
        *self.complete_delay.lock().unwrap() = Some(delay);
    }

    pub fn gateway_init_count(&self, gateway_id: &str) -> usize {
        self.init_calls
            .lock()
            .unwrap()
            .get(gateway_id)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl CommerceApi for MockCommerceApi {
    async fn checkout_by_id(
        &self,
        id: &CheckoutId,
        _locale: &str,
        _policy: FetchPolicy,
    ) -> Result<Option<Checkout>, CheckoutError> {
        self.checkout_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.checkouts.lock().unwrap().get(id).cloned())
    }

    async fn checkout_create(
        &self,
        channel: &str,
        locale: &str,
        variant_id: &str,
        quantity: i32,
    ) -> Result<Checkout, CheckoutError> {
        let id = CheckoutId::new(format!("ck_{}", uuid::Uuid::new_v4().simple()));
        let checkout = Checkout {
            id: id.clone(),
            channel: channel.to_string(),
            locale: locale.to_string(),
            lines: vec![CheckoutLine {
                id: "line_1".to_string(),
                variant_id: variant_id.to_string(),
                quantity,
                total: Money::new(dec!(10.00), "EUR"),
            }],
            total: Money::new(dec!(10.00), "EUR"),
        };
        self.put_checkout(checkout.clone());
        Ok(checkout)
    }

    async fn checkout_lines_add(
        &self,
        id: &CheckoutId,
        variant_id: &str,
        quantity: i32,
    ) -> Result<Checkout, CheckoutError> {
        let mut checkouts = self.checkouts.lock().unwrap();
        let checkout = checkouts
            .get_mut(id)
            .ok_or_else(|| CheckoutError::NotFound(format!("Checkout {} not found", id)))?;
        let line_no = checkout.lines.len() + 1;
        checkout.lines.push(CheckoutLine {
            id: format!("line_{}", line_no),
            variant_id: variant_id.to_string(),
            quantity,
            total: Money::new(dec!(10.00), "EUR"),
        });
        Ok(checkout.clone())
    }

    async fn checkout_lines_delete(
        &self,
        id: &CheckoutId,
        line_id: &str,
    ) -> Result<Checkout, CheckoutError> {
        let mut checkouts = self.checkouts.lock().unwrap();
        let checkout = checkouts
            .get_mut(id)
            .ok_or_else(|| CheckoutError::NotFound(format!("Checkout {} not found", id)))?;
        checkout.lines.retain(|line| line.id != line_id);
        Ok(checkout.clone())
    }

    async fn checkout_complete(&self, id: &CheckoutId) -> Result<CompletionData, CheckoutError> {
        self.complete_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.complete_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(scripted) = self.complete_script.lock().unwrap().pop_front() {
            return scripted;
        }

        // Default: consume the checkout and materialize an order for it.
        let removed = self.checkouts.lock().unwrap().remove(id);
        match removed {
            Some(_) => {
                let order = order_fixture("ord_1");
                self.put_order(order.clone());
                Ok(CompletionData {
                    order: Some(order),
                    errors: vec![],
                })
            }
            None => Ok(CompletionData {
                order: None,
                errors: vec![FieldError {
                    field: Some("id".to_string()),
                    code: "NOT_FOUND".to_string(),
                    message: format!("Checkout {} does not exist", id),
                }],
            }),
        }
    }

    async fn order_by_id(&self, id: &OrderId) -> Result<Option<Order>, CheckoutError> {
        self.order_calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.order_absent_for.load(Ordering::SeqCst);
        if remaining > 0 {
            self.order_absent_for.store(remaining - 1, Ordering::SeqCst);
            return Ok(None);
        }
        Ok(self.orders.lock().unwrap().get(id).cloned())
    }

    async fn transaction_initialize(
        &self,
        _id: &CheckoutId,
        gateway_id: &str,
    ) -> Result<serde_json::Value, CheckoutError> {
        *self
            .init_calls
            .lock()
            .unwrap()
            .entry(gateway_id.to_string())
            .or_insert(0) += 1;
        Ok(json!({ "clientSecret": "sec_test" }))
    }
}

pub fn checkout_fixture(id: &str, channel: &str, lines: usize) -> Checkout {
    let line_total = dec!(22.50);
    Checkout {
        id: CheckoutId::new(id),
        channel: channel.to_string(),
        locale: "en-US".to_string(),
        lines: (0..lines)
            .map(|i| CheckoutLine {
                id: format!("line_{}", i + 1),
                variant_id: format!("var_{}", i + 1),
                quantity: 1,
                total: Money::new(line_total, "EUR"),
            })
            .collect(),
        total: Money::new(line_total * rust_decimal::Decimal::from(lines as i64), "EUR"),
    }
}

pub fn order_fixture(id: &str) -> Order {
    Order {
        id: OrderId::new(id),
        number: format!("1{}", id.len()),
        email: Some("buyer@example.com".to_string()),
        total: Money::new(dec!(45.00), "EUR"),
        discount: None,
        lines: vec![OrderLine {
            variant_id: "var_1".to_string(),
            product_name: "Test Product".to_string(),
            quantity: 2,
            total: Money::new(dec!(45.00), "EUR"),
        }],
        created_at: Utc::now(),
    }
}

/// Test harness wiring the mock backend into a full [`AppState`].
pub struct TestApp {
    pub state: Arc<AppState>,
    pub api: Arc<MockCommerceApi>,
}

impl TestApp {
    pub fn new() -> Self {
        let api = MockCommerceApi::new();
        let config = AppConfig {
            default_channel: "netherlands".to_string(),
            order_poll_interval_ms: 20,
            ..AppConfig::default()
        };
        let (event_tx, event_rx) = mpsc::channel(256);
        tokio::spawn(process_events(event_rx));
        let state = Arc::new(AppState::new(
            config,
            api.clone() as Arc<dyn CommerceApi>,
            EventSender::new(event_tx),
        ));
        Self { state, api }
    }

    pub fn router(&self) -> axum::Router {
        storefront_checkout::handlers::routes().with_state(self.state.clone())
    }
}
