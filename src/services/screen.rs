//! Top-level view selection.
//!
//! The decision is recomputed from raw inputs on every request and returned
//! as a tagged variant, so the table below is testable without any HTTP
//! machinery.

use serde::Serialize;

use crate::models::OrderId;
use crate::services::checkout_data::CheckoutFetch;
use crate::services::order_poll::OrderFetch;
use crate::services::url_state::UrlState;

/// Which top-level screen the storefront should render.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "screen", rename_all = "kebab-case")]
pub enum Screen {
    /// An order id is referenced; the confirmation view polls until the order
    /// resolves and shows a skeleton meanwhile.
    OrderConfirmation { order_id: OrderId, loading: bool },
    /// The checkout is gone but the gateway reported success: generic
    /// "payment received" confirmation, no further network calls.
    PaymentSuccessful,
    /// Unknown or expired checkout with no success signal.
    NotFound,
    /// The checkout exists but holds no lines; payment must not start.
    EmptyCart,
    /// Live checkout form and payment sections. `processing` overlays a
    /// blocking guard while a completion call is outstanding.
    Checkout { processing: bool },
}

/// Decision table, first match wins:
///
/// 1. order id in URL              → OrderConfirmation
/// 2. resolved, absent, redirect-succeeded → PaymentSuccessful
/// 3. resolved, absent             → NotFound
/// 4. otherwise                    → Checkout (or EmptyCart with zero lines)
///
/// Rule 2 must precede rule 3: a successful payment whose checkout was
/// already deleted server-side would otherwise be misreported as an error.
pub fn select_screen(url: &UrlState, checkout: &CheckoutFetch, order: &OrderFetch) -> Screen {
    if let Some(order_id) = &url.order {
        return Screen::OrderConfirmation {
            order_id: order_id.clone(),
            loading: order.order.is_none(),
        };
    }

    let resolved_absent = !checkout.is_loading() && checkout.checkout.is_none();
    if resolved_absent && url.redirect_succeeded() {
        return Screen::PaymentSuccessful;
    }
    if resolved_absent {
        return Screen::NotFound;
    }

    if let Some(checkout) = &checkout.checkout {
        if checkout.is_empty() {
            return Screen::EmptyCart;
        }
    }
    Screen::Checkout {
        processing: url.processing_payment,
    }
}
