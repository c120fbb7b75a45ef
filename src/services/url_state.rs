//! The query-parameter contract shared with the storefront.
//!
//! The pending-completion signal is derived from these parameters on every
//! request; it is never stored. Gateway-specific parameters are stripped once
//! consumed so a refresh cannot reprocess them.

use serde::Serialize;
use url::Url;

use crate::models::{CheckoutId, OrderId};

pub const PARAM_ORDER: &str = "order";
pub const PARAM_CHECKOUT: &str = "checkout";
pub const PARAM_REDIRECT_STATUS: &str = "redirect_status";
pub const PARAM_PROCESSING: &str = "processingPayment";
/// Value of `redirect_status` that marks a successful gateway return.
pub const REDIRECT_SUCCEEDED: &str = "succeeded";

/// Gateway-specific parameters appended by the processor's redirect.
pub const GATEWAY_PARAMS: &[&str] = &["payment_intent", "payment_intent_client_secret"];

/// Parsed view of the checkout-relevant query parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UrlState {
    pub order: Option<OrderId>,
    pub checkout: Option<CheckoutId>,
    pub redirect_status: Option<String>,
    pub processing_payment: bool,
    pub payment_intent: Option<String>,
    pub payment_intent_client_secret: Option<String>,
}

impl UrlState {
    pub fn from_url(url: &Url) -> Self {
        let mut state = UrlState::default();
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                PARAM_ORDER => state.order = Some(OrderId::new(value.into_owned())),
                PARAM_CHECKOUT => state.checkout = Some(CheckoutId::new(value.into_owned())),
                PARAM_REDIRECT_STATUS => state.redirect_status = Some(value.into_owned()),
                PARAM_PROCESSING => state.processing_payment = value != "false",
                "payment_intent" => state.payment_intent = Some(value.into_owned()),
                "payment_intent_client_secret" => {
                    state.payment_intent_client_secret = Some(value.into_owned())
                }
                _ => {}
            }
        }
        state
    }

    /// True when the gateway reported a successful redirect outcome.
    pub fn redirect_succeeded(&self) -> bool {
        self.redirect_status.as_deref() == Some(REDIRECT_SUCCEEDED)
    }

    /// True when the page was (re)loaded mid-completion: a processing marker
    /// is present along with the checkout id the attempt was made for.
    pub fn pending_completion(&self) -> bool {
        self.processing_payment && self.checkout.is_some()
    }
}

fn is_consumed_param(key: &str) -> bool {
    matches!(
        key,
        PARAM_ORDER | PARAM_CHECKOUT | PARAM_REDIRECT_STATUS | PARAM_PROCESSING
    ) || GATEWAY_PARAMS.contains(&key)
}

/// Rewrites `base` to reference the confirmed order: sets `order=<id>` and
/// strips every checkout and payment parameter. The caller performs a full
/// navigation to the result so all dependent state is discarded.
pub fn confirmation_url(base: &Url, order_id: &OrderId) -> Url {
    let retained: Vec<(String, String)> = base
        .query_pairs()
        .filter(|(key, _)| !is_consumed_param(key))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut url = base.clone();
    url.set_query(None);
    {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in retained {
            pairs.append_pair(&key, &value);
        }
        pairs.append_pair(PARAM_ORDER, order_id.as_str());
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_full_contract() {
        let url = Url::parse(
            "https://shop.example.com/checkout?checkout=ck_1&redirect_status=succeeded&processingPayment=true&payment_intent=pi_9&payment_intent_client_secret=sec_9",
        )
        .unwrap();
        let state = UrlState::from_url(&url);
        assert_eq!(state.checkout, Some(CheckoutId::new("ck_1")));
        assert!(state.redirect_succeeded());
        assert!(state.pending_completion());
        assert_eq!(state.payment_intent.as_deref(), Some("pi_9"));
    }

    #[test]
    fn processing_marker_without_checkout_id_is_not_pending() {
        let url = Url::parse("https://shop.example.com/checkout?processingPayment=true").unwrap();
        let state = UrlState::from_url(&url);
        assert!(!state.pending_completion());
    }

    #[test]
    fn confirmation_url_strips_consumed_params() {
        let base = Url::parse(
            "https://shop.example.com/checkout?checkout=ck_1&processingPayment=true&redirect_status=succeeded&payment_intent=pi_9&payment_intent_client_secret=sec_9&channel=netherlands",
        )
        .unwrap();
        let url = confirmation_url(&base, &OrderId::new("ord_987"));

        let query = url.query().unwrap();
        assert!(query.contains("order=ord_987"));
        assert!(query.contains("channel=netherlands"));
        assert!(!query.contains("checkout="));
        assert!(!query.contains("redirect_status"));
        assert!(!query.contains("processingPayment"));
        assert!(!query.contains("payment_intent"));
    }

    #[test_case::test_case("succeeded", true; "literal succeeded")]
    #[test_case::test_case("failed", false; "failed status")]
    #[test_case::test_case("Succeeded", false; "case sensitive")]
    #[test_case::test_case("success", false; "other spellings")]
    fn only_literal_succeeded_counts(status: &str, expected: bool) {
        let url = Url::parse(&format!(
            "https://shop.example.com/checkout?redirect_status={}",
            status
        ))
        .unwrap();
        assert_eq!(UrlState::from_url(&url).redirect_succeeded(), expected);
    }
}
