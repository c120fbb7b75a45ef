use std::sync::Arc;

use axum::extract::{Path, RawQuery, State};
use axum::http::HeaderMap;
use axum::response::Response;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use url::Url;
use validator::Validate;

use crate::commerce::FetchPolicy;
use crate::errors::CheckoutError;
use crate::events::Event;
use crate::models::{Checkout, CheckoutId, OrderId};
use crate::services::checkout_data::CheckoutFetch;
use crate::services::completion::CompletionOutcome;
use crate::services::gateways::GatewaySession;
use crate::services::identity::{CheckoutIdentityStore, CookieIdentityStore};
use crate::services::order_poll::OrderFetch;
use crate::services::screen::{select_screen, Screen};
use crate::services::url_state::UrlState;
use crate::AppState;

use super::{redirect_with_cookies, request_url, success_with_cookies};

/// Creates the router for checkout endpoints
pub fn checkout_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/view", get(resolve_view))
        .route("/complete", post(complete_checkout))
        .route("/lines", post(add_line))
        .route("/lines/:line_id", delete(remove_line))
        .route("/payment/:gateway_id", post(initialize_payment))
}

#[derive(Debug, Serialize)]
struct ViewResponse {
    #[serde(flatten)]
    screen: Screen,
    #[serde(skip_serializing_if = "Option::is_none")]
    checkout: Option<Checkout>,
}

/// Resolves which top-level screen the storefront should render for the
/// current URL and cookie state. Runs post-redirect recovery first when the
/// URL carries a processing marker.
async fn resolve_view(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Result<Response, CheckoutError> {
    let url = request_url(&state.config.storefront_base_url, query.as_deref())?;
    let url_state = UrlState::from_url(&url);
    let identity =
        CookieIdentityStore::from_headers(&headers, state.config.cookie_max_age());

    if url_state.pending_completion() {
        match state.completion.recover(&url_state, &url, &identity).await {
            CompletionOutcome::Completed { redirect, .. } => {
                return Ok(redirect_with_cookies(&redirect, &identity));
            }
            CompletionOutcome::SoftSuccess => {
                let body = ViewResponse {
                    screen: Screen::PaymentSuccessful,
                    checkout: None,
                };
                return Ok(success_with_cookies(body, &identity));
            }
            // Recovery declined to run (e.g. a completion is already in
            // flight); fall through to normal view resolution.
            CompletionOutcome::Failed { .. } => {}
        }
    }

    let channel = &state.config.default_channel;
    let checkout_id = url_state
        .checkout
        .clone()
        .or_else(|| identity.get(channel));

    // Checkout state mutates rapidly around payment; any redirect or order
    // marker on the URL forces a cache-bypassing read.
    let policy = if url_state.order.is_some()
        || url_state.redirect_status.is_some()
        || url_state.processing_payment
    {
        FetchPolicy::NetworkOnly
    } else {
        FetchPolicy::CacheFirst
    };

    let checkout = match &checkout_id {
        Some(id) => {
            state
                .checkout_data
                .fetch(id, &state.config.default_locale, policy)
                .await?
        }
        None => CheckoutFetch::resolved(None),
    };

    let order = match &url_state.order {
        Some(id) => OrderFetch {
            order: state.api.order_by_id(id).await?,
            loading: false,
        },
        None => OrderFetch::default(),
    };

    // A checkout referenced only by URL gets persisted under the channel it
    // actually belongs to, so a plain revisit finds it again.
    if let Some(resolved) = &checkout.checkout {
        if identity.get(&resolved.channel).is_none() {
            identity.save(&resolved.channel, &resolved.id);
        }
    }

    let screen = select_screen(&url_state, &checkout, &order);
    let body = ViewResponse {
        checkout: match &screen {
            Screen::Checkout { .. } => checkout.checkout.clone(),
            _ => None,
        },
        screen,
    };
    Ok(success_with_cookies(body, &identity))
}

#[derive(Debug, Deserialize)]
struct CompleteCheckoutRequest {
    checkout_id: Option<String>,
    channel: Option<String>,
    /// URL the confirmation redirect is derived from; defaults to the
    /// storefront base.
    return_to: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
enum CompletionResponse {
    Completed { order_id: OrderId, redirect: String },
    PaymentReceived,
    Failed { message: String },
}

/// Exchanges the checkout for an order (direct submission path).
async fn complete_checkout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<CompleteCheckoutRequest>,
) -> Result<Response, CheckoutError> {
    let identity =
        CookieIdentityStore::from_headers(&headers, state.config.cookie_max_age());
    let channel = payload
        .channel
        .unwrap_or_else(|| state.config.default_channel.clone());
    let checkout_id = payload
        .checkout_id
        .map(CheckoutId::new)
        .or_else(|| identity.get(&channel));

    let return_to = match payload.return_to.as_deref() {
        Some(raw) => Url::parse(raw)
            .map_err(|e| CheckoutError::ValidationError(format!("invalid return URL: {}", e)))?,
        None => request_url(&state.config.storefront_base_url, None)?,
    };

    let outcome = state
        .completion
        .submit(checkout_id.as_ref(), &return_to, &identity)
        .await;

    let body = match outcome {
        CompletionOutcome::Completed { order_id, redirect } => CompletionResponse::Completed {
            order_id,
            redirect: redirect.to_string(),
        },
        CompletionOutcome::SoftSuccess => CompletionResponse::PaymentReceived,
        CompletionOutcome::Failed { message } => CompletionResponse::Failed { message },
    };
    Ok(success_with_cookies(body, &identity))
}

#[derive(Debug, Deserialize, Validate)]
struct AddLineRequest {
    #[validate(length(min = 1))]
    variant_id: String,
    #[validate(range(min = 1))]
    quantity: i32,
    channel: Option<String>,
}

/// Adds a line to the channel's checkout, creating the checkout (and its
/// identity cookie) on the first add.
async fn add_line(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<AddLineRequest>,
) -> Result<Response, CheckoutError> {
    payload
        .validate()
        .map_err(|e| CheckoutError::ValidationError(e.to_string()))?;

    let identity =
        CookieIdentityStore::from_headers(&headers, state.config.cookie_max_age());
    let channel = payload
        .channel
        .unwrap_or_else(|| state.config.default_channel.clone());

    let checkout = match identity.get(&channel) {
        Some(id) => {
            let checkout = state
                .api
                .checkout_lines_add(&id, &payload.variant_id, payload.quantity)
                .await?;
            state.checkout_data.invalidate(&id);
            checkout
        }
        None => {
            let checkout = state
                .api
                .checkout_create(
                    &channel,
                    &state.config.default_locale,
                    &payload.variant_id,
                    payload.quantity,
                )
                .await?;
            identity.save(&channel, &checkout.id);
            state
                .event_sender
                .send(Event::CheckoutStarted {
                    checkout_id: checkout.id.clone(),
                    channel: channel.clone(),
                })
                .await;
            checkout
        }
    };

    Ok(success_with_cookies(checkout, &identity))
}

#[derive(Debug, Deserialize)]
struct RemoveLineQuery {
    channel: Option<String>,
}

/// Removes a line from the channel's checkout.
async fn remove_line(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(line_id): Path<String>,
    axum::extract::Query(query): axum::extract::Query<RemoveLineQuery>,
) -> Result<Response, CheckoutError> {
    let identity =
        CookieIdentityStore::from_headers(&headers, state.config.cookie_max_age());
    let channel = query
        .channel
        .unwrap_or_else(|| state.config.default_channel.clone());
    let id = identity.get(&channel).ok_or_else(|| {
        CheckoutError::NotFound(format!("No checkout for channel {}", channel))
    })?;

    let checkout = state.api.checkout_lines_delete(&id, &line_id).await?;
    state.checkout_data.invalidate(&id);
    Ok(success_with_cookies(checkout, &identity))
}

#[derive(Debug, Deserialize)]
struct InitializePaymentRequest {
    channel: Option<String>,
}

#[derive(Debug, Serialize)]
struct InitializePaymentResponse {
    session: GatewaySession,
}

/// Initializes a payment session with the selected gateway. Only the named
/// gateway is touched.
async fn initialize_payment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(gateway_id): Path<String>,
    Json(payload): Json<InitializePaymentRequest>,
) -> Result<Response, CheckoutError> {
    let identity =
        CookieIdentityStore::from_headers(&headers, state.config.cookie_max_age());
    let channel = payload
        .channel
        .unwrap_or_else(|| state.config.default_channel.clone());
    let id = identity.get(&channel).ok_or_else(|| {
        CheckoutError::NotFound(format!("No checkout for channel {}", channel))
    })?;

    let fetch = state
        .checkout_data
        .fetch(&id, &state.config.default_locale, FetchPolicy::NetworkOnly)
        .await?;
    let checkout = fetch
        .checkout
        .ok_or_else(|| CheckoutError::NotFound(format!("Checkout {} not found", id)))?;

    let session = state.gateways.initialize(&gateway_id, &checkout).await?;
    Ok(success_with_cookies(
        InitializePaymentResponse { session },
        &identity,
    ))
}
