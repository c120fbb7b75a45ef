use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use axum::routing::post;
use axum::Router;
use serde::Deserialize;
use serde_json::json;

use crate::errors::CheckoutError;
use crate::services::identity::CookieIdentityStore;
use crate::AppState;

use super::success_with_cookies;

/// Creates the router for session endpoints
pub fn session_routes() -> Router<Arc<AppState>> {
    Router::new().route("/clear", post(clear_session))
}

#[derive(Debug, Deserialize)]
struct ClearSessionQuery {
    /// Restrict clearing to one channel (explicit cart-clear); otherwise
    /// every checkout cookie goes.
    channel: Option<String>,
}

async fn clear_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ClearSessionQuery>,
) -> Result<Response, CheckoutError> {
    let identity =
        CookieIdentityStore::from_headers(&headers, state.config.cookie_max_age());
    match &query.channel {
        Some(channel) => state.cleanup.clear_channel(&identity, channel).await,
        None => state.cleanup.clear_all(&identity).await,
    }
    Ok(success_with_cookies(json!({ "cleared": true }), &identity))
}
