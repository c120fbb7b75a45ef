use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use url::Url;

use crate::errors::CheckoutError;
use crate::services::identity::CookieIdentityStore;
use crate::{ApiResponse, AppState};

pub mod checkout;
pub mod orders;
pub mod session;

/// Assembles the full route tree.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health))
        .nest("/checkout", checkout::checkout_routes())
        .nest("/orders", orders::order_routes())
        .nest("/session", session::session_routes())
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

pub(crate) fn success_response<T: serde::Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(ApiResponse::ok(data))).into_response()
}

/// Serializes `data`, attaches the cookie mutations accumulated on `identity`,
/// and returns the response.
pub(crate) fn success_with_cookies<T: serde::Serialize>(
    data: T,
    identity: &CookieIdentityStore,
) -> Response {
    let mut response = success_response(data);
    identity.apply_to(response.headers_mut());
    response
}

/// 303 redirect carrying the accumulated cookie mutations. A server-issued
/// redirect forces the browser through a full navigation, discarding all
/// dependent client state.
pub(crate) fn redirect_with_cookies(target: &Url, identity: &CookieIdentityStore) -> Response {
    let mut response = (
        StatusCode::SEE_OTHER,
        [(axum::http::header::LOCATION, target.as_str().to_string())],
    )
        .into_response();
    identity.apply_to(response.headers_mut());
    response
}

/// Reconstructs the absolute request URL from the configured storefront base
/// and the raw query string, for query-parameter parsing and rewriting.
pub(crate) fn request_url(
    base_url: &str,
    query: Option<&str>,
) -> Result<Url, CheckoutError> {
    let mut url = Url::parse(base_url)
        .map_err(|e| CheckoutError::ConfigError(format!("invalid storefront base URL: {}", e)))?;
    url.set_path("/checkout");
    url.set_query(query);
    Ok(url)
}
