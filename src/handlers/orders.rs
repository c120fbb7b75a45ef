use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;

use crate::errors::CheckoutError;
use crate::events::Event;
use crate::models::OrderId;
use crate::services::order_poll::OrderFetch;
use crate::AppState;

use super::success_response;

/// Creates the router for order endpoints
pub fn order_routes() -> Router<Arc<AppState>> {
    Router::new().route("/:order_id", get(get_order))
}

#[derive(Debug, Deserialize)]
struct OrderQuery {
    /// When set, the request blocks until the order materializes. Dropping
    /// the connection drops the poll handle and aborts the timer.
    #[serde(default)]
    wait: bool,
}

/// Fetches an order. A missing order is not an error: completion and order
/// materialization race, so the confirmation view either polls (`wait=true`)
/// or re-requests on its own cadence.
async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<String>,
    Query(query): Query<OrderQuery>,
) -> Result<Response, CheckoutError> {
    let order_id = OrderId::new(order_id);

    if query.wait {
        let mut handle = state.order_poller.start(order_id.clone());
        let order = handle.wait().await.ok_or_else(|| {
            CheckoutError::InternalError("order polling ended unexpectedly".to_string())
        })?;
        state.event_sender.send(Event::OrderConfirmed(order_id)).await;
        return Ok(success_response(OrderFetch {
            order: Some(order),
            loading: false,
        }));
    }

    let order = state.api.order_by_id(&order_id).await?;
    let loading = order.is_none();
    if !loading {
        state.event_sender.send(Event::OrderConfirmed(order_id)).await;
    }
    Ok(success_response(OrderFetch { order, loading }))
}
