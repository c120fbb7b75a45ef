//! Boundary to the headless commerce GraphQL backend.
//!
//! Everything the orchestration services need from the backend goes through
//! [`CommerceApi`], one method per backend operation. Tests substitute an
//! in-memory implementation; production wires [`GraphqlCommerceApi`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::CheckoutError;
use crate::models::{Checkout, CheckoutId, Order, OrderId};

pub mod graphql;

pub use graphql::GraphqlCommerceApi;

/// Cache behavior for a backend read.
///
/// Checkout state mutates rapidly near the point of payment; a stale read at
/// that moment causes incorrect not-found determinations, so the completion
/// and confirmation paths must use [`FetchPolicy::NetworkOnly`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchPolicy {
    #[default]
    CacheFirst,
    NetworkOnly,
}

/// Field-level error reported by a mutation alongside its payload. These are
/// data, not transport failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldError {
    pub field: Option<String>,
    pub code: String,
    pub message: String,
}

/// Payload of the checkout-complete mutation: an order, a list of field
/// errors, or (transiently) neither.
#[derive(Debug, Clone, Default)]
pub struct CompletionData {
    pub order: Option<Order>,
    pub errors: Vec<FieldError>,
}

#[async_trait]
pub trait CommerceApi: Send + Sync {
    /// Resolves the current server-side checkout state. `Ok(None)` when the
    /// identifier is unknown or expired server-side, an expected outcome;
    /// never an error.
    async fn checkout_by_id(
        &self,
        id: &CheckoutId,
        locale: &str,
        policy: FetchPolicy,
    ) -> Result<Option<Checkout>, CheckoutError>;

    /// Creates a checkout for a channel with its first line.
    async fn checkout_create(
        &self,
        channel: &str,
        locale: &str,
        variant_id: &str,
        quantity: i32,
    ) -> Result<Checkout, CheckoutError>;

    /// Adds a line to an existing checkout.
    async fn checkout_lines_add(
        &self,
        id: &CheckoutId,
        variant_id: &str,
        quantity: i32,
    ) -> Result<Checkout, CheckoutError>;

    /// Removes a line from an existing checkout.
    async fn checkout_lines_delete(
        &self,
        id: &CheckoutId,
        line_id: &str,
    ) -> Result<Checkout, CheckoutError>;

    /// Exchanges the checkout for an order. Field errors arrive in the
    /// returned [`CompletionData`]; transport failures as `Err`.
    async fn checkout_complete(&self, id: &CheckoutId) -> Result<CompletionData, CheckoutError>;

    /// Fetches an order by id, bypassing all caching layers. `Ok(None)` while
    /// the order has not materialized yet.
    async fn order_by_id(&self, id: &OrderId) -> Result<Option<Order>, CheckoutError>;

    /// Initializes a payment transaction for a gateway, returning the
    /// gateway-specific opaque session payload.
    async fn transaction_initialize(
        &self,
        id: &CheckoutId,
        gateway_id: &str,
    ) -> Result<serde_json::Value, CheckoutError>;
}
