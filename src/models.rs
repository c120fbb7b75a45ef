use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Opaque, server-assigned checkout identifier. The client never inspects it;
/// it only round-trips through cookies and query parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckoutId(pub String);

impl CheckoutId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CheckoutId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque order identifier, assigned by the backend on checkout completion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl OrderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Amount with its ISO 4217 currency code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    pub amount: Decimal,
    pub currency: String,
}

impl Money {
    pub fn new(amount: Decimal, currency: impl Into<String>) -> Self {
        Self {
            amount,
            currency: currency.into(),
        }
    }

    pub fn zero(currency: impl Into<String>) -> Self {
        Self::new(Decimal::ZERO, currency)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

/// A single line of an in-progress checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutLine {
    pub id: String,
    pub variant_id: String,
    pub quantity: i32,
    pub total: Money,
}

/// Server-owned, mutable draft order. The client holds only the identifier
/// (in a cookie) plus a locally cached, revalidatable copy of this snapshot.
///
/// The backend may expire or purge a checkout at any time independent of
/// client awareness; callers must treat absence as an expected outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkout {
    pub id: CheckoutId,
    /// Sales-region scope under which catalog, pricing, and identifiers are
    /// partitioned.
    pub channel: String,
    pub locale: String,
    pub lines: Vec<CheckoutLine>,
    pub total: Money,
}

impl Checkout {
    /// An empty checkout must never proceed to payment.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Line snapshot on a finalized order, independent of the now-gone checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub variant_id: String,
    pub product_name: String,
    pub quantity: i32,
    pub total: Money,
}

/// Finalized, immutable purchase record. Created server-side as a side effect
/// of checkout completion; the client never constructs one. It may not be
/// queryable immediately after completion (asynchronous materialization), so
/// callers poll until it appears.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub number: String,
    pub email: Option<String>,
    pub total: Money,
    pub discount: Option<Money>,
    pub lines: Vec<OrderLine>,
    pub created_at: DateTime<Utc>,
}
