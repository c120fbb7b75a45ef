//! Pluggable payment gateway integrations.
//!
//! Adding a payment method is registration only: map an identifier to a
//! [`PaymentGateway`] implementation. No other component is aware of which
//! gateways exist.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use tracing::{instrument, warn};

use crate::commerce::CommerceApi;
use crate::errors::CheckoutError;
use crate::models::Checkout;

/// Ephemeral, gateway-specific payment initialization payload (e.g. a client
/// secret or transaction token). Owned exclusively by the caller for the
/// current attempt; never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct GatewaySession {
    pub gateway_id: String,
    pub data: Value,
}

/// One external payment-processing integration.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn id(&self) -> &str;

    /// Exchanges checkout id + gateway id for the gateway-specific session
    /// payload that the storefront feeds into the processor's hosted flow.
    async fn initialize(&self, checkout: &Checkout) -> Result<GatewaySession, CheckoutError>;
}

/// Card processor with a hosted confirmation/redirect flow. The backend's
/// transaction-initialize mutation returns a client secret which the
/// processor SDK exchanges for its hosted UI; the user returns with
/// `payment_intent` / `redirect_status` query parameters.
pub struct CardRedirectGateway {
    api: Arc<dyn CommerceApi>,
    id: String,
}

impl CardRedirectGateway {
    pub fn new(api: Arc<dyn CommerceApi>, id: impl Into<String>) -> Self {
        Self { api, id: id.into() }
    }
}

#[async_trait]
impl PaymentGateway for CardRedirectGateway {
    fn id(&self) -> &str {
        &self.id
    }

    #[instrument(skip(self, checkout), fields(checkout_id = %checkout.id, gateway = %self.id))]
    async fn initialize(&self, checkout: &Checkout) -> Result<GatewaySession, CheckoutError> {
        let data = self
            .api
            .transaction_initialize(&checkout.id, &self.id)
            .await?;
        // A session without a client secret cannot open the hosted UI.
        if data.get("paymentIntent").and_then(|pi| pi.get("clientSecret")).is_none()
            && data.get("clientSecret").is_none()
        {
            return Err(CheckoutError::PaymentFailed(
                "gateway session carried no client secret".to_string(),
            ));
        }
        Ok(GatewaySession {
            gateway_id: self.id.clone(),
            data,
        })
    }
}

/// Development gateway: passes the backend payload through untouched.
pub struct DummyGateway {
    api: Arc<dyn CommerceApi>,
    id: String,
}

impl DummyGateway {
    pub fn new(api: Arc<dyn CommerceApi>, id: impl Into<String>) -> Self {
        Self { api, id: id.into() }
    }
}

#[async_trait]
impl PaymentGateway for DummyGateway {
    fn id(&self) -> &str {
        &self.id
    }

    async fn initialize(&self, checkout: &Checkout) -> Result<GatewaySession, CheckoutError> {
        let data = self
            .api
            .transaction_initialize(&checkout.id, &self.id)
            .await?;
        Ok(GatewaySession {
            gateway_id: self.id.clone(),
            data,
        })
    }
}

/// Identifier → gateway mapping.
#[derive(Clone, Default)]
pub struct GatewayRegistry {
    gateways: Arc<DashMap<String, Arc<dyn PaymentGateway>>>,
}

impl GatewayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, gateway: Arc<dyn PaymentGateway>) {
        self.gateways.insert(gateway.id().to_string(), gateway);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn PaymentGateway>> {
        self.gateways.get(id).map(|entry| entry.value().clone())
    }

    pub fn ids(&self) -> Vec<String> {
        self.gateways.iter().map(|e| e.key().clone()).collect()
    }

    /// Initializes a payment session with the selected gateway. Only that
    /// gateway is touched; failures surface as a generic, retryable
    /// `PaymentFailed` and leave the checkout usable.
    #[instrument(skip(self, checkout), fields(checkout_id = %checkout.id))]
    pub async fn initialize(
        &self,
        gateway_id: &str,
        checkout: &Checkout,
    ) -> Result<GatewaySession, CheckoutError> {
        if checkout.is_empty() {
            return Err(CheckoutError::InvalidOperation(
                "Checkout is empty".to_string(),
            ));
        }
        let gateway = self.get(gateway_id).ok_or_else(|| {
            CheckoutError::NotFound(format!("Payment gateway {} not registered", gateway_id))
        })?;
        gateway.initialize(checkout).await.map_err(|err| {
            warn!(gateway = gateway_id, error = %err, "gateway initialization failed");
            CheckoutError::PaymentFailed(
                "Payment could not be initialized, please try again".to_string(),
            )
        })
    }
}
