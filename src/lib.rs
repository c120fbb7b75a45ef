//! Storefront Checkout Orchestration
//!
//! Tracks an in-progress checkout across requests, drives pluggable payment
//! gateway integrations, recovers completions interrupted by external payment
//! redirects, and reconciles completed checkouts into confirmed orders.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod commerce;
pub mod config;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod models;
pub mod services;

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use crate::commerce::CommerceApi;
use crate::services::cleanup::SessionCleanup;
use crate::services::completion::CompletionOrchestrator;
use crate::services::gateways::{CardRedirectGateway, DummyGateway, GatewayRegistry};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub config: config::AppConfig,
    pub api: Arc<dyn CommerceApi>,
    pub event_sender: events::EventSender,
    pub checkout_data: services::checkout_data::CheckoutDataClient,
    pub order_poller: services::order_poll::OrderPoller,
    pub gateways: GatewayRegistry,
    pub completion: Arc<CompletionOrchestrator>,
    pub cleanup: SessionCleanup,
}

impl AppState {
    /// Wires the full service graph and the default gateway set.
    pub fn new(
        config: config::AppConfig,
        api: Arc<dyn CommerceApi>,
        event_sender: events::EventSender,
    ) -> Self {
        let checkout_data =
            services::checkout_data::CheckoutDataClient::new(api.clone(), config.checkout_cache_ttl());
        let order_poller =
            services::order_poll::OrderPoller::new(api.clone(), config.order_poll_interval());
        let cleanup = SessionCleanup::new(event_sender.clone());
        let completion = Arc::new(CompletionOrchestrator::new(
            api.clone(),
            event_sender.clone(),
            cleanup.clone(),
        ));

        let gateways = GatewayRegistry::new();
        gateways.register(Arc::new(CardRedirectGateway::new(
            api.clone(),
            "gateway.card",
        )));
        gateways.register(Arc::new(DummyGateway::new(api.clone(), "gateway.dummy")));

        Self {
            config,
            api,
            event_sender,
            checkout_data,
            order_poller,
            gateways,
            completion,
            cleanup,
        }
    }
}

// Common response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: String,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            message: Some(message.into()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}
