use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Error body returned by the HTTP surface.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Bad Request")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// Additional error details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// ISO 8601 timestamp when the error occurred
    pub timestamp: String,
}

/// Errors produced by the checkout orchestration services.
///
/// Expected absence (checkout or order not found by id) is *not* represented
/// here; those cases resolve to `Ok(None)` and are handled by branching in
/// the view router. Only genuine failures become a `CheckoutError`.
#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Payment failed: {0}")]
    PaymentFailed(String),

    #[error("A checkout completion is already in progress")]
    CompletionInFlight,

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    /// Non-empty top-level `errors` array on a GraphQL response.
    #[error("Commerce backend error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<reqwest::Error> for CheckoutError {
    fn from(err: reqwest::Error) -> Self {
        CheckoutError::ExternalServiceError(err.to_string())
    }
}

impl From<serde_json::Error> for CheckoutError {
    fn from(err: serde_json::Error) -> Self {
        CheckoutError::SerializationError(err.to_string())
    }
}

impl CheckoutError {
    fn status(&self) -> StatusCode {
        match self {
            CheckoutError::NotFound(_) => StatusCode::NOT_FOUND,
            CheckoutError::ValidationError(_) | CheckoutError::InvalidOperation(_) => {
                StatusCode::BAD_REQUEST
            }
            CheckoutError::PaymentFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            CheckoutError::CompletionInFlight => StatusCode::CONFLICT,
            CheckoutError::ExternalServiceError(_) | CheckoutError::Backend(_) => {
                StatusCode::BAD_GATEWAY
            }
            CheckoutError::SerializationError(_)
            | CheckoutError::ConfigError(_)
            | CheckoutError::InternalError(_)
            | CheckoutError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for CheckoutError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorResponse {
            error: status
                .canonical_reason()
                .unwrap_or("Internal Server Error")
                .to_string(),
            message: self.to_string(),
            details: None,
            timestamp: Utc::now().to_rfc3339(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            CheckoutError::NotFound("x".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            CheckoutError::CompletionInFlight.status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            CheckoutError::Backend("boom".into()).status(),
            StatusCode::BAD_GATEWAY
        );
    }
}
