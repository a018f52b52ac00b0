use std::any::Any;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    BoxError, Json,
};
use serde::Serialize;

use crate::kaiten::KaitenError;

pub type Result<T> = std::result::Result<T, WebhookError>;

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("Malformed request body: {0}")]
    MalformedRequest(String),

    #[error("Missing required configuration: {}", .0.join(", "))]
    ConfigurationError(Vec<&'static str>),

    #[error("Kaiten request failed: {0}")]
    DownstreamError(#[from] KaitenError),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Body of every non-2xx response the webhook route produces.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub detail: String,
}

impl WebhookError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            WebhookError::ConfigurationError(_)
            | WebhookError::DownstreamError(_)
            | WebhookError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to hand back to the caller. Unexpected failures only
    /// show up in the logs.
    pub fn detail(&self) -> String {
        match self {
            WebhookError::InternalError(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        match &self {
            WebhookError::MalformedRequest(_) => {
                tracing::info!("Client error: {}", self);
            }
            WebhookError::DownstreamError(e) => {
                tracing::warn!("Downstream error: {:?}", e);
            }
            WebhookError::ConfigurationError(_) | WebhookError::InternalError(_) => {
                tracing::error!("Server error: {:?}", self);
            }
        }

        let body = ErrorResponse {
            detail: self.detail(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

/// Turns a panic caught by `CatchPanicLayer` into the same JSON error shape
/// as every other failure.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };

    WebhookError::InternalError(anyhow::anyhow!("handler panicked: {message}")).into_response()
}

/// Error handler for the request-level timeout layer.
pub async fn handle_timeout(err: BoxError) -> Response {
    if err.is::<tower::timeout::error::Elapsed>() {
        tracing::warn!("Request exceeded the request timeout");
        let body = ErrorResponse {
            detail: "Request timed out".to_string(),
        };
        return (StatusCode::REQUEST_TIMEOUT, Json(body)).into_response();
    }

    WebhookError::InternalError(anyhow::anyhow!("unhandled layer error: {err}")).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_variants_to_status_codes() {
        assert_eq!(
            WebhookError::MalformedRequest("eof".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            WebhookError::ConfigurationError(vec!["KAITEN_API_TOKEN"]).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            WebhookError::DownstreamError(KaitenError::Timeout).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            WebhookError::InternalError(anyhow::anyhow!("boom")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn configuration_error_lists_missing_names() {
        let err = WebhookError::ConfigurationError(vec!["KAITEN_API_URL", "KAITEN_BOARD_ID"]);
        assert_eq!(
            err.detail(),
            "Missing required configuration: KAITEN_API_URL, KAITEN_BOARD_ID"
        );
    }

    #[test]
    fn internal_error_detail_is_generic() {
        let err = WebhookError::InternalError(anyhow::anyhow!("db password is hunter2"));
        assert!(!err.detail().contains("hunter2"));
        assert!(err.to_string().contains("hunter2"));
    }

    #[tokio::test]
    async fn elapsed_timeout_becomes_request_timeout_response() {
        let response = handle_timeout(Box::new(tower::timeout::error::Elapsed::new())).await;
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);

        let response = handle_timeout("broken pipe".into()).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn panic_payload_becomes_internal_error_response() {
        let response = handle_panic(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
