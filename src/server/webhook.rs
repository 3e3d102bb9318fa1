//! Notification endpoint handler.
//!
//! Verifies the delivery signature, decodes the body, and dispatches it
//! through the current handler set before responding. The platform's
//! delivery is only acknowledged once every handler has run.
//!
//! Handlers are synchronous and may block, so dispatch runs on tokio's
//! blocking pool rather than on a runtime worker.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tokio::task::JoinError;
use tracing::{debug, info, warn};

use super::AppState;
use crate::webhooks::{
    DispatchError, ParseError, SIGNATURE_HEADER, SignatureError, parse_notification,
    verify_signature,
};

/// Errors that can occur when processing a delivery.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Signature missing, malformed, or wrong.
    #[error("invalid signature: {0}")]
    InvalidSignature(#[from] SignatureError),

    /// Signature validation is on but no secret was configured.
    #[error("signature validation enabled without an app secret")]
    MissingAppSecret,

    /// The body could not be decoded.
    #[error("invalid payload: {0}")]
    Parse(#[from] ParseError),

    /// The error policy aborted dispatch.
    #[error("dispatch aborted: {0}")]
    Dispatch(#[from] DispatchError),

    /// A handler panicked.
    #[error("dispatch task failed: {0}")]
    DispatchTask(#[from] JoinError),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebhookError::InvalidSignature(_) => StatusCode::BAD_REQUEST,
            WebhookError::MissingAppSecret => StatusCode::INTERNAL_SERVER_ERROR,
            WebhookError::Parse(_) => StatusCode::INTERNAL_SERVER_ERROR,
            WebhookError::Dispatch(_) => StatusCode::INTERNAL_SERVER_ERROR,
            WebhookError::DispatchTask(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, self.to_string()).into_response()
    }
}

/// Notification handler.
///
/// # Request
///
/// - Method: POST
/// - Headers: `X-Hub-Signature-256` (when signature validation is enabled)
/// - Body: JSON notification
///
/// # Response
///
/// - 200 OK: Delivery dispatched (individual handler failures the error
///   policy continued past still count as success)
/// - 400 Bad Request: Signature missing or invalid
/// - 500 Internal Server Error: Undecodable body, dispatch aborted, or a
///   handler panicked
pub async fn webhook_handler(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, WebhookError> {
    if app_state.validate_signature() {
        let secret = app_state
            .app_secret()
            .ok_or(WebhookError::MissingAppSecret)?;
        let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());

        if let Err(e) = verify_signature(&body, signature, secret) {
            warn!(error = %e, "Rejected webhook delivery");
            return Err(e.into());
        }
    }

    let notification = parse_notification(&body).inspect_err(|e| {
        warn!(error = %e, bytes = body.len(), "Failed to decode webhook delivery");
    })?;

    if !notification.is_whatsapp_business_account() {
        info!(object = %notification.object, "Unexpected notification object");
    }

    let changes = notification.change_count();
    let handlers = app_state.handlers().await;
    let outcome = tokio::task::spawn_blocking(move || handlers.dispatch(&notification))
        .await
        .inspect_err(|e| warn!(error = %e, "Dispatch task failed"))?;

    match outcome {
        Ok(summary) => {
            debug!(
                changes,
                invoked = summary.invoked,
                unhandled = summary.unhandled,
                ignored_changes = summary.ignored_changes,
                suppressed_errors = summary.suppressed_errors,
                "Webhook delivery dispatched"
            );
            Ok(StatusCode::OK)
        }
        Err(e) => {
            info!(error = %e, "Webhook delivery aborted by error policy");
            Err(e.into())
        }
    }
}
