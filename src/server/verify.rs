//! Subscription handshake endpoint.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tracing::{info, warn};

use super::AppState;
use crate::webhooks::verify_subscription;

/// Query parameters of the handshake request.
#[derive(Debug, Default, Deserialize)]
pub struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,

    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,

    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// Handshake handler.
///
/// # Response
///
/// - 200 OK with the challenge as a plain-text body
/// - 400 Bad Request with an empty body otherwise
///
/// # Example
///
/// ```ignore
/// GET /webhook?hub.mode=subscribe&hub.challenge=1158201444&hub.verify_token=meatyhamhock HTTP/1.1
///
/// HTTP/1.1 200 OK
///
/// 1158201444
/// ```
pub async fn verify_handler(
    State(app_state): State<AppState>,
    Query(query): Query<VerifyQuery>,
) -> Response {
    let result = verify_subscription(
        query.mode.as_deref(),
        query.verify_token.as_deref(),
        query.challenge.as_deref(),
        app_state.verify_token(),
    );

    match result {
        Ok(challenge) => {
            info!("Webhook subscription verified");
            (StatusCode::OK, challenge).into_response()
        }
        Err(e) => {
            warn!(error = %e, "Rejected subscription handshake");
            StatusCode::BAD_REQUEST.into_response()
        }
    }
}
