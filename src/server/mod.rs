//! HTTP server for webhook deliveries.
//!
//! This module implements the HTTP server that:
//! - Answers the subscription handshake
//! - Accepts deliveries, validates signatures, and dispatches them
//! - Provides health checks for liveness probes
//!
//! # Endpoints
//!
//! - `POST {route_path}` - Accepts deliveries (returns 200 once dispatched)
//! - `GET {route_path}` - Subscription handshake
//! - `GET /health` - Returns 200 if server is running
//!
//! `route_path` defaults to `/webhook`.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use crate::config::Config;
use crate::webhooks::Handlers;

pub mod health;
pub mod verify;
pub mod webhook;

pub use health::health_handler;
pub use verify::{VerifyQuery, verify_handler};
pub use webhook::{WebhookError, webhook_handler};

/// Endpoint settings, fixed for the life of the server.
#[derive(Clone)]
pub struct WebhookSettings {
    /// Secret for HMAC-SHA256 signature verification.
    pub app_secret: Option<Vec<u8>>,

    /// Token expected in the subscription handshake.
    pub verify_token: String,

    /// Whether deliveries must carry a valid signature.
    pub validate_signature: bool,

    /// Path serving both the handshake and deliveries.
    pub route_path: String,
}

impl From<&Config> for WebhookSettings {
    fn from(config: &Config) -> Self {
        WebhookSettings {
            app_secret: config.app_secret.as_ref().map(|s| s.as_bytes().to_vec()),
            verify_token: config.verify_token.clone(),
            validate_signature: config.validate_signature,
            route_path: config.route_path.clone(),
        }
    }
}

/// Shared application state.
///
/// This is passed to all handlers via Axum's `State` extractor. The handler
/// set is held as an `Arc` snapshot: each delivery dispatches through the
/// snapshot current when it arrived, and [`AppState::replace_handlers`] swaps
/// in a new one without disturbing deliveries already in flight.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    settings: WebhookSettings,
    handlers: RwLock<Arc<Handlers>>,
}

impl AppState {
    pub fn new(settings: WebhookSettings, handlers: Handlers) -> Self {
        AppState {
            inner: Arc::new(AppStateInner {
                settings,
                handlers: RwLock::new(Arc::new(handlers)),
            }),
        }
    }

    pub fn from_config(config: &Config, handlers: Handlers) -> Self {
        AppState::new(WebhookSettings::from(config), handlers)
    }

    /// The current handler set.
    pub async fn handlers(&self) -> Arc<Handlers> {
        self.inner.handlers.read().await.clone()
    }

    /// Swaps in a new handler set, returning the previous one.
    pub async fn replace_handlers(&self, handlers: Handlers) -> Arc<Handlers> {
        let mut current = self.inner.handlers.write().await;
        std::mem::replace(&mut *current, Arc::new(handlers))
    }

    pub fn app_secret(&self) -> Option<&[u8]> {
        self.inner.settings.app_secret.as_deref()
    }

    pub fn verify_token(&self) -> &str {
        &self.inner.settings.verify_token
    }

    pub fn validate_signature(&self) -> bool {
        self.inner.settings.validate_signature
    }

    pub fn route_path(&self) -> &str {
        &self.inner.settings.route_path
    }
}

/// Builds the axum Router with all endpoints.
pub fn build_router(app_state: AppState) -> axum::Router {
    use axum::routing::{get, post};

    let route_path = app_state.route_path().to_string();
    axum::Router::new()
        .route(&route_path, post(webhook_handler).get(verify_handler))
        .route("/health", get(health_handler))
        .with_state(app_state)
}

/// Binds the configured address and serves until Ctrl-C.
pub async fn serve(config: &Config, handlers: Handlers) -> anyhow::Result<()> {
    let addr = config.socket_addr()?;
    let app = build_router(AppState::from_config(config, handlers));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        addr = %addr,
        route_path = %config.route_path,
        validate_signature = config.validate_signature,
        "Listening for webhook deliveries"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutting down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> WebhookSettings {
        WebhookSettings {
            app_secret: Some(b"test-secret".to_vec()),
            verify_token: "verify-me".to_string(),
            validate_signature: true,
            route_path: "/webhook".to_string(),
        }
    }

    #[test]
    fn app_state_accessors_work() {
        let state = AppState::new(settings(), Handlers::new());

        assert_eq!(state.app_secret(), Some(&b"test-secret"[..]));
        assert_eq!(state.verify_token(), "verify-me");
        assert!(state.validate_signature());
        assert_eq!(state.route_path(), "/webhook");
    }

    #[test]
    fn settings_from_config() {
        let config = Config::from_iter([
            ("WEBHOOK_VERIFY_TOKEN".to_string(), "tok".to_string()),
            ("WEBHOOK_APP_SECRET".to_string(), "shh".to_string()),
        ])
        .unwrap();

        let settings = WebhookSettings::from(&config);
        assert_eq!(settings.app_secret.as_deref(), Some(&b"shh"[..]));
        assert_eq!(settings.verify_token, "tok");
    }

    #[tokio::test]
    async fn replace_handlers_swaps_snapshot() {
        let state = AppState::new(settings(), Handlers::new());
        let before = state.handlers().await;

        let mut next = Handlers::new();
        next.on_text(|_, _| Ok(()));
        let previous = state.replace_handlers(next).await;

        assert!(Arc::ptr_eq(&before, &previous));
        assert!(before.registered_slots().is_empty());
        assert_eq!(state.handlers().await.registered_slots(), vec!["text"]);
    }
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    use crate::test_utils::{
        business_change, message, messages_change, notification, recording_handlers,
        text_message, to_bytes,
    };
    use crate::webhooks::{ErrorPolicy, compute_signature, format_signature_header};

    const SECRET: &[u8] = b"test-secret";
    const VERIFY_TOKEN: &str = "verify-me";

    fn test_app_state(handlers: Handlers) -> AppState {
        AppState::new(
            WebhookSettings {
                app_secret: Some(SECRET.to_vec()),
                verify_token: VERIFY_TOKEN.to_string(),
                validate_signature: true,
                route_path: "/webhook".to_string(),
            },
            handlers,
        )
    }

    /// Creates a delivery signed with `secret`.
    fn signed_request(secret: &[u8], body: &serde_json::Value) -> Request<Body> {
        let body_bytes = to_bytes(body);
        let signature_header = format_signature_header(&compute_signature(&body_bytes, secret));

        Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("content-type", "application/json")
            .header("x-hub-signature-256", signature_header)
            .body(Body::from(body_bytes))
            .unwrap()
    }

    fn handshake_request(query: &str) -> Request<Body> {
        Request::builder()
            .uri(format!("/webhook?{}", query))
            .body(Body::empty())
            .unwrap()
    }

    async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
        response
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec()
    }

    // ─── Health endpoint ───

    #[tokio::test]
    async fn health_returns_200() {
        let app = build_router(test_app_state(Handlers::new()));

        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await, b"OK");
    }

    // ─── Handshake ───

    #[tokio::test]
    async fn handshake_echoes_challenge() {
        let app = build_router(test_app_state(Handlers::new()));

        let response = app
            .oneshot(handshake_request(
                "hub.mode=subscribe&hub.challenge=1158201444&hub.verify_token=verify-me",
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await, b"1158201444");
    }

    #[tokio::test]
    async fn handshake_wrong_token_is_400_with_empty_body() {
        let app = build_router(test_app_state(Handlers::new()));

        let response = app
            .oneshot(handshake_request(
                "hub.mode=subscribe&hub.challenge=1158201444&hub.verify_token=guess",
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_bytes(response).await.is_empty());
    }

    #[tokio::test]
    async fn handshake_missing_params_is_400() {
        let app = build_router(test_app_state(Handlers::new()));

        let response = app.oneshot(handshake_request("")).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_bytes(response).await.is_empty());
    }

    // ─── Deliveries ───

    #[tokio::test]
    async fn valid_delivery_is_dispatched() {
        let (handlers, recorder) = recording_handlers();
        let app = build_router(test_app_state(handlers));

        let body = notification(vec![messages_change(vec![text_message("wamid.1", "hi")])]);
        let response = app.oneshot(signed_request(SECRET, &body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(recorder.calls(), vec!["text"]);
    }

    #[tokio::test]
    async fn malformed_message_does_not_fail_the_delivery() {
        let (handlers, recorder) = recording_handlers();
        let app = build_router(test_app_state(handlers));

        let body = notification(vec![messages_change(vec![
            text_message("wamid.1", "before"),
            message("wamid.2", "image", serde_json::Value::Null),
            text_message("wamid.3", "after"),
        ])]);
        let response = app.oneshot(signed_request(SECRET, &body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(recorder.calls(), vec!["text", "text"]);
    }

    #[tokio::test]
    async fn wrong_secret_is_400_and_not_dispatched() {
        let (handlers, recorder) = recording_handlers();
        let app = build_router(test_app_state(handlers));

        let body = notification(vec![messages_change(vec![text_message("wamid.1", "hi")])]);
        let response = app
            .oneshot(signed_request(b"wrong-secret", &body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(recorder.calls().is_empty());
    }

    #[tokio::test]
    async fn missing_signature_is_400() {
        let app = build_router(test_app_state(Handlers::new()));

        let request = Request::builder()
            .method("POST")
            .uri("/webhook")
            .body(Body::from(to_bytes(&notification(vec![]))))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unsigned_delivery_accepted_when_validation_disabled() {
        let (handlers, recorder) = recording_handlers();
        let state = AppState::new(
            WebhookSettings {
                app_secret: None,
                verify_token: VERIFY_TOKEN.to_string(),
                validate_signature: false,
                route_path: "/hooks/whatsapp".to_string(),
            },
            handlers,
        );
        let app = build_router(state);

        let body = notification(vec![business_change(
            "account_review_update",
            json!({"decision": "APPROVED"}),
        )]);
        let request = Request::builder()
            .method("POST")
            .uri("/hooks/whatsapp")
            .body(Body::from(to_bytes(&body)))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(recorder.calls(), vec!["account_review"]);
    }

    #[tokio::test]
    async fn undecodable_body_is_500() {
        let app = build_router(test_app_state(Handlers::new()));

        let body = br#"{"object": "whatsapp_business_account", "entry": "nope"}"#;
        let signature_header = format_signature_header(&compute_signature(body, SECRET));
        let request = Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("x-hub-signature-256", signature_header)
            .body(Body::from(&body[..]))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    fn two_review_changes() -> serde_json::Value {
        notification(vec![
            business_change("account_review_update", json!({"decision": "fail"})),
            business_change("account_review_update", json!({"decision": "APPROVED"})),
        ])
    }

    fn failing_review_handlers(calls: Arc<AtomicUsize>) -> Handlers {
        let mut handlers = Handlers::new();
        handlers.on_account_review(move |_, update| {
            calls.fetch_add(1, Ordering::SeqCst);
            if update.decision == "fail" {
                anyhow::bail!("review handler broke");
            }
            Ok(())
        });
        handlers
    }

    #[tokio::test]
    async fn continue_policy_still_returns_200() {
        let calls = Arc::new(AtomicUsize::new(0));
        let app = build_router(test_app_state(failing_review_handlers(calls.clone())));

        let response = app
            .oneshot(signed_request(SECRET, &two_review_changes()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn abort_policy_returns_500() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut handlers = failing_review_handlers(calls.clone());
        handlers.set_error_policy(ErrorPolicy::abort_on_error());
        let app = build_router(test_app_state(handlers));

        let response = app
            .oneshot(signed_request(SECRET, &two_review_changes()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn replaced_handlers_serve_next_delivery() {
        let state = test_app_state(Handlers::new());
        let body = notification(vec![messages_change(vec![text_message("wamid.1", "hi")])]);

        let response = build_router(state.clone())
            .oneshot(signed_request(SECRET, &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let (handlers, recorder) = recording_handlers();
        state.replace_handlers(handlers).await;

        let response = build_router(state)
            .oneshot(signed_request(SECRET, &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(recorder.calls(), vec!["text"]);
    }
}
