//! Subscription handshake.
//!
//! When a webhook URL is registered the platform sends
//! `GET ?hub.mode=subscribe&hub.challenge=<n>&hub.verify_token=<token>` and
//! expects the challenge echoed back if the token matches the one configured
//! for the app.

use thiserror::Error;

/// The only `hub.mode` the platform sends.
pub const SUBSCRIBE_MODE: &str = "subscribe";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    #[error("missing query parameter {0}")]
    MissingParameter(&'static str),

    #[error("unexpected hub.mode {0:?}")]
    WrongMode(String),

    #[error("verify token mismatch")]
    TokenMismatch,
}

/// Answers a handshake, returning the challenge to echo.
///
/// # Examples
///
/// ```
/// use whatsapp_webhooks::webhooks::{VerificationError, verify_subscription};
///
/// let challenge =
///     verify_subscription(Some("subscribe"), Some("s3cret"), Some("1158201444"), "s3cret");
/// assert_eq!(challenge.as_deref(), Ok("1158201444"));
///
/// let rejected =
///     verify_subscription(Some("subscribe"), Some("guess"), Some("1158201444"), "s3cret");
/// assert_eq!(rejected, Err(VerificationError::TokenMismatch));
/// ```
pub fn verify_subscription(
    mode: Option<&str>,
    token: Option<&str>,
    challenge: Option<&str>,
    expected_token: &str,
) -> Result<String, VerificationError> {
    let mode = mode.ok_or(VerificationError::MissingParameter("hub.mode"))?;
    let token = token.ok_or(VerificationError::MissingParameter("hub.verify_token"))?;
    let challenge = challenge.ok_or(VerificationError::MissingParameter("hub.challenge"))?;

    if mode != SUBSCRIBE_MODE {
        return Err(VerificationError::WrongMode(mode.to_string()));
    }
    if token != expected_token {
        return Err(VerificationError::TokenMismatch);
    }

    Ok(challenge.to_string())
}
