//! Delivery signature verification (HMAC-SHA256).
//!
//! The platform signs every POST body with the app secret and sends the
//! result in the `X-Hub-Signature-256` header as `sha256=<hex>`. The digest
//! covers the exact bytes on the wire, so verification must run on the raw
//! body before any JSON decoding.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the delivery signature.
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

const PREFIX: &str = "sha256=";

/// Why a delivery signature was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("signature header missing")]
    Missing,

    #[error("signature header malformed")]
    Malformed,

    #[error("signature does not match payload")]
    Mismatch,
}

/// Decodes a `sha256=<hex>` header value into digest bytes.
///
/// Returns `None` for anything else (other algorithm, bad hex, ...).
///
/// # Examples
///
/// ```
/// use whatsapp_webhooks::webhooks::parse_signature_header;
///
/// assert_eq!(parse_signature_header("sha256=0aff"), Some(vec![0x0a, 0xff]));
/// assert!(parse_signature_header("0aff").is_none());
/// assert!(parse_signature_header("sha1=0aff").is_none());
/// assert!(parse_signature_header("sha256=0g").is_none());
/// ```
pub fn parse_signature_header(header: &str) -> Option<Vec<u8>> {
    let digest = header.trim().strip_prefix(PREFIX)?;
    hex::decode(digest).ok()
}

/// HMAC-SHA256 of `payload` under `secret`.
pub fn compute_signature(payload: &[u8], secret: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}

/// Formats digest bytes as a header value (`sha256=<hex>`).
pub fn format_signature_header(signature: &[u8]) -> String {
    format!("{}{}", PREFIX, hex::encode(signature))
}

/// Checks `header` against the HMAC of `payload` under `secret`.
///
/// The comparison is constant-time.
///
/// # Examples
///
/// ```
/// use whatsapp_webhooks::webhooks::{
///     SignatureError, compute_signature, format_signature_header, verify_signature,
/// };
///
/// let body = br#"{"object":"whatsapp_business_account","entry":[]}"#;
/// let header = format_signature_header(&compute_signature(body, b"app-secret"));
///
/// assert_eq!(verify_signature(body, Some(&header), b"app-secret"), Ok(()));
/// assert_eq!(
///     verify_signature(body, Some(&header), b"other-secret"),
///     Err(SignatureError::Mismatch)
/// );
/// assert_eq!(
///     verify_signature(body, None, b"app-secret"),
///     Err(SignatureError::Missing)
/// );
/// ```
pub fn verify_signature(
    payload: &[u8],
    header: Option<&str>,
    secret: &[u8],
) -> Result<(), SignatureError> {
    let header = header.ok_or(SignatureError::Missing)?;
    let expected = parse_signature_header(header).ok_or(SignatureError::Malformed)?;

    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| SignatureError::Mismatch)?;
    mac.update(payload);
    mac.verify_slice(&expected)
        .map_err(|_| SignatureError::Mismatch)
}
