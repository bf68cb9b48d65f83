//! Webhook signature schemes.
//!
//! Two schemes cover the vendors in scope: a body HMAC (SHA-256 hex
//! over the raw request bytes, delivered as `sha256=<hex>`) and a URL
//! HMAC (SHA-1 base64 over the full callback URL plus the form
//! parameters sorted by name). Both compare through the mac's own
//! constant-time verify, and a rejected signature never lets the body
//! reach a parser. See `docs/architecture.md` section 5.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::Sha256;
use tracing::debug;

use concierge_types::{ConciergeError, WebhookRequest, WebhookResponse};

type HmacSha256 = Hmac<Sha256>;
type HmacSha1 = Hmac<Sha1>;

const BODY_SCHEME_PREFIX: &str = "sha256=";

/// Verifies a `sha256=<hex>` body signature over the exact request
/// bytes.
pub fn verify_body_hmac(
    secret: &str,
    body: &[u8],
    signature_header: Option<&str>,
) -> Result<(), ConciergeError> {
    let header = signature_header
        .ok_or_else(|| ConciergeError::SignatureInvalid("missing signature header".into()))?;
    let hex_digest = header.strip_prefix(BODY_SCHEME_PREFIX).ok_or_else(|| {
        ConciergeError::SignatureInvalid(format!(
            "signature header must start with `{BODY_SCHEME_PREFIX}`"
        ))
    })?;
    let expected = hex::decode(hex_digest)
        .map_err(|_| ConciergeError::SignatureInvalid("signature is not valid hex".into()))?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ConciergeError::Internal(format!("hmac init failed: {e}")))?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| ConciergeError::SignatureInvalid("body signature mismatch".into()))?;
    debug!(scheme = "body-hmac-sha256", "webhook signature accepted");
    Ok(())
}

/// Verifies a base64 SHA-1 signature over the full callback URL plus
/// the form parameters, concatenated name-then-value in name order.
pub fn verify_url_params_hmac(
    auth_token: &str,
    url: &str,
    params: &[(String, String)],
    signature_header: Option<&str>,
) -> Result<(), ConciergeError> {
    let header = signature_header
        .ok_or_else(|| ConciergeError::SignatureInvalid("missing signature header".into()))?;
    let expected = BASE64
        .decode(header)
        .map_err(|_| ConciergeError::SignatureInvalid("signature is not valid base64".into()))?;

    let mut sorted: Vec<&(String, String)> = params.iter().collect();
    sorted.sort_by(|a, b| (&a.0, &a.1).cmp(&(&b.0, &b.1)));

    let mut mac = HmacSha1::new_from_slice(auth_token.as_bytes())
        .map_err(|e| ConciergeError::Internal(format!("hmac init failed: {e}")))?;
    mac.update(url.as_bytes());
    for (name, value) in sorted {
        mac.update(name.as_bytes());
        mac.update(value.as_bytes());
    }
    mac.verify_slice(&expected)
        .map_err(|_| ConciergeError::SignatureInvalid("url signature mismatch".into()))?;
    debug!(scheme = "url-hmac-sha1", "webhook signature accepted");
    Ok(())
}

/// Answers a subscription handshake: echoes `hub.challenge` as plain
/// text when `hub.mode` is `subscribe` and `hub.verify_token` matches
/// the configured token, otherwise 403.
pub fn answer_subscribe_challenge(
    verify_token: &str,
    request: &WebhookRequest,
) -> WebhookResponse {
    let mode = request.query_param("hub.mode");
    let token = request.query_param("hub.verify_token");
    let challenge = request.query_param("hub.challenge");

    match (mode, token, challenge) {
        (Some("subscribe"), Some(token), Some(challenge)) if token == verify_token => {
            debug!("subscription handshake accepted");
            WebhookResponse::ok_text(challenge)
        }
        _ => WebhookResponse::forbidden("verification token mismatch"),
    }
}
