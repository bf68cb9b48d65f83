//! Vendor error envelopes and per-vendor classification profiles.
//!
//! Every vendor wraps failures differently; the envelope parse here is
//! deliberately tolerant (nested `error` object or top-level fields,
//! numeric or stringly codes) so classification never depends on a
//! vendor keeping its documented shape. See `docs/architecture.md`
//! section 4.

use serde_json::Value;

use concierge_types::ConciergeError;

/// The fields classification cares about, pulled out of whatever error
/// shape the vendor answered with. Anything absent stays `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VendorErrorEnvelope {
    pub code: Option<i64>,
    pub subcode: Option<i64>,
    /// Vendor error class ("OAuthException").
    pub kind: Option<String>,
    pub message: Option<String>,
}

impl VendorErrorEnvelope {
    /// Extracts an envelope from a parsed body. Prefers a nested
    /// `error` object, falls back to top-level fields.
    pub fn from_json(value: &Value) -> Self {
        let source = value.get("error").filter(|v| v.is_object()).unwrap_or(value);
        Self {
            code: field(source, &["code"]).and_then(as_int),
            subcode: field(source, &["error_subcode", "subcode"]).and_then(as_int),
            kind: field(source, &["type"]).and_then(Value::as_str).map(String::from),
            message: field(source, &["message", "detail", "error_description"])
                .and_then(Value::as_str)
                .map(String::from),
        }
    }

    /// Parses a raw body and extracts an envelope, if the body is JSON
    /// at all.
    pub fn from_body(body: &str) -> Option<Self> {
        serde_json::from_str::<Value>(body)
            .ok()
            .map(|v| Self::from_json(&v))
    }
}

fn field<'a>(source: &'a Value, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|name| source.get(*name))
}

fn as_int(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

/// Per-vendor error classification rules.
///
/// Transport status beats envelope contents: 401 and 403 are always
/// credential failures. Beyond those, a vendor may publish error codes
/// that mean "token dead" even under other statuses, and one vendor
/// embeds its error envelope inside 200 responses.
#[derive(Debug, Clone)]
pub struct ErrorProfile {
    /// Short vendor tag used as message prefix ("petbooqz").
    pub vendor: &'static str,
    /// Error codes that mean the credential is no longer valid.
    pub auth_codes: &'static [i64],
    /// An error class plus code that together mean the credential is no
    /// longer valid, for vendors whose auth failures hide behind a
    /// generic permission code.
    pub auth_exception: Option<(&'static str, i64)>,
    /// Scan 2xx bodies for an embedded `error` object.
    pub scan_success_bodies: bool,
}

impl ErrorProfile {
    /// Profile for vendors with no published error code contract:
    /// status-only classification.
    pub const fn generic(vendor: &'static str) -> Self {
        Self {
            vendor,
            auth_codes: &[],
            auth_exception: None,
            scan_success_bodies: false,
        }
    }

    /// Classifies a non-success response.
    pub fn classify(&self, status: u16, body: &str) -> ConciergeError {
        let envelope = VendorErrorEnvelope::from_body(body).unwrap_or_default();
        let message = self.describe(&envelope, body);
        if status == 401 || status == 403 || self.envelope_means_auth(&envelope) {
            return ConciergeError::AuthInvalid(message);
        }
        ConciergeError::RequestFailed { status, message }
    }

    /// Checks a parsed 2xx body for an embedded error envelope. Returns
    /// `None` when the body carries no `error` object, meaning the
    /// response really is a success.
    pub fn classify_embedded(&self, status: u16, body: &Value) -> Option<ConciergeError> {
        body.get("error").filter(|v| v.is_object())?;
        let envelope = VendorErrorEnvelope::from_json(body);
        let message = self.describe(&envelope, "");
        if self.envelope_means_auth(&envelope) {
            return Some(ConciergeError::AuthInvalid(message));
        }
        Some(ConciergeError::RequestFailed { status, message })
    }

    fn envelope_means_auth(&self, envelope: &VendorErrorEnvelope) -> bool {
        let Some(code) = envelope.code else {
            return false;
        };
        if self.auth_codes.contains(&code) {
            return true;
        }
        match self.auth_exception {
            Some((kind, auth_code)) => {
                code == auth_code && envelope.kind.as_deref() == Some(kind)
            }
            None => false,
        }
    }

    fn describe(&self, envelope: &VendorErrorEnvelope, raw_body: &str) -> String {
        let detail = envelope
            .message
            .clone()
            .unwrap_or_else(|| snippet(raw_body));
        match envelope.code {
            Some(code) => format!("{}: {detail} (code {code})", self.vendor),
            None => format!("{}: {detail}", self.vendor),
        }
    }
}

/// First part of a raw body for error context, so huge HTML error pages
/// never end up in logs verbatim.
fn snippet(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty body>".to_string();
    }
    trimmed.chars().take(200).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const GRAPH: ErrorProfile = ErrorProfile {
        vendor: "graph",
        auth_codes: &[190, 102],
        auth_exception: Some(("OAuthException", 10)),
        scan_success_bodies: true,
    };

    const TELEPHONY: ErrorProfile = ErrorProfile {
        vendor: "telephony",
        auth_codes: &[20003],
        auth_exception: None,
        scan_success_bodies: false,
    };

    #[test]
    fn envelope_reads_nested_and_top_level_shapes() {
        let nested = VendorErrorEnvelope::from_json(&json!({
            "error": {"message": "Error validating access token", "type": "OAuthException",
                      "code": 190, "error_subcode": 463}
        }));
        assert_eq!(nested.code, Some(190));
        assert_eq!(nested.subcode, Some(463));
        assert_eq!(nested.kind.as_deref(), Some("OAuthException"));

        let flat = VendorErrorEnvelope::from_json(&json!({
            "code": 20003, "message": "Authenticate", "status": 401
        }));
        assert_eq!(flat.code, Some(20003));
        assert_eq!(flat.message.as_deref(), Some("Authenticate"));
    }

    #[test]
    fn envelope_accepts_stringly_codes() {
        let envelope =
            VendorErrorEnvelope::from_json(&json!({"error": {"code": "190", "message": "x"}}));
        assert_eq!(envelope.code, Some(190));
    }

    #[test]
    fn status_401_and_403_always_classify_as_auth() {
        assert!(GRAPH.classify(401, "").is_auth_invalid());
        assert!(TELEPHONY
            .classify(403, r#"{"code": 20403, "message": "Forbidden"}"#)
            .is_auth_invalid());
    }

    #[test]
    fn published_auth_codes_classify_as_auth_under_any_status() {
        let err = GRAPH.classify(
            400,
            r#"{"error": {"message": "Session has expired", "type": "OAuthException", "code": 190}}"#,
        );
        assert!(err.is_auth_invalid());

        let err = TELEPHONY.classify(400, r#"{"code": 20003, "message": "Authenticate"}"#);
        assert!(err.is_auth_invalid());
    }

    #[test]
    fn oauth_exception_code_ten_counts_as_auth_only_with_matching_kind() {
        let with_kind = GRAPH.classify(
            400,
            r#"{"error": {"message": "Permission denied", "type": "OAuthException", "code": 10}}"#,
        );
        assert!(with_kind.is_auth_invalid());

        let without_kind = GRAPH.classify(
            400,
            r#"{"error": {"message": "Unsupported request", "type": "GraphMethodException", "code": 10}}"#,
        );
        assert!(matches!(
            without_kind,
            ConciergeError::RequestFailed { status: 400, .. }
        ));
    }

    #[test]
    fn other_failures_keep_status_and_vendor_message() {
        let err = TELEPHONY.classify(
            400,
            r#"{"code": 21211, "message": "Invalid 'To' Phone Number"}"#,
        );
        match err {
            ConciergeError::RequestFailed { status, message } => {
                assert_eq!(status, 400);
                assert!(message.contains("Invalid 'To' Phone Number"));
                assert!(message.contains("21211"));
            }
            other => panic!("expected RequestFailed, got {other:?}"),
        }
    }

    #[test]
    fn non_json_bodies_fall_back_to_a_snippet() {
        let err = GRAPH.classify(502, "<html>Bad Gateway</html>");
        match err {
            ConciergeError::RequestFailed { status, message } => {
                assert_eq!(status, 502);
                assert!(message.contains("Bad Gateway"));
            }
            other => panic!("expected RequestFailed, got {other:?}"),
        }
    }

    #[test]
    fn embedded_error_in_success_body_classifies_like_a_failure() {
        let auth = GRAPH.classify_embedded(
            200,
            &json!({"error": {"message": "Error validating access token",
                              "type": "OAuthException", "code": 190}}),
        );
        assert!(matches!(auth, Some(ConciergeError::AuthInvalid(_))));

        let plain = GRAPH.classify_embedded(
            200,
            &json!({"error": {"message": "Unsupported get request", "code": 100}}),
        );
        assert!(matches!(
            plain,
            Some(ConciergeError::RequestFailed { status: 200, .. })
        ));

        assert!(GRAPH
            .classify_embedded(200, &json!({"data": [{"id": "1"}]}))
            .is_none());
    }
}
