use thiserror::Error;

/// Unified error type for every Concierge operation.
///
/// Apps, vendor clients, and webhook handlers all speak this one enum so
/// the host runtime can make routing decisions on the variant alone:
/// credential problems pause an install, validation problems bounce back
/// to the caller, and everything else is a plain failed call.
#[derive(Error, Debug)]
pub enum ConciergeError {
    /// The vendor rejected the install's credentials. The host must stop
    /// retrying and surface a reconnect prompt to the workspace owner.
    #[error("vendor rejected credentials: {0}")]
    AuthInvalid(String),

    /// A vendor call failed for a reason other than authentication.
    /// Carries the HTTP status the vendor answered with and its
    /// message. Status 0 means the request produced no response at all
    /// (connect failure or timeout).
    #[error("vendor request failed (status {status}): {message}")]
    RequestFailed { status: u16, message: String },

    /// Caller-supplied input failed a precondition before any vendor
    /// call was made.
    #[error("invalid input: {0}")]
    Validation(String),

    /// An inbound webhook carried a missing or wrong signature.
    #[error("webhook signature rejected: {0}")]
    SignatureInvalid(String),

    /// A host platform service (records, messaging, files) failed.
    #[error("host platform error: {0}")]
    Host(String),

    /// Install settings are missing or malformed.
    #[error("install settings error: {0}")]
    Settings(String),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Internal invariant violation.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ConciergeError {
    /// True when the error means the vendor no longer accepts the stored
    /// credentials, as opposed to a transient or per-request failure.
    pub fn is_auth_invalid(&self) -> bool {
        matches!(self, Self::AuthInvalid(_))
    }

    /// True when the error must interrupt tool dispatch instead of being
    /// folded into a failed tool result. Vendor-side failures stay inside
    /// the result so the conversational flow can react to them; these two
    /// need the host (or the caller) to fix something first.
    pub fn interrupts_dispatch(&self) -> bool {
        matches!(self, Self::AuthInvalid(_) | Self::Validation(_))
    }
}

impl From<serde_json::Error> for ConciergeError {
    fn from(err: serde_json::Error) -> Self {
        ConciergeError::Serialization(err.to_string())
    }
}
