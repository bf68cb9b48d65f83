//! Vendor credentials and the authentication schemes in use across the
//! supported vendors.

use std::fmt;

/// How a vendor authenticates requests.
#[derive(Clone)]
pub enum AuthScheme {
    /// HTTP basic auth (telephony API keys are sid/token pairs).
    Basic { username: String, password: String },
    /// `Authorization: Bearer` token.
    Bearer(String),
    /// Token passed as a query parameter on every request. A request
    /// that already carries the parameter keeps its own value, which is
    /// how per-call token overrides work.
    QueryToken { param: String, token: String },
}

impl AuthScheme {
    fn kind(&self) -> &'static str {
        match self {
            Self::Basic { .. } => "basic",
            Self::Bearer(_) => "bearer",
            Self::QueryToken { .. } => "query-token",
        }
    }
}

/// A validated install credential: vendor base URL, auth scheme, and
/// any fixed extra headers the vendor requires.
#[derive(Clone)]
pub struct VendorCredential {
    base_url: String,
    auth: AuthScheme,
    headers: Vec<(String, String)>,
}

impl VendorCredential {
    pub fn new(base_url: impl Into<String>, auth: AuthScheme) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
            headers: Vec::new(),
        }
    }

    /// Adds a header sent with every request made under this credential.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn auth(&self) -> &AuthScheme {
        &self.auth
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }
}

// Credentials end up in tracing fields and error context. Keep secrets
// out of the Debug output.
impl fmt::Debug for VendorCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VendorCredential")
            .field("base_url", &self.base_url)
            .field("auth", &self.auth.kind())
            .field("headers", &self.headers.len())
            .finish()
    }
}
