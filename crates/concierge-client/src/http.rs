//! The vendor HTTP client shared by every integration app.
//!
//! One client owns a credential, a version selector, and an error
//! profile; apps describe calls as method + path + query + body and get
//! back either parsed JSON or an explicit no-content marker. All
//! status and envelope classification happens here so the vendor
//! clients above never look at raw HTTP. See `docs/architecture.md`
//! section 4.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use concierge_types::ConciergeError;

use crate::credential::{AuthScheme, VendorCredential};
use crate::envelope::ErrorProfile;
use crate::version::ApiVersionSelector;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of a successful vendor exchange.
#[derive(Debug, Clone)]
pub enum VendorPayload {
    Json(Value),
    /// The vendor answered 2xx with an empty body or a non-JSON
    /// content type. Callers that only care about success stop here.
    NoContent,
}

impl VendorPayload {
    pub fn json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::NoContent => None,
        }
    }

    pub fn into_json(self) -> Result<Value, ConciergeError> {
        match self {
            Self::Json(value) => Ok(value),
            Self::NoContent => Err(ConciergeError::Serialization(
                "vendor returned no content where a JSON body was expected".into(),
            )),
        }
    }

    /// Decodes the JSON payload into a typed response.
    pub fn decode<T: DeserializeOwned>(self) -> Result<T, ConciergeError> {
        Ok(serde_json::from_value(self.into_json()?)?)
    }
}

/// Request body in one of the two wire formats the vendors use.
#[derive(Debug, Clone)]
enum RequestBody {
    Json(Value),
    Form(Vec<(String, String)>),
}

/// HTTP client bound to one install's credential.
pub struct VendorClient {
    http: reqwest::Client,
    credential: VendorCredential,
    versions: Arc<dyn ApiVersionSelector>,
    profile: ErrorProfile,
}

impl VendorClient {
    pub fn new(
        credential: VendorCredential,
        versions: Arc<dyn ApiVersionSelector>,
        profile: ErrorProfile,
    ) -> Result<Self, ConciergeError> {
        Self::with_request_timeout(credential, versions, profile, REQUEST_TIMEOUT)
    }

    /// Same as [`VendorClient::new`] with a custom overall request
    /// timeout.
    pub fn with_request_timeout(
        credential: VendorCredential,
        versions: Arc<dyn ApiVersionSelector>,
        profile: ErrorProfile,
        timeout: Duration,
    ) -> Result<Self, ConciergeError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ConciergeError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            credential,
            versions,
            profile,
        })
    }

    pub fn profile(&self) -> &ErrorProfile {
        &self.profile
    }

    pub fn request(&self, method: Method, path: &str) -> VendorRequest<'_> {
        VendorRequest {
            client: self,
            method,
            path: path.to_string(),
            query: Vec::new(),
            body: None,
            version_override: None,
        }
    }

    pub fn get(&self, path: &str) -> VendorRequest<'_> {
        self.request(Method::GET, path)
    }

    pub fn post(&self, path: &str) -> VendorRequest<'_> {
        self.request(Method::POST, path)
    }

    pub fn delete(&self, path: &str) -> VendorRequest<'_> {
        self.request(Method::DELETE, path)
    }

    fn build_url(&self, path: &str, version_override: Option<&str>) -> String {
        let version = match version_override {
            Some(v) => Some(v.trim_matches('/').to_string()),
            None => self.versions.version_for(path),
        };
        let path = path.trim_start_matches('/');
        match version {
            Some(v) => format!("{}/{}/{}", self.credential.base_url(), v, path),
            None => format!("{}/{}", self.credential.base_url(), path),
        }
    }
}

/// A single vendor call under construction.
#[must_use = "a vendor request does nothing until sent"]
pub struct VendorRequest<'a> {
    client: &'a VendorClient,
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<RequestBody>,
    version_override: Option<String>,
}

impl VendorRequest<'_> {
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }

    pub fn form(mut self, pairs: Vec<(String, String)>) -> Self {
        self.body = Some(RequestBody::Form(pairs));
        self
    }

    /// Overrides the version selector for this call only.
    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.version_override = Some(version.into());
        self
    }

    pub async fn send(self) -> Result<VendorPayload, ConciergeError> {
        let url = self
            .client
            .build_url(&self.path, self.version_override.as_deref());
        let profile = self.client.profile.clone();

        let mut query = self.query;
        let mut request = self.client.http.request(self.method.clone(), &url);
        match self.client.credential.auth() {
            AuthScheme::Basic { username, password } => {
                request = request.basic_auth(username, Some(password));
            }
            AuthScheme::Bearer(token) => {
                request = request.bearer_auth(token);
            }
            AuthScheme::QueryToken { param, token } => {
                // An explicit per-call token wins over the install token.
                if !query.iter().any(|(name, _)| name == param) {
                    query.push((param.clone(), token.clone()));
                }
            }
        }
        for (name, value) in self.client.credential.headers() {
            request = request.header(name, value);
        }
        if !query.is_empty() {
            request = request.query(&query);
        }
        match self.body {
            Some(RequestBody::Json(ref body)) => request = request.json(body),
            Some(RequestBody::Form(ref pairs)) => request = request.form(pairs),
            None => {}
        }

        debug!(vendor = profile.vendor, method = %self.method, url = %url, "sending vendor request");
        let response = request.send().await.map_err(|e| {
            // Status 0 marks requests that never produced a response.
            ConciergeError::RequestFailed {
                status: 0,
                message: format!("{}: transport failure: {e}", profile.vendor),
            }
        })?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();
        let body = response
            .text()
            .await
            .map_err(|e| ConciergeError::RequestFailed {
                status: status.as_u16(),
                message: format!("{}: failed reading response body: {e}", profile.vendor),
            })?;

        if !status.is_success() {
            return Err(profile.classify(status.as_u16(), &body));
        }

        if body.trim().is_empty() || !content_type.contains("json") {
            debug!(vendor = profile.vendor, status = status.as_u16(), "vendor returned no content");
            return Ok(VendorPayload::NoContent);
        }

        let value: Value = serde_json::from_str(&body).map_err(|e| {
            ConciergeError::Serialization(format!(
                "{}: malformed JSON in {} response: {e}",
                profile.vendor,
                status.as_u16()
            ))
        })?;

        if profile.scan_success_bodies {
            if let Some(err) = profile.classify_embedded(status.as_u16(), &value) {
                warn!(vendor = profile.vendor, error = %err, "error envelope embedded in success response");
                return Err(err);
            }
        }

        Ok(VendorPayload::Json(value))
    }
}
