//! Shared vendor HTTP client.
//!
//! Each integration app wraps one [`VendorClient`] per vendor API it
//! talks to. The client owns credential application, API version
//! placement, timeouts, and the status/envelope error classification
//! described in `docs/architecture.md` section 4.

pub mod credential;
pub mod envelope;
pub mod http;
pub mod normalize;
pub mod version;

pub use credential::{AuthScheme, VendorCredential};
pub use envelope::{ErrorProfile, VendorErrorEnvelope};
pub use http::{VendorClient, VendorPayload, VendorRequest};
pub use normalize::{OneOrMany, OpaqueId};
pub use version::{ApiVersionSelector, FixedVersion, Unversioned};

// Vendor crates name methods without importing reqwest themselves.
pub use reqwest::Method;
