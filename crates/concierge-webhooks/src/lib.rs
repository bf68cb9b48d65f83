//! Webhook ingress helpers shared by the integration apps: signature
//! verification, subscription handshakes, and form body parsing.
//!
//! Verification always runs before any body parse. A delivery that
//! fails here comes back as `SignatureInvalid`, which the registry
//! turns into a 401 without ever touching the payload.

pub mod form;
pub mod verify;

pub use form::{form_value, parse_form_body};
pub use verify::{answer_subscribe_challenge, verify_body_hmac, verify_url_params_hmac};
