//! Helpers for parsing per-install settings.
//!
//! The host stores one JSON settings object per app install and passes
//! it verbatim on every invocation. Each app defines its own typed
//! settings struct and runs it through [`parse_settings`] plus field
//! checks, so a misconfigured install fails with a `Settings` error
//! before any vendor traffic happens.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::errors::ConciergeError;

/// Deserializes an install's settings object into the app's typed
/// settings struct.
pub fn parse_settings<T: DeserializeOwned>(settings: &Value) -> Result<T, ConciergeError> {
    serde_json::from_value(settings.clone())
        .map_err(|e| ConciergeError::Settings(format!("invalid install settings: {e}")))
}

/// Rejects empty or whitespace-only required settings, which usually
/// mean a half-finished install form.
pub fn require_non_empty(field: &str, value: &str) -> Result<(), ConciergeError> {
    if value.trim().is_empty() {
        return Err(ConciergeError::Settings(format!(
            "setting `{field}` must not be empty"
        )));
    }
    Ok(())
}
