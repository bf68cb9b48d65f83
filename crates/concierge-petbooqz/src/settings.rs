//! Per-install settings for a Petbooqz practice.

use serde::Deserialize;

use concierge_client::{AuthScheme, VendorCredential};
use concierge_types::settings::require_non_empty;
use concierge_types::ConciergeError;

fn default_legacy_version() -> String {
    "v1".to_string()
}

/// Settings captured when a practice connects its Petbooqz account.
#[derive(Debug, Clone, Deserialize)]
pub struct PetbooqzSettings {
    /// Practice server base URL; hosted and on-premise installs differ.
    pub base_url: String,
    pub username: String,
    pub password: String,
    /// Practices provisioned after the vendor's key rollout also carry
    /// an API key header.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Multi-practice servers need the practice selected per request.
    #[serde(default)]
    pub practice_id: Option<String>,
    /// Version segment for the legacy endpoint families. The calendar
    /// family is unversioned and ignores this.
    #[serde(default = "default_legacy_version")]
    pub legacy_api_version: String,
    /// When a two-step booking confirms unsuccessfully, also release
    /// the reservation instead of leaving the hold in place for staff
    /// to resolve.
    #[serde(default)]
    pub release_on_confirm_failure: bool,
}

impl PetbooqzSettings {
    pub fn validate(&self) -> Result<(), ConciergeError> {
        require_non_empty("base_url", &self.base_url)?;
        require_non_empty("username", &self.username)?;
        require_non_empty("password", &self.password)?;
        require_non_empty("legacy_api_version", &self.legacy_api_version)?;
        Ok(())
    }

    pub fn credential(&self) -> VendorCredential {
        let mut credential = VendorCredential::new(
            &self.base_url,
            AuthScheme::Basic {
                username: self.username.clone(),
                password: self.password.clone(),
            },
        );
        if let Some(api_key) = &self.api_key {
            credential = credential.with_header("X-Api-Key", api_key);
        }
        if let Some(practice_id) = &self.practice_id {
            credential = credential.with_header("X-Practice-Id", practice_id);
        }
        credential
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concierge_types::settings::parse_settings;
    use serde_json::json;

    #[test]
    fn minimal_settings_parse_with_defaults() {
        let settings: PetbooqzSettings = parse_settings(&json!({
            "base_url": "https://clinic.petbooqz.example",
            "username": "frontdesk",
            "password": "s3cret"
        }))
        .unwrap();
        settings.validate().unwrap();
        assert_eq!(settings.legacy_api_version, "v1");
        assert!(!settings.release_on_confirm_failure);
        assert!(settings.api_key.is_none());
    }

    #[test]
    fn blank_credentials_fail_validation() {
        let settings: PetbooqzSettings = parse_settings(&json!({
            "base_url": "https://clinic.petbooqz.example",
            "username": " ",
            "password": "s3cret"
        }))
        .unwrap();
        assert!(matches!(
            settings.validate(),
            Err(ConciergeError::Settings(_))
        ));
    }
}
