//! Per-install settings for a Twilio account.

use serde::Deserialize;

use concierge_client::{AuthScheme, VendorCredential};
use concierge_types::settings::require_non_empty;
use concierge_types::ConciergeError;

fn default_api_base() -> String {
    "https://api.twilio.com/2010-04-01".to_string()
}

fn default_numbers_base() -> String {
    "https://numbers.twilio.com/v2".to_string()
}

/// Settings captured when an organization connects its Twilio account.
#[derive(Debug, Clone, Deserialize)]
pub struct TwilioSettings {
    pub account_sid: String,
    pub auth_token: String,
    /// Default sending number for messages that do not name one.
    #[serde(default)]
    pub from_number: Option<String>,
    /// Core REST API base. The version lives in the path, not in a
    /// header or a separate segment.
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Regulatory compliance API base; a separate host with its own
    /// path version.
    #[serde(default = "default_numbers_base")]
    pub numbers_base: String,
}

impl TwilioSettings {
    pub fn validate(&self) -> Result<(), ConciergeError> {
        require_non_empty("account_sid", &self.account_sid)?;
        require_non_empty("auth_token", &self.auth_token)?;
        require_non_empty("api_base", &self.api_base)?;
        require_non_empty("numbers_base", &self.numbers_base)?;
        Ok(())
    }

    /// The sending number for a message, preferring the explicit
    /// argument over the install default.
    pub fn resolve_from(&self, from: Option<&str>) -> Result<String, ConciergeError> {
        from.map(str::to_string)
            .or_else(|| self.from_number.clone())
            .ok_or_else(|| {
                ConciergeError::Validation(
                    "no `from` number given and the install has no default from_number".into(),
                )
            })
    }

    pub fn api_credential(&self) -> VendorCredential {
        VendorCredential::new(&self.api_base, self.auth())
    }

    pub fn numbers_credential(&self) -> VendorCredential {
        VendorCredential::new(&self.numbers_base, self.auth())
    }

    fn auth(&self) -> AuthScheme {
        AuthScheme::Basic {
            username: self.account_sid.clone(),
            password: self.auth_token.clone(),
        }
    }
}
