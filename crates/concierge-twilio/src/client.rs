//! Typed client for the two Twilio API hosts the app touches: the core
//! REST API (messaging, number inventory) and the regulatory
//! compliance API. Both speak form-encoded requests and JSON responses,
//! with the version segment baked into the base path.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use concierge_client::{ErrorProfile, Unversioned, VendorClient};
use concierge_types::ConciergeError;

use crate::settings::TwilioSettings;

/// Code 20003 is the vendor's "authentication failed" error. It
/// usually rides a 401 but the code is authoritative either way.
pub const PROFILE: ErrorProfile = ErrorProfile {
    vendor: "twilio",
    auth_codes: &[20003],
    auth_exception: None,
    scan_success_bodies: false,
};

/// An accepted outbound SMS.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentSms {
    pub sid: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// One purchasable number from the availability search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableNumber {
    pub phone_number: String,
    #[serde(default)]
    pub friendly_name: Option<String>,
    #[serde(default)]
    pub locality: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub capabilities: Option<Value>,
}

/// A number purchased into the account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionedNumber {
    pub sid: String,
    pub phone_number: String,
}

/// A regulatory bundle as the vendor reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceBundle {
    pub sid: String,
    pub status: String,
    #[serde(default)]
    pub failure_reason: Option<String>,
    #[serde(default)]
    pub valid_until: Option<String>,
}

#[derive(Deserialize)]
struct AvailableNumbersResponse {
    #[serde(default)]
    available_phone_numbers: Vec<AvailableNumber>,
}

#[derive(Deserialize)]
struct ResourceSid {
    sid: String,
}

/// One install's Twilio connection.
pub struct TwilioClient {
    api: VendorClient,
    numbers: VendorClient,
    account_sid: String,
}

impl TwilioClient {
    pub fn new(settings: &TwilioSettings) -> Result<Self, ConciergeError> {
        let api = VendorClient::new(settings.api_credential(), Arc::new(Unversioned), PROFILE)?;
        let numbers =
            VendorClient::new(settings.numbers_credential(), Arc::new(Unversioned), PROFILE)?;
        Ok(Self {
            api,
            numbers,
            account_sid: settings.account_sid.clone(),
        })
    }

    fn account_path(&self, tail: &str) -> String {
        format!("/Accounts/{}/{tail}", self.account_sid)
    }

    fn bundle_path(&self, bundle_sid: &str) -> String {
        format!("/RegulatoryCompliance/Bundles/{bundle_sid}")
    }

    // ==================== messaging ====================

    pub async fn send_sms(
        &self,
        to: &str,
        from: &str,
        body: &str,
    ) -> Result<SentSms, ConciergeError> {
        let payload = self
            .api
            .post(&self.account_path("Messages.json"))
            .form(vec![
                ("To".into(), to.into()),
                ("From".into(), from.into()),
                ("Body".into(), body.into()),
            ])
            .send()
            .await?;
        let sms: SentSms = payload.decode()?;
        info!(sid = %sms.sid, to, "sms accepted by vendor");
        Ok(sms)
    }

    // ==================== number inventory ====================

    /// Searches purchasable local numbers in a country, optionally
    /// narrowed by area code.
    pub async fn search_local_numbers(
        &self,
        country: &str,
        area_code: Option<&str>,
    ) -> Result<Vec<AvailableNumber>, ConciergeError> {
        let mut request = self.api.get(&self.account_path(&format!(
            "AvailablePhoneNumbers/{country}/Local.json"
        )));
        if let Some(area) = area_code {
            request = request.query("AreaCode", area);
        }
        let listing: AvailableNumbersResponse = request.send().await?.decode()?;
        Ok(listing.available_phone_numbers)
    }

    /// Purchases a number into the account, pointing its inbound SMS
    /// and voice deliveries at the given callback URLs.
    pub async fn provision_number(
        &self,
        phone_number: &str,
        sms_url: Option<&str>,
        voice_url: Option<&str>,
    ) -> Result<ProvisionedNumber, ConciergeError> {
        let mut form = vec![("PhoneNumber".to_string(), phone_number.to_string())];
        if let Some(url) = sms_url {
            form.push(("SmsUrl".into(), url.into()));
        }
        if let Some(url) = voice_url {
            form.push(("VoiceUrl".into(), url.into()));
        }
        let number: ProvisionedNumber = self
            .api
            .post(&self.account_path("IncomingPhoneNumbers.json"))
            .form(form)
            .send()
            .await?
            .decode()?;
        info!(sid = %number.sid, phone_number = %number.phone_number, "number provisioned");
        Ok(number)
    }

    // ==================== regulatory compliance ====================

    pub async fn create_bundle(
        &self,
        friendly_name: &str,
        email: &str,
        iso_country: &str,
        number_type: &str,
        end_user_type: &str,
        status_callback: Option<&str>,
    ) -> Result<ComplianceBundle, ConciergeError> {
        let mut form = vec![
            ("FriendlyName".to_string(), friendly_name.to_string()),
            ("Email".to_string(), email.to_string()),
            ("IsoCountry".to_string(), iso_country.to_string()),
            ("NumberType".to_string(), number_type.to_string()),
            ("EndUserType".to_string(), end_user_type.to_string()),
        ];
        if let Some(url) = status_callback {
            form.push(("StatusCallback".into(), url.into()));
        }
        let bundle: ComplianceBundle = self
            .numbers
            .post("/RegulatoryCompliance/Bundles")
            .form(form)
            .send()
            .await?
            .decode()?;
        info!(bundle_sid = %bundle.sid, status = %bundle.status, "bundle created");
        Ok(bundle)
    }

    /// Creates an end-user item. `attributes` is the vendor's free-form
    /// per-regulation field set, sent as a JSON string.
    pub async fn create_end_user(
        &self,
        friendly_name: &str,
        kind: &str,
        attributes: &Value,
    ) -> Result<String, ConciergeError> {
        let resource: ResourceSid = self
            .numbers
            .post("/RegulatoryCompliance/EndUsers")
            .form(vec![
                ("FriendlyName".into(), friendly_name.into()),
                ("Type".into(), kind.into()),
                ("Attributes".into(), serde_json::to_string(attributes)?),
            ])
            .send()
            .await?
            .decode()?;
        Ok(resource.sid)
    }

    pub async fn create_supporting_document(
        &self,
        friendly_name: &str,
        kind: &str,
        attributes: &Value,
    ) -> Result<String, ConciergeError> {
        let resource: ResourceSid = self
            .numbers
            .post("/RegulatoryCompliance/SupportingDocuments")
            .form(vec![
                ("FriendlyName".into(), friendly_name.into()),
                ("Type".into(), kind.into()),
                ("Attributes".into(), serde_json::to_string(attributes)?),
            ])
            .send()
            .await?
            .decode()?;
        Ok(resource.sid)
    }

    /// Attaches an end-user or supporting-document item to a bundle.
    pub async fn assign_item(
        &self,
        bundle_sid: &str,
        object_sid: &str,
    ) -> Result<String, ConciergeError> {
        let resource: ResourceSid = self
            .numbers
            .post(&format!("{}/ItemAssignments", self.bundle_path(bundle_sid)))
            .form(vec![("ObjectSid".into(), object_sid.into())])
            .send()
            .await?
            .decode()?;
        Ok(resource.sid)
    }

    /// Moves a draft bundle into the vendor's review queue.
    pub async fn submit_bundle(
        &self,
        bundle_sid: &str,
    ) -> Result<ComplianceBundle, ConciergeError> {
        let bundle: ComplianceBundle = self
            .numbers
            .post(&self.bundle_path(bundle_sid))
            .form(vec![("Status".into(), "pending-review".into())])
            .send()
            .await?
            .decode()?;
        info!(bundle_sid = %bundle.sid, status = %bundle.status, "bundle submitted for review");
        Ok(bundle)
    }

    pub async fn bundle_status(
        &self,
        bundle_sid: &str,
    ) -> Result<ComplianceBundle, ConciergeError> {
        self.numbers
            .get(&self.bundle_path(bundle_sid))
            .send()
            .await?
            .decode()
    }
}
