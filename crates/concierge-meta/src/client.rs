//! Typed client for the Graph API surface the app uses.
//!
//! All paths sit behind one version segment from install settings. The
//! install's system-user token rides along as a query parameter; page
//! scoped reads switch to the page's own token when the pages listing
//! returned one.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use concierge_client::{ErrorProfile, FixedVersion, OpaqueId, VendorClient};
use concierge_types::ConciergeError;

use crate::settings::MetaSettings;

/// Token-death codes published for the Graph API: 190 (invalid or
/// expired token), 102 (session invalidated), and OAuthException 10
/// (permission revoked). Errors also show up embedded in 200 bodies.
pub const PROFILE: ErrorProfile = ErrorProfile {
    vendor: "graph",
    auth_codes: &[190, 102],
    auth_exception: Some(("OAuthException", 10)),
    scan_success_bodies: true,
};

/// Cursor pagination guard. The pages listing of a normal business is
/// a handful of entries; anything past this is a paging loop.
const MAX_PAGE_FETCHES: usize = 10;

/// A WhatsApp business phone number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhoneNumberSummary {
    pub id: OpaqueId,
    pub display_phone_number: String,
    #[serde(default)]
    pub verified_name: Option<String>,
    #[serde(default)]
    pub quality_rating: Option<String>,
}

/// A page the connected business manages.
#[derive(Debug, Clone, Deserialize)]
pub struct PageSummary {
    pub id: String,
    pub name: String,
    /// Page-scoped token, present when the granting user had page
    /// admin. Page reads prefer it over the install token.
    #[serde(default)]
    pub access_token: Option<String>,
}

/// An Instagram professional account reachable through a managed page.
#[derive(Debug, Clone, Serialize)]
pub struct InstagramAccount {
    pub page_id: String,
    pub page_name: String,
    pub instagram_id: OpaqueId,
    pub username: Option<String>,
}

/// Outcome of the two-stage Instagram discovery. Pages that could not
/// be read are reported, not silently dropped.
#[derive(Debug, Clone, Serialize)]
pub struct InstagramLookup {
    pub accounts: Vec<InstagramAccount>,
    pub skipped_pages: Vec<String>,
}

#[derive(Deserialize)]
struct SendResponse {
    #[serde(default)]
    messages: Vec<SentMessage>,
}

#[derive(Deserialize)]
struct SentMessage {
    id: String,
}

#[derive(Deserialize)]
struct DataEnvelope<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
    #[serde(default)]
    paging: Option<Paging>,
}

#[derive(Deserialize)]
struct Paging {
    #[serde(default)]
    cursors: Option<Cursors>,
    #[serde(default)]
    next: Option<String>,
}

#[derive(Deserialize)]
struct Cursors {
    #[serde(default)]
    after: Option<String>,
}

#[derive(Deserialize)]
struct PageDetail {
    #[serde(default)]
    instagram_business_account: Option<IgAccount>,
}

#[derive(Deserialize)]
struct IgAccount {
    id: OpaqueId,
    #[serde(default)]
    username: Option<String>,
}

/// One install's Graph API connection.
pub struct GraphClient {
    vendor: VendorClient,
}

impl GraphClient {
    pub fn new(settings: &MetaSettings) -> Result<Self, ConciergeError> {
        let vendor = VendorClient::new(
            settings.credential(),
            Arc::new(FixedVersion::new(&settings.graph_version)),
            PROFILE,
        )?;
        Ok(Self { vendor })
    }

    /// Sends a plain-text WhatsApp message and returns the vendor
    /// message id.
    pub async fn send_text(
        &self,
        phone_number_id: &str,
        to: &str,
        body: &str,
    ) -> Result<String, ConciergeError> {
        let payload = self
            .vendor
            .post(&format!("/{phone_number_id}/messages"))
            .json(json!({
                "messaging_product": "whatsapp",
                "recipient_type": "individual",
                "to": to,
                "type": "text",
                "text": {"body": body}
            }))
            .send()
            .await?;
        let response: SendResponse = payload.decode()?;
        let id = response
            .messages
            .into_iter()
            .next()
            .map(|m| m.id)
            .ok_or_else(|| ConciergeError::RequestFailed {
                status: 200,
                message: "graph: send succeeded but returned no message id".into(),
            })?;
        info!(phone_number_id, message_id = %id, "whatsapp message sent");
        Ok(id)
    }

    /// Phone numbers attached to a WhatsApp business account.
    pub async fn phone_numbers(
        &self,
        waba_id: &str,
    ) -> Result<Vec<PhoneNumberSummary>, ConciergeError> {
        let payload = self
            .vendor
            .get(&format!("/{waba_id}/phone_numbers"))
            .send()
            .await?;
        let envelope: DataEnvelope<PhoneNumberSummary> = payload.decode()?;
        Ok(envelope.data)
    }

    /// Pages the connected business manages, following cursor
    /// pagination to the end.
    pub async fn pages(&self) -> Result<Vec<PageSummary>, ConciergeError> {
        let mut pages = Vec::new();
        let mut after: Option<String> = None;
        for _ in 0..MAX_PAGE_FETCHES {
            let mut request = self.vendor.get("/me/accounts");
            if let Some(cursor) = &after {
                request = request.query("after", cursor);
            }
            let envelope: DataEnvelope<PageSummary> = request.send().await?.decode()?;
            pages.extend(envelope.data);

            after = match envelope.paging {
                Some(Paging {
                    next: Some(_),
                    cursors: Some(Cursors { after: Some(cursor) }),
                }) => Some(cursor),
                _ => return Ok(pages),
            };
        }
        warn!(
            fetched = pages.len(),
            "stopped following page cursors, vendor keeps paging"
        );
        Ok(pages)
    }

    /// The Instagram professional account behind one page, if any.
    /// Reads with the page token when the listing carried one.
    pub async fn instagram_account(
        &self,
        page: &PageSummary,
    ) -> Result<Option<InstagramAccount>, ConciergeError> {
        let mut request = self
            .vendor
            .get(&format!("/{}", page.id))
            .query("fields", "instagram_business_account{id,username}");
        if let Some(token) = &page.access_token {
            request = request.query("access_token", token);
        }
        let detail: PageDetail = request.send().await?.decode()?;
        Ok(detail.instagram_business_account.map(|ig| InstagramAccount {
            page_id: page.id.clone(),
            page_name: page.name.clone(),
            instagram_id: ig.id,
            username: ig.username,
        }))
    }

    /// Two-stage discovery: list pages, then resolve each page's
    /// Instagram account.
    ///
    /// A failure on the install token means the whole connection is
    /// bad and propagates. A failure on a single page (including an
    /// auth failure of that page's own token) only skips the page;
    /// other pages are still worth reporting.
    pub async fn instagram_accounts(&self) -> Result<InstagramLookup, ConciergeError> {
        let pages = self.pages().await?;
        let mut accounts = Vec::new();
        let mut skipped_pages = Vec::new();
        for page in &pages {
            match self.instagram_account(page).await {
                Ok(Some(account)) => accounts.push(account),
                Ok(None) => {}
                Err(err) if err.is_auth_invalid() && page.access_token.is_none() => {
                    return Err(err);
                }
                Err(err) => {
                    warn!(page_id = %page.id, error = %err, "page lookup failed, skipping");
                    skipped_pages.push(page.id.clone());
                }
            }
        }
        info!(
            pages = pages.len(),
            accounts = accounts.len(),
            skipped = skipped_pages.len(),
            "instagram discovery finished"
        );
        Ok(InstagramLookup {
            accounts,
            skipped_pages,
        })
    }
}
