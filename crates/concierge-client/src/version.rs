//! API version selection.
//!
//! Vendors disagree about where versions live: the social graph API
//! puts one segment in front of every path, the practice-management
//! vendor versions only its legacy endpoint families, and telephony
//! bakes versions into the paths themselves. The selector trait keeps
//! that policy out of the request path builder, and individual calls
//! can still override it.

/// Decides the version path segment for a vendor path.
pub trait ApiVersionSelector: Send + Sync {
    /// Returns the segment to insert between base URL and path, or
    /// `None` when this path family is unversioned. Must be
    /// deterministic for a given path.
    fn version_for(&self, path: &str) -> Option<String>;
}

/// Selector for vendors with no version segment anywhere.
pub struct Unversioned;

impl ApiVersionSelector for Unversioned {
    fn version_for(&self, _path: &str) -> Option<String> {
        None
    }
}

/// One version segment for every path.
pub struct FixedVersion(String);

impl FixedVersion {
    pub fn new(version: impl Into<String>) -> Self {
        let version = version.into();
        Self(version.trim_matches('/').to_string())
    }
}

impl ApiVersionSelector for FixedVersion {
    fn version_for(&self, _path: &str) -> Option<String> {
        Some(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_version_applies_everywhere_and_trims_slashes() {
        let selector = FixedVersion::new("/v19.0/");
        assert_eq!(selector.version_for("/me").as_deref(), Some("v19.0"));
        assert_eq!(
            selector.version_for("/123/messages").as_deref(),
            Some("v19.0")
        );
    }

    #[test]
    fn unversioned_always_declines() {
        assert_eq!(Unversioned.version_for("/calendars/cal-1/reserve"), None);
    }
}
