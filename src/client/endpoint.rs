//! Dataplane API endpoint description.

use crate::version::Version;

/// Connection parameters for one Dataplane API instance
///
/// Identity tags are opaque to the engine; callers use them to correlate
/// results when syncing many endpoints. A cached version skips the info
/// probe on connect.
#[derive(Clone)]
pub struct Endpoint {
    pub url: String,
    pub user: String,
    pub password: String,
    pub tags: Vec<String>,
    pub cached_version: Option<Version>,
}

impl Endpoint {
    /// Describe an endpoint with basic-auth credentials
    #[must_use]
    pub fn new(url: impl Into<String>, user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            user: user.into(),
            password: password.into(),
            tags: Vec::new(),
            cached_version: None,
        }
    }

    /// Attach an opaque identity tag
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Provide a previously discovered server version, skipping the probe
    #[must_use]
    pub fn with_cached_version(mut self, version: Version) -> Self {
        self.cached_version = Some(version);
        self
    }

    /// Base URL without a trailing slash
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("url", &self.url)
            .field("user", &self.user)
            .field("password", &"***")
            .field("tags", &self.tags)
            .field("cached_version", &self.cached_version)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_strips_trailing_slash() {
        let endpoint = Endpoint::new("http://10.0.0.1:5555/", "admin", "secret");
        assert_eq!(endpoint.base_url(), "http://10.0.0.1:5555");
    }

    #[test]
    fn test_debug_masks_password() {
        let endpoint = Endpoint::new("http://localhost:5555", "admin", "hunter2");
        let debug = format!("{endpoint:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("***"));
    }

    #[test]
    fn test_tags_accumulate() {
        let endpoint = Endpoint::new("http://localhost:5555", "admin", "pw")
            .with_tag("dc1")
            .with_tag("blue");
        assert_eq!(endpoint.tags, vec!["dc1", "blue"]);
    }
}
