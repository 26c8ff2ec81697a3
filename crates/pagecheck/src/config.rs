//! Session configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

use crate::assertion::soft::AssertionMode;
use crate::result::{PageError, PageResult};

/// Default application root for relative URIs
pub const DEFAULT_BASE_URL: &str = "http://localhost";

/// Default redirect hop limit (same as reqwest's default policy)
pub const DEFAULT_MAX_REDIRECTS: usize = 10;

/// Configuration for a [`PageSession`](crate::session::PageSession)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Base URL relative URIs are joined to
    pub base_url: String,
    /// Maximum redirect hops per navigation
    pub max_redirects: usize,
    /// How assertion failures are reported
    pub assertion_mode: AssertionMode,
    /// Keep and resend cookies from `Set-Cookie`
    pub send_cookies: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            max_redirects: DEFAULT_MAX_REDIRECTS,
            assertion_mode: AssertionMode::FailFast,
            send_cookies: true,
        }
    }
}

impl SessionConfig {
    /// Create default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base URL
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the redirect limit
    #[must_use]
    pub const fn with_max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    /// Set the assertion mode
    #[must_use]
    pub const fn with_assertion_mode(mut self, mode: AssertionMode) -> Self {
        self.assertion_mode = mode;
        self
    }

    /// Enable or disable the cookie jar
    #[must_use]
    pub const fn with_send_cookies(mut self, send_cookies: bool) -> Self {
        self.send_cookies = send_cookies;
        self
    }

    /// Parse YAML configuration; missing keys keep their defaults
    pub fn from_yaml_str(yaml: &str) -> PageResult<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.base_url()?;
        Ok(config)
    }

    /// Load YAML configuration from a file
    pub fn from_file(path: impl AsRef<Path>) -> PageResult<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    /// Parsed base URL
    pub fn base_url(&self) -> PageResult<Url> {
        Url::parse(&self.base_url)
            .map_err(|e| PageError::config(format!("invalid base_url {}: {e}", self.base_url)))
    }
}
