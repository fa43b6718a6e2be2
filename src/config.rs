//! Reader configuration.
//!
//! Loaded from TOML; every field has a default so an empty file is valid:
//!
//! ```toml
//! trusted_proxies    = ["10.0.0.0/8", "::1"]
//! forwarded_position = "rightmost_untrusted"   # or "leftmost"
//! client_ip_headers  = ["x-forwarded-for", "x-real-ip"]
//! max_body_size      = 2097152
//! ```

use std::fs;
use std::path::Path;

use http::header::HeaderName;
use serde::Deserialize;

use crate::proxy::{ForwardedPosition, TrustedProxies};

/// 2 MiB.
pub const DEFAULT_MAX_BODY_SIZE: usize = 2 * 1024 * 1024;

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Trust and resource policy applied when building readers.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Peers allowed to supply forwarding headers. Empty: trust nobody.
    pub trusted_proxies: TrustedProxies,

    /// Which forwarded hop counts as the client.
    pub forwarded_position: ForwardedPosition,

    /// Forwarding headers consulted for the client address, in order; the
    /// first one present is used.
    pub client_ip_headers: ForwardingHeaders,

    /// Upper bound on buffered body bytes.
    pub max_body_size: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            trusted_proxies: TrustedProxies::default(),
            forwarded_position: ForwardedPosition::default(),
            client_ip_headers: ForwardingHeaders::default(),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }
}

impl ReaderConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn trusted_proxies(mut self, proxies: TrustedProxies) -> Self {
        self.trusted_proxies = proxies;
        self
    }

    pub fn forwarded_position(mut self, position: ForwardedPosition) -> Self {
        self.forwarded_position = position;
        self
    }

    pub fn max_body_size(mut self, limit: usize) -> Self {
        self.max_body_size = limit;
        self
    }
}

/// Validated list of forwarding header names.
#[derive(Clone, Debug, Deserialize)]
#[serde(try_from = "Vec<String>")]
pub struct ForwardingHeaders(Vec<HeaderName>);

impl ForwardingHeaders {
    pub fn as_slice(&self) -> &[HeaderName] {
        &self.0
    }
}

impl Default for ForwardingHeaders {
    fn default() -> Self {
        Self(vec![HeaderName::from_static("x-forwarded-for")])
    }
}

impl TryFrom<Vec<String>> for ForwardingHeaders {
    type Error = http::header::InvalidHeaderName;

    fn try_from(names: Vec<String>) -> Result<Self, Self::Error> {
        names
            .iter()
            .map(|n| HeaderName::from_bytes(n.as_bytes()))
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}
