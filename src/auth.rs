//! HTTP Basic credentials (RFC 7617).
//!
//! Extraction is total: anything other than a well-formed `Basic` header
//! yields empty credentials. Authentication itself is the caller's job.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::debug;

/// User and password carried by an `Authorization: Basic …` header.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct Credentials {
    pub(crate) user: String,
    pub(crate) password: String,
}

impl Credentials {
    /// Parses an `Authorization` header value, or returns empty credentials.
    pub(crate) fn from_header(value: Option<&str>) -> Self {
        value.and_then(Self::parse_basic).unwrap_or_default()
    }

    fn parse_basic(value: &str) -> Option<Self> {
        let (scheme, token) = value.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("basic") {
            return None;
        }

        let decoded = match STANDARD.decode(token.trim()) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!("ignoring basic credentials: {e}");
                return None;
            }
        };
        let Ok(decoded) = String::from_utf8(decoded) else {
            debug!("ignoring basic credentials: not valid utf-8");
            return None;
        };
        // The user-id cannot contain a colon; the password may.
        let (user, password) = decoded.split_once(':')?;

        Some(Self { user: user.to_owned(), password: password.to_owned() })
    }
}
