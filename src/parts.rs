//! The normalized request snapshot every reader is built on.
//!
//! Transports describe what they received as a [`RawHead`]; [`RequestParts::resolve`]
//! turns it into the immutable snapshot that [`RequestReader`](crate::RequestReader)
//! exposes. All inference happens here, once, at construction.

use std::fmt;
use std::net::IpAddr;
use std::sync::{Arc, OnceLock, Weak};

use http::header::{AUTHORIZATION, CONTENT_LENGTH, HOST, USER_AGENT};
use http::{HeaderMap, HeaderName, Version};
use percent_encoding::percent_decode_str;
use tracing::debug;

use crate::auth::Credentials;
use crate::config::ReaderConfig;
use crate::device::DeviceType;
use crate::env::{ServerEnv, script_strings};
use crate::error::Error;
use crate::proxy::{self, X_FORWARDED_HOST, X_FORWARDED_PROTO};
use crate::router::Route;

const SEC_CH_UA_MOBILE: HeaderName = HeaderName::from_static("sec-ch-ua-mobile");

/// URL scheme of the original request.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum Scheme {
    #[default]
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http  => "http",
            Self::Https => "https",
        }
    }

    pub fn default_port(self) -> u16 {
        match self {
            Self::Http  => 80,
            Self::Https => 443,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a transport knows about a request ahead of its body.
#[derive(Debug)]
pub struct RawHead {
    /// e.g. `"HTTP/1.1"`.
    pub protocol: String,
    pub method: String,
    /// Percent-encoded path, without the query.
    pub path: String,
    /// Raw query, without the leading `?`.
    pub query: String,
    /// Authority from an absolute-form target or HTTP/2 `:authority`.
    pub authority: Option<String>,
    pub headers: HeaderMap,
    /// Address of the immediate peer, if the transport knows it.
    pub peer: Option<IpAddr>,
    /// Whether the connection to the peer is TLS.
    pub secure: bool,
}

/// Wire name of an HTTP version.
pub fn protocol_name(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_2  => "HTTP/2.0",
        Version::HTTP_3  => "HTTP/3.0",
        _                => "HTTP/1.1",
    }
}

/// Immutable, normalized view of one request head.
#[derive(Debug)]
pub struct RequestParts {
    pub(crate) protocol: String,
    pub(crate) method: String,
    pub(crate) headers: HeaderMap,
    pub(crate) scheme: Scheme,
    pub(crate) host: String,
    pub(crate) path: String,
    pub(crate) raw_path: String,
    pub(crate) query: String,
    pub(crate) credentials: Credentials,
    pub(crate) content_length: Option<u64>,
    pub(crate) script_full: String,
    pub(crate) script_base: String,
    pub(crate) peer: Option<IpAddr>,
    pub(crate) client_ip: Option<IpAddr>,
    pub(crate) user_agent: String,
    pub(crate) device: DeviceType,
    pub(crate) route: OnceLock<Weak<Route>>,
}

impl RequestParts {
    /// Normalizes a transport's raw head.
    ///
    /// Fails on a path with malformed percent-encoding or an unusable
    /// `Content-Length`; everything else degrades to empty defaults.
    pub fn resolve(head: RawHead, config: &ReaderConfig, env: &ServerEnv) -> Result<Self, Error> {
        let RawHead { protocol, method, path, query, authority, headers, peer, secure } = head;

        let raw_path = path;
        let path = decode_path(&raw_path)?;
        let content_length = declared_length(&headers)?;

        let peer = peer.map(|ip| ip.to_canonical());
        let peer_trusted = peer.is_some_and(|ip| config.trusted_proxies.contains(ip));

        let scheme = if secure
            || proxy::forwarded_value(&headers, &X_FORWARDED_PROTO, peer_trusted)
                .is_some_and(|proto| proto.eq_ignore_ascii_case("https"))
        {
            Scheme::Https
        } else {
            Scheme::Http
        };

        let host = resolve_host(&headers, authority.as_deref(), peer_trusted, scheme, env);

        let client_ip = proxy::client_ip(
            peer,
            &headers,
            &config.trusted_proxies,
            config.client_ip_headers.as_slice(),
            config.forwarded_position,
        );

        let credentials = Credentials::from_header(header_str(&headers, &AUTHORIZATION));
        let user_agent = header_str(&headers, &USER_AGENT).unwrap_or_default().to_owned();
        let mobile_hint = header_str(&headers, &SEC_CH_UA_MOBILE).is_some_and(|v| v.trim() == "?1");
        let device = DeviceType::classify(&user_agent, mobile_hint);

        let (script_full, script_base) = script_strings(env.script_path().as_deref());

        debug!(
            %method,
            %path,
            %scheme,
            %host,
            client_ip = ?client_ip,
            %device,
            "resolved request parts"
        );

        Ok(Self {
            protocol,
            method: method.to_ascii_uppercase(),
            headers,
            scheme,
            host,
            path,
            raw_path,
            query,
            credentials,
            content_length,
            script_full,
            script_base,
            peer,
            client_ip,
            user_agent,
            device,
            route: OnceLock::new(),
        })
    }

    /// Address of the immediate peer, before forwarding headers.
    pub fn peer_addr(&self) -> Option<IpAddr> {
        self.peer
    }

    pub(crate) fn declared_length(&self) -> Option<u64> {
        self.content_length
    }

    pub(crate) fn set_route(&self, route: &Arc<Route>) -> Result<(), Error> {
        self.route
            .set(Arc::downgrade(route))
            .map_err(|_| Error::RouteAlreadyResolved)
    }

    pub(crate) fn route(&self) -> Result<Arc<Route>, Error> {
        self.route
            .get()
            .ok_or(Error::RouteNotResolved)?
            .upgrade()
            .ok_or(Error::RouteReleased)
    }
}

fn header_str<'h>(headers: &'h HeaderMap, name: &HeaderName) -> Option<&'h str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Percent-decodes a request path. Every `%` must start a `%XX` escape and the
/// decoded bytes must be UTF-8.
fn decode_path(raw: &str) -> Result<String, Error> {
    let malformed = || Error::MalformedPath { path: raw.to_owned() };

    let bytes = raw.as_bytes();
    let mut i = 0;
    while let Some(offset) = bytes[i..].iter().position(|&b| b == b'%') {
        let at = i + offset;
        let escape = bytes.get(at + 1..at + 3).ok_or_else(malformed)?;
        if !escape.iter().all(u8::is_ascii_hexdigit) {
            return Err(malformed());
        }
        i = at + 3;
    }

    percent_decode_str(raw)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| malformed())
}

/// The declared body length. Repeated values (as separate field lines or a
/// comma list) are accepted only when they all agree.
fn declared_length(headers: &HeaderMap) -> Result<Option<u64>, Error> {
    let mut declared = None;
    for value in headers.get_all(CONTENT_LENGTH) {
        let invalid = || Error::InvalidContentLength {
            value: String::from_utf8_lossy(value.as_bytes()).into_owned(),
        };
        let text = value.to_str().map_err(|_| invalid())?;
        for item in text.split(',') {
            let item = item.trim();
            if item.is_empty() || !item.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            let n = item.parse::<u64>().map_err(|_| invalid())?;
            match declared {
                Some(prev) if prev != n => return Err(invalid()),
                _ => declared = Some(n),
            }
        }
    }
    Ok(declared)
}

fn resolve_host(
    headers: &HeaderMap,
    authority: Option<&str>,
    peer_trusted: bool,
    scheme: Scheme,
    env: &ServerEnv,
) -> String {
    if let Some(host) = proxy::forwarded_value(headers, &X_FORWARDED_HOST, peer_trusted) {
        return host.to_owned();
    }
    if let Some(host) = header_str(headers, &HOST).map(str::trim).filter(|h| !h.is_empty()) {
        return host.to_owned();
    }
    if let Some(authority) = authority.filter(|a| !a.is_empty()) {
        return authority.to_owned();
    }
    match (env.name(), env.port()) {
        (Some(name), Some(port)) if port != scheme.default_port() => format!("{name}:{port}"),
        (Some(name), _) => name.to_owned(),
        (None, _) => String::new(),
    }
}
