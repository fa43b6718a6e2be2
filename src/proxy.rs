//! Trust boundary for proxy-forwarded request data.
//!
//! A forwarding header is only honoured when the *immediate* peer is a
//! configured trusted proxy. Anything else can be forged by the client, so
//! untrusted peers are always reported as themselves.

use std::fmt;
use std::net::{IpAddr, SocketAddr};

use http::HeaderMap;
use http::header::HeaderName;
use serde::Deserialize;
use tracing::{debug, warn};

pub(crate) const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
pub(crate) const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

// ── TrustedProxies ────────────────────────────────────────────────────────────

/// A single address or CIDR block, e.g. `10.0.0.0/8` or `::1`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct IpRange {
    network: IpAddr,
    prefix: u8,
}

impl IpRange {
    pub fn contains(&self, ip: IpAddr) -> bool {
        match (self.network, ip.to_canonical()) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                let mask = u32::MAX.checked_shl(32 - u32::from(self.prefix)).unwrap_or(0);
                u32::from(net) & mask == u32::from(ip) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                let mask = u128::MAX.checked_shl(128 - u32::from(self.prefix)).unwrap_or(0);
                u128::from(net) & mask == u128::from(ip) & mask
            }
            _ => false,
        }
    }
}

impl std::str::FromStr for IpRange {
    type Err = InvalidIpRange;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidIpRange(s.to_owned());
        let (addr, prefix) = match s.trim().split_once('/') {
            Some((addr, prefix)) => (addr, Some(prefix)),
            None => (s.trim(), None),
        };
        let network = addr.parse::<IpAddr>().map_err(|_| invalid())?.to_canonical();
        let max = if network.is_ipv4() { 32 } else { 128 };
        let prefix = match prefix {
            Some(p) => p.parse::<u8>().ok().filter(|p| *p <= max).ok_or_else(invalid)?,
            None => max,
        };
        Ok(Self { network, prefix })
    }
}

impl fmt::Display for IpRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}

/// Returned when a trusted-proxy entry is neither an IP address nor a CIDR block.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("invalid trusted proxy `{0}`: expected an IP address or CIDR block")]
pub struct InvalidIpRange(String);

/// The set of peers allowed to supply forwarding headers.
///
/// Empty by default: no peer is trusted until configured.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(try_from = "Vec<String>")]
pub struct TrustedProxies(Vec<IpRange>);

impl TrustedProxies {
    pub fn new(ranges: impl IntoIterator<Item = IpRange>) -> Self {
        Self(ranges.into_iter().collect())
    }

    pub fn contains(&self, ip: IpAddr) -> bool {
        self.0.iter().any(|range| range.contains(ip))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<Vec<String>> for TrustedProxies {
    type Error = InvalidIpRange;

    fn try_from(entries: Vec<String>) -> Result<Self, Self::Error> {
        entries
            .iter()
            .map(|e| e.parse::<IpRange>())
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}

/// Which `X-Forwarded-For` entry is the client when the peer is trusted.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ForwardedPosition {
    /// The first entry, as written by the outermost proxy. Only sound when
    /// the edge proxy overwrites (rather than appends to) the header.
    Leftmost,
    /// Walk from the right, skipping entries that are trusted proxies
    /// themselves; the first untrusted hop is the client.
    #[default]
    RightmostUntrusted,
}

// ── Resolution ────────────────────────────────────────────────────────────────

/// Resolves the client address for a request received from `peer`.
///
/// Returns `None` only when the peer itself is unknown.
pub(crate) fn client_ip(
    peer: Option<IpAddr>,
    headers: &HeaderMap,
    trusted: &TrustedProxies,
    forwarding_headers: &[HeaderName],
    position: ForwardedPosition,
) -> Option<IpAddr> {
    let peer = peer?.to_canonical();
    let Some(name) = forwarding_headers.iter().find(|name| headers.contains_key(*name)) else {
        return Some(peer);
    };

    if !trusted.contains(peer) {
        debug!(%peer, header = %name, "ignoring forwarding header from untrusted peer");
        return Some(peer);
    }

    let entries: Vec<&str> = headers
        .get_all(name)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .collect();

    let selected = match position {
        ForwardedPosition::Leftmost => entries.first().copied(),
        ForwardedPosition::RightmostUntrusted => rightmost_untrusted(&entries, trusted),
    };

    match selected.map(|e| (e, parse_forwarded_addr(e))) {
        Some((_, Some(ip))) => Some(ip),
        Some((entry, None)) => {
            warn!(%peer, header = %name, entry, "unparsable forwarded address, using peer");
            Some(peer)
        }
        None => Some(peer),
    }
}

fn rightmost_untrusted<'a>(entries: &[&'a str], trusted: &TrustedProxies) -> Option<&'a str> {
    for entry in entries.iter().rev() {
        match parse_forwarded_addr(entry) {
            Some(ip) if trusted.contains(ip) => continue,
            // Untrusted hop, or garbage we must not skip past.
            _ => return Some(entry),
        }
    }
    entries.first().copied()
}

/// Parses one forwarded hop: `1.2.3.4`, `1.2.3.4:80`, `::1`, `[::1]:80`, optionally quoted.
fn parse_forwarded_addr(entry: &str) -> Option<IpAddr> {
    let entry = entry.trim().trim_matches('"');
    if let Ok(ip) = entry.parse::<IpAddr>() {
        return Some(ip.to_canonical());
    }
    if let Ok(addr) = entry.parse::<SocketAddr>() {
        return Some(addr.ip().to_canonical());
    }
    let inner = entry.strip_prefix('[')?.split(']').next()?;
    inner.parse::<IpAddr>().ok().map(|ip| ip.to_canonical())
}

/// First value of a forwarding header, honoured only for trusted peers.
pub(crate) fn forwarded_value<'h>(
    headers: &'h HeaderMap,
    name: &HeaderName,
    peer_trusted: bool,
) -> Option<&'h str> {
    if !peer_trusted {
        return None;
    }
    headers
        .get(name)?
        .to_str()
        .ok()?
        .split(',')
        .next()
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    const XFF: HeaderName = HeaderName::from_static("x-forwarded-for");

    fn proxies(entries: &[&str]) -> TrustedProxies {
        TrustedProxies::try_from(entries.iter().map(|s| s.to_string()).collect::<Vec<_>>()).unwrap()
    }

    fn xff(values: &[&str]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for v in values {
            headers.append(XFF, HeaderValue::from_str(v).unwrap());
        }
        headers
    }

    fn resolve(peer: &str, headers: &HeaderMap, trusted: &TrustedProxies, pos: ForwardedPosition) -> Option<IpAddr> {
        client_ip(Some(peer.parse().unwrap()), headers, trusted, &[XFF], pos)
    }

    fn ip(s: &str) -> Option<IpAddr> {
        Some(s.parse().unwrap())
    }

    #[test]
    fn ranges_match_by_prefix() {
        let range: IpRange = "10.0.0.0/8".parse().unwrap();
        assert!(range.contains("10.255.0.1".parse().unwrap()));
        assert!(!range.contains("11.0.0.1".parse().unwrap()));
        // IPv4-mapped IPv6 peers are canonicalised.
        assert!(range.contains("::ffff:10.1.2.3".parse().unwrap()));

        let v6: IpRange = "fd00::/8".parse().unwrap();
        assert!(v6.contains("fd12::1".parse().unwrap()));
        assert!(!v6.contains("10.0.0.1".parse().unwrap()));

        let any: IpRange = "0.0.0.0/0".parse().unwrap();
        assert!(any.contains("203.0.113.9".parse().unwrap()));

        let single: IpRange = "127.0.0.1".parse().unwrap();
        assert_eq!(single.to_string(), "127.0.0.1/32");
    }

    #[test]
    fn invalid_ranges_are_rejected() {
        for bad in ["", "10.0.0.0/33", "::/129", "localhost", "10.0.0.0/x"] {
            assert!(bad.parse::<IpRange>().is_err(), "{bad}");
        }
    }

    #[test]
    fn trusted_peer_yields_forwarded_client() {
        let trusted = proxies(&["10.0.0.0/8"]);
        let headers = xff(&["1.2.3.4, 10.0.0.1"]);
        for pos in [ForwardedPosition::Leftmost, ForwardedPosition::RightmostUntrusted] {
            assert_eq!(resolve("10.0.0.2", &headers, &trusted, pos), ip("1.2.3.4"));
        }
    }

    #[test]
    fn untrusted_peer_is_reported_as_itself() {
        let trusted = proxies(&["10.0.0.0/8"]);
        let headers = xff(&["1.2.3.4, 10.0.0.1"]);
        let got = resolve("198.51.100.7", &headers, &trusted, ForwardedPosition::Leftmost);
        assert_eq!(got, ip("198.51.100.7"));
    }

    #[test]
    fn nothing_is_trusted_by_default() {
        let headers = xff(&["1.2.3.4"]);
        let got = resolve("10.0.0.2", &headers, &TrustedProxies::default(), ForwardedPosition::Leftmost);
        assert_eq!(got, ip("10.0.0.2"));
    }

    #[test]
    fn rightmost_untrusted_ignores_client_supplied_prefix() {
        // The client forged "6.6.6.6"; the edge proxy appended the real address.
        let trusted = proxies(&["10.0.0.0/8"]);
        let headers = xff(&["6.6.6.6, 1.2.3.4, 10.0.0.1"]);
        let got = resolve("10.0.0.2", &headers, &trusted, ForwardedPosition::RightmostUntrusted);
        assert_eq!(got, ip("1.2.3.4"));
        let got = resolve("10.0.0.2", &headers, &trusted, ForwardedPosition::Leftmost);
        assert_eq!(got, ip("6.6.6.6"));
    }

    #[test]
    fn multiple_field_lines_form_one_list() {
        let trusted = proxies(&["10.0.0.0/8"]);
        let headers = xff(&["1.2.3.4", "10.0.0.1"]);
        let got = resolve("10.0.0.2", &headers, &trusted, ForwardedPosition::RightmostUntrusted);
        assert_eq!(got, ip("1.2.3.4"));
    }

    #[test]
    fn all_trusted_chain_yields_leftmost() {
        let trusted = proxies(&["10.0.0.0/8"]);
        let headers = xff(&["10.0.0.9, 10.0.0.1"]);
        let got = resolve("10.0.0.2", &headers, &trusted, ForwardedPosition::RightmostUntrusted);
        assert_eq!(got, ip("10.0.0.9"));
    }

    #[test]
    fn garbage_entries_fall_back_to_peer() {
        let trusted = proxies(&["10.0.0.0/8"]);
        let headers = xff(&["1.2.3.4, unknown"]);
        let got = resolve("10.0.0.2", &headers, &trusted, ForwardedPosition::RightmostUntrusted);
        assert_eq!(got, ip("10.0.0.2"));
        let headers = xff(&["unknown"]);
        let got = resolve("10.0.0.2", &headers, &trusted, ForwardedPosition::Leftmost);
        assert_eq!(got, ip("10.0.0.2"));
    }

    #[test]
    fn forwarded_entries_may_carry_ports_and_brackets() {
        assert_eq!(parse_forwarded_addr("1.2.3.4:8080"), ip("1.2.3.4"));
        assert_eq!(parse_forwarded_addr("[2001:db8::1]:443"), ip("2001:db8::1"));
        assert_eq!(parse_forwarded_addr("\"[2001:db8::1]\""), ip("2001:db8::1"));
        assert_eq!(parse_forwarded_addr("2001:db8::1"), ip("2001:db8::1"));
        assert_eq!(parse_forwarded_addr("unknown"), None);
    }

    #[test]
    fn missing_peer_resolves_to_nothing() {
        let headers = xff(&["1.2.3.4"]);
        let got = client_ip(None, &headers, &proxies(&["0.0.0.0/0"]), &[XFF], ForwardedPosition::Leftmost);
        assert_eq!(got, None);
    }

    #[test]
    fn forwarded_value_requires_trust() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static("https, http"));
        assert_eq!(forwarded_value(&headers, &X_FORWARDED_PROTO, true), Some("https"));
        assert_eq!(forwarded_value(&headers, &X_FORWARDED_PROTO, false), None);
    }
}
