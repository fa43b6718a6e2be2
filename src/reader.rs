//! The request reader interface.

use std::future::Future;
use std::net::IpAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::HeaderMap;

use crate::device::DeviceType;
use crate::error::Error;
use crate::parts::{RequestParts, Scheme};
use crate::router::Route;

/// Read-only access to one inbound request, independent of the transport
/// that produced it.
///
/// Implementors supply the normalized [`RequestParts`] and the body; every
/// accessor is provided on top of those two. Accessors are total: absent data
/// reads as an empty string or zero, never as an error.
///
/// Concrete readers are picked by constructor: [`HttpRequestReader`] for
/// hyper-style `http::Request`s, [`CgiRequestReader`] for CGI environments.
///
/// [`HttpRequestReader`]: crate::HttpRequestReader
/// [`CgiRequestReader`]: crate::CgiRequestReader
pub trait RequestReader {
    /// The normalized request head.
    fn parts(&self) -> &RequestParts;

    /// The full request body.
    ///
    /// The body stream is read on the first call and cached; later calls
    /// return the same bytes. The read is bounded by the configured maximum
    /// body size. If it fails, the error is returned once and every later
    /// call returns [`Error::BodyUnavailable`]: the stream is never re-read.
    fn content(&mut self) -> impl Future<Output = Result<&Bytes, Error>> + Send;

    /// e.g. `"HTTP/1.1"`.
    fn protocol(&self) -> &str {
        &self.parts().protocol
    }

    /// Uppercase method, e.g. `"GET"`.
    fn method(&self) -> &str {
        &self.parts().method
    }

    /// Case-insensitive header lookup. Repeated headers are joined with `", "`
    /// in arrival order; an absent header is `""`.
    fn header(&self, name: &str) -> String {
        let mut values = self.parts().headers.get_all(name).iter();
        let Some(first) = values.next() else {
            return String::new();
        };
        let mut joined = String::from_utf8_lossy(first.as_bytes()).into_owned();
        for value in values {
            joined.push_str(", ");
            joined.push_str(&String::from_utf8_lossy(value.as_bytes()));
        }
        joined
    }

    /// All headers as received.
    fn headers(&self) -> &HeaderMap {
        &self.parts().headers
    }

    fn scheme(&self) -> Scheme {
        self.parts().scheme
    }

    /// Authority of the original request, honouring `X-Forwarded-Host` from
    /// trusted proxies.
    fn host(&self) -> &str {
        &self.parts().host
    }

    /// HTTP Basic user, or `""`.
    fn user(&self) -> &str {
        &self.parts().credentials.user
    }

    /// HTTP Basic password, or `""`.
    fn password(&self) -> &str {
        &self.parts().credentials.password
    }

    /// Percent-decoded path, without the query.
    fn path(&self) -> &str {
        &self.parts().path
    }

    /// The path as sent, still percent-encoded. Segment boundaries are those
    /// of the wire form, so an encoded `/` stays inside its segment.
    fn raw_path(&self) -> &str {
        &self.parts().raw_path
    }

    /// Raw query string, without the leading `?`. Not decoded: parameters
    /// are decoded individually by whoever parses them.
    fn query(&self) -> &str {
        &self.parts().query
    }

    /// Declared body length; 0 when no `Content-Length` was sent.
    fn content_length(&self) -> u64 {
        self.parts().content_length.unwrap_or(0)
    }

    /// The executing script: its absolute path when `fullpath` is set, else
    /// its file name. `""` when the environment names no script.
    fn script(&self, fullpath: bool) -> &str {
        let parts = self.parts();
        if fullpath { &parts.script_full } else { &parts.script_base }
    }

    /// Best client address given the trusted-proxy policy; `""` when the peer
    /// address is unknown.
    fn client_ip(&self) -> String {
        self.parts().client_ip.map(|ip| ip.to_string()).unwrap_or_default()
    }

    fn client_addr(&self) -> Option<IpAddr> {
        self.parts().client_ip
    }

    /// Address of the immediate peer, ignoring forwarding headers.
    fn peer_addr(&self) -> Option<IpAddr> {
        self.parts().peer_addr()
    }

    /// Raw `User-Agent`, or `""`.
    fn client_user_agent(&self) -> &str {
        &self.parts().user_agent
    }

    fn client_device_type(&self) -> DeviceType {
        self.parts().device
    }

    fn client_device_type_name(&self) -> &'static str {
        self.parts().device.as_str()
    }

    /// The route this request was resolved to.
    ///
    /// Fails with [`Error::RouteNotResolved`] when called before routing, and
    /// with [`Error::RouteReleased`] once the router's dispatcher dropped it.
    fn route(&self) -> Result<Arc<Route>, Error> {
        self.parts().route()
    }

    /// Associates the resolved route. Only the first call succeeds.
    fn set_route(&self, route: &Arc<Route>) -> Result<(), Error> {
        self.parts().set_route(route)
    }

    /// `path` plus `?query` when the query is non-empty.
    fn uri(&self) -> String {
        let (path, query) = (self.path(), self.query());
        if query.is_empty() {
            path.to_owned()
        } else {
            format!("{path}?{query}")
        }
    }

    /// `scheme://host` followed by [`uri`](Self::uri).
    fn url(&self) -> String {
        format!("{}://{}{}", self.scheme(), self.host(), self.uri())
    }
}
