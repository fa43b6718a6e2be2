//! Reader over a CGI environment (RFC 3875).
//!
//! The meta-variables are handed over as an explicit [`CgiEnv`], typically
//! collected from `std::env::vars()` by the binary's `main`, and the body is
//! read from the given stdin stream.

use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;

use bytes::Bytes;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderMap, HeaderName, HeaderValue};
use tokio::io::AsyncRead;
use tracing::debug;

use crate::body::{LazyBody, ReaderBody};
use crate::config::ReaderConfig;
use crate::env::ServerEnv;
use crate::error::Error;
use crate::parts::{RawHead, RequestParts};
use crate::reader::RequestReader;

/// CGI meta-variables for one request.
#[derive(Clone, Debug, Default)]
pub struct CgiEnv(BTreeMap<String, String>);

impl CgiEnv {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str).filter(|v| !v.is_empty())
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.0 {
            let header = match name.as_str() {
                "CONTENT_TYPE" => CONTENT_TYPE,
                "CONTENT_LENGTH" => CONTENT_LENGTH,
                _ => match name.strip_prefix("HTTP_") {
                    Some(rest) => {
                        let wire = rest.to_ascii_lowercase().replace('_', "-");
                        match HeaderName::from_bytes(wire.as_bytes()) {
                            Ok(header) => header,
                            Err(_) => {
                                debug!(variable = %name, "skipping meta-variable with invalid header name");
                                continue;
                            }
                        }
                    }
                    None => continue,
                },
            };
            if value.is_empty() && header == CONTENT_LENGTH {
                continue;
            }
            match HeaderValue::from_str(value) {
                Ok(value) => {
                    headers.append(header, value);
                }
                Err(_) => debug!(variable = %name, "skipping meta-variable with invalid header value"),
            }
        }
        headers
    }

    fn server_env(&self) -> ServerEnv {
        let mut env = ServerEnv::new();
        if let Some(script) = self.get("SCRIPT_FILENAME") {
            env = env.script_filename(script);
        }
        if let Some(root) = self.get("DOCUMENT_ROOT") {
            env = env.document_root(root);
        }
        if let Some(name) = self.get("SERVER_NAME") {
            env = env.server_name(name);
        }
        if let Some(port) = self.get("SERVER_PORT").and_then(|p| p.parse().ok()) {
            env = env.server_port(port);
        }
        env
    }

    /// Encoded path and query. `REQUEST_URI` when the server provides it,
    /// else `SCRIPT_NAME` + `PATH_INFO`; `QUERY_STRING` always wins for the query.
    fn target(&self) -> (String, String) {
        let (path, query) = match self.get("REQUEST_URI") {
            Some(uri) => match uri.split_once('?') {
                Some((path, query)) => (path.to_owned(), query.to_owned()),
                None => (uri.to_owned(), String::new()),
            },
            None => {
                let script = self.get("SCRIPT_NAME").unwrap_or_default();
                let info = self.get("PATH_INFO").unwrap_or_default();
                (format!("{script}{info}"), String::new())
            }
        };
        let query = self.get("QUERY_STRING").map(str::to_owned).unwrap_or(query);
        let path = if path.is_empty() { "/".to_owned() } else { path };
        (path, query)
    }

    fn secure(&self) -> bool {
        let https = self.get("HTTPS").is_some_and(|v| !v.eq_ignore_ascii_case("off"));
        https || self.get("REQUEST_SCHEME").is_some_and(|s| s.eq_ignore_ascii_case("https"))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for CgiEnv {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// [`RequestReader`] over CGI meta-variables and a stdin stream.
pub struct CgiRequestReader<R> {
    parts: RequestParts,
    body: LazyBody<ReaderBody<R>>,
}

impl<R> CgiRequestReader<R>
where
    R: AsyncRead + Unpin + Send,
{
    /// Normalizes the meta-variables. `stdin` is not read until
    /// [`content`](RequestReader::content) is called, and then only for
    /// `CONTENT_LENGTH` bytes.
    pub fn new(env: CgiEnv, stdin: R, config: &ReaderConfig) -> Result<Self, Error> {
        let (path, query) = env.target();
        let raw = RawHead {
            protocol: env.get("SERVER_PROTOCOL").unwrap_or("HTTP/1.0").to_owned(),
            method: env.get("REQUEST_METHOD").unwrap_or("GET").to_owned(),
            path,
            query,
            authority: None,
            headers: env.headers(),
            peer: env.get("REMOTE_ADDR").and_then(|a| a.parse::<IpAddr>().ok()),
            secure: env.secure(),
        };
        let parts = RequestParts::resolve(raw, config, &env.server_env())?;
        let body = LazyBody::new(ReaderBody(stdin), parts.declared_length(), config.max_body_size);
        Ok(Self { parts, body })
    }
}

impl<R> RequestReader for CgiRequestReader<R>
where
    R: AsyncRead + Unpin + Send,
{
    fn parts(&self) -> &RequestParts {
        &self.parts
    }

    async fn content(&mut self) -> Result<&Bytes, Error> {
        self.body.get().await
    }
}

impl<R> fmt::Debug for CgiRequestReader<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CgiRequestReader")
            .field("method", &self.parts.method)
            .field("path", &self.parts.path)
            .field("protocol", &self.parts.protocol)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceType;
    use crate::parts::Scheme;
    use crate::proxy::TrustedProxies;

    fn env(vars: &[(&str, &str)]) -> CgiEnv {
        vars.iter().copied().collect()
    }

    fn reader(vars: &[(&str, &str)], stdin: &'static [u8]) -> CgiRequestReader<&'static [u8]> {
        CgiRequestReader::new(env(vars), stdin, &ReaderConfig::default()).unwrap()
    }

    const BASE: &[(&str, &str)] = &[
        ("REQUEST_METHOD", "post"),
        ("SERVER_PROTOCOL", "HTTP/1.1"),
        ("SCRIPT_NAME", "/cgi-bin/app.cgi"),
        ("SCRIPT_FILENAME", "/var/www/cgi-bin/app.cgi"),
        ("PATH_INFO", "/orders/caf%C3%A9"),
        ("QUERY_STRING", "page=2&sort=%20asc"),
        ("SERVER_NAME", "shop.test"),
        ("SERVER_PORT", "8443"),
        ("HTTPS", "on"),
        ("REMOTE_ADDR", "192.0.2.10"),
        ("HTTP_USER_AGENT", "Mozilla/5.0 (iPad; CPU OS 16_6 like Mac OS X)"),
        ("HTTP_X_REQUEST_ID", "abc-123"),
        ("CONTENT_TYPE", "text/plain"),
        ("CONTENT_LENGTH", "5"),
        ("PATH", "/usr/bin"),
    ];

    #[test]
    fn meta_variables_map_onto_the_reader() {
        let reader = reader(BASE, b"hello");
        assert_eq!(reader.protocol(), "HTTP/1.1");
        assert_eq!(reader.method(), "POST");
        assert_eq!(reader.scheme(), Scheme::Https);
        assert_eq!(reader.host(), "shop.test:8443");
        assert_eq!(reader.path(), "/cgi-bin/app.cgi/orders/café");
        assert_eq!(reader.query(), "page=2&sort=%20asc");
        assert_eq!(reader.header("x-request-id"), "abc-123");
        assert_eq!(reader.header("content-type"), "text/plain");
        assert_eq!(reader.header("path"), "");
        assert_eq!(reader.content_length(), 5);
        assert_eq!(reader.client_ip(), "192.0.2.10");
        assert_eq!(reader.client_device_type(), DeviceType::Tablet);
        assert_eq!(reader.script(true), "/var/www/cgi-bin/app.cgi");
        assert_eq!(reader.script(false), "app.cgi");
        assert_eq!(
            reader.url(),
            "https://shop.test:8443/cgi-bin/app.cgi/orders/café?page=2&sort=%20asc"
        );
    }

    #[test]
    fn request_uri_takes_precedence_over_script_name() {
        let reader = reader(&[("REQUEST_URI", "/pretty/path?from=uri"), ("SCRIPT_NAME", "/index.cgi")], b"");
        assert_eq!(reader.path(), "/pretty/path");
        assert_eq!(reader.query(), "from=uri");
    }

    #[test]
    fn sparse_environment_has_defaults() {
        let reader = reader(&[], b"");
        assert_eq!(reader.protocol(), "HTTP/1.0");
        assert_eq!(reader.method(), "GET");
        assert_eq!(reader.path(), "/");
        assert_eq!(reader.host(), "");
        assert_eq!(reader.client_ip(), "");
        assert_eq!(reader.script(true), "");
        assert_eq!(reader.content_length(), 0);
        assert_eq!(reader.url(), "http:///");
    }

    #[test]
    fn https_off_is_plain_http() {
        let reader = reader(&[("HTTPS", "off")], b"");
        assert_eq!(reader.scheme(), Scheme::Http);
    }

    #[test]
    fn forwarded_for_from_trusted_web_server() {
        let config = ReaderConfig::default()
            .trusted_proxies(TrustedProxies::try_from(vec!["127.0.0.1".to_string()]).unwrap());
        let vars = env(&[("REMOTE_ADDR", "127.0.0.1"), ("HTTP_X_FORWARDED_FOR", "1.2.3.4")]);
        let reader = CgiRequestReader::new(vars, &b""[..], &config).unwrap();
        assert_eq!(reader.client_ip(), "1.2.3.4");
    }

    #[test]
    fn invalid_content_length_is_rejected() {
        let err = CgiRequestReader::new(env(&[("CONTENT_LENGTH", "lots")]), &b""[..], &ReaderConfig::default())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidContentLength { .. }));
    }

    #[tokio::test]
    async fn stdin_is_read_once_for_content_length_bytes() {
        let mut reader = reader(BASE, b"hello, and trailing bytes");
        assert_eq!(reader.content().await.unwrap().as_ref(), b"hello");
        assert_eq!(reader.content().await.unwrap().as_ref(), b"hello");
    }

    #[tokio::test]
    async fn short_stdin_is_truncation() {
        let mut reader = reader(BASE, b"hel");
        assert!(matches!(
            reader.content().await,
            Err(Error::TruncatedBody { expected: 5, received: 3 })
        ));
    }
}
