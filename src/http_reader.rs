//! Reader over an `http::Request`, as produced by hyper.

use std::error::Error as StdError;
use std::fmt;
use std::net::SocketAddr;

use bytes::Bytes;
use hyper::body::{Body, Incoming};

use crate::body::{HttpBody, LazyBody};
use crate::config::ReaderConfig;
use crate::env::ServerEnv;
use crate::error::Error;
use crate::parts::{RawHead, RequestParts, protocol_name};
use crate::reader::RequestReader;

/// The request type handlers receive from [`Server`](crate::Server).
pub type Request = HttpRequestReader<Incoming>;

/// Facts about the connection a request arrived on.
#[derive(Clone, Copy, Debug)]
pub struct ConnectionInfo {
    pub peer_addr: SocketAddr,
    /// TLS terminated by this process (not by a proxy in front of it).
    pub secure: bool,
}

impl ConnectionInfo {
    pub fn plain(peer_addr: SocketAddr) -> Self {
        Self { peer_addr, secure: false }
    }
}

/// [`RequestReader`] over an `http::Request<B>`.
pub struct HttpRequestReader<B> {
    parts: RequestParts,
    body: LazyBody<HttpBody<B>>,
}

impl<B> HttpRequestReader<B>
where
    B: Body + Send,
    B::Data: Send,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    /// Normalizes the request head. The body is left untouched until
    /// [`content`](RequestReader::content) is called.
    ///
    /// Fails with [`Error::MalformedPath`] or [`Error::InvalidContentLength`].
    pub fn new(
        request: http::Request<B>,
        conn: ConnectionInfo,
        config: &ReaderConfig,
        env: &ServerEnv,
    ) -> Result<Self, Error> {
        let (head, body) = request.into_parts();
        let raw = RawHead {
            protocol: protocol_name(head.version).to_owned(),
            method: head.method.as_str().to_owned(),
            path: head.uri.path().to_owned(),
            query: head.uri.query().unwrap_or_default().to_owned(),
            authority: head.uri.authority().map(|a| a.as_str().to_owned()),
            headers: head.headers,
            peer: Some(conn.peer_addr.ip()),
            secure: conn.secure,
        };
        let parts = RequestParts::resolve(raw, config, env)?;
        let body = LazyBody::new(HttpBody(body), parts.declared_length(), config.max_body_size);
        Ok(Self { parts, body })
    }
}

impl<B> RequestReader for HttpRequestReader<B>
where
    B: Body + Send,
    B::Data: Send,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    fn parts(&self) -> &RequestParts {
        &self.parts
    }

    async fn content(&mut self) -> Result<&Bytes, Error> {
        self.body.get().await
    }
}

impl<B> fmt::Debug for HttpRequestReader<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRequestReader")
            .field("method", &self.parts.method)
            .field("path", &self.parts.path)
            .field("protocol", &self.parts.protocol)
            .finish()
    }
}
