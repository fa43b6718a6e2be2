//! Single-read, size-bounded body buffering.
//!
//! A request body is a stream: it can be consumed exactly once. [`LazyBody`]
//! defers that read until the body is first asked for, caches the bytes, and
//! refuses to touch the stream again if the read fails.

use std::error::Error as StdError;
use std::future::Future;
use std::mem;

use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Body;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::Error;

/// A one-shot source of body bytes.
///
/// Whatever comes back must match the declared length exactly; `LazyBody`
/// rejects a short or long body.
pub(crate) trait BodySource: Send {
    /// Reads the whole body, failing with [`Error::BodyTooLarge`] past `limit` bytes.
    fn read_all(self, declared: Option<u64>, limit: usize) -> impl Future<Output = Result<Bytes, Error>> + Send;
}

/// An `http_body::Body`, e.g. hyper's `Incoming`.
pub(crate) struct HttpBody<B>(pub(crate) B);

impl<B> BodySource for HttpBody<B>
where
    B: Body + Send,
    B::Data: Send,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    async fn read_all(self, _declared: Option<u64>, limit: usize) -> Result<Bytes, Error> {
        match Limited::new(self.0, limit).collect().await {
            Ok(collected) => Ok(collected.to_bytes()),
            Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => Err(Error::BodyTooLarge { limit }),
            Err(e) => Err(Error::Io(std::io::Error::other(e))),
        }
    }
}

/// A byte stream with no framing of its own, e.g. CGI stdin. Exactly the
/// declared number of bytes is read; without a declared length there is no body.
pub(crate) struct ReaderBody<R>(pub(crate) R);

impl<R> BodySource for ReaderBody<R>
where
    R: AsyncRead + Unpin + Send,
{
    async fn read_all(mut self, declared: Option<u64>, _limit: usize) -> Result<Bytes, Error> {
        let want = declared.unwrap_or(0);
        if want == 0 {
            return Ok(Bytes::new());
        }
        let mut buf = Vec::with_capacity(usize::try_from(want).unwrap_or(usize::MAX));
        (&mut self.0).take(want).read_to_end(&mut buf).await?;
        Ok(Bytes::from(buf))
    }
}

enum State<S> {
    Unread(S),
    Buffered(Bytes),
    Failed,
}

/// A body read at most once and cached thereafter.
pub(crate) struct LazyBody<S> {
    state: State<S>,
    declared: Option<u64>,
    limit: usize,
}

impl<S: BodySource> LazyBody<S> {
    pub(crate) fn new(source: S, declared: Option<u64>, limit: usize) -> Self {
        Self { state: State::Unread(source), declared, limit }
    }

    /// The body bytes, reading the source on first call.
    ///
    /// A failed read leaves the body unavailable; later calls return
    /// [`Error::BodyUnavailable`] instead of touching the stream again.
    pub(crate) async fn get(&mut self) -> Result<&Bytes, Error> {
        if matches!(self.state, State::Unread(_)) {
            if let State::Unread(source) = mem::replace(&mut self.state, State::Failed) {
                let bytes = read_checked(source, self.declared, self.limit).await?;
                self.state = State::Buffered(bytes);
            }
        }
        match &self.state {
            State::Buffered(bytes) => Ok(bytes),
            _ => Err(Error::BodyUnavailable),
        }
    }
}

async fn read_checked<S: BodySource>(source: S, declared: Option<u64>, limit: usize) -> Result<Bytes, Error> {
    if declared.is_some_and(|n| n > limit as u64) {
        return Err(Error::BodyTooLarge { limit });
    }
    let bytes = source.read_all(declared, limit).await?;
    let received = bytes.len() as u64;
    match declared {
        Some(expected) if received < expected => Err(Error::TruncatedBody { expected, received }),
        Some(expected) if received > expected => Err(Error::ExcessBody { expected, received }),
        _ => Ok(bytes),
    }
}
