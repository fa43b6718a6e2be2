//! Unified error type.

use http::StatusCode;

/// The error type returned by inbound's fallible operations.
///
/// Absence is never an error: a missing header, credential or query resolves
/// to an empty default. This type covers malformed framing fields rejected at
/// construction, body read failures, misuse of the route slot, and
/// infrastructure failures such as binding to a port.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("request body exceeds the {limit} byte limit")]
    BodyTooLarge { limit: usize },

    #[error("request body truncated: expected {expected} bytes, received {received}")]
    TruncatedBody { expected: u64, received: u64 },

    #[error("request body overruns content-length: expected {expected} bytes, received {received}")]
    ExcessBody { expected: u64, received: u64 },

    /// A previous read of the body failed. Body streams are not replayable.
    #[error("request body is unavailable after a failed read")]
    BodyUnavailable,

    #[error("malformed percent-encoding in request path `{path}`")]
    MalformedPath { path: String },

    #[error("invalid content-length `{value}`")]
    InvalidContentLength { value: String },

    #[error("route accessed before route resolution")]
    RouteNotResolved,

    #[error("route was already resolved for this request")]
    RouteAlreadyResolved,

    #[error("resolved route has already been released")]
    RouteReleased,
}

impl Error {
    /// The HTTP status a server should answer with when this error ends a request.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::TruncatedBody { .. }
            | Self::ExcessBody { .. }
            | Self::MalformedPath { .. }
            | Self::InvalidContentLength { .. } => StatusCode::BAD_REQUEST,
            Self::Io(_)
            | Self::BodyUnavailable
            | Self::RouteNotResolved
            | Self::RouteAlreadyResolved
            | Self::RouteReleased => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
