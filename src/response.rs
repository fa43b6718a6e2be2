//! Conversion of handler results into HTTP responses.
//!
//! Writing responses is not this crate's business; this module only gives
//! handlers a way to hand back something hyper can send, including the
//! reader's own [`Error`]s.

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderValue};
use http::StatusCode;
use http_body_util::Full;

use crate::error::Error;

/// The response type the server sends.
pub type Response = http::Response<Full<Bytes>>;

const TEXT_PLAIN: HeaderValue = HeaderValue::from_static("text/plain; charset=utf-8");

/// Conversion into a [`Response`].
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response { self }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response { text(StatusCode::OK, Bytes::from_static(self.as_bytes())) }
}

impl IntoResponse for String {
    fn into_response(self) -> Response { text(StatusCode::OK, Bytes::from(self)) }
}

/// Return a bare status from a handler: `return StatusCode::NOT_FOUND`.
impl IntoResponse for StatusCode {
    fn into_response(self) -> Response {
        let mut response = Response::new(Full::default());
        *response.status_mut() = self;
        response
    }
}

/// Client faults carry their message; server faults are not echoed back.
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_client_error() {
            text(status, Bytes::from(self.to_string()))
        } else {
            status.into_response()
        }
    }
}

impl<T: IntoResponse> IntoResponse for Result<T, Error> {
    fn into_response(self) -> Response {
        match self {
            Ok(value) => value.into_response(),
            Err(e) => e.into_response(),
        }
    }
}

fn text(status: StatusCode, body: Bytes) -> Response {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    response.headers_mut().insert(CONTENT_TYPE, TEXT_PLAIN);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_of(response: Response) -> Bytes {
        response.into_body().collect().await.unwrap().to_bytes()
    }

    #[tokio::test]
    async fn strings_are_plain_text() {
        let response = "hi".into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/plain; charset=utf-8");
        assert_eq!(body_of(response).await, "hi");
    }

    #[tokio::test]
    async fn client_errors_explain_themselves() {
        let response = Error::MalformedPath { path: "/%zz".into() }.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_of(response).await, "malformed percent-encoding in request path `/%zz`");
    }

    #[tokio::test]
    async fn server_errors_stay_opaque() {
        let result: Result<String, Error> = Err(Error::RouteNotResolved);
        let response = result.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_of(response).await.is_empty());
    }
}
