//! Response encoders.
//!
//! The JSON pair is the default for every route. The HTML pair exists for
//! the few routes that render for browsers (password reset links).

use bytes::Bytes;
use http::{header, Response, StatusCode};
use http_body_util::Full;
use serde::Serialize;
use std::error::Error as StdError;
use std::fmt::Display;
use tracing::error;
use utilisync_core::{DomainError, RequestContext};

/// HTTP response type produced by the pipeline.
pub type HttpResponse = Response<Full<Bytes>>;

/// JSON content type.
pub const CONTENT_TYPE_JSON: &str = "application/json; charset=utf-8";

/// HTML content type.
pub const CONTENT_TYPE_HTML: &str = "text/html; charset=utf-8";

/// Partial response data handed to error encoders.
pub const DEFAULT_ERROR_DATA: &str = "error:";

fn build(status: StatusCode, content_type: Option<&str>, body: Bytes) -> HttpResponse {
    let mut builder = Response::builder().status(status);
    if let Some(content_type) = content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    builder
        .body(Full::new(body))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::new())))
}

/// Encodes `value` as a 200 JSON response.
pub fn encode_json<T: Serialize>(_ctx: &RequestContext, value: T) -> Result<HttpResponse, DomainError> {
    let body = serde_json::to_vec(&value).map_err(|e| {
        DomainError::internal("failed to encode response")
            .with_cause(e)
            .with_origin("encode_json")
    })?;
    Ok(build(StatusCode::OK, Some(CONTENT_TYPE_JSON), Bytes::from(body)))
}

/// Encodes `value` as a 200 HTML response.
pub fn encode_html<T: Display>(_ctx: &RequestContext, value: T) -> Result<HttpResponse, DomainError> {
    Ok(build(
        StatusCode::OK,
        Some(CONTENT_TYPE_HTML),
        Bytes::from(value.to_string()),
    ))
}

/// Encodes `err` as its JSON envelope with the status from its kind.
pub fn encode_error(_ctx: &RequestContext, _data: &str, err: &DomainError) -> HttpResponse {
    let body = serde_json::to_vec(&err.to_envelope()).unwrap_or_default();
    build(err.code(), Some(CONTENT_TYPE_JSON), Bytes::from(body))
}

/// Encodes `err` as a small HTML fragment prefixed by `data`.
pub fn encode_error_html(_ctx: &RequestContext, data: &str, err: &DomainError) -> HttpResponse {
    let body = format!(
        "{data}\n  kind - {},\n message: {}",
        err.kind(),
        err.message()
    );
    build(err.code(), Some(CONTENT_TYPE_HTML), Bytes::from(body))
}

/// Default error hook: logs the kind, message and cause chain.
pub fn log_error(ctx: &RequestContext, err: &DomainError) {
    let mut chain = Vec::new();
    let mut source = err.source();
    while let Some(cause) = source {
        chain.push(cause.to_string());
        source = cause.source();
    }

    error!(
        request_id = %ctx.request_id(),
        kind = err.kind().as_str(),
        message = err.message(),
        error = %err,
        chain = ?chain,
        path = ctx.path(),
        "request failed"
    );
}

/// A response with no body, used for 503 and 404.
pub fn empty_response(status: StatusCode) -> HttpResponse {
    build(status, None, Bytes::new())
}

/// A JSON response with an explicit status.
pub(crate) fn json_response<T: Serialize>(status: StatusCode, value: &T) -> HttpResponse {
    let body = serde_json::to_vec(value).unwrap_or_default();
    build(status, Some(CONTENT_TYPE_JSON), Bytes::from(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use utilisync_core::ErrorKind;

    async fn body_string(response: HttpResponse) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_encode_json() {
        let ctx = RequestContext::new();
        let response = encode_json(&ctx, serde_json::json!({"id": 7})).unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            CONTENT_TYPE_JSON
        );
        assert_eq!(body_string(response).await, r#"{"id":7}"#);
    }

    #[tokio::test]
    async fn test_encode_error_not_found_is_400() {
        let ctx = RequestContext::new();
        let err = DomainError::from_kind(ErrorKind::NotFound);
        let response = encode_error(&ctx, DEFAULT_ERROR_DATA, &err);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["error"]["kind"], "not_found");
        assert_eq!(
            body["error"]["message"],
            ErrorKind::NotFound.default_message()
        );
    }

    #[tokio::test]
    async fn test_encode_error_html() {
        let ctx = RequestContext::new();
        let err = DomainError::todo("not yet");
        let response = encode_error_html(&ctx, DEFAULT_ERROR_DATA, &err);
        assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            CONTENT_TYPE_HTML
        );
        assert_eq!(
            body_string(response).await,
            "error:\n  kind - todo,\n message: not yet"
        );
    }

    #[tokio::test]
    async fn test_encode_html() {
        let ctx = RequestContext::new();
        let response = encode_html(&ctx, "<p>done</p>").unwrap();
        assert_eq!(body_string(response).await, "<p>done</p>");
    }

    #[tokio::test]
    async fn test_empty_response() {
        let response = empty_response(StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(response.headers().get(header::CONTENT_TYPE).is_none());
        assert_eq!(body_string(response).await, "");
    }

    #[test]
    fn test_log_error_does_not_panic() {
        let ctx = RequestContext::new();
        let err = DomainError::external("billing down")
            .with_cause(std::io::Error::other("timeout"));
        log_error(&ctx, &err);
    }
}
