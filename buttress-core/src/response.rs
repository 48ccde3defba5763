//! Response descriptor shared by transports, the cache, and callers.

use crate::error::{CallError, Result};
use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;

/// A response from a downstream service.
///
/// Bodies are held as [`Bytes`], so cloning a response (for cache storage)
/// is cheap.
#[derive(Debug, Clone)]
pub struct ServiceResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl ServiceResponse {
    /// Create a response descriptor.
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Get the status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Check if the response was successful (2xx).
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Check if the response was a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        self.status.is_client_error()
    }

    /// Check if the response was a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        self.status.is_server_error()
    }

    /// Get the response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get a specific header value.
    pub fn header(&self, name: impl AsRef<str>) -> Option<&str> {
        self.headers
            .get(name.as_ref())
            .and_then(|v| v.to_str().ok())
    }

    /// Get the response body as bytes.
    pub fn bytes(&self) -> &Bytes {
        &self.body
    }

    /// Consume the response and return the body as bytes.
    pub fn into_bytes(self) -> Bytes {
        self.body
    }

    /// Get the response body as text.
    pub fn text(&self) -> Result<String> {
        String::from_utf8(self.body.to_vec()).map_err(|e| CallError::Decode(e.to_string()))
    }

    /// Parse the response body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| CallError::Decode(e.to_string()))
    }

    /// Get the content type if available.
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Get the content length if available.
    pub fn content_length(&self) -> Option<u64> {
        self.headers
            .get(http::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_body_parsing() {
        let response = ServiceResponse::new(
            StatusCode::OK,
            HeaderMap::new(),
            Bytes::from_static(br#"{"id": 7, "city": "dubai"}"#),
        );

        let value: serde_json::Value = response.json().unwrap();
        assert_eq!(value["id"], 7);
        assert_eq!(value["city"], "dubai");
    }

    #[test]
    fn test_invalid_json_is_a_decode_error() {
        let response =
            ServiceResponse::new(StatusCode::OK, HeaderMap::new(), Bytes::from_static(b"nope"));
        let err = response.json::<serde_json::Value>().unwrap_err();
        assert!(matches!(err, CallError::Decode(_)));
    }

    #[test]
    fn test_status_predicates() {
        let ok = ServiceResponse::new(StatusCode::OK, HeaderMap::new(), Bytes::new());
        assert!(ok.is_success());
        assert!(!ok.is_server_error());

        let bad = ServiceResponse::new(StatusCode::BAD_GATEWAY, HeaderMap::new(), Bytes::new());
        assert!(bad.is_server_error());
        assert!(!bad.is_client_error());
    }
}
