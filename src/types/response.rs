use std::fmt::Display;

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use url::Url;

use crate::{ErrorKind, Payload, ResponseAs, Result};

/// A fully received HTTP response as handed back by a [`crate::Transport`].
///
/// Unlike [`reqwest::Response`] this can be cloned, which lets the same
/// response be passed to a listener and returned to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    /// Status code of the response
    pub status: StatusCode,
    /// Reason phrase for the status code, empty if unknown
    pub status_text: String,
    /// Response headers
    pub headers: HeaderMap,
    /// Final URL after redirects
    pub url: Url,
    /// Complete response body
    pub body: Bytes,
}

impl RawResponse {
    /// Create a response with an empty header map.
    /// The status text is the canonical reason phrase of `status`.
    #[must_use]
    pub fn new(status: StatusCode, url: Url, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers: HeaderMap::new(),
            url,
            body: body.into(),
        }
    }

    /// Read a [`reqwest::Response`] to the end.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::NetworkRequest`] if the body cannot be read.
    pub async fn from_response(response: reqwest::Response) -> Result<Self> {
        let status = response.status();
        let headers = response.headers().clone();
        let url = response.url().clone();
        let body = response.bytes().await.map_err(ErrorKind::NetworkRequest)?;

        Ok(Self {
            status,
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            url,
            body,
        })
    }

    /// Whether the status lies in `200..=299`
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Value of the `Content-Type` header, if present and valid UTF-8
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(http::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
    }
}

/// A response was received, but its status is outside the success range.
#[derive(Debug, Clone)]
pub struct StatusError {
    /// The status text of the response
    pub message: String,
    /// The response itself
    pub response: RawResponse,
    /// Best-effort materialized body, [`Payload::Empty`] if that failed
    pub body: Payload,
}

impl StatusError {
    /// Build the error for an unsuccessful `response`, materializing its body
    /// the same way a successful one would be.
    #[must_use]
    pub fn new(response: RawResponse, response_as: ResponseAs) -> Self {
        let message = if response.status_text.is_empty() {
            response.status.as_str().to_string()
        } else {
            response.status_text.clone()
        };
        let body = Payload::materialize(&response, response_as);
        Self {
            message,
            response,
            body,
        }
    }

    /// Status code of the failed response
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.response.status
    }
}

impl Display for StatusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for StatusError {}
