//! The network call itself.
//!
//! Everything above this module works on [`TransportRequest`] and
//! [`RawResponse`] only, so the HTTP stack can be swapped for tests or other
//! environments by implementing [`Transport`].

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Method};
use url::Url;

use crate::{ErrorKind, RawResponse, Result};

/// A fully resolved request, built from the merged configuration
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// HTTP method
    pub method: Method,
    /// Absolute URL
    pub url: Url,
    /// Headers after null sentinels were removed
    pub headers: HeaderMap,
    /// Encoded body, if any
    pub body: Option<Bytes>,
    /// Per-request timeout, from the `timeout` option
    pub timeout: Option<Duration>,
}

/// Sends a [`TransportRequest`] and receives the complete response.
///
/// Implementations report failures that happen before a response exists as
/// [`ErrorKind::NetworkRequest`] or [`ErrorKind::Transport`]. A response with
/// any status code, including 4xx and 5xx, is a success at this level.
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    /// Send `request`
    async fn send(&self, request: TransportRequest) -> Result<RawResponse>;
}

/// [`Transport`] backed by a [`reqwest::Client`]
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Wrap an existing client
    #[must_use]
    pub const fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<RawResponse> {
        let TransportRequest {
            method,
            url,
            headers,
            body,
            timeout,
        } = request;

        log::debug!("{method} {url}");
        let mut builder = self.client.request(method, url).headers(headers);
        if let Some(body) = body {
            builder = builder.body(body);
        }
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await.map_err(ErrorKind::NetworkRequest)?;
        RawResponse::from_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(method: Method, url: &str) -> TransportRequest {
        TransportRequest {
            method,
            url: Url::parse(url).unwrap(),
            headers: HeaderMap::new(),
            body: None,
            timeout: None,
        }
    }

    #[tokio::test]
    async fn test_send_with_headers_and_body() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/posts"))
            .and(header("x-token", "abc"))
            .and(body_string("hello"))
            .respond_with(ResponseTemplate::new(201).set_body_string("created"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let mut request = request(Method::POST, &format!("{}/posts", mock_server.uri()));
        request.headers.insert("x-token", "abc".parse().unwrap());
        request.body = Some(Bytes::from_static(b"hello"));

        let response = ReqwestTransport::default().send(request).await.unwrap();
        assert_eq!(response.status, StatusCode::CREATED);
        assert_eq!(response.status_text, "Created");
        assert_eq!(response.body, Bytes::from_static(b"created"));
    }

    #[tokio::test]
    async fn test_error_status_is_not_a_transport_error() {
        let mock_server = mock_server!("GET", StatusCode::INTERNAL_SERVER_ERROR);
        let response = ReqwestTransport::default()
            .send(request(Method::GET, &mock_server.uri()))
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_timeout() {
        let mock_server = mock_server!(
            "GET",
            StatusCode::OK,
            set_delay(Duration::from_millis(200))
        );
        let mut request = request(Method::GET, &mock_server.uri());
        request.timeout = Some(Duration::from_millis(10));

        let error = ReqwestTransport::default().send(request).await.unwrap_err();
        assert!(matches!(error, ErrorKind::NetworkRequest(e) if e.is_timeout()));
    }

    #[tokio::test]
    async fn test_connection_refused() {
        // Nothing listens on the discard port on localhost.
        let error = ReqwestTransport::default()
            .send(request(Method::GET, "http://127.0.0.1:9"))
            .await
            .unwrap_err();
        assert!(error.is_transport());
    }
}
