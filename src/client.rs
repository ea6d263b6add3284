//! Handler of request configuration and sending.
//!
//! This module defines two structs, [`Client`] and [`ClientBuilder`].
//! `Client` holds a base URL and instance options and sends requests through
//! a [`Transport`]. `ClientBuilder` exposes a finer level of granularity for
//! building a `Client`.
//!
//! For convenience, a free function [`get`] is provided for ad-hoc requests.

use std::sync::Arc;
use std::time::Duration;

use http::Method;
use typed_builder::TypedBuilder;
use url::Url;

use crate::config::{self, EffectiveOptions, defaults};
use crate::invoker::{Invocable, RequestDescriptor};
use crate::utils::url::join;
use crate::{
    Clock, ConfigLayer, ErrorKind, Payload, RateLimitConfig, RateLimiter, ReqwestTransport,
    RequestData, Result, StatusError, SystemClock, Transport, TransportRequest,
    canonical_headers, merge,
};

/// Default user agent, `fetchtower-<PKG_VERSION>`.
pub const DEFAULT_USER_AGENT: &str = concat!("fetchtower/", env!("CARGO_PKG_VERSION"));

/// Builder for [`Client`].
///
/// See crate-level documentation for usage example.
#[derive(TypedBuilder, Debug, Clone)]
#[builder(field_defaults(default, setter(into)))]
#[builder(builder_method(doc = "
Create a builder for building `ClientBuilder`.

On the builder call, call methods with same name as its fields to set their values.

Finally, call `.build()` to create the instance of `ClientBuilder`.
"))]
pub struct ClientBuilder {
    /// Every request path is joined onto this URL.
    #[builder(!default)]
    base_url: String,
    /// Instance options, merged above [`defaults`] and below per-request
    /// options.
    options: ConfigLayer,
    /// Sends the requests.
    ///
    /// Defaults to a [`ReqwestTransport`] configured with `user_agent` and
    /// `timeout`.
    #[builder(setter(!into, strip_option))]
    transport: Option<Arc<dyn Transport>>,
    /// Time source of the rate limiters created by [`Client::request`].
    ///
    /// Defaults to [`SystemClock`].
    #[builder(setter(!into, strip_option))]
    clock: Option<Arc<dyn Clock>>,
    /// Throttle applied by [`Client::request`] to descriptors that do not set
    /// their own window.
    rate_limit: Option<RateLimitConfig>,
    /// User-agent of the default transport.
    #[builder(default_code = "String::from(DEFAULT_USER_AGENT)")]
    user_agent: String,
    /// Overall timeout of the default transport.
    /// The `timeout` option overrides it per request.
    timeout: Option<Duration>,
}

impl ClientBuilder {
    /// Instantiates a [`Client`].
    ///
    /// # Errors
    ///
    /// Returns an `Err` if no transport was given and the request client
    /// cannot be created.
    /// See [here](https://docs.rs/reqwest/latest/reqwest/struct.ClientBuilder.html#errors).
    pub fn client(self) -> Result<Client> {
        let Self {
            base_url,
            options,
            transport,
            clock,
            rate_limit,
            user_agent,
            timeout,
        } = self;

        let transport = match transport {
            Some(transport) => transport,
            None => {
                let builder = reqwest::ClientBuilder::new()
                    .gzip(true)
                    .user_agent(user_agent);

                let reqwest_client = (match timeout {
                    Some(t) => builder.timeout(t),
                    None => builder,
                })
                .build()
                .map_err(ErrorKind::BuildRequestClient)?;

                Arc::new(ReqwestTransport::new(reqwest_client))
            }
        };

        Ok(Client {
            base_url,
            options: canonical_headers(&options),
            transport,
            clock: clock.unwrap_or_else(|| Arc::new(SystemClock)),
            rate_limit,
        })
    }
}

/// Sends requests relative to a base URL.
///
/// Every request merges, in order of increasing precedence, [`defaults`],
/// the client's options, the per-request options and the HTTP method.
///
/// Clones share the transport and clock.
#[derive(Debug, Clone)]
pub struct Client {
    base_url: String,
    options: ConfigLayer,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    rate_limit: Option<RateLimitConfig>,
}

impl Client {
    /// The URL every request path is joined onto
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The instance options, with header names lowercased
    #[must_use]
    pub const fn options(&self) -> &ConfigLayer {
        &self.options
    }

    /// Send a request to `path`, relative to the base URL.
    ///
    /// An empty `path` targets the base URL itself. Responses with a status
    /// in `200..=299` are materialized according to the `responseAs` option.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::Status`] for any other status, carrying the response
    ///   and its best-effort body.
    /// - The transport's error if no response was received.
    /// - A configuration error if the merged options or the URL are invalid.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        data: Option<RequestData>,
        options: Option<&ConfigLayer>,
    ) -> Result<Payload> {
        let method_layer = ConfigLayer::new().with(config::METHOD, method.as_str());
        let layers = [
            Some(&defaults()),
            Some(&self.options),
            options,
            Some(&method_layer),
        ]
        .map(|layer| layer.map(canonical_headers));
        let merged = merge(layers.iter().map(Option::as_ref));
        log::trace!("Merged options: {merged:?}");
        let effective = EffectiveOptions::from_layer(&merged)?;

        let url = join(&self.base_url, path);
        let url = Url::parse(&url).map_err(|e| ErrorKind::InvalidUrl(url.clone(), e))?;
        let body = data.map(RequestData::into_body).transpose()?.flatten();

        let response = self
            .transport
            .send(TransportRequest {
                method: effective.method,
                url,
                headers: effective.headers,
                body,
                timeout: effective.timeout,
            })
            .await?;

        if response.is_success() {
            Ok(Payload::materialize(&response, effective.response_as))
        } else {
            log::debug!("{} responded with {}", response.url, response.status);
            Err(StatusError::new(response, effective.response_as).into())
        }
    }

    /// `GET` `path`
    ///
    /// # Errors
    ///
    /// See [`Client::send`].
    pub async fn get(&self, path: &str, options: Option<&ConfigLayer>) -> Result<Payload> {
        self.send(Method::GET, path, None, options).await
    }

    /// `DELETE` `path`, optionally with a body
    ///
    /// # Errors
    ///
    /// See [`Client::send`].
    pub async fn delete(
        &self,
        path: &str,
        data: Option<RequestData>,
        options: Option<&ConfigLayer>,
    ) -> Result<Payload> {
        self.send(Method::DELETE, path, data, options).await
    }

    /// `POST` `data` to `path`
    ///
    /// # Errors
    ///
    /// See [`Client::send`].
    pub async fn post(
        &self,
        path: &str,
        data: Option<RequestData>,
        options: Option<&ConfigLayer>,
    ) -> Result<Payload> {
        self.send(Method::POST, path, data, options).await
    }

    /// `PUT` `data` to `path`
    ///
    /// # Errors
    ///
    /// See [`Client::send`].
    pub async fn put(
        &self,
        path: &str,
        data: Option<RequestData>,
        options: Option<&ConfigLayer>,
    ) -> Result<Payload> {
        self.send(Method::PUT, path, data, options).await
    }

    /// `PATCH` `path` with `data`
    ///
    /// # Errors
    ///
    /// See [`Client::send`].
    pub async fn patch(
        &self,
        path: &str,
        data: Option<RequestData>,
        options: Option<&ConfigLayer>,
    ) -> Result<Payload> {
        self.send(Method::PATCH, path, data, options).await
    }

    /// A sub-client rooted at `path`, with `options` merged above this
    /// client's options. This client is left unchanged.
    #[must_use]
    pub fn up(&self, path: &str, options: Option<&ConfigLayer>) -> Self {
        Self {
            base_url: join(&self.base_url, path),
            options: merge([
                Some(&self.options),
                options.map(canonical_headers).as_ref(),
            ]),
            ..self.clone()
        }
    }

    /// Merge `options` into the instance options and optionally replace the
    /// base URL.
    pub fn edit(&mut self, options: &ConfigLayer, base_url: Option<&str>) -> &mut Self {
        self.options = self.options.merged(&canonical_headers(options));
        if let Some(base_url) = base_url {
            self.base_url = base_url.to_string();
        }
        self
    }

    /// Bind `descriptor` to this client.
    ///
    /// The descriptor's own window takes precedence over the client's
    /// default rate limit. A zero window on the descriptor disables
    /// throttling for this request, even if the client has a default.
    #[must_use]
    pub fn request(&self, descriptor: RequestDescriptor) -> Invocable {
        let rate_limit = match descriptor.rate_limit {
            Some(window) if window.is_zero() => None,
            Some(window) => Some(
                RateLimitConfig::new(window).reset_on_success_only(descriptor.rate_only_success),
            ),
            None => self.rate_limit.map(|config| {
                config.reset_on_success_only(
                    config.reset_on_success_only || descriptor.rate_only_success,
                )
            }),
        }
        .filter(|config| !config.window.is_zero());

        let limiter = rate_limit.map(|config| {
            let listener = Arc::clone(&descriptor.listener);
            RateLimiter::with_clock(config, Arc::clone(&self.clock))
                .on_suppressed(move |remaining| listener.on_rate_limited(remaining))
        });

        Invocable::new(self.clone(), descriptor, limiter)
    }
}

/// A convenience function to `GET` a single URL with default options.
///
/// # Errors
///
/// See [`Client::send`].
pub async fn get(url: &str) -> Result<Payload> {
    let client = ClientBuilder::builder().base_url(url).build().client()?;
    client.get("", None).await
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use bytes::Bytes;
    use http::{StatusCode, header};
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;
    use wiremock::matchers::{body_json, header as header_matcher, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::test_utils::layer;
    use crate::{ConfigValue, RawResponse, ResponseAs};

    /// Records requests and answers with a fixed status and body
    #[derive(Debug)]
    struct RecordingTransport {
        status: StatusCode,
        body: &'static str,
        requests: Mutex<Vec<TransportRequest>>,
    }

    impl RecordingTransport {
        fn new(status: StatusCode, body: &'static str) -> Arc<Self> {
            Arc::new(Self {
                status,
                body,
                requests: Mutex::new(Vec::new()),
            })
        }

        fn last(&self) -> TransportRequest {
            self.requests.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn send(&self, request: TransportRequest) -> Result<RawResponse> {
            let url = request.url.clone();
            self.requests.lock().unwrap().push(request);
            Ok(RawResponse::new(self.status, url, self.body))
        }
    }

    /// Always fails before a response exists
    #[derive(Debug)]
    struct FailingTransport;

    #[async_trait]
    impl Transport for FailingTransport {
        async fn send(&self, _request: TransportRequest) -> Result<RawResponse> {
            Err(ErrorKind::Transport("connection reset".into()))
        }
    }

    fn recording_client(base_url: &str, transport: &Arc<RecordingTransport>) -> Client {
        ClientBuilder::builder()
            .base_url(base_url)
            .transport(Arc::clone(transport) as Arc<dyn Transport>)
            .build()
            .client()
            .unwrap()
    }

    #[tokio::test]
    async fn test_get_json() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/posts/1"))
            .and(header_matcher("accept", "application/json"))
            .and(header_matcher("user-agent", DEFAULT_USER_AGENT))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = ClientBuilder::builder()
            .base_url(mock_server.uri())
            .build()
            .client()
            .unwrap();
        let payload = client.get("/posts//1", None).await.unwrap();
        assert_eq!(payload, Payload::Json(json!({"id": 1})));
    }

    #[tokio::test]
    async fn test_post_json_body() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/posts"))
            .and(header_matcher("content-type", "application/json"))
            .and(body_json(json!({"title": "foo", "userId": 1})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 101})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = ClientBuilder::builder()
            .base_url(mock_server.uri())
            .build()
            .client()
            .unwrap();
        let payload = client
            .post("posts", Some(json!({"title": "foo", "userId": 1}).into()), None)
            .await
            .unwrap();
        assert_eq!(payload, Payload::Json(json!({"id": 101})));
    }

    #[tokio::test]
    async fn test_unparsable_error_body_is_empty() {
        let mock_server = mock_server!(
            "GET",
            StatusCode::NOT_FOUND,
            set_body_string("<html>not json</html>")
        );
        let client = ClientBuilder::builder()
            .base_url(mock_server.uri())
            .build()
            .client()
            .unwrap();

        let error = client.get("/missing", None).await.unwrap_err();
        let status = error.as_status().unwrap();
        assert_eq!(status.message, "Not Found");
        assert_eq!(status.status(), StatusCode::NOT_FOUND);
        assert_eq!(status.body, Payload::Empty);
    }

    #[tokio::test]
    async fn test_error_body_is_materialized() {
        let transport = RecordingTransport::new(StatusCode::UNPROCESSABLE_ENTITY, r#"{"e":1}"#);
        let client = recording_client("https://example.com", &transport);

        let error = client.put("items/1", None, None).await.unwrap_err();
        assert_eq!(
            error.as_status().map(|e| e.body.clone()),
            Some(Payload::Json(json!({"e": 1})))
        );
    }

    #[tokio::test]
    async fn test_null_header_removes_default() {
        let transport = RecordingTransport::new(StatusCode::OK, "ok");
        let client = recording_client("https://example.com", &transport);

        let options = layer(json!({
            "headers": {"Content-Type": null, "X-Trace": "1"},
            "responseAs": "text"
        }));
        let payload = client.get("", Some(&options)).await.unwrap();
        assert_eq!(payload, Payload::Text("ok".to_string()));

        let request = transport.last();
        assert_eq!(request.url.as_str(), "https://example.com/");
        assert!(request.headers.get(header::CONTENT_TYPE).is_none());
        assert_eq!(request.headers[header::ACCEPT], "application/json");
        assert_eq!(request.headers["x-trace"], "1");
    }

    #[rstest]
    #[case(Method::GET)]
    #[case(Method::POST)]
    #[case(Method::PUT)]
    #[case(Method::PATCH)]
    #[case(Method::DELETE)]
    #[tokio::test]
    async fn test_method_shims(#[case] expected: Method) {
        let transport = RecordingTransport::new(StatusCode::NO_CONTENT, "");
        let client = recording_client("https://example.com/api", &transport);
        // A method set in the options never wins over the shim's method
        let options = layer(json!({"method": "OPTIONS"}));
        let options = Some(&options);

        let result = match expected {
            Method::GET => client.get("x", options).await,
            Method::POST => client.post("x", None, options).await,
            Method::PUT => client.put("x", None, options).await,
            Method::PATCH => client.patch("x", None, options).await,
            _ => client.delete("x", None, options).await,
        };

        // An empty body is not valid JSON
        assert_eq!(result.unwrap(), Payload::Empty);
        let request = transport.last();
        assert_eq!(request.method, expected);
        assert_eq!(request.url.as_str(), "https://example.com/api/x");
        assert_eq!(request.body, None);
    }

    #[tokio::test]
    async fn test_delete_with_form_body() {
        let transport = RecordingTransport::new(StatusCode::OK, "{}");
        let client = recording_client("https://example.com", &transport);

        client
            .delete(
                "sessions",
                Some(RequestData::Form(vec![("id".into(), "a b".into())])),
                None,
            )
            .await
            .unwrap();
        assert_eq!(transport.last().body, Some(Bytes::from_static(b"id=a+b")));
    }

    #[tokio::test]
    async fn test_up_nests_base_url_and_options() {
        let transport = RecordingTransport::new(StatusCode::OK, "{}");
        let client = ClientBuilder::builder()
            .base_url("https://example.com/api/")
            .options(layer(json!({"headers": {"X-Api": "1"}})))
            .transport(Arc::clone(&transport) as Arc<dyn Transport>)
            .build()
            .client()
            .unwrap();

        let users = client.up("/users/", Some(&layer(json!({"headers": {"X-Users": "1"}}))));
        assert_eq!(users.base_url(), "https://example.com/api/users/");
        assert_eq!(
            users.options(),
            &layer(json!({"headers": {"x-api": "1", "x-users": "1"}}))
        );
        // The parent is unchanged
        assert_eq!(client.base_url(), "https://example.com/api/");
        assert_eq!(client.options(), &layer(json!({"headers": {"x-api": "1"}})));

        users.get("42", None).await.unwrap();
        let request = transport.last();
        assert_eq!(request.url.as_str(), "https://example.com/api/users/42");
        assert_eq!(request.headers["x-api"], "1");
        assert_eq!(request.headers["x-users"], "1");
    }

    #[test]
    fn test_edit_mutates_in_place() {
        let mut client = ClientBuilder::builder()
            .base_url("https://example.com")
            .options(layer(json!({"timeout": "5s", "headers": {"A": "1"}})))
            .build()
            .client()
            .unwrap();

        client
            .edit(&layer(json!({"headers": {"B": "2"}})), None)
            .edit(&layer(json!({"timeout": 0})), Some("https://other.example.com"));

        assert_eq!(client.base_url(), "https://other.example.com");
        assert_eq!(
            client.options(),
            &layer(json!({"timeout": 0, "headers": {"a": "1", "b": "2"}}))
        );
    }

    #[tokio::test]
    async fn test_header_names_are_case_insensitive() {
        let transport = RecordingTransport::new(StatusCode::OK, "{}");
        let client = recording_client("https://example.com", &transport);

        let options = layer(json!({
            "headers": {"ACCEPT": "text/plain", "CONTENT-TYPE": null}
        }));
        client.get("", Some(&options)).await.unwrap();

        let request = transport.last();
        assert_eq!(request.headers[header::ACCEPT], "text/plain");
        assert!(request.headers.get(header::CONTENT_TYPE).is_none());
        assert_eq!(request.headers.get_all(header::ACCEPT).iter().count(), 1);
    }

    #[tokio::test]
    async fn test_edit_overrides_header_in_other_case() {
        let transport = RecordingTransport::new(StatusCode::OK, "{}");
        let mut client = ClientBuilder::builder()
            .base_url("https://example.com")
            .options(layer(json!({"headers": {"Authorization": "Bearer old"}})))
            .transport(Arc::clone(&transport) as Arc<dyn Transport>)
            .build()
            .client()
            .unwrap();

        client.edit(&layer(json!({"headers": {"AUTHORIZATION": "Bearer new"}})), None);
        let child = client.up("", Some(&layer(json!({"headers": {"authorization": null}}))));

        client.get("", None).await.unwrap();
        assert_eq!(transport.last().headers[header::AUTHORIZATION], "Bearer new");

        child.get("", None).await.unwrap();
        assert!(transport.last().headers.get(header::AUTHORIZATION).is_none());
    }

    #[tokio::test]
    async fn test_response_as_response() {
        let transport = RecordingTransport::new(StatusCode::OK, "raw");
        let client = recording_client("https://example.com", &transport);
        let options = ConfigLayer::new().with("responseAs", ResponseAs::Response.to_string());

        let payload = client.get("", Some(&options)).await.unwrap();
        let Payload::Response(response) = payload else {
            panic!("Expected the raw response, got {payload:?}");
        };
        assert_eq!(response.body, Bytes::from_static(b"raw"));
    }

    #[tokio::test]
    async fn test_unknown_options_are_ignored() {
        let transport = RecordingTransport::new(StatusCode::OK, "{}");
        let client = recording_client("https://example.com", &transport);
        let options = ConfigLayer::new()
            .with("credentials", "include")
            .with("cache", ConfigValue::Null);

        assert!(client.get("", Some(&options)).await.is_ok());
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let transport = RecordingTransport::new(StatusCode::OK, "{}");
        let client = recording_client("not a url", &transport);

        let error = client.get("x", None).await.unwrap_err();
        assert!(matches!(error, ErrorKind::InvalidUrl(url, _) if url == "not a url/x"));
        assert!(transport.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transport_error_is_propagated() {
        let client = ClientBuilder::builder()
            .base_url("https://example.com")
            .transport(Arc::new(FailingTransport) as Arc<dyn Transport>)
            .build()
            .client()
            .unwrap();

        let error = client.get("", None).await.unwrap_err();
        assert!(error.is_transport());
    }

    #[test]
    fn test_zero_window_means_no_limiter() {
        let client = ClientBuilder::builder()
            .base_url("https://example.com")
            .rate_limit(RateLimitConfig::new(Duration::from_secs(1)))
            .build()
            .client()
            .unwrap();

        let throttled = client.request(RequestDescriptor::builder().url("/").build());
        assert_eq!(
            throttled.limiter().map(|l| *l.config()),
            Some(RateLimitConfig::new(Duration::from_secs(1)))
        );

        let own_window = client.request(
            RequestDescriptor::builder()
                .url("/")
                .rate_limit(Duration::from_secs(5))
                .rate_only_success(true)
                .build(),
        );
        assert_eq!(
            own_window.limiter().map(|l| *l.config()),
            Some(RateLimitConfig::new(Duration::from_secs(5)).reset_on_success_only(true))
        );

        // An explicit zero window opts out of the client's default
        let unthrottled = client.request(
            RequestDescriptor::builder()
                .url("/")
                .rate_limit(Duration::ZERO)
                .build(),
        );
        assert!(unthrottled.limiter().is_none());
    }

    #[tokio::test]
    async fn test_get_convenience() {
        let mock_server = mock_server!("GET", StatusCode::OK, set_body_json(json!(["a"])));
        let payload = get(&mock_server.uri()).await.unwrap();
        assert_eq!(payload, Payload::Json(json!(["a"])));
    }
}
