//! Reusable request invocations.
//!
//! A [`RequestDescriptor`] captures everything about a request except the
//! moment it is sent. [`crate::Client::request`] binds a descriptor to a
//! client and returns an [`Invocable`], which can be invoked any number of
//! times. URL and body may be given as providers that are evaluated anew on
//! every invocation.

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use http::{Method, StatusCode};
use tokio::sync::mpsc::UnboundedSender;
use typed_builder::TypedBuilder;

use crate::ratelimit::Throttled;
use crate::{Client, ConfigLayer, ErrorKind, Payload, RateLimiter, RequestData, Result};

/// A value that is either fixed or produced on demand
pub enum Lazy<T> {
    /// Used as is on every invocation
    Value(T),
    /// Called once per invocation, immediately before the request is sent
    Provider(Arc<dyn Fn() -> T + Send + Sync>),
}

impl<T: Clone> Lazy<T> {
    /// Wrap a provider function
    pub fn provider(f: impl Fn() -> T + Send + Sync + 'static) -> Self {
        Self::Provider(Arc::new(f))
    }

    /// The current value
    #[must_use]
    pub fn resolve(&self) -> T {
        match self {
            Self::Value(value) => value.clone(),
            Self::Provider(provider) => provider(),
        }
    }
}

impl<T: Clone> Clone for Lazy<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Value(value) => Self::Value(value.clone()),
            Self::Provider(provider) => Self::Provider(Arc::clone(provider)),
        }
    }
}

impl<T: Debug> Debug for Lazy<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Provider(_) => f.write_str("Provider(..)"),
        }
    }
}

impl From<&str> for Lazy<String> {
    fn from(value: &str) -> Self {
        Self::Value(value.to_string())
    }
}

impl From<String> for Lazy<String> {
    fn from(value: String) -> Self {
        Self::Value(value)
    }
}

impl From<RequestData> for Lazy<RequestData> {
    fn from(value: RequestData) -> Self {
        Self::Value(value)
    }
}

/// Hooks called after an admitted request settles, or when one is dropped by
/// the rate limiter.
///
/// All methods do nothing by default. Hooks observe the outcome; the caller
/// of [`Invocable::invoke`] still receives it.
pub trait RequestListener: Send + Sync + 'static {
    /// The request succeeded with `payload`
    fn on_success(&self, payload: &Payload) {
        let _ = payload;
    }

    /// The request failed with `error`
    fn on_error(&self, error: &ErrorKind) {
        let _ = error;
    }

    /// The request was suppressed, `remaining` is the rest of the cooldown
    fn on_rate_limited(&self, remaining: Duration) {
        let _ = remaining;
    }
}

/// No hooks
impl RequestListener for () {}

/// What happened to an invocation, as sent by a [`ChannelListener`]
#[derive(Debug, Clone, PartialEq)]
pub enum RequestEvent {
    /// The request succeeded
    Success(Payload),
    /// The request failed
    Error {
        /// The error's message
        message: String,
        /// Status code if the server answered with an error status
        status: Option<StatusCode>,
    },
    /// The request was dropped by the rate limiter
    RateLimited(Duration),
}

/// [`RequestListener`] forwarding every event into a channel
#[derive(Debug, Clone)]
pub struct ChannelListener {
    sender: UnboundedSender<RequestEvent>,
}

impl ChannelListener {
    /// Forward events to `sender`
    #[must_use]
    pub const fn new(sender: UnboundedSender<RequestEvent>) -> Self {
        Self { sender }
    }

    fn send(&self, event: RequestEvent) {
        // A dropped receiver just means nobody is interested anymore
        let _ = self.sender.send(event);
    }
}

impl RequestListener for ChannelListener {
    fn on_success(&self, payload: &Payload) {
        self.send(RequestEvent::Success(payload.clone()));
    }

    fn on_error(&self, error: &ErrorKind) {
        self.send(RequestEvent::Error {
            message: error.to_string(),
            status: error.as_status().map(crate::StatusError::status),
        });
    }

    fn on_rate_limited(&self, remaining: Duration) {
        self.send(RequestEvent::RateLimited(remaining));
    }
}

/// Everything needed to send a request, except the client.
///
/// ```
/// use fetchtower::{Lazy, RequestDescriptor};
/// use http::Method;
/// use std::time::Duration;
///
/// let descriptor = RequestDescriptor::builder()
///     .method(Method::POST)
///     .url(Lazy::provider(|| format!("/posts/{}", 1)))
///     .rate_limit(Duration::from_secs(1))
///     .build();
/// assert_eq!(descriptor.url.resolve(), "/posts/1");
/// ```
#[derive(TypedBuilder, Clone)]
#[builder(field_defaults(default, setter(into)))]
pub struct RequestDescriptor {
    /// HTTP method
    #[builder(default = Method::GET)]
    pub method: Method,

    /// Path relative to the client's base URL
    #[builder(!default)]
    pub url: Lazy<String>,

    /// Request body
    #[builder(setter(strip_option))]
    pub data: Option<Lazy<RequestData>>,

    /// Per-request options, merged above the client's options
    #[builder(setter(strip_option))]
    pub options: Option<ConfigLayer>,

    /// Success, error and rate-limit hooks
    #[builder(default = Arc::new(()) as Arc<dyn RequestListener>, setter(!into))]
    pub listener: Arc<dyn RequestListener>,

    /// Cooldown window. Without one the client's default rate limit
    /// applies; a zero window disables throttling.
    #[builder(setter(strip_option))]
    pub rate_limit: Option<Duration>,

    /// End the cooldown early when the admitted request fails
    pub rate_only_success: bool,
}

impl Debug for RequestDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestDescriptor")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("data", &self.data)
            .field("options", &self.options)
            .field("rate_limit", &self.rate_limit)
            .field("rate_only_success", &self.rate_only_success)
            .finish_non_exhaustive()
    }
}

/// A request bound to a client, ready to be invoked repeatedly.
///
/// Clones share the rate limiter.
#[derive(Debug, Clone)]
pub struct Invocable {
    client: Client,
    descriptor: Arc<RequestDescriptor>,
    limiter: Option<RateLimiter>,
}

impl Invocable {
    pub(crate) fn new(
        client: Client,
        descriptor: RequestDescriptor,
        limiter: Option<RateLimiter>,
    ) -> Self {
        Self {
            client,
            descriptor: Arc::new(descriptor),
            limiter,
        }
    }

    /// The descriptor this invocable was built from
    #[must_use]
    pub fn descriptor(&self) -> &RequestDescriptor {
        &self.descriptor
    }

    /// The rate limiter, if the request is throttled
    #[must_use]
    pub const fn limiter(&self) -> Option<&RateLimiter> {
        self.limiter.as_ref()
    }

    /// Send the request.
    ///
    /// URL and body providers are evaluated when the request is admitted.
    /// The `on_success` or `on_error` hook runs before the outcome is
    /// returned. A call dropped by the rate limiter resolves to
    /// [`Throttled::Suppressed`] without touching the network.
    ///
    /// # Errors
    ///
    /// Returns the error of the request, after `on_error` saw it.
    pub fn invoke(&self) -> BoxFuture<'static, Result<Throttled<Payload>>> {
        let client = self.client.clone();
        let descriptor = Arc::clone(&self.descriptor);
        match &self.limiter {
            Some(limiter) => limiter.invoke(move || execute(client, descriptor)),
            None => execute(client, descriptor)
                .map(|result| result.map(Throttled::Admitted))
                .boxed(),
        }
    }
}

async fn execute(client: Client, descriptor: Arc<RequestDescriptor>) -> Result<Payload> {
    let url = descriptor.url.resolve();
    let data = descriptor.data.as_ref().map(Lazy::resolve);

    let result = client
        .send(
            descriptor.method.clone(),
            &url,
            data,
            descriptor.options.as_ref(),
        )
        .await;

    match &result {
        Ok(payload) => descriptor.listener.on_success(payload),
        Err(error) => {
            log::debug!("{} {url} failed: {error}", descriptor.method);
            descriptor.listener.on_error(error);
        }
    }
    result
}
