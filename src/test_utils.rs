use std::sync::Arc;

use serde_json::Value;

use crate::{Client, ClientBuilder, Clock, ConfigLayer, ManualClock};

#[macro_export]
/// Creates a mock web server, which responds with a predefined status when
/// handling a request with the given method
macro_rules! mock_server {
    ($method:expr, $status:expr $(, $func:tt ($($arg:expr),*))*) => {{
        let mock_server = wiremock::MockServer::start().await;
        let response_template = wiremock::ResponseTemplate::new(http::StatusCode::from($status));
        let template = response_template$(.$func($($arg),*))*;
        wiremock::Mock::given(wiremock::matchers::method($method)).respond_with(template).mount(&mock_server).await;
        mock_server
    }};
}

/// Build a layer from a JSON object literal
///
/// # Panic
///
/// This panics if `value` is not an object, so it should only be used for
/// testing
pub(crate) fn layer(value: Value) -> ConfigLayer {
    match value {
        Value::Object(map) => map.into(),
        other => panic!("Expected a JSON object, got {other}"),
    }
}

/// Client for `base_url` with a manual clock for rate limiting
pub(crate) fn manual_client(base_url: &str, clock: &ManualClock) -> Client {
    ClientBuilder::builder()
        .base_url(base_url)
        .clock(Arc::new(clock.clone()) as Arc<dyn Clock>)
        .build()
        .client()
        .unwrap()
}
