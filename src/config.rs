//! Default options, well-known option keys and file-based configuration.
//!
//! Options are plain [`ConfigLayer`]s. Only a handful of keys are interpreted
//! when a request is sent; every other key is carried through the merge
//! untouched.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use http::{HeaderMap, Method};
use humantime_serde::re::humantime;
use serde::{Deserialize, Serialize};

use crate::{
    Client, ClientBuilder, ConfigLayer, ConfigValue, ErrorKind, RateLimitConfig, ResponseAs,
    Result, filter_headers, header_map,
};

/// HTTP method, e.g. `"GET"`
pub const METHOD: &str = "method";
/// Map of header name to value; `null` removes a header
pub const HEADERS: &str = "headers";
/// How the response body is materialized, see [`ResponseAs`]
pub const RESPONSE_AS: &str = "responseAs";
/// Per-request timeout, either a humantime string like `"5s"` or milliseconds
pub const TIMEOUT: &str = "timeout";

/// The lowest-precedence layer of every request.
///
/// Accept and send JSON, and parse responses as JSON.
#[must_use]
pub fn defaults() -> ConfigLayer {
    ConfigLayer::new()
        .with(
            HEADERS,
            ConfigLayer::new()
                .with("Accept", "application/json")
                .with("Content-Type", "application/json"),
        )
        .with(RESPONSE_AS, ResponseAs::Json.to_string())
}

/// The interpreted part of a merged configuration
#[derive(Debug, Clone)]
pub(crate) struct EffectiveOptions {
    pub(crate) method: Method,
    pub(crate) headers: HeaderMap,
    pub(crate) response_as: ResponseAs,
    pub(crate) timeout: Option<Duration>,
}

impl EffectiveOptions {
    /// Interpret the well-known keys of a merged layer.
    ///
    /// Missing and `null` values fall back to `GET`, no headers, JSON and no
    /// timeout respectively.
    pub(crate) fn from_layer(merged: &ConfigLayer) -> Result<Self> {
        let method = match merged.get(METHOD) {
            None | Some(ConfigValue::Null) => Method::GET,
            Some(ConfigValue::String(name)) => Method::from_bytes(name.to_uppercase().as_bytes())
                .map_err(|_| ErrorKind::InvalidMethod(name.clone()))?,
            Some(other) => return Err(wrong_kind(METHOD, other)),
        };

        let headers = match merged.get(HEADERS) {
            None | Some(ConfigValue::Null) => HeaderMap::new(),
            Some(ConfigValue::Map(headers)) => header_map(&filter_headers(headers))?,
            Some(other) => return Err(wrong_kind(HEADERS, other)),
        };

        let response_as = match merged.get(RESPONSE_AS) {
            None | Some(ConfigValue::Null) => ResponseAs::default(),
            Some(ConfigValue::String(name)) => ResponseAs::from_str(name)
                .map_err(|_| ErrorKind::InvalidResponseAs(name.clone()))?,
            Some(other) => return Err(wrong_kind(RESPONSE_AS, other)),
        };

        let timeout = match merged.get(TIMEOUT) {
            None | Some(ConfigValue::Null) => None,
            Some(ConfigValue::String(s)) => Some(
                humantime::parse_duration(s).map_err(|_| ErrorKind::InvalidTimeout(s.clone()))?,
            ),
            Some(ConfigValue::Number(n)) => Some(Duration::from_millis(
                n.as_u64()
                    .ok_or_else(|| ErrorKind::InvalidTimeout(n.to_string()))?,
            )),
            Some(other) => return Err(wrong_kind(TIMEOUT, other)),
        };

        Ok(Self {
            method,
            headers,
            response_as,
            timeout,
        })
    }
}

fn wrong_kind(key: &str, value: &ConfigValue) -> ErrorKind {
    ErrorKind::InvalidConfigValue {
        key: key.to_string(),
        reason: format!("unexpected {}", value.kind()),
    }
}

/// Client configuration as stored in a TOML file.
///
/// ```toml
/// base_url = "https://jsonplaceholder.typicode.com"
///
/// [options]
/// responseAs = "json"
/// timeout = "10s"
///
/// [options.headers]
/// Authorization = "Bearer token"
///
/// [rate_limit]
/// window = "1s"
/// reset_on_success_only = true
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Base URL every request path is joined onto
    pub base_url: String,

    /// Instance options, merged above [`defaults`]
    #[serde(default)]
    pub options: ConfigLayer,

    /// Default throttle for invocables built with [`Client::request`]
    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,
}

impl ClientConfig {
    /// Load configuration from a file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid
    /// configuration.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ErrorKind::ReadConfig(path.to_path_buf(), e))?;
        Self::from_str(&contents)
    }

    /// Build a [`Client`] with the default transport and clock
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn client(self) -> Result<Client> {
        ClientBuilder::builder()
            .base_url(self.base_url)
            .options(self.options)
            .rate_limit(self.rate_limit)
            .build()
            .client()
    }
}

impl FromStr for ClientConfig {
    type Err = ErrorKind;

    fn from_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }
}
