//! Header post-processing after the final merge.
//!
//! Merging can add or overwrite headers but never remove one. A header set to
//! `null` in any layer is removed here, exactly once, right before the request
//! is sent.
//!
//! Header names are case-insensitive in HTTP, so [`canonical_headers`] folds
//! them to lowercase in every layer before merging. That way a later layer
//! overrides or deletes an earlier header regardless of spelling.

use std::collections::BTreeMap;

use http::{HeaderMap, HeaderName, HeaderValue};

use crate::config::HEADERS;
use crate::{ConfigLayer, ConfigValue, Result};

/// Drop every header whose value is the `null` sentinel.
///
/// Strings are kept unchanged, including empty ones. Booleans and numbers are
/// rendered as strings. Nested maps, lists and opaque payloads are not valid
/// header values and are skipped.
///
/// ```
/// use fetchtower::{ConfigLayer, ConfigValue, filter_headers};
///
/// let headers = ConfigLayer::new()
///     .with("Accept", "json")
///     .with("X-Foo", ConfigValue::Null);
/// let filtered = filter_headers(&headers);
///
/// assert_eq!(filtered.len(), 1);
/// assert_eq!(filtered["Accept"], "json");
/// ```
#[must_use]
pub fn filter_headers(headers: &ConfigLayer) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            let value = match value {
                ConfigValue::Null => return None,
                ConfigValue::String(s) => s.clone(),
                ConfigValue::Bool(b) => b.to_string(),
                ConfigValue::Number(n) => n.to_string(),
                other => {
                    log::warn!(
                        "Ignoring header `{name}`: a {} is not a valid header value",
                        other.kind()
                    );
                    return None;
                }
            };
            Some((name.clone(), value))
        })
        .collect()
}

/// Copy of `layer` with the names in its `headers` map lowercased.
///
/// Two names in the same map that only differ in case collapse into one; the
/// spelling sorting last wins.
#[must_use]
pub fn canonical_headers(layer: &ConfigLayer) -> ConfigLayer {
    let mut layer = layer.clone();
    if let Some(ConfigValue::Map(headers)) = layer.get_mut(HEADERS) {
        *headers = headers
            .iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value.clone()))
            .collect();
    }
    layer
}

/// Convert filtered headers into a [`HeaderMap`].
///
/// Names that only differ in case end up as one header; the one sorting last
/// wins. Use [`canonical_headers`] on each layer before merging to let
/// precedence decide instead.
///
/// # Errors
///
/// Returns [`crate::ErrorKind::InvalidHeaderName`] or
/// [`crate::ErrorKind::InvalidHeader`] if a name or value is not valid in HTTP.
pub fn header_map(headers: &BTreeMap<String, String>) -> Result<HeaderMap> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        map.insert(
            HeaderName::from_bytes(name.as_bytes())?,
            HeaderValue::from_str(value)?,
        );
    }
    Ok(map)
}
