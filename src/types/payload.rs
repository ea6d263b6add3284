use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString, VariantNames};

use crate::{ErrorKind, RawResponse, Result};

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// How the body of a successful response is handed back to the caller.
///
/// Set through the `responseAs` option, e.g. `responseAs = "text"`.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    VariantNames,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub enum ResponseAs {
    /// UTF-8 text, invalid sequences are replaced
    Text,
    /// Parsed JSON
    #[default]
    Json,
    /// Bytes together with their content type
    Blob,
    /// Bytes only
    ArrayBuffer,
    /// `application/x-www-form-urlencoded` fields
    FormData,
    /// The [`RawResponse`] itself
    Response,
}

/// Materialized response body
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// See [`ResponseAs::Text`]
    Text(String),
    /// See [`ResponseAs::Json`]
    Json(Value),
    /// See [`ResponseAs::Blob`]
    Blob {
        /// Value of the `Content-Type` header, if any
        content_type: Option<String>,
        /// Raw body
        data: Bytes,
    },
    /// See [`ResponseAs::ArrayBuffer`]
    ArrayBuffer(Bytes),
    /// See [`ResponseAs::FormData`]
    FormData(Vec<(String, String)>),
    /// See [`ResponseAs::Response`]
    Response(Box<RawResponse>),
    /// The body could not be materialized in the requested representation
    Empty,
}

impl Payload {
    /// Convert the body of `response` into the requested representation.
    ///
    /// This never fails: a body that cannot be represented, such as malformed
    /// JSON, yields [`Payload::Empty`].
    #[must_use]
    pub fn materialize(response: &RawResponse, response_as: ResponseAs) -> Self {
        match response_as {
            ResponseAs::Text => Self::Text(String::from_utf8_lossy(&response.body).into_owned()),
            ResponseAs::Json => match serde_json::from_slice(&response.body) {
                Ok(value) => Self::Json(value),
                Err(e) => {
                    log::debug!("Cannot parse body of {} as JSON: {e}", response.url);
                    Self::Empty
                }
            },
            ResponseAs::Blob => Self::Blob {
                content_type: response.content_type().map(ToString::to_string),
                data: response.body.clone(),
            },
            ResponseAs::ArrayBuffer => Self::ArrayBuffer(response.body.clone()),
            ResponseAs::FormData => match response.content_type() {
                Some(content_type) if content_type.starts_with(FORM_URLENCODED) => Self::FormData(
                    url::form_urlencoded::parse(&response.body)
                        .into_owned()
                        .collect(),
                ),
                other => {
                    log::debug!(
                        "Cannot read body of {} as form data, content type is {other:?}",
                        response.url
                    );
                    Self::Empty
                }
            },
            ResponseAs::Response => Self::Response(Box::new(response.clone())),
        }
    }

    /// Whether this is the [`Payload::Empty`] marker
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// The parsed JSON value, if this is a [`Payload::Json`]
    #[must_use]
    pub const fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    /// The text, if this is a [`Payload::Text`]
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// Request body
#[derive(Debug, Clone, PartialEq)]
pub enum RequestData {
    /// Serialized with `serde_json`
    Json(Value),
    /// Sent as-is
    Text(String),
    /// Sent as-is
    Bytes(Bytes),
    /// Encoded as `application/x-www-form-urlencoded`
    Form(Vec<(String, String)>),
}

impl RequestData {
    /// Encode into the bytes sent over the wire.
    ///
    /// `Json(null)` and empty text mean "no body" and return `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::EncodeBody`] if a JSON value cannot be serialized.
    pub fn into_body(self) -> Result<Option<Bytes>> {
        match self {
            Self::Json(Value::Null) => Ok(None),
            Self::Json(value) => serde_json::to_vec(&value)
                .map(|body| Some(body.into()))
                .map_err(ErrorKind::EncodeBody),
            Self::Text(text) if text.is_empty() => Ok(None),
            Self::Text(text) => Ok(Some(text.into())),
            Self::Bytes(bytes) => Ok(Some(bytes)),
            Self::Form(fields) => Ok(Some(
                url::form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(fields)
                    .finish()
                    .into(),
            )),
        }
    }
}

impl From<Value> for RequestData {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl From<String> for RequestData {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for RequestData {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<Bytes> for RequestData {
    fn from(value: Bytes) -> Self {
        Self::Bytes(value)
    }
}
