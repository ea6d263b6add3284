use std::path::PathBuf;

use thiserror::Error;

use crate::StatusError;

/// Possible errors when sending requests with `fetchtower`
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The request failed before any response existed (reqwest transport)
    #[error("Network error while sending the request")]
    NetworkRequest(#[source] reqwest::Error),

    /// The request failed before any response existed (custom transport)
    #[error("Transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The reqwest client could not be created
    #[error("Error creating request client: {0}")]
    BuildRequestClient(#[source] reqwest::Error),

    /// A response was received but its status is not in `200..=299`
    #[error("{0}")]
    Status(Box<StatusError>),

    /// The resolved URL cannot be parsed
    #[error("Cannot parse `{0}` as URL")]
    InvalidUrl(String, #[source] url::ParseError),

    /// A header value could not be parsed.
    #[error("Header value could not be parsed")]
    InvalidHeader(#[from] http::header::InvalidHeaderValue),

    /// A header name could not be parsed.
    #[error("Header name could not be parsed")]
    InvalidHeaderName(#[from] http::header::InvalidHeaderName),

    /// The `method` option is not a valid HTTP method
    #[error("Invalid HTTP method `{0}`")]
    InvalidMethod(String),

    /// The `responseAs` option names an unknown representation
    #[error("Unknown response representation `{0}`")]
    InvalidResponseAs(String),

    /// The `timeout` option cannot be parsed as a duration
    #[error("Invalid timeout `{0}`")]
    InvalidTimeout(String),

    /// A well-known option has a value of the wrong kind
    #[error("Invalid value for option `{key}`: {reason}")]
    InvalidConfigValue {
        /// The option name
        key: String,
        /// What was wrong with it
        reason: String,
    },

    /// The request body could not be serialized as JSON
    #[error("Failed to encode request body as JSON")]
    EncodeBody(#[source] serde_json::Error),

    /// A configuration file could not be read
    #[error("Failed to read configuration file `{}`", .0.display())]
    ReadConfig(PathBuf, #[source] std::io::Error),

    /// A configuration file is not valid TOML or has unknown fields
    #[error("Failed to parse configuration file")]
    ParseConfig(#[from] toml::de::Error),
}

impl ErrorKind {
    /// The status error, if a response with an unsuccessful status was received
    #[must_use]
    pub fn as_status(&self) -> Option<&StatusError> {
        match self {
            Self::Status(e) => Some(e),
            _ => None,
        }
    }

    /// Whether the request failed before any response existed
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::NetworkRequest(_) | Self::Transport(_))
    }
}

impl From<StatusError> for ErrorKind {
    fn from(e: StatusError) -> Self {
        Self::Status(Box::new(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RawResponse, ResponseAs};
    use http::StatusCode;
    use url::Url;

    #[test]
    fn test_status_error_display() {
        let response = RawResponse::new(
            StatusCode::NOT_FOUND,
            Url::parse("https://example.com/missing").unwrap(),
            "",
        );
        let error = ErrorKind::from(StatusError::new(response, ResponseAs::Json));

        assert_eq!(error.to_string(), "Not Found");
        assert!(!error.is_transport());
        assert_eq!(error.as_status().map(StatusError::status), Some(StatusCode::NOT_FOUND));
    }

    #[test]
    fn test_transport_error() {
        let error = ErrorKind::Transport("connection reset".into());
        assert!(error.is_transport());
        assert!(error.as_status().is_none());
        assert_eq!(error.to_string(), "Transport error: connection reset");
    }
}
