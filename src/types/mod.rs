#![allow(unreachable_pub)]

mod error;
mod payload;
mod response;
mod value;

pub use error::ErrorKind;
pub use payload::{Payload, RequestData, ResponseAs};
pub use response::{RawResponse, StatusError};
pub use value::{ConfigLayer, ConfigValue, OpaquePayload};

/// The fetchtower `Result` type
pub type Result<T> = std::result::Result<T, crate::ErrorKind>;
