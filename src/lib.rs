//! `fetchtower` is a small helper for sending HTTP requests with layered,
//! mergeable options and an optional per-endpoint throttle.
//!
//! ```no_run
//! use fetchtower::{ClientBuilder, ConfigLayer, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!   let client = ClientBuilder::builder()
//!       .base_url("https://jsonplaceholder.typicode.com")
//!       .build()
//!       .client()?;
//!
//!   let post = client.get("/posts/1", None).await?;
//!   println!("{post:?}");
//!
//!   let as_text = ConfigLayer::new().with("responseAs", "text");
//!   let todos = client.up("todos", None);
//!   println!("{:?}", todos.get("1", Some(&as_text)).await?);
//!   Ok(())
//! }
//! ```
//!
//! Requests that should not be started more than once per time window are
//! described once and invoked repeatedly:
//!
//! ```no_run
//! use fetchtower::{ClientBuilder, Lazy, RequestDescriptor, Result, Throttled};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!   let client = ClientBuilder::builder()
//!       .base_url("https://jsonplaceholder.typicode.com")
//!       .build()
//!       .client()?;
//!
//!   let refresh = client.request(
//!       RequestDescriptor::builder()
//!           .url(Lazy::provider(|| format!("/posts/{}", 1)))
//!           .rate_limit(Duration::from_secs(1))
//!           .build(),
//!   );
//!
//!   match refresh.invoke().await? {
//!       Throttled::Admitted(payload) => println!("{payload:?}"),
//!       Throttled::Suppressed { remaining } => println!("try again in {remaining:?}"),
//!   }
//!   Ok(())
//! }
//! ```
#![warn(missing_docs)]

#[cfg(test)]
#[macro_use]
pub mod test_utils;

mod client;
mod headers;
mod invoker;
mod merge;
mod transport;
mod types;
mod utils;

pub mod config;
pub mod ratelimit;

pub use client::{Client, ClientBuilder, DEFAULT_USER_AGENT, get};
pub use config::{ClientConfig, defaults};
pub use headers::{canonical_headers, filter_headers, header_map};
pub use invoker::{
    ChannelListener, Invocable, Lazy, RequestDescriptor, RequestEvent, RequestListener,
};
pub use merge::merge;
pub use ratelimit::{
    Clock, ManualClock, Phase, RateLimitConfig, RateLimiter, SystemClock, Throttled,
    TimerCallback,
};
pub use transport::{ReqwestTransport, Transport, TransportRequest};
pub use types::*;
pub use utils::url::normalize_url;
