#![cfg_attr(test, deny(rust_2018_idioms))]

//! An asynchronous HTTP/1.1 client over a bounded, reusable connection
//! pool to one remote authority.
//!
//! A [`Client`] dials and reuses up to `max_connections` persistent
//! connections, serializes requests per connection (no pipelining),
//! streams request and response bodies without full buffering, and
//! supports HTTP/1.1 `Upgrade`/`101 Switching Protocols` handoff to a raw
//! byte stream (see [`upgrade`]).
//!
//! ```no_run
//! use linkpool::{Client, ClientConfig, Request};
//!
//! # async fn run() -> linkpool::Result<()> {
//! let client = Client::new(ClientConfig::builder("example.com").build());
//! let request = Request::get("/").build()?;
//! let response = client.apply(request).await?;
//! let body = response.take_body()?.to_bytes().await?;
//! # Ok(())
//! # }
//! ```

pub use http;
pub use http::{HeaderMap, Method, StatusCode, Uri};

pub use crate::body::Body;
pub use crate::client::Client;
pub use crate::config::{ClientConfig, ClientConfigBuilder, Scheme};
pub use crate::error::{Error, Result};
pub use crate::request::{Request, RequestBuilder};
pub use crate::response::Response;
pub use crate::upgrade::Upgraded;

pub mod body;
mod client;
mod config;
mod error;
mod proto;
mod request;
mod response;
pub mod upgrade;
