//! Blocking HTTP request helper and a generic API result envelope.
//!
//! # Overview
//! - `get` / `post` send one request described by an `HttpRequestConfig`
//!   and return the response body as text. Optional forward proxy, optional
//!   timeouts, caller or default headers, JSON or form body.
//! - `ApiResult<T>` is a success/failure envelope built from `ResultCode`.
//!   It has nothing to do with the dispatcher.
//!
//! # Design
//! - Requests are built as plain data (`build_get_request`,
//!   `build_post_request`) before any I/O. That is where URL encoding,
//!   header policy and body selection are decided and tested.
//! - Two shared agents serve unproxied traffic. Proxied calls get a fresh
//!   agent.
//! - HTTPS targets are reached with certificate and hostname verification
//!   disabled (`TlsMode::InsecureSkipVerify`). See `client` before using
//!   this against anything whose identity matters.
//! - The crate logs through `tracing` and never installs a subscriber.
//!
//! ```rust,no_run
//! use http_dispatch::{HttpRequestConfig, ProxyConfig};
//!
//! let config = HttpRequestConfig::new("https://api.example.com/users")
//!     .with_param("page", "1")
//!     .with_proxy(ProxyConfig::new("proxy.example.com", 8080).with_credentials("user", "pass"));
//! let body = http_dispatch::get(&config)?;
//! # Ok::<(), http_dispatch::HttpRequestError>(())
//! ```

pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod http;

pub use client::{build_get_request, build_post_request, get, post, ClientKind, TlsMode};
pub use config::{ConfigError, HttpRequestConfig, ProxyConfig, ProxyScheme};
pub use envelope::{ApiResult, ResultCode};
pub use error::HttpRequestError;
pub use http::{HttpMethod, HttpRequest};
