//! Error type for the request dispatcher.
//!
//! # Design
//! `get` and `post` fail with exactly one type. The variant tells the caller
//! which stage failed: `InvalidUrl`, `UnsupportedScheme` and `InvalidProxy`
//! fire before any I/O, `Status` means the server answered with 4xx/5xx, and
//! `Transport` covers everything between (DNS, connect, TLS, timeouts, body
//! decoding). The client library's error is kept as a boxed `source` so it
//! stays inspectable without leaking its type into the public API.

use std::error::Error as StdError;

use thiserror::Error;

use crate::config::ConfigError;
use crate::http::HttpMethod;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HttpRequestError {
    #[error("failed to execute {method} request: invalid url `{url}`")]
    InvalidUrl {
        method: HttpMethod,
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to execute {method} request: unsupported url scheme `{scheme}`")]
    UnsupportedScheme { method: HttpMethod, scheme: String },

    #[error("failed to execute {method} request: invalid proxy configuration")]
    InvalidProxy {
        method: HttpMethod,
        #[source]
        source: ConfigError,
    },

    /// The server returned 400 or above. The response body is not read.
    #[error("failed to execute {method} request: request failed with status {status}")]
    Status { method: HttpMethod, status: u16 },

    #[error("failed to execute {method} request: {source}")]
    Transport {
        method: HttpMethod,
        #[source]
        source: Box<dyn StdError + Send + Sync + 'static>,
    },
}

impl HttpRequestError {
    pub(crate) fn transport<E>(method: HttpMethod, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        HttpRequestError::Transport {
            method,
            source: Box::new(source),
        }
    }

    pub fn method(&self) -> HttpMethod {
        match self {
            HttpRequestError::InvalidUrl { method, .. }
            | HttpRequestError::UnsupportedScheme { method, .. }
            | HttpRequestError::InvalidProxy { method, .. }
            | HttpRequestError::Status { method, .. }
            | HttpRequestError::Transport { method, .. } => *method,
        }
    }

    /// Status code for `Status` errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            HttpRequestError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, HttpRequestError::Transport { .. })
    }
}
