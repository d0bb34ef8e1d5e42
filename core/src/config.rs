//! Request and proxy configuration.
//!
//! Both types are plain values: built once per call, read by the dispatcher,
//! then dropped. They derive serde so a host application can load them from
//! its own configuration files.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Scheme used to talk to the proxy itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyScheme {
    #[default]
    Http,
    Https,
}

impl ProxyScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyScheme::Http => "http",
            ProxyScheme::Https => "https",
        }
    }
}

impl fmt::Display for ProxyScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Invalid proxy settings, reported before any network I/O.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("proxy host must not be empty")]
    EmptyHost,

    #[error("proxy port {0} is out of range 1-65535")]
    InvalidPort(u16),

    #[error("proxy url `{url}` is invalid")]
    InvalidProxyUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("proxy url `{url}` was rejected: {reason}")]
    Rejected { url: String, reason: String },

    /// Credentials are sent verbatim in the proxy authority, so only
    /// characters a URI userinfo can hold unescaped are accepted.
    #[error("proxy {field} contains unsupported character {ch:?}")]
    UnsupportedCredential { field: &'static str, ch: char },
}

/// Forward proxy settings.
///
/// Basic credentials are only sent when both `username` and `password` are
/// set; a lone username or password is ignored. They go on the wire exactly
/// as given, without percent-encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub scheme: ProxyScheme,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl ProxyConfig {
    /// Plain `http` proxy without credentials.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            scheme: ProxyScheme::Http,
            username: None,
            password: None,
        }
    }

    pub fn with_scheme(mut self, scheme: ProxyScheme) -> Self {
        self.scheme = scheme;
        self
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials().is_some()
    }

    /// Username and password, only when both are set.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => Some((username.as_str(), password.as_str())),
            _ => None,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }
        if let Some((username, password)) = self.credentials() {
            check_credential("username", username, |c| c != ':')?;
            check_credential("password", password, |_| true)?;
        }
        Ok(())
    }

    /// Host as it appears in an authority: IPv6 literals are bracketed.
    pub fn authority_host(&self) -> Cow<'_, str> {
        if self.host.contains(':') && !self.host.starts_with('[') {
            Cow::Owned(format!("[{}]", self.host))
        } else {
            Cow::Borrowed(self.host.as_str())
        }
    }

    /// Render `scheme://host:port`. Credentials are never part of it, so the
    /// result is safe to log.
    pub fn proxy_url(&self) -> Result<Url, ConfigError> {
        self.validate()?;

        let raw = format!("{}://{}:{}", self.scheme, self.authority_host(), self.port);
        Url::parse(&raw).map_err(|source| ConfigError::InvalidProxyUrl { url: raw, source })
    }
}

/// `Proxy-Authorization` carries `base64(username:password)`, so a colon is
/// only ambiguous in the username. Everything else must be printable ASCII
/// that a URI authority accepts unescaped.
fn check_credential(
    field: &'static str,
    value: &str,
    extra: impl Fn(char) -> bool,
) -> Result<(), ConfigError> {
    match value.chars().find(|&c| !is_userinfo_char(c) || !extra(c)) {
        Some(ch) => Err(ConfigError::UnsupportedCredential { field, ch }),
        None => Ok(()),
    }
}

fn is_userinfo_char(c: char) -> bool {
    c.is_ascii_graphic()
        && !matches!(
            c,
            '"' | '<' | '>' | '\\' | '^' | '`' | '{' | '|' | '}' | '/' | '?' | '#' | '[' | ']'
        )
}

/// Everything needed for one `get` or `post` call.
///
/// `headers: None` means "send the default header set"; `Some(map)` replaces
/// the defaults entirely. On POST, `json_body` wins over `params`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpRequestConfig {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxyConfig>,
}

impl HttpRequestConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Add one header. The first call switches off the default header set.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value.into());
        self
    }

    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers = Some(headers);
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value.into());
        self
    }

    pub fn with_params(mut self, params: BTreeMap<String, String>) -> Self {
        self.params = Some(params);
        self
    }

    pub fn with_json_body(mut self, body: impl Into<String>) -> Self {
        self.json_body = Some(body.into());
        self
    }

    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout_ms = Some(duration_to_ms(timeout));
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout_ms = Some(duration_to_ms(timeout));
        self
    }

    pub fn with_proxy(mut self, proxy: ProxyConfig) -> Self {
        self.proxy = Some(proxy);
        self
    }

    pub fn connection_timeout(&self) -> Option<Duration> {
        self.connection_timeout_ms.map(Duration::from_millis)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms.map(Duration::from_millis)
    }
}

fn duration_to_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
