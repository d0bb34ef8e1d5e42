//! Blocking request dispatcher.
//!
//! # Design
//! Each call goes through two steps. `build_*_request` turns an
//! `HttpRequestConfig` into a plain `HttpRequest` (URL, headers, body)
//! without touching the network. `get` / `post` then pick one of four
//! agents and send the request once. There is no retry.
//!
//! Agent choice depends on two facts about the call:
//!
//! | target  | proxy | agent                                     |
//! |---------|-------|-------------------------------------------|
//! | http    | no    | shared default agent                      |
//! | https   | no    | shared agent with `InsecureSkipVerify`    |
//! | http    | yes   | new agent routed through the proxy        |
//! | https   | yes   | new proxied agent with `InsecureSkipVerify` |
//!
//! The two shared agents are process-wide `LazyLock` statics, so they are
//! built exactly once even when the first calls race. `ureq::Agent` pools
//! connections internally and is safe to share across threads. Proxied
//! agents are built per call and never shared.
//!
//! # Security
//! Every HTTPS request is sent with `TlsMode::InsecureSkipVerify`: any
//! certificate is accepted, including self-signed ones and ones issued for
//! another host. This is meant for development and test targets. Do not use
//! this dispatcher where the server's identity has to be verified.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::io::{self, Read};
use std::sync::LazyLock;

use flate2::read::{DeflateDecoder, ZlibDecoder};
use tracing::{debug, error, instrument, warn};
use ureq::config::AutoHeaderValue;
use ureq::http::header::CONTENT_ENCODING;
use ureq::http::Response;
use ureq::tls::TlsConfig;
use ureq::{Agent, Body, Proxy, ProxyProtocol};
use url::Url;

use crate::config::{ConfigError, HttpRequestConfig, ProxyConfig, ProxyScheme};
use crate::error::HttpRequestError;
use crate::http::{
    form_encode, merge_query, request_headers, HttpMethod, HttpRequest, CONTENT_TYPE,
    FORM_CONTENT_TYPE, JSON_CONTENT_TYPE,
};

/// Certificate handling for an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
    /// Normal chain and hostname verification.
    Verified,
    /// Accept any certificate for any host. Development targets only.
    InsecureSkipVerify,
}

/// Which of the four agent configurations serves a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientKind {
    Shared,
    SharedInsecureTls,
    Proxied,
    ProxiedInsecureTls,
}

impl ClientKind {
    pub fn select(https: bool, proxied: bool) -> Self {
        match (https, proxied) {
            (false, false) => ClientKind::Shared,
            (true, false) => ClientKind::SharedInsecureTls,
            (false, true) => ClientKind::Proxied,
            (true, true) => ClientKind::ProxiedInsecureTls,
        }
    }

    pub fn tls_mode(&self) -> TlsMode {
        match self {
            ClientKind::Shared | ClientKind::Proxied => TlsMode::Verified,
            ClientKind::SharedInsecureTls | ClientKind::ProxiedInsecureTls => {
                TlsMode::InsecureSkipVerify
            }
        }
    }

    pub fn is_proxied(&self) -> bool {
        matches!(self, ClientKind::Proxied | ClientKind::ProxiedInsecureTls)
    }
}

static SHARED_AGENT: LazyLock<Agent> = LazyLock::new(|| build_agent(TlsMode::Verified, None));
static SHARED_INSECURE_AGENT: LazyLock<Agent> =
    LazyLock::new(|| build_agent(TlsMode::InsecureSkipVerify, None));

/// Build an agent that sends exactly the headers on the `HttpRequest`.
///
/// The library's automatic `User-Agent`, `Accept` and `Accept-Encoding`
/// headers are switched off, status codes are returned as data, and the
/// proxy is always explicit so `HTTP_PROXY` style variables are ignored.
fn build_agent(tls: TlsMode, proxy: Option<Proxy>) -> Agent {
    let tls_config = match tls {
        TlsMode::Verified => TlsConfig::builder().build(),
        TlsMode::InsecureSkipVerify => TlsConfig::builder().disable_verification(true).build(),
    };

    Agent::config_builder()
        .http_status_as_error(false)
        .user_agent(AutoHeaderValue::None)
        .accept(AutoHeaderValue::None)
        .accept_encoding(AutoHeaderValue::None)
        .tls_config(tls_config)
        .proxy(proxy)
        .build()
        .into()
}

fn shared_agent(tls: TlsMode) -> &'static Agent {
    match tls {
        TlsMode::Verified => &SHARED_AGENT,
        TlsMode::InsecureSkipVerify => &SHARED_INSECURE_AGENT,
    }
}

/// Build a per-call agent routed through `config`.
///
/// The proxy is assembled from its parts so the credentials reach the
/// `Proxy-Authorization` header byte-for-byte.
fn proxied_agent(
    method: HttpMethod,
    tls: TlsMode,
    config: &ProxyConfig,
) -> Result<Agent, HttpRequestError> {
    let url = config
        .proxy_url()
        .map_err(|source| HttpRequestError::InvalidProxy { method, source })?;

    let protocol = match config.scheme {
        ProxyScheme::Http => ProxyProtocol::Http,
        ProxyScheme::Https => ProxyProtocol::Https,
    };
    let mut builder = Proxy::builder(protocol)
        .host(&config.authority_host())
        .port(config.port);

    match config.credentials() {
        Some((username, password)) => builder = builder.username(username).password(password),
        None if config.username.is_some() || config.password.is_some() => {
            debug!(proxy = %url, "incomplete proxy credentials ignored");
        }
        None => {}
    }

    let proxy = builder.build().map_err(|e| HttpRequestError::InvalidProxy {
        method,
        source: ConfigError::Rejected {
            url: url.to_string(),
            reason: e.to_string(),
        },
    })?;

    Ok(build_agent(tls, Some(proxy)))
}

/// Validate `raw` and merge `params` into its query.
///
/// Without params the URL comes back byte-for-byte unchanged.
fn build_url(
    method: HttpMethod,
    raw: &str,
    params: Option<&BTreeMap<String, String>>,
) -> Result<String, HttpRequestError> {
    let mut url = Url::parse(raw).map_err(|source| HttpRequestError::InvalidUrl {
        method,
        url: raw.to_string(),
        source,
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(HttpRequestError::UnsupportedScheme {
            method,
            scheme: url.scheme().to_string(),
        });
    }

    match params {
        Some(params) if !params.is_empty() => {
            merge_query(&mut url, params);
            Ok(url.to_string())
        }
        _ => Ok(raw.to_string()),
    }
}

/// Build the GET request for `config`. Params go into the query string.
pub fn build_get_request(config: &HttpRequestConfig) -> Result<HttpRequest, HttpRequestError> {
    let url = build_url(HttpMethod::Get, &config.url, config.params.as_ref())?;
    Ok(HttpRequest {
        method: HttpMethod::Get,
        url,
        headers: request_headers(config.headers.as_ref()),
        body: None,
    })
}

/// Build the POST request for `config`.
///
/// A JSON body is sent verbatim as `application/json` and takes precedence;
/// params are then ignored. Otherwise params become a form body. With
/// neither, the request has no body.
pub fn build_post_request(config: &HttpRequestConfig) -> Result<HttpRequest, HttpRequestError> {
    let url = build_url(HttpMethod::Post, &config.url, None)?;
    let mut request = HttpRequest {
        method: HttpMethod::Post,
        url,
        headers: request_headers(config.headers.as_ref()),
        body: None,
    };

    if let Some(json) = &config.json_body {
        request.set_header(CONTENT_TYPE, JSON_CONTENT_TYPE);
        request.body = Some(json.clone());
    } else if let Some(params) = &config.params {
        if request.header(CONTENT_TYPE).is_none() {
            request.set_header(CONTENT_TYPE, FORM_CONTENT_TYPE);
        }
        request.body = Some(form_encode(params));
    }

    Ok(request)
}

/// Send a GET request and return the response body.
///
/// # Errors
///
/// Fails with `HttpRequestError` when the URL is invalid, the proxy settings
/// are invalid, the transport fails, or the server answers with 400 or above.
#[instrument(name = "http_get", skip_all, fields(url = %config.url))]
pub fn get(config: &HttpRequestConfig) -> Result<String, HttpRequestError> {
    let request = build_get_request(config)?;
    execute(&request, config)
}

/// Send a POST request and return the response body.
///
/// # Errors
///
/// Same failure modes as [`get`].
#[instrument(name = "http_post", skip_all, fields(url = %config.url))]
pub fn post(config: &HttpRequestConfig) -> Result<String, HttpRequestError> {
    let request = build_post_request(config)?;
    execute(&request, config)
}

fn execute(request: &HttpRequest, config: &HttpRequestConfig) -> Result<String, HttpRequestError> {
    let method = request.method;
    let kind = ClientKind::select(request.is_https(), config.proxy.is_some());
    debug!(
        kind = ?kind,
        https = request.is_https(),
        proxied = kind.is_proxied(),
        tls = ?kind.tls_mode(),
        has_body = request.body.is_some(),
        "dispatching http request"
    );

    let agent: Cow<'_, Agent> = match config.proxy.as_ref().filter(|_| kind.is_proxied()) {
        Some(proxy) => Cow::Owned(proxied_agent(method, kind.tls_mode(), proxy)?),
        None => Cow::Borrowed(shared_agent(kind.tls_mode())),
    };

    let mut response = send(&agent, request, config).map_err(|e| {
        error!(error = %e, "http request send failed");
        HttpRequestError::transport(method, e)
    })?;

    let status = response.status().as_u16();
    if status >= 400 {
        warn!(status, "http request failed with error status");
        return Err(HttpRequestError::Status { method, status });
    }
    debug!(status, "http response received");

    // gzip and br are decoded by the agent; deflate is left to us.
    let deflated = response
        .headers()
        .get(CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("deflate"));

    let mut bytes = response.body_mut().read_to_vec().map_err(|e| {
        error!(error = %e, "failed to read http response body");
        HttpRequestError::transport(method, e)
    })?;

    if deflated {
        bytes = inflate(&bytes).map_err(|e| {
            error!(error = %e, "failed to inflate deflate-encoded response body");
            HttpRequestError::transport(method, e)
        })?;
    }

    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Decode a `Content-Encoding: deflate` body.
///
/// The header means zlib-wrapped data, but some servers send a bare deflate
/// stream, so that is tried when the zlib header does not parse.
fn inflate(bytes: &[u8]) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    if ZlibDecoder::new(bytes).read_to_end(&mut out).is_ok() {
        return Ok(out);
    }
    out.clear();
    DeflateDecoder::new(bytes).read_to_end(&mut out)?;
    Ok(out)
}

fn send(
    agent: &Agent,
    request: &HttpRequest,
    config: &HttpRequestConfig,
) -> Result<Response<Body>, ureq::Error> {
    let connect_timeout = config.connection_timeout();
    let read_timeout = config.read_timeout();

    match request.method {
        HttpMethod::Get => {
            let mut builder = agent.get(request.url.as_str());
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            builder
                .config()
                .timeout_connect(connect_timeout)
                .timeout_recv_response(read_timeout)
                .timeout_recv_body(read_timeout)
                .build()
                .call()
        }
        HttpMethod::Post => {
            let mut builder = agent.post(request.url.as_str());
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            let builder = builder
                .config()
                .timeout_connect(connect_timeout)
                .timeout_recv_response(read_timeout)
                .timeout_recv_body(read_timeout)
                .build();
            match &request.body {
                Some(body) => builder.send(body.as_bytes()),
                None => builder.send_empty(),
            }
        }
    }
}
