//! HTTP request types and the pure helpers used to assemble them.
//!
//! # Design
//! A request is first built as plain data (`HttpRequest`): final URL, the
//! exact header list and an optional body. Building performs no I/O, so URL
//! encoding, header policy and body selection can be checked without a
//! server. The dispatcher in `client` turns the built value into a network
//! call.

use std::collections::BTreeMap;
use std::fmt;

use url::form_urlencoded;
use url::Url;

/// `User-Agent` sent when the caller supplies no headers. Some servers
/// reject obvious non-browser clients, so this mimics a desktop Chrome build.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/84.0.4147.135 Safari/537.36";

/// Headers attached when `HttpRequestConfig::headers` is `None`.
///
/// Every advertised encoding is decoded before the body is returned: gzip
/// and br by the agent, deflate by the dispatcher.
pub const DEFAULT_HEADERS: [(&str, &str); 4] = [
    ("Connection", "keep-alive"),
    ("Accept-Encoding", "gzip, deflate, br"),
    ("Accept", "*/*"),
    ("User-Agent", DEFAULT_USER_AGENT),
];

pub const CONTENT_TYPE: &str = "Content-Type";
pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=UTF-8";

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An HTTP request described as plain data.
///
/// Produced by `build_get_request` / `build_post_request`. `headers` is the
/// complete list that goes on the wire; nothing is merged in later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Set a header, replacing every existing entry with the same name.
    pub fn set_header(&mut self, name: &str, value: &str) {
        self.headers.retain(|(key, _)| !key.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.to_string()));
    }

    pub fn is_https(&self) -> bool {
        self.url
            .as_bytes()
            .get(..6)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(b"https:"))
    }
}

/// The caller's headers verbatim, or the default set when there are none.
pub fn request_headers(headers: Option<&BTreeMap<String, String>>) -> Vec<(String, String)> {
    match headers {
        Some(headers) => headers
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect(),
        None => DEFAULT_HEADERS
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect(),
    }
}

/// Merge `params` into the query of an already parsed URL.
///
/// A key that already appears in the URL is replaced, every other existing
/// pair is kept in place, and new pairs follow in map order.
pub fn merge_query(url: &mut Url, params: &BTreeMap<String, String>) {
    let existing: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !params.contains_key(key.as_ref()))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    url.set_query(None);
    let mut query = url.query_pairs_mut();
    query.extend_pairs(existing);
    query.extend_pairs(params.iter());
}

/// `application/x-www-form-urlencoded` body for `params`.
pub fn form_encode(params: &BTreeMap<String, String>) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params.iter())
        .finish()
}
