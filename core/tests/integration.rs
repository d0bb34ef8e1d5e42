//! End-to-end dispatcher tests against the live mock server.
//!
//! # Design
//! Each test starts the mock server on a random port in a background thread
//! with its own tokio runtime, then calls the blocking `get` / `post`
//! functions over real HTTP. The `/echo` route reports what actually went
//! over the wire.

use std::collections::BTreeMap;
use std::net::SocketAddr;

use http_dispatch::http::{DEFAULT_USER_AGENT, FORM_CONTENT_TYPE};
use http_dispatch::{get, post, HttpMethod, HttpRequestConfig, HttpRequestError, ProxyConfig};
use mock_server::Echo;
use url::Url;

fn spawn_server() -> SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    addr
}

/// A local port with nothing listening on it.
fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn echo(body: &str) -> Echo {
    serde_json::from_str(body).expect("echo response should be JSON")
}

#[test]
fn get_without_params_hits_unmodified_url() {
    let addr = spawn_server();
    let config = HttpRequestConfig::new(format!("http://{addr}/echo?fixed=1"));

    let seen = echo(&get(&config).unwrap());
    assert_eq!(seen.method, "GET");
    assert_eq!(seen.uri, "/echo?fixed=1");
}

#[test]
fn get_params_round_trip_through_query() {
    let addr = spawn_server();
    let params: BTreeMap<String, String> = [
        ("name", "张三"),
        ("q", "a b&c=d"),
        ("empty", ""),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    let config = HttpRequestConfig::new(format!("http://{addr}/echo")).with_params(params.clone());

    let seen = echo(&get(&config).unwrap());
    let query = seen.query.expect("query string");
    assert_eq!(query.split('&').count(), params.len());

    let parsed = Url::parse(&format!("http://localhost/?{query}")).unwrap();
    let decoded: BTreeMap<String, String> = parsed.query_pairs().into_owned().collect();
    assert_eq!(decoded, params);
}

#[test]
fn default_headers_are_sent_without_caller_headers() {
    let addr = spawn_server();
    let config = HttpRequestConfig::new(format!("http://{addr}/echo"));

    let seen = echo(&get(&config).unwrap());
    assert_eq!(seen.headers.get("connection").map(String::as_str), Some("keep-alive"));
    assert_eq!(
        seen.headers.get("accept-encoding").map(String::as_str),
        Some("gzip, deflate, br")
    );
    assert_eq!(seen.headers.get("accept").map(String::as_str), Some("*/*"));
    assert_eq!(
        seen.headers.get("user-agent").map(String::as_str),
        Some(DEFAULT_USER_AGENT)
    );
}

#[test]
fn caller_headers_replace_defaults() {
    let addr = spawn_server();
    let config = HttpRequestConfig::new(format!("http://{addr}/echo"))
        .with_header("X-Api-Key", "secret")
        .with_header("Accept", "application/json");

    let seen = echo(&get(&config).unwrap());
    assert_eq!(seen.headers.get("x-api-key").map(String::as_str), Some("secret"));
    assert_eq!(
        seen.headers.get("accept").map(String::as_str),
        Some("application/json")
    );
    assert!(!seen.headers.contains_key("user-agent"));
    assert!(!seen.headers.contains_key("accept-encoding"));
}

#[test]
fn post_json_body_is_sent_byte_for_byte() {
    let addr = spawn_server();
    let json = r#"{ "name" : "John",  "age": 30 }"#;
    let config = HttpRequestConfig::new(format!("http://{addr}/echo")).with_json_body(json);

    let seen = echo(&post(&config).unwrap());
    assert_eq!(seen.method, "POST");
    assert_eq!(seen.body, json);
    assert_eq!(
        seen.headers.get("content-type").map(String::as_str),
        Some("application/json")
    );
}

#[test]
fn post_params_are_form_encoded() {
    let addr = spawn_server();
    let config = HttpRequestConfig::new(format!("http://{addr}/echo"))
        .with_param("name", "John Doe")
        .with_param("city", "上海");

    let seen = echo(&post(&config).unwrap());
    assert_eq!(seen.uri, "/echo");
    assert_eq!(seen.body, "city=%E4%B8%8A%E6%B5%B7&name=John+Doe");
    let content_type = seen.headers.get("content-type").map(String::as_str);
    assert_eq!(content_type, Some(FORM_CONTENT_TYPE));
    assert!(!content_type.unwrap_or_default().contains("json"));
}

#[test]
fn post_without_body_sends_empty_request() {
    let addr = spawn_server();
    let config = HttpRequestConfig::new(format!("http://{addr}/echo"));

    let seen = echo(&post(&config).unwrap());
    assert_eq!(seen.method, "POST");
    assert!(seen.body.is_empty());
    assert!(!seen.headers.contains_key("content-type"));
}

#[test]
fn error_status_is_reported_without_body() {
    let addr = spawn_server();

    let err = get(&HttpRequestConfig::new(format!("http://{addr}/status/404"))).unwrap_err();
    assert!(matches!(
        err,
        HttpRequestError::Status { method: HttpMethod::Get, status: 404 }
    ));
    assert!(!err.to_string().contains(mock_server::STATUS_BODY));

    let config = HttpRequestConfig::new(format!("http://{addr}/status/500")).with_json_body("{}");
    let err = post(&config).unwrap_err();
    assert_eq!(err.status(), Some(500));
    assert_eq!(err.method(), HttpMethod::Post);
}

#[test]
fn status_below_400_returns_body() {
    let addr = spawn_server();
    let body = get(&HttpRequestConfig::new(format!("http://{addr}/status/202"))).unwrap();
    assert_eq!(body, mock_server::STATUS_BODY);
}

#[test]
fn empty_body_yields_empty_string() {
    let addr = spawn_server();
    let body = get(&HttpRequestConfig::new(format!("http://{addr}/empty"))).unwrap();
    assert_eq!(body, "");
}

#[test]
fn concurrent_gets_share_default_agent() {
    let addr = spawn_server();

    let handles: Vec<_> = (0..50)
        .map(|i| {
            std::thread::spawn(move || {
                let config = HttpRequestConfig::new(format!("http://{addr}/echo"))
                    .with_param("id", i.to_string());
                (i, get(&config))
            })
        })
        .collect();

    for handle in handles {
        let (i, result) = handle.join().unwrap();
        let seen = echo(&result.unwrap());
        assert_eq!(seen.query, Some(format!("id={i}")));
    }
}

#[test]
fn connection_refused_is_transport_error() {
    let port = closed_port();
    let err = get(&HttpRequestConfig::new(format!("http://127.0.0.1:{port}/"))).unwrap_err();
    assert!(err.is_transport(), "unexpected error: {err}");
    assert!(std::error::Error::source(&err).is_some());
}

#[test]
fn unreachable_proxy_is_transport_error() {
    let addr = spawn_server();
    let proxy = ProxyConfig::new("127.0.0.1", closed_port()).with_credentials("user", "pass");
    let config = HttpRequestConfig::new(format!("http://{addr}/echo")).with_proxy(proxy);

    let err = get(&config).unwrap_err();
    assert!(err.is_transport(), "unexpected error: {err}");
}

#[test]
fn malformed_url_fails_before_io() {
    let err = post(&HttpRequestConfig::new("http://")).unwrap_err();
    assert!(matches!(err, HttpRequestError::InvalidUrl { .. }));
}
