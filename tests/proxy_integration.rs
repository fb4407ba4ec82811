//! Proxy environment handling of the shared HTTP client.
//!
//! Kept in its own test binary because it mutates process-wide environment
//! variables.

mod support;
use support::socket_guard::start_mock_server_or_skip;

use bulkpull_core::build_http_client;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn test_no_proxy_hosts_bypass_configured_proxy() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/api/bulk/abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(1)
        .mount(&server)
        .await;

    // SAFETY: this binary holds a single test, so nothing reads the
    // environment concurrently.
    unsafe {
        for name in ["ALL_PROXY", "all_proxy", "HTTPS_PROXY", "https_proxy"] {
            std::env::remove_var(name);
        }
        std::env::set_var("HTTP_PROXY", "http://127.0.0.1:9");
        std::env::set_var("http_proxy", "http://127.0.0.1:9");
        std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
        std::env::set_var("no_proxy", "127.0.0.1,localhost");
    }

    let client = build_http_client().unwrap();
    let response = client
        .get(format!("{}/api/bulk/abc123", server.uri()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
}
