//! Integration tests for token redemption and link resolution against a mock
//! archive server.

mod support;
use support::socket_guard::start_mock_server_or_skip;

use std::time::Duration;

use bulkpull_core::remote::{Communicator, RemoteError, RestoreStatus};
use bulkpull_core::retry::RetryPolicy;
use bulkpull_core::token::DownloadToken;
use serde_json::json;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn communicator(server: &MockServer, token: &DownloadToken) -> Communicator {
    let base = Url::parse(&server.uri()).unwrap();
    Communicator::new(base.clone(), base, token.backend(), reqwest::Client::new())
        .with_retry_policy(RetryPolicy::with_delay(Duration::from_millis(1)))
}

fn two_entry_manifest() -> serde_json::Value {
    json!({
        "status": "ok",
        "metadata": {
            "id": "job-1",
            "description": "rushes",
            "userEmail": "someone@example.com",
            "addedAt": "2024-01-01T00:00:00Z",
            "errorCount": 0,
            "availCount": 2,
            "restoringCount": 0
        },
        "retrievalToken": "long-lived",
        "entries": [
            {"entryId": "e1", "path": "project/a.mov", "fileSize": 100},
            {"entryId": "e2", "path": "project/b.mov", "fileSize": 200}
        ]
    })
}

#[tokio::test]
async fn test_bare_token_single_phase_redemption() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/api/bulk/abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(two_entry_manifest()))
        .expect(1)
        .mount(&server)
        .await;

    let token = DownloadToken::parse("abc123").unwrap();
    let manifest = communicator(&server, &token).redeem(&token).await.unwrap();

    assert_eq!(manifest.totals(), (2, 300));
    assert_eq!(manifest.retrieval_token, "long-lived");
    assert_eq!(manifest.metadata.user_email, "someone@example.com");
    assert_eq!(manifest.entries[1].path, "project/b.mov");
}

#[tokio::test]
async fn test_two_phase_redemption_reads_summary_stream() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/api/bulkv2/xyz"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok",
            "metadata": {"id": "job-2"},
            "retrievalToken": "rt-9",
            "entries": null
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/bulkv2/rt-9/summarystream"))
        .respond_with(ResponseTemplate::new(200).set_body_string(concat!(
            "{\"entryId\":\"s1\",\"path\":\"x/1.mxf\",\"fileSize\":10}\n",
            "\n",
            "{\"entryId\":\"s2\",\"path\":\"x/2.mxf\",\"fileSize\":20}\n",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let token = DownloadToken::parse("archivehunter:bulkdownload:xyz").unwrap();
    let manifest = communicator(&server, &token).redeem(&token).await.unwrap();

    assert_eq!(manifest.entries.len(), 2);
    assert_eq!(manifest.entries[0].entry_id, "s1");
    assert_eq!(manifest.entries[1].entry_id, "s2");
    assert_eq!(manifest.totals(), (2, 30));
}

#[tokio::test]
async fn test_present_but_empty_entries_skip_summary_stream() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/api/bulkv2/xyz"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok",
            "retrievalToken": "rt-9",
            "entries": []
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/bulkv2/rt-9/summarystream"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let token = DownloadToken::parse("archivehunter:bulkdownload:xyz").unwrap();
    let manifest = communicator(&server, &token).redeem(&token).await.unwrap();
    assert!(manifest.entries.is_empty());
}

#[tokio::test]
async fn test_one_bad_summary_line_fails_redemption() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/api/bulkv2/xyz"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status": "ok", "retrievalToken": "rt"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/bulkv2/rt/summarystream"))
        .respond_with(ResponseTemplate::new(200).set_body_string(concat!(
            "{\"entryId\":\"s1\",\"path\":\"a\",\"fileSize\":1}\n",
            "{\"entryId\":\n",
        )))
        .mount(&server)
        .await;

    let token = DownloadToken::parse("archivehunter:bulkdownload:xyz").unwrap();
    let err = communicator(&server, &token)
        .redeem(&token)
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::Synopsis { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_summary_stream_failure_is_not_retried() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/api/bulkv2/xyz"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status": "ok", "retrievalToken": "rt"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/bulkv2/rt/summarystream"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let token = DownloadToken::parse("archivehunter:bulkdownload:xyz").unwrap();
    let err = communicator(&server, &token)
        .redeem(&token)
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(503));
}

#[tokio::test]
async fn test_redemption_retries_through_gateway_errors() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/api/bulk/abc123"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .with_priority(1)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/bulk/abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(two_entry_manifest()))
        .expect(1)
        .mount(&server)
        .await;

    let token = DownloadToken::parse("abc123").unwrap();
    let manifest = communicator(&server, &token).redeem(&token).await.unwrap();
    assert_eq!(manifest.entries.len(), 2);
}

#[tokio::test]
async fn test_redemption_gives_up_on_eleventh_attempt() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/api/bulk/abc123"))
        .respond_with(ResponseTemplate::new(502))
        .expect(11)
        .mount(&server)
        .await;

    let token = DownloadToken::parse("abc123").unwrap();
    let err = communicator(&server, &token)
        .redeem(&token)
        .await
        .unwrap_err();
    match err {
        RemoteError::Exhausted {
            attempts, message, ..
        } => {
            assert_eq!(attempts, 11);
            assert_eq!(message, "server was not available");
        }
        other => panic!("expected exhausted error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_redemption_not_found_is_not_retried() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/api/bulk/expired"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such token"))
        .expect(1)
        .mount(&server)
        .await;

    let token = DownloadToken::parse("expired").unwrap();
    let err = communicator(&server, &token)
        .redeem(&token)
        .await
        .unwrap_err();
    match err {
        RemoteError::HttpStatus { status, body, .. } => {
            assert_eq!(status, 404);
            assert_eq!(body, "no such token");
        }
        other => panic!("expected HTTP status error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_redemption_is_idempotent() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/api/bulk/abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(two_entry_manifest()))
        .expect(2)
        .mount(&server)
        .await;

    let token = DownloadToken::parse("abc123").unwrap();
    let comm = communicator(&server, &token);
    let first = comm.redeem(&token).await.unwrap();
    let second = comm.redeem(&token).await.unwrap();
    assert_eq!(first.entries, second.entries);
}

#[tokio::test]
async fn test_malformed_manifest_is_not_retried() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/api/bulk/abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let token = DownloadToken::parse("abc123").unwrap();
    let err = communicator(&server, &token)
        .redeem(&token)
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::Malformed { .. }));
}

#[tokio::test]
async fn test_resolve_link_decodes_fields() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/api/bulk/long-lived/get/e1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok",
            "restoreStatus": "RS_ALREADY",
            "downloadLink": "/api/bulk/long-lived/content/e1?sig=abc"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let token = DownloadToken::parse("abc123").unwrap();
    let link = communicator(&server, &token)
        .resolve_link("long-lived", "e1")
        .await
        .unwrap();
    assert_eq!(link.restore_status, RestoreStatus::Already);
    assert_eq!(link.download_link.path(), "/api/bulk/long-lived/content/e1");
    assert_eq!(link.download_link.query(), Some("sig=abc"));
}

#[tokio::test]
async fn test_resolve_link_missing_field_is_named() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/api/bulk/long-lived/get/e1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status": "ok", "restoreStatus": "RS_SUCCESS"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let token = DownloadToken::parse("abc123").unwrap();
    let err = communicator(&server, &token)
        .resolve_link("long-lived", "e1")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RemoteError::MissingField {
            field: "downloadLink"
        }
    ));
}

#[tokio::test]
async fn test_resolve_link_gives_up_on_eleventh_attempt() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/api/bulk/long-lived/get/e1"))
        .respond_with(ResponseTemplate::new(504))
        .expect(11)
        .mount(&server)
        .await;

    let token = DownloadToken::parse("abc123").unwrap();
    let err = communicator(&server, &token)
        .resolve_link("long-lived", "e1")
        .await
        .unwrap_err();
    assert!(
        err.to_string().starts_with("server not responding"),
        "got {err}"
    );
}
