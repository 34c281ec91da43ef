//! Transport tests against an in-process mock server.

mod common;

use columnar_link::compression::decompress_gzip;
use columnar_link::{
    CancellationToken, ClientConfig, DataFormat, ExecParams, InsertParams, InsertValues,
    LinkClient, LinkError, LogSink, QueryParams,
};
use common::{unused_url, MockResponse, MockServer};
use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Item {
    id: u32,
}

fn client_for(url: &str) -> LinkClient {
    LinkClient::builder().url(url).build().unwrap()
}

#[tokio::test]
async fn test_query_request_shape() {
    let server = MockServer::fixed(
        MockResponse::ok("{\"id\":1}\n{\"id\":2}\n")
            .with_header("X-ClickHouse-Query-Id", "server-qid")
            .with_header("X-ClickHouse-Summary", r#"{"read_rows":"2","read_bytes":"16"}"#),
    )
    .await;
    let client = LinkClient::builder()
        .url(&server.url)
        .username("alice")
        .password("secret")
        .database("analytics")
        .setting("max_threads", 8u64)
        .application("tests")
        .build()
        .unwrap();

    let mut result = client
        .query(
            QueryParams::new("SELECT id FROM t;")
                .with_setting("max_threads", 2u64)
                .with_query_param("min", 1)
                .with_query_id("client-qid"),
        )
        .await
        .unwrap();

    let items: Vec<Item> = result.json().await.unwrap();
    assert_eq!(items, vec![Item { id: 1 }, Item { id: 2 }]);
    assert_eq!(result.query_id(), "server-qid");
    assert_eq!(result.summary().unwrap().read_rows, 2);

    let request = server.last_request();
    assert_eq!(request.method, "POST");
    assert_eq!(request.body_text(), "SELECT id FROM t \nFORMAT JSONEachRow");
    assert_eq!(request.param("database").as_deref(), Some("analytics"));
    assert_eq!(request.param("query_id").as_deref(), Some("client-qid"));
    assert_eq!(request.param("max_threads").as_deref(), Some("2"));
    assert_eq!(request.param("param_min").as_deref(), Some("1"));
    assert_eq!(request.param("enable_http_compression").as_deref(), Some("1"));
    assert!(request.header("authorization").unwrap().starts_with("Basic "));
    assert!(request.header("user-agent").unwrap().starts_with("tests columnar-link/"));
    assert!(request.header("accept-encoding").unwrap_or_default().contains("gzip"));
}

#[tokio::test]
async fn test_access_token_header() {
    let server = MockServer::fixed(MockResponse::ok("")).await;
    let client = LinkClient::builder().url(&server.url).access_token("tok").build().unwrap();

    client.command(ExecParams::new("SELECT 1")).await.unwrap();
    assert_eq!(server.last_request().header("authorization"), Some("Bearer tok"));
}

#[tokio::test]
async fn test_insert_with_request_compression() {
    let server = MockServer::fixed(
        MockResponse::ok("").with_header("X-ClickHouse-Summary", r#"{"written_rows":"2"}"#),
    )
    .await;
    let client = LinkClient::builder().url(&server.url).compress_request(true).build().unwrap();

    let result = client
        .insert(
            InsertParams::new("t", InsertValues::rows(vec![Item { id: 1 }, Item { id: 2 }]))
                .with_format(DataFormat::JsonEachRow),
        )
        .await
        .unwrap();
    assert!(result.executed);
    assert_eq!(result.summary.unwrap().written_rows, 2);

    let request = server.last_request();
    assert_eq!(request.param("query").as_deref(), Some("INSERT INTO t FORMAT JSONEachRow"));
    assert_eq!(request.header("content-encoding"), Some("gzip"));
    let body = decompress_gzip(&request.body).unwrap();
    assert_eq!(String::from_utf8(body).unwrap(), "{\"id\":1}\n{\"id\":2}\n");
}

#[tokio::test]
async fn test_insert_then_query_round_trip() {
    // Minimal one-table server: inserts append, selects return everything
    let table: Arc<Mutex<Vec<u8>>> = Arc::default();
    let stored = table.clone();
    let server = MockServer::start(move |request| {
        let mut rows = stored.lock().unwrap();
        if request.param("query").map_or(false, |q| q.starts_with("INSERT INTO t ")) {
            rows.extend_from_slice(&request.body);
            MockResponse::ok("")
        } else {
            MockResponse::ok(rows.clone())
        }
    })
    .await;
    let client = client_for(&server.url);

    let inserted = client
        .insert(
            InsertParams::new("t", InsertValues::rows(vec![Item { id: 1 }, Item { id: 2 }]))
                .with_format(DataFormat::JsonEachRow),
        )
        .await
        .unwrap();
    assert!(inserted.executed);
    assert_eq!(table.lock().unwrap().as_slice(), b"{\"id\":1}\n{\"id\":2}\n");

    let mut result = client
        .query(QueryParams::new("SELECT * FROM t ORDER BY id").with_format(DataFormat::JsonEachRow))
        .await
        .unwrap();
    let items: Vec<Item> = result.json().await.unwrap();
    assert_eq!(items, vec![Item { id: 1 }, Item { id: 2 }]);
    assert_eq!(server.last_request().body_text(), "SELECT * FROM t ORDER BY id \nFORMAT JSONEachRow");
}

#[tokio::test]
async fn test_streaming_insert_sends_every_record() {
    let server = MockServer::fixed(MockResponse::ok("")).await;
    let client = client_for(&server.url);

    let records = stream::iter((0..500u32).map(|id| Ok(vec![json!(id), json!(format!("name-{}", id))])));
    client
        .insert(InsertParams::new("t", InsertValues::records(records)))
        .await
        .unwrap();

    let request = server.last_request();
    assert_eq!(request.param("query").as_deref(), Some("INSERT INTO t FORMAT JSONCompactEachRow"));
    let body = request.body_text();
    let lines: Vec<&str> = body.lines().collect();
    assert_eq!(lines.len(), 500);
    assert_eq!(lines[0], "[0,\"name-0\"]");
    assert_eq!(lines[499], "[499,\"name-499\"]");
}

#[tokio::test]
async fn test_streaming_insert_with_compression() {
    let server = MockServer::fixed(MockResponse::ok("")).await;
    let client = LinkClient::builder().url(&server.url).compress_request(true).build().unwrap();

    let csv = stream::iter(vec![
        Ok(bytes::Bytes::from_static(b"1,a\n")),
        Ok(bytes::Bytes::from_static(b"2,b\n")),
    ]);
    client
        .insert(InsertParams::new("t", InsertValues::raw(csv)).with_format(DataFormat::Csv))
        .await
        .unwrap();

    let request = server.last_request();
    assert_eq!(request.header("content-encoding"), Some("gzip"));
    assert_eq!(decompress_gzip(&request.body).unwrap(), b"1,a\n2,b\n");
}

#[tokio::test]
async fn test_server_error_is_parsed() {
    let server = MockServer::fixed(
        MockResponse::error(
            404,
            "Code: 60. DB::Exception: Table default.missing does not exist. (UNKNOWN_TABLE) (version 24.3.1.1)",
        )
        .with_header("X-ClickHouse-Exception-Code", "60"),
    )
    .await;
    let client = client_for(&server.url);

    let err = client.query(QueryParams::new("SELECT * FROM missing")).await.unwrap_err();
    match err {
        LinkError::ServerError {
            status_code,
            code,
            error_type,
            message,
        } => {
            assert_eq!(status_code, 404);
            assert_eq!(code.as_deref(), Some("60"));
            assert_eq!(error_type.as_deref(), Some("UNKNOWN_TABLE"));
            assert!(message.contains("does not exist"));
        },
        other => panic!("expected server error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_ping() {
    let server = MockServer::start(|request| {
        if request.path() == "/ping" {
            MockResponse::ok("Ok.\n")
        } else {
            MockResponse::error(404, "not found")
        }
    })
    .await;
    let client = client_for(&server.url);

    let ping = client.ping().await;
    assert!(ping.is_success(), "{:?}", ping.error);
    assert_eq!(server.last_request().method, "GET");
}

#[tokio::test]
async fn test_ping_never_raises() {
    let client = client_for(&unused_url().await);
    let ping = client.ping().await;
    assert!(!ping.is_success());
    assert!(matches!(ping.error, Some(LinkError::NetworkError(_))));

    let server = MockServer::fixed(MockResponse::error(503, "overloaded")).await;
    let ping = client_for(&server.url).ping().await;
    assert!(matches!(ping.error, Some(LinkError::ServerError { status_code: 503, .. })));
}

#[tokio::test]
async fn test_ping_with_stalled_body_times_out() {
    let server = MockServer::fixed(MockResponse::chunks(vec!["Ok."]).hanging()).await;
    let client = LinkClient::builder()
        .url(&server.url)
        .request_timeout(Duration::from_millis(200))
        .build()
        .unwrap();

    let ping = tokio::time::timeout(Duration::from_secs(3), client.ping())
        .await
        .expect("ping must not hang on a stalled body");
    assert!(!ping.is_success());
    assert!(matches!(ping.error, Some(LinkError::TimeoutError(_))));
}

#[tokio::test]
async fn test_server_failures_reach_log_sink() {
    let server = MockServer::start(|request| {
        if request.body_text().contains("missing") {
            MockResponse::error(404, "Code: 60. DB::Exception: Table default.missing does not exist. (UNKNOWN_TABLE)")
        } else {
            MockResponse::error(500, "Code: 1001. DB::Exception: boom. (STD_EXCEPTION)")
        }
    })
    .await;
    let records = Arc::new(Mutex::new(Vec::new()));
    let captured = records.clone();
    let client = LinkClient::builder()
        .url(&server.url)
        .log_sink(LogSink::new().on_log(move |record| captured.lock().unwrap().push(record.clone())))
        .build()
        .unwrap();

    client.command(ExecParams::new("SELECT * FROM missing")).await.unwrap_err();
    client.command(ExecParams::new("SELECT 1")).await.unwrap_err();

    let records = records.lock().unwrap();
    let failures: Vec<_> = records.iter().filter(|r| r.message.contains("failed")).collect();
    assert_eq!(failures.len(), 2);
    assert_eq!(failures[0].level, log::Level::Warn);
    assert_eq!(failures[1].level, log::Level::Error);
    assert_eq!(failures[1].module, "Connection");
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    let client = client_for(&unused_url().await);
    let err = client.query(QueryParams::new("SELECT 1")).await.unwrap_err();
    assert!(matches!(err, LinkError::NetworkError(_)), "{:?}", err);
    assert!(!err.is_aborted());
}

#[tokio::test]
async fn test_cancel_mid_stream() {
    let server = MockServer::fixed(MockResponse::chunks(vec!["{\"id\":1}\n"]).hanging()).await;
    let client = client_for(&server.url);
    let token = CancellationToken::new();

    let mut result = client
        .query(QueryParams::new("SELECT id FROM t").with_cancel_token(token.clone()))
        .await
        .unwrap();
    let mut batches = result.stream().unwrap();

    let first = batches.next().await.unwrap().unwrap();
    assert_eq!(first.len(), 1);

    token.cancel();
    let next = tokio::time::timeout(Duration::from_secs(5), batches.next())
        .await
        .expect("stream must not hang after cancel");
    match next {
        Some(Err(e)) => assert!(matches!(e, LinkError::Cancelled(_)) && e.is_aborted()),
        other => panic!("expected cancellation, got {:?}", other.map(|r| r.map(|rows| rows.len()))),
    }
    assert!(batches.next().await.is_none());
}

#[tokio::test]
async fn test_cancel_before_headers() {
    let server =
        MockServer::fixed(MockResponse::ok("").with_header_delay(Duration::from_secs(30))).await;
    let client = client_for(&server.url);
    let token = CancellationToken::new();

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });

    let err = client
        .exec(ExecParams::new("SELECT sleep(3)").with_cancel_token(token))
        .await
        .unwrap_err();
    assert!(matches!(err, LinkError::Cancelled(_)));
}

#[tokio::test]
async fn test_stalled_stream_times_out() {
    let server = MockServer::fixed(MockResponse::chunks(vec!["{\"id\":1}\n"]).hanging()).await;
    let client = LinkClient::builder()
        .url(&server.url)
        .request_timeout(Duration::from_millis(300))
        .build()
        .unwrap();

    let mut result = client.query(QueryParams::new("SELECT id FROM t")).await.unwrap();
    let mut batches = result.stream().unwrap();
    assert!(batches.next().await.unwrap().is_ok());
    assert!(matches!(batches.next().await, Some(Err(LinkError::TimeoutError(_)))));
}

#[tokio::test]
async fn test_slow_headers_time_out() {
    let server =
        MockServer::fixed(MockResponse::ok("").with_header_delay(Duration::from_secs(30))).await;
    let client = LinkClient::builder()
        .url(&server.url)
        .request_timeout(Duration::from_millis(200))
        .build()
        .unwrap();

    let err = client.command(ExecParams::new("SELECT 1")).await.unwrap_err();
    assert!(matches!(err, LinkError::TimeoutError(_)));
}

#[tokio::test]
async fn test_max_open_connections_bounds_calls() {
    let server = MockServer::fixed(MockResponse::chunks(vec!["{\"id\":1}\n"]).hanging()).await;
    let client = LinkClient::new(ClientConfig {
        url: Some(server.url.clone()),
        max_open_connections: Some(1),
        request_timeout: Some(Duration::from_secs(5)),
        ..Default::default()
    })
    .unwrap();

    let held = client.query(QueryParams::new("SELECT 1")).await.unwrap();

    // The only slot is held by the unread result set
    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        canceller.cancel();
    });
    let err = client
        .query(QueryParams::new("SELECT 2").with_cancel_token(token))
        .await
        .unwrap_err();
    assert!(matches!(err, LinkError::Cancelled(_)));

    drop(held);
    let mut result = client.query(QueryParams::new("SELECT 3")).await.unwrap();
    result.close();
}

#[tokio::test]
async fn test_unread_result_times_out_and_frees_slot() {
    let server = MockServer::fixed(MockResponse::chunks(vec!["{\"id\":1}\n"]).hanging()).await;
    let client = LinkClient::new(ClientConfig {
        url: Some(server.url.clone()),
        max_open_connections: Some(1),
        request_timeout: Some(Duration::from_millis(300)),
        ..Default::default()
    })
    .unwrap();

    let mut held = client.query(QueryParams::new("SELECT 1")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(900)).await;

    // The held call expired, so its slot is free again
    let mut second = client.query(QueryParams::new("SELECT 2")).await.unwrap();
    second.close();

    let mut batches = held.stream().unwrap();
    assert!(matches!(batches.next().await, Some(Err(LinkError::TimeoutError(_)))));
    assert!(batches.next().await.is_none());
}

#[tokio::test]
async fn test_exec_without_rows() {
    let server =
        MockServer::fixed(MockResponse::ok("").with_header("X-ClickHouse-Query-Id", "abc")).await;
    let client = client_for(&server.url);

    let result = client.exec(ExecParams::new("CREATE TABLE t (id UInt32) ENGINE = Memory;")).await.unwrap();
    assert_eq!(result.query_id, "abc");
    let chunks: Vec<_> = result.stream.collect().await;
    assert!(chunks.iter().all(|c| c.as_ref().map(|b| b.is_empty()).unwrap_or(false)));

    let request = server.last_request();
    assert_eq!(request.body_text(), "CREATE TABLE t (id UInt32) ENGINE = Memory");
}

#[tokio::test]
async fn test_empty_insert_sends_nothing() {
    let server = MockServer::fixed(MockResponse::ok("")).await;
    let client = client_for(&server.url);

    let result = client.insert(InsertParams::new("t", InsertValues::<Item>::rows(vec![]))).await.unwrap();
    assert!(!result.executed);
    assert!(server.requests().is_empty());
}

#[tokio::test]
async fn test_closed_client_rejects_calls() {
    let server = MockServer::fixed(MockResponse::ok("")).await;
    let client = client_for(&server.url);

    client.close().await.unwrap();
    let err = client.command(ExecParams::new("SELECT 1")).await.unwrap_err();
    assert!(matches!(err, LinkError::ConnectionClosed));
    assert!(!client.ping().await.is_success());
    assert!(server.requests().is_empty());
}
