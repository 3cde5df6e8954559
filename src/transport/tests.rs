use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};

use crate::broker::{Event, Registry};
use crate::transport::http::{parse_query, parse_request_line, start_http_server};

#[test]
fn test_parse_request_line() {
    let (method, path, query) = parse_request_line("GET /events?topic=foo HTTP/1.1").unwrap();
    assert_eq!(method, "GET");
    assert_eq!(path, "/events");
    assert_eq!(query, "topic=foo");
}

#[test]
fn test_parse_request_line_without_query() {
    let (method, path, query) = parse_request_line("POST /publish HTTP/1.1").unwrap();
    assert_eq!(method, "POST");
    assert_eq!(path, "/publish");
    assert_eq!(query, "");
}

#[test]
fn test_parse_request_line_rejects_garbage() {
    assert!(parse_request_line("GET").is_none());
    assert!(parse_request_line("").is_none());
}

#[test]
fn test_parse_query() {
    let query = parse_query("topic=weather&replay=1");
    assert_eq!(query.get("topic").map(String::as_str), Some("weather"));
    assert_eq!(query.get("replay").map(String::as_str), Some("1"));
    assert!(parse_query("").is_empty());

    let bare = parse_query("flag");
    assert_eq!(bare.get("flag").map(String::as_str), Some(""));
}

async fn start_test_server(addr: &'static str) -> Arc<Registry> {
    let registry = Arc::new(Registry::default());
    let server_registry = registry.clone();
    tokio::spawn(async move {
        let _ = start_http_server(addr, server_registry).await;
    });
    sleep(Duration::from_millis(300)).await;
    registry
}

async fn read_to_end(client: &mut TcpStream) -> String {
    let mut response = String::new();
    timeout(Duration::from_secs(2), client.read_to_string(&mut response))
        .await
        .expect("timed out reading response")
        .expect("failed to read response");
    response
}

#[tokio::test]
async fn test_sse_session_end_to_end() {
    let addr = "127.0.0.1:9106";
    let registry = start_test_server(addr).await;

    let mut client = TcpStream::connect(addr).await.unwrap();
    client
        .write_all(b"GET /events?topic=weather HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();

    // Wait for the session to attach its subscriber.
    let mut waited = 0;
    loop {
        if registry.contains("weather") {
            let stream = registry.get_or_create("weather");
            if stream.stats().await.unwrap().subscribers == 1 {
                break;
            }
        }
        waited += 1;
        assert!(waited < 100, "subscriber never attached");
        sleep(Duration::from_millis(10)).await;
    }

    registry
        .publish("weather", Event::with_id("1", "sunny"))
        .await
        .unwrap();

    let mut collected = String::new();
    let mut buf = [0u8; 1024];
    timeout(Duration::from_secs(2), async {
        loop {
            let n = client.read(&mut buf).await.unwrap();
            assert!(n > 0, "server closed the stream early");
            collected.push_str(std::str::from_utf8(&buf[..n]).unwrap());
            if collected.contains("id: 1\ndata: sunny\n\n") {
                break;
            }
        }
    })
    .await
    .expect("timed out waiting for the event record");

    assert!(collected.starts_with("HTTP/1.1 200 OK"));
    assert!(collected.contains("Content-Type: text/event-stream"));

    // The sentinel ends the session without being written to the wire.
    registry
        .publish("weather", Event::end_of_stream())
        .await
        .unwrap();
    let rest = read_to_end(&mut client).await;
    assert!(!rest.contains("data:"));

    // The session deregisters its subscriber on the way out.
    let stream = registry.get_or_create("weather");
    let mut waited = 0;
    while stream.stats().await.unwrap().subscribers != 0 {
        waited += 1;
        assert!(waited < 100, "subscriber never detached");
        sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn test_publish_endpoint_roundtrip() {
    let addr = "127.0.0.1:9107";
    let registry = start_test_server(addr).await;

    let stream = registry.get_or_create("news");
    let mut subscriber = stream.add_subscriber().await.unwrap();

    let body = r#"{"id":"7","data":"headline"}"#;
    let request = format!(
        "POST /publish?topic=news HTTP/1.1\r\nHost: localhost\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    );
    let mut client = TcpStream::connect(addr).await.unwrap();
    client.write_all(request.as_bytes()).await.unwrap();

    let response = read_to_end(&mut client).await;
    assert!(response.starts_with("HTTP/1.1 204 No Content"));

    let event = timeout(Duration::from_secs(2), subscriber.next_event())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.format(), "id: 7\ndata: headline\n\n");
}

#[tokio::test]
async fn test_publish_to_unknown_topic_creates_nothing() {
    let addr = "127.0.0.1:9108";
    let registry = start_test_server(addr).await;

    let body = r#"{"data":"into the void"}"#;
    let request = format!(
        "POST /publish?topic=ghost HTTP/1.1\r\nHost: localhost\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    );
    let mut client = TcpStream::connect(addr).await.unwrap();
    client.write_all(request.as_bytes()).await.unwrap();

    let response = read_to_end(&mut client).await;
    assert!(response.starts_with("HTTP/1.1 204 No Content"));
    assert_eq!(registry.topic_count(), 0);
}

#[tokio::test]
async fn test_missing_topic_is_rejected() {
    let addr = "127.0.0.1:9109";
    let registry = start_test_server(addr).await;

    let mut client = TcpStream::connect(addr).await.unwrap();
    client
        .write_all(b"GET /events HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();

    let response = read_to_end(&mut client).await;
    assert!(response.starts_with("HTTP/1.1 400 Bad Request"));
    assert!(response.contains("topic"));
    assert_eq!(registry.topic_count(), 0);
}

#[tokio::test]
async fn test_malformed_publish_body_is_rejected() {
    let addr = "127.0.0.1:9111";
    let registry = start_test_server(addr).await;

    let stream = registry.get_or_create("news");
    let mut subscriber = stream.add_subscriber().await.unwrap();

    let body = "{not json";
    let request = format!(
        "POST /publish?topic=news HTTP/1.1\r\nHost: localhost\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    );
    let mut client = TcpStream::connect(addr).await.unwrap();
    client.write_all(request.as_bytes()).await.unwrap();

    let response = read_to_end(&mut client).await;
    assert!(response.starts_with("HTTP/1.1 400 Bad Request"));
    assert!(response.contains("invalid publish body"));

    // Nothing was delivered to the topic.
    assert!(subscriber.try_next().is_none());
}

#[tokio::test]
async fn test_garbage_request_line_is_rejected() {
    let addr = "127.0.0.1:9112";
    let registry = start_test_server(addr).await;

    let mut client = TcpStream::connect(addr).await.unwrap();
    client.write_all(b"GET\r\n\r\n").await.unwrap();

    let response = read_to_end(&mut client).await;
    assert!(response.starts_with("HTTP/1.1 400 Bad Request"));
    assert!(response.contains("malformed request"));
    assert_eq!(registry.topic_count(), 0);
}

#[tokio::test]
async fn test_unknown_path_is_not_found() {
    let addr = "127.0.0.1:9110";
    let _registry = start_test_server(addr).await;

    let mut client = TcpStream::connect(addr).await.unwrap();
    client
        .write_all(b"GET /nope HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();

    let response = read_to_end(&mut client).await;
    assert!(response.starts_with("HTTP/1.1 404 Not Found"));
}
