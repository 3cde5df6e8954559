use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info};

use crate::broker::{Registry, Subscriber};
use crate::transport::message::PublishRequest;

const SSE_RESPONSE_HEAD: &str = "HTTP/1.1 200 OK\r\n\
    Content-Type: text/event-stream\r\n\
    Cache-Control: no-cache\r\n\
    Connection: keep-alive\r\n\r\n";

/// Accepts connections on `addr` and serves the subscribe and publish
/// endpoints until the process exits. Each connection runs in its own task.
pub async fn start_http_server(addr: &str, registry: Arc<Registry>) -> io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr, "SSE server listening");

    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let registry = registry.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, registry).await {
                        debug!(peer = %peer, error = %e, "connection ended with error");
                    }
                });
            }
            Err(e) => error!(error = %e, "failed to accept connection"),
        }
    }
}

/// A parsed inbound request. Only the pieces the two endpoints need.
#[derive(Debug)]
struct Request {
    method: String,
    path: String,
    query: HashMap<String, String>,
    body: Vec<u8>,
}

async fn handle_connection(stream: TcpStream, registry: Arc<Registry>) -> io::Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let request = match read_request(&mut reader).await {
        Ok(Some(request)) => request,
        // Closed before sending a request line; nothing to answer.
        Ok(None) => return Ok(()),
        Err(e) if e.kind() == io::ErrorKind::InvalidData => {
            return respond(&mut write_half, "400 Bad Request", "malformed request\n").await;
        }
        Err(e) => return Err(e),
    };

    match (request.method.as_str(), request.path.as_str()) {
        ("GET", "/events") => serve_events(reader, write_half, &request, registry).await,
        ("POST", "/publish") => serve_publish(&mut write_half, &request, registry).await,
        _ => respond(&mut write_half, "404 Not Found", "no such resource\n").await,
    }
}

/// Reads one request head (and body, when Content-Length says there is
/// one). Returns `None` on a connection closed before any bytes.
async fn read_request(reader: &mut BufReader<OwnedReadHalf>) -> io::Result<Option<Request>> {
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Ok(None);
    }
    let Some((method, path, raw_query)) = parse_request_line(line.trim_end()) else {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "malformed request line",
        ));
    };

    let mut content_length = 0usize;
    loop {
        let mut header = String::new();
        if reader.read_line(&mut header).await? == 0 {
            break;
        }
        let header = header.trim_end();
        if header.is_empty() {
            break;
        }
        if let Some((name, value)) = header.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().map_err(|_| {
                    io::Error::new(io::ErrorKind::InvalidData, "malformed content-length")
                })?;
            }
        }
    }

    let mut body = vec![0u8; content_length];
    if content_length > 0 {
        reader.read_exact(&mut body).await?;
    }

    Ok(Some(Request {
        method,
        path,
        query: parse_query(&raw_query),
        body,
    }))
}

/// Splits a request line into method, path, and raw query string.
pub(super) fn parse_request_line(line: &str) -> Option<(String, String, String)> {
    let mut parts = line.split_whitespace();
    let method = parts.next()?;
    let target = parts.next()?;
    parts.next()?; // HTTP version
    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path, query),
        None => (target, ""),
    };
    Some((method.to_string(), path.to_string(), query.to_string()))
}

/// Splits a raw query string into key/value pairs. No percent-decoding;
/// topic names are expected to be plain tokens.
pub(super) fn parse_query(raw: &str) -> HashMap<String, String> {
    raw.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => (key.to_string(), value.to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect()
}

/// Attaches the connection as a subscriber and streams formatted events at
/// it until its queue closes, an end-of-stream sentinel arrives, or the
/// client disconnects. The subscriber is deregistered on every exit path.
async fn serve_events(
    mut reader: BufReader<OwnedReadHalf>,
    mut write_half: OwnedWriteHalf,
    request: &Request,
    registry: Arc<Registry>,
) -> io::Result<()> {
    let Some(topic) = request.query.get("topic") else {
        return respond(
            &mut write_half,
            "400 Bad Request",
            "please specify a topic query parameter\n",
        )
        .await;
    };

    let stream = registry.get_or_create(topic);
    let mut subscriber = match stream.add_subscriber().await {
        Ok(subscriber) => subscriber,
        Err(e) => {
            error!(topic, error = %e, "failed to attach subscriber");
            return respond(
                &mut write_half,
                "500 Internal Server Error",
                "topic unavailable\n",
            )
            .await;
        }
    };
    debug!(topic, subscriber = %subscriber.id(), "SSE session started");

    let subscriber_id = subscriber.id();
    let result = stream_session(&mut reader, &mut write_half, &mut subscriber).await;
    // The stream may have shut down while we were draining; a stale handle
    // here is fine.
    let _ = stream.remove_subscriber(subscriber_id).await;
    debug!(topic, subscriber = %subscriber_id, "SSE session ended");
    result
}

async fn stream_session(
    reader: &mut BufReader<OwnedReadHalf>,
    write_half: &mut OwnedWriteHalf,
    subscriber: &mut Subscriber,
) -> io::Result<()> {
    write_half.write_all(SSE_RESPONSE_HEAD.as_bytes()).await?;
    write_half.flush().await?;

    loop {
        tokio::select! {
            event = subscriber.next_event() => {
                match event {
                    // Queue closed: unsubscribed or topic shut down.
                    None => return Ok(()),
                    // Sentinel: finish the delivery without forwarding it.
                    Some(event) if event.is_end_of_stream() => return Ok(()),
                    Some(event) => {
                        write_half.write_all(event.format().as_bytes()).await?;
                        write_half.flush().await?;
                    }
                }
            }
            _ = connection_closed(reader) => return Ok(()),
        }
    }
}

/// Resolves when the client's side of the connection goes away. Any bytes
/// the client sends mid-session are discarded.
async fn connection_closed(reader: &mut BufReader<OwnedReadHalf>) {
    let mut scratch = [0u8; 256];
    loop {
        match reader.read(&mut scratch).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
    }
}

/// Forwards a JSON publish body to the registry. Unknown topics are a
/// silent no-op per the broker contract; publishing never creates a topic.
async fn serve_publish(
    write_half: &mut OwnedWriteHalf,
    request: &Request,
    registry: Arc<Registry>,
) -> io::Result<()> {
    let Some(topic) = request.query.get("topic") else {
        return respond(
            write_half,
            "400 Bad Request",
            "please specify a topic query parameter\n",
        )
        .await;
    };

    let event = match serde_json::from_slice::<PublishRequest>(&request.body) {
        Ok(body) => body.into_event(),
        Err(e) => {
            debug!(topic, error = %e, "invalid publish body");
            return respond(write_half, "400 Bad Request", "invalid publish body\n").await;
        }
    };

    match registry.publish(topic, event).await {
        Ok(()) => {
            write_half
                .write_all(b"HTTP/1.1 204 No Content\r\nConnection: close\r\n\r\n")
                .await?;
            write_half.flush().await
        }
        Err(e) => {
            error!(topic, error = %e, "publish failed");
            respond(write_half, "500 Internal Server Error", "publish failed\n").await
        }
    }
}

async fn respond(write_half: &mut OwnedWriteHalf, status: &str, body: &str) -> io::Result<()> {
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    write_half.write_all(response.as_bytes()).await?;
    write_half.flush().await
}
