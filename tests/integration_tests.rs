//! End-to-end tests: consumer -> relay (real TCP listener) -> stubbed upstream.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::time::timeout;
use wiremock::matchers::{any, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fitscribe_relay::client::consumer::{ConsumerError, StreamEvent, SuggestionClient};
use fitscribe_relay::client::suggestion::Suggestion;
use fitscribe_relay::config::UpstreamConfig;
use fitscribe_relay::relay::api::{build_router, AppState};
use fitscribe_relay::relay::upstream::UpstreamClient;

/// Start the relay on an ephemeral port in front of `upstream`.
async fn spawn_relay(upstream: &MockServer) -> SocketAddr {
    spawn_relay_to(format!("{}/v1", upstream.uri())).await
}

async fn spawn_relay_to(base_url: String) -> SocketAddr {
    let config = UpstreamConfig {
        base_url,
        ..UpstreamConfig::default()
    };
    let client = UpstreamClient::new(&config, "sk-test").unwrap();
    let app = build_router(Arc::new(AppState { upstream: client }));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn consumer(addr: SocketAddr) -> SuggestionClient {
    SuggestionClient::with_http(
        reqwest::Client::new(),
        format!("http://{addr}/ai/suggest"),
        Duration::from_secs(5),
    )
}

/// Read one HTTP request (head plus `content-length` body) off `socket`.
async fn read_request(socket: &mut TcpStream) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "relay closed before sending a full request");
        buf.extend_from_slice(&chunk[..n]);

        let Some(head_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&buf[..head_end]).to_ascii_lowercase();
        let body_len = head
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .map(|v| v.trim().parse::<usize>().unwrap())
            .unwrap_or(0);
        if buf.len() >= head_end + 4 + body_len {
            return buf;
        }
    }
}

fn delta_line(text: &str) -> String {
    let event = serde_json::json!({"type": "response.output_text.delta", "delta": text});
    format!("event: response.output_text.delta\ndata: {event}\n\n")
}

#[tokio::test]
async fn test_full_suggestion_pipeline() {
    let mut body = String::from("event: response.created\ndata: {\"type\":\"response.created\"}\n\n");
    for piece in [
        "NEXT_SET: 75kg x 8\n",
        "PROGRESSION: hold weight, ",
        "match reps\n",
        "ANOMALY: none\n",
        "SUMMARY1: 2 sets\nSUMMARY2: 15 reps\nSUMMARY3: 1125kg volume",
    ] {
        body.push_str(&delta_line(piece));
    }
    body.push_str("event: response.completed\ndata: {\"type\":\"response.completed\"}\n\n");

    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/responses"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .expect(1)
        .mount(&upstream)
        .await;

    let addr = spawn_relay(&upstream).await;
    let events: Vec<StreamEvent> = consumer(addr)
        .stream("Exercise: Bench Press\nToday Sets: 75kg x 8, 75kg x 7")
        .collect()
        .await;

    let (last, deltas) = events.split_last().unwrap();
    assert!(matches!(last, StreamEvent::Done));

    let text: String = deltas
        .iter()
        .map(|event| match event {
            StreamEvent::Delta(d) => d.as_str(),
            other => panic!("unexpected event: {other:?}"),
        })
        .collect();

    let suggestion = Suggestion::parse(&text);
    assert_eq!(suggestion.next_set.as_deref(), Some("75kg x 8"));
    assert_eq!(suggestion.progression.as_deref(), Some("hold weight, match reps"));
    assert_eq!(suggestion.anomaly, None);
    assert_eq!(suggestion.summary.len(), 3);
}

#[tokio::test]
async fn test_upstream_failure_reaches_consumer() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("rate limited"))
        .mount(&upstream)
        .await;

    let addr = spawn_relay(&upstream).await;
    let events: Vec<StreamEvent> = consumer(addr).stream("Squat").collect().await;

    match events.as_slice() {
        [StreamEvent::Error(ConsumerError::Status { status, body })] => {
            assert_eq!(status.as_u16(), 500);
            assert_eq!(body, "rate limited");
        }
        other => panic!("unexpected events: {other:?}"),
    }
}

#[tokio::test]
async fn test_blank_context_rejected_end_to_end() {
    let upstream = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&upstream)
        .await;

    let addr = spawn_relay(&upstream).await;
    let events: Vec<StreamEvent> = consumer(addr).stream("   ").collect().await;

    match events.as_slice() {
        [StreamEvent::Error(ConsumerError::Status { status, body })] => {
            assert_eq!(status.as_u16(), 400);
            assert!(body.contains("Missing required field: context (string)."));
        }
        other => panic!("unexpected events: {other:?}"),
    }
}

#[tokio::test]
async fn test_deltas_arrive_while_upstream_open_and_disconnect_cancels_it() {
    let upstream = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let upstream_addr = upstream.local_addr().unwrap();
    let (closed_tx, closed_rx) = oneshot::channel();

    // Upstream that sends one delta, then holds the response open until the
    // relay hangs up.
    tokio::spawn(async move {
        let (mut socket, _) = upstream.accept().await.unwrap();
        let request = read_request(&mut socket).await;
        assert!(request.starts_with(b"POST /v1/responses "));

        let frame = "data: {\"type\":\"response.output_text.delta\",\"delta\":\"A\"}\n\n";
        let head = "HTTP/1.1 200 OK\r\n\
                    content-type: text/event-stream\r\n\
                    transfer-encoding: chunked\r\n\r\n";
        socket.write_all(head.as_bytes()).await.unwrap();
        socket
            .write_all(format!("{:x}\r\n{frame}\r\n", frame.len()).as_bytes())
            .await
            .unwrap();
        socket.flush().await.unwrap();

        let mut buf = [0u8; 1024];
        loop {
            match socket.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(_) => continue,
            }
        }
        let _ = closed_tx.send(());
    });

    let addr = spawn_relay_to(format!("http://{upstream_addr}/v1")).await;
    let mut events = Box::pin(consumer(addr).stream("Exercise: Squat"));

    let first = timeout(Duration::from_secs(2), events.next())
        .await
        .expect("delta was held back until the upstream finished");
    assert!(matches!(first, Some(StreamEvent::Delta(d)) if d == "A"));

    drop(events);
    timeout(Duration::from_secs(5), closed_rx)
        .await
        .expect("upstream connection still open after the consumer went away")
        .unwrap();
}
