//! `HttpTransport` exercised against a hand-rolled HTTP/1.1 test server.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use reqrace::prelude::{
    AttemptFailure, HttpTransport, RaceCoordinator, RaceOptions, RaceTransport, RequestVariant,
};
use tokio_util::sync::CancellationToken;

struct TestServer {
    authority: String,
    served: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<String>>>,
    _join: JoinHandle<()>,
}

impl TestServer {
    fn start(status: u16, body: &'static str, delay: Duration) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind test server");
        let authority = listener.local_addr().expect("read local address").to_string();
        listener.set_nonblocking(true).expect("set listener nonblocking");

        let served = Arc::new(AtomicUsize::new(0));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let served_clone = Arc::clone(&served);
        let requests_clone = Arc::clone(&requests);

        let join = thread::spawn(move || {
            let deadline = Instant::now() + Duration::from_secs(5);
            let mut workers = Vec::new();

            while Instant::now() < deadline {
                match listener.accept() {
                    Ok((mut stream, _)) => {
                        let served = Arc::clone(&served_clone);
                        let requests = Arc::clone(&requests_clone);
                        workers.push(thread::spawn(move || {
                            let raw = read_http_request(&mut stream).unwrap_or_default();
                            if let Ok(mut captured) = requests.lock() {
                                captured.push(String::from_utf8_lossy(&raw).into_owned());
                            }
                            if !delay.is_zero() {
                                thread::sleep(delay);
                            }
                            let _ = write_http_response(&mut stream, status, body);
                            served.fetch_add(1, Ordering::SeqCst);
                        }));
                    }
                    Err(error) if error.kind() == std::io::ErrorKind::WouldBlock => {
                        thread::sleep(Duration::from_millis(2));
                    }
                    Err(_) => break,
                }
            }

            for worker in workers {
                let _ = worker.join();
            }
        });

        Self {
            authority,
            served,
            requests,
            _join: join,
        }
    }

    fn base_url(&self) -> String {
        format!("http://{}", self.authority)
    }

    fn served(&self) -> usize {
        self.served.load(Ordering::SeqCst)
    }

    fn captured_requests(&self) -> Vec<String> {
        self.requests.lock().map(|captured| captured.clone()).unwrap_or_default()
    }
}

fn read_http_request(stream: &mut TcpStream) -> std::io::Result<Vec<u8>> {
    stream.set_read_timeout(Some(Duration::from_secs(2)))?;

    let mut raw = Vec::new();
    loop {
        let mut chunk = [0_u8; 1024];
        let read = stream.read(&mut chunk)?;
        if read == 0 {
            break;
        }
        raw.extend_from_slice(&chunk[..read]);

        if let Some(header_end) = raw.windows(4).position(|window| window == b"\r\n\r\n") {
            let content_length = parse_content_length(&raw[..header_end]);
            if raw.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }
    Ok(raw)
}

fn parse_content_length(raw_headers: &[u8]) -> usize {
    let text = String::from_utf8_lossy(raw_headers);
    for line in text.split("\r\n") {
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                if let Ok(parsed) = value.trim().parse::<usize>() {
                    return parsed;
                }
            }
        }
    }
    0
}

fn write_http_response(stream: &mut TcpStream, status: u16, body: &str) -> std::io::Result<()> {
    let status_text = match status {
        200 => "OK",
        503 => "Service Unavailable",
        _ => "Unknown",
    };
    let raw = format!(
        "HTTP/1.1 {status} {status_text}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(raw.as_bytes())?;
    stream.flush()
}

fn transport_for(server: &TestServer) -> HttpTransport {
    HttpTransport::builder(server.base_url())
        .client_name("reqrace-tests")
        .try_build()
        .expect("transport should build")
}

#[tokio::test]
async fn successful_attempt_returns_response_with_default_headers_applied() {
    let server = TestServer::start(200, r#"{"status":"ok"}"#, Duration::ZERO);
    let transport = transport_for(&server);

    let variant = RequestVariant::get("/health");
    let response = transport
        .send(&variant, Duration::from_secs(2), CancellationToken::new())
        .await
        .expect("request should succeed");

    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.text(), r#"{"status":"ok"}"#);

    let captured = server.captured_requests();
    assert_eq!(captured.len(), 1);
    assert!(captured[0].starts_with("GET /health HTTP/1.1"));
    assert!(captured[0].to_ascii_lowercase().contains("user-agent: reqrace-tests"));
}

#[tokio::test]
async fn non_success_status_is_classified_with_body() {
    let server = TestServer::start(503, "overloaded", Duration::ZERO);
    let transport = transport_for(&server);

    let failure = transport
        .send(
            &RequestVariant::get("/health"),
            Duration::from_secs(2),
            CancellationToken::new(),
        )
        .await
        .expect_err("503 should be classified as a status failure");

    match failure {
        AttemptFailure::HttpStatus { status, body } => {
            assert_eq!(status, 503);
            assert_eq!(body, "overloaded");
        }
        other => panic!("unexpected failure: {other}"),
    }
}

#[tokio::test]
async fn slow_response_is_classified_as_timeout() {
    let server = TestServer::start(200, "late", Duration::from_millis(500));
    let transport = transport_for(&server);

    let failure = transport
        .send(
            &RequestVariant::get("/health"),
            Duration::from_millis(100),
            CancellationToken::new(),
        )
        .await
        .expect_err("deadline should elapse first");

    match failure {
        AttemptFailure::Timeout { timeout_ms } => assert_eq!(timeout_ms, 100),
        other => panic!("unexpected failure: {other}"),
    }
}

#[tokio::test]
async fn cancellation_aborts_a_pending_attempt() {
    let server = TestServer::start(200, "late", Duration::from_millis(500));
    let transport = transport_for(&server);
    let cancel = CancellationToken::new();

    let variant = RequestVariant::get("/health");
    let send = transport.send(&variant, Duration::from_secs(5), cancel.clone());
    let canceller = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    };

    let (outcome, ()) = tokio::join!(send, canceller);
    match outcome.expect_err("cancelled attempt must not produce a response") {
        AttemptFailure::Aborted => {}
        other => panic!("unexpected failure: {other}"),
    }
}

#[tokio::test]
async fn unreachable_peer_is_classified_as_transport_error() {
    // Bind and immediately drop a listener so the port is closed.
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind probe listener");
    let base_url = format!("http://{}", listener.local_addr().expect("read local address"));
    drop(listener);

    let transport = HttpTransport::builder(base_url)
        .try_build()
        .expect("transport should build");

    let failure = transport
        .send(
            &RequestVariant::get("/health"),
            Duration::from_secs(2),
            CancellationToken::new(),
        )
        .await
        .expect_err("closed port should fail");

    match failure {
        AttemptFailure::Transport { .. } => {}
        other => panic!("unexpected failure: {other}"),
    }
}

#[tokio::test]
async fn race_over_http_adopts_the_reachable_variant() {
    let server = TestServer::start(200, "alive", Duration::ZERO);

    // Variant 0 targets a closed port via an absolute url; variant 1 reaches
    // the live server after the stagger delay.
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind probe listener");
    let dead_url = format!("http://{}/health", listener.local_addr().expect("read local address"));
    drop(listener);

    let transport = HttpTransport::builder(server.base_url())
        .try_build()
        .expect("transport should build");
    let coordinator = RaceCoordinator::new(transport);

    let variants = vec![RequestVariant::get(dead_url), RequestVariant::get("/health")];
    let options = RaceOptions::standard()
        .timeout(Duration::from_secs(2))
        .stagger_delay(Duration::from_millis(50))
        .fallback_delay(Duration::from_millis(100))
        .retry_on_failure(false);

    let response = coordinator
        .race("http-race", variants, options)
        .await
        .expect("live variant should win");
    assert_eq!(response.text(), "alive");

    // The server bumps its counter just after writing; give it a beat.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(server.served(), 1);
}

#[tokio::test]
async fn liveness_preset_wins_on_first_healthy_probe() {
    let server = TestServer::start(200, r#"{"status":"ok"}"#, Duration::ZERO);
    let transport = transport_for(&server);
    let coordinator = RaceCoordinator::new(transport);

    let response = coordinator
        .race_liveness()
        .await
        .expect("healthy server should settle the probe");
    assert_eq!(response.status().as_u16(), 200);
    assert!(server.served() >= 1);
}
