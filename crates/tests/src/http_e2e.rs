//! Agent runs against a local HTTP collector

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use agent::{Agent, AgentState};
use contracts::AgentConfig;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::support::{folder_config, open_cache, write_pngs};

/// Minimal collector: answers `failures` requests with `failure_status`,
/// then 200 for everything else
#[derive(Clone)]
struct Collector {
    url: String,
    requests: Arc<AtomicUsize>,
    bodies: Arc<Mutex<Vec<String>>>,
}

impl Collector {
    async fn start(failures: usize, failure_status: &'static str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let collector = Self {
            url: format!("http://{}/api/v1/report", listener.local_addr().unwrap()),
            requests: Arc::new(AtomicUsize::new(0)),
            bodies: Arc::new(Mutex::new(Vec::new())),
        };

        let state = collector.clone();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let seen = state.requests.fetch_add(1, Ordering::SeqCst);
                let status = if seen < failures {
                    failure_status
                } else {
                    "200 OK"
                };
                let bodies = Arc::clone(&state.bodies);
                tokio::spawn(async move {
                    if let Some(body) = answer(socket, status).await {
                        bodies.lock().unwrap().push(body);
                    }
                });
            }
        });
        collector
    }

    fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn bodies(&self) -> Vec<String> {
        self.bodies.lock().unwrap().clone()
    }
}

/// Read one request, reply with `status`, return the request body
async fn answer(mut socket: TcpStream, status: &str) -> Option<String> {
    let mut request = Vec::new();
    let mut buf = [0u8; 8192];
    let body_start = loop {
        let n = socket.read(&mut buf).await.ok()?;
        if n == 0 {
            return None;
        }
        request.extend_from_slice(&buf[..n]);
        let text = String::from_utf8_lossy(&request);
        let Some(head_end) = text.find("\r\n\r\n") else {
            continue;
        };
        let length = text[..head_end]
            .lines()
            .find_map(|l| {
                l.to_ascii_lowercase()
                    .strip_prefix("content-length:")
                    .and_then(|v| v.trim().parse::<usize>().ok())
            })
            .unwrap_or(0);
        if request.len() >= head_end + 4 + length {
            break head_end + 4;
        }
    };

    let response = format!("HTTP/1.1 {status}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
    socket.write_all(response.as_bytes()).await.ok()?;
    Some(String::from_utf8_lossy(&request[body_start..]).into_owned())
}

fn http_config(images: &std::path::Path, state: &std::path::Path, url: &str) -> AgentConfig {
    let mut config = folder_config(images, &state.join("cache.db"));
    config.reporter.endpoint = url.to_string();
    config.reporter.timeout_secs = 2.0;
    config
}

#[tokio::test]
async fn test_http_delivery_end_to_end() {
    let images = tempfile::tempdir().unwrap();
    let state = tempfile::tempdir().unwrap();
    write_pngs(images.path(), 3);
    let collector = Collector::start(0, "503 Service Unavailable").await;
    let config = http_config(images.path(), state.path(), &collector.url);

    let report = Agent::new(config.clone()).run().await.unwrap();

    assert_eq!(report.final_state, AgentState::Stopped);
    assert_eq!(report.exit_code(), 0);
    assert_eq!(report.reporter.delivered, 1);
    assert_eq!(collector.requests(), 1);

    let bodies = collector.bodies();
    assert_eq!(bodies.len(), 1);
    assert!(bodies[0].contains("\"device_id\":\"edge-001\""));
    assert!(bodies[0].contains("\"frame_id\":2"));
    assert!(open_cache(&config).is_empty().unwrap());
}

#[tokio::test]
async fn test_http_server_errors_are_retried() {
    let images = tempfile::tempdir().unwrap();
    let state = tempfile::tempdir().unwrap();
    write_pngs(images.path(), 2);
    let collector = Collector::start(2, "503 Service Unavailable").await;
    let config = http_config(images.path(), state.path(), &collector.url);

    let report = Agent::new(config.clone()).run().await.unwrap();

    assert_eq!(collector.requests(), 3);
    assert_eq!(report.reporter.delivered, 1);
    assert_eq!(report.reporter.delivery_failures, 2);
    assert_eq!(report.reporter.cached, 0);
    assert!(open_cache(&config).is_empty().unwrap());
}

#[tokio::test]
async fn test_http_rejection_is_cached_without_retry() {
    let images = tempfile::tempdir().unwrap();
    let state = tempfile::tempdir().unwrap();
    write_pngs(images.path(), 2);
    let collector = Collector::start(usize::MAX, "422 Unprocessable Entity").await;
    let config = http_config(images.path(), state.path(), &collector.url);

    let report = Agent::new(config.clone()).run().await.unwrap();

    assert_eq!(collector.requests(), 1);
    assert_eq!(report.reporter.cached, 1);

    let pending = open_cache(&config).get_pending(10).unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].result_count, 2);
}
