// Minimal scripted HTTP/1.1 responder standing in for inference servers.
#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use serde_json::json;
use tellerai::llm::LlmConfig;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
pub struct Route {
    pub path: &'static str,
    pub status: u16,
    pub body: String,
    pub delay: Duration,
}

impl Route {
    pub fn ok(path: &'static str, body: serde_json::Value) -> Self {
        Self {
            path,
            status: 200,
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn status(path: &'static str, status: u16, body: &str) -> Self {
        Self {
            path,
            status,
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Recorded {
    pub path: String,
    pub head: String,
    pub body: String,
}

/// Requests currently being answered, and the highest count seen.
#[derive(Debug, Default)]
struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlight {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct ScriptedServer {
    pub base_url: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
    in_flight: Arc<InFlight>,
}

impl ScriptedServer {
    pub async fn start(routes: Vec<Route>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&requests);
        let routes = Arc::new(routes);
        let in_flight = Arc::new(InFlight::default());
        let counter = Arc::clone(&in_flight);

        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let routes = Arc::clone(&routes);
                let log = Arc::clone(&log);
                let counter = Arc::clone(&counter);
                tokio::spawn(async move {
                    respond(socket, &routes, &log, &counter).await;
                });
            }
        });

        Self {
            base_url: format!("http://{}/v1", addr),
            requests,
            in_flight,
        }
    }

    /// Highest number of requests the server was answering at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.in_flight.peak.load(Ordering::SeqCst)
    }

    pub async fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().await.clone()
    }

    pub async fn requests_to(&self, path: &str) -> Vec<Recorded> {
        self.requests()
            .await
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }
}

async fn respond(mut socket: TcpStream, routes: &[Route], log: &Mutex<Vec<Recorded>>, in_flight: &InFlight) {
    let Some(request) = read_request(&mut socket).await else {
        return;
    };
    let route = routes.iter().find(|r| r.path == request.path).cloned();
    log.lock().await.push(request);

    let route = route.unwrap_or_else(|| Route::status("", 404, "{}"));
    in_flight.enter();
    tokio::time::sleep(route.delay).await;

    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        route.status,
        reason(route.status),
        route.body.len(),
        route.body
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
    in_flight.leave();
}

async fn read_request(socket: &mut TcpStream) -> Option<Recorded> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let head_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < head_end + 4 + length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let path = head.lines().next()?.split_whitespace().nth(1)?.to_string();
    let body = String::from_utf8_lossy(&buf[head_end + 4..]).to_string();
    Some(Recorded { path, head, body })
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        401 => "Unauthorized",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Status",
    }
}

/// Listing route for `/v1/models`.
pub fn models_route() -> Route {
    Route::ok("/v1/models", json!({ "data": [{ "id": "mistral-7b-instruct-v0.2.Q4_K_M.gguf" }] }))
}

/// `/v1/completions` answering with `text`.
pub fn completion_route(text: &str) -> Route {
    Route::ok("/v1/completions", json!({ "choices": [{ "text": text }] }))
}

/// `/v1/chat/completions` answering with `content`.
pub fn chat_route(content: &str) -> Route {
    Route::ok(
        "/v1/chat/completions",
        json!({ "choices": [{ "message": { "role": "assistant", "content": content } }] }),
    )
}

pub fn write_weights(dir: &Path, file_name: &str) {
    std::fs::write(dir.join(file_name), b"GGUF").unwrap();
}

/// Config pointing both backends at `server` and weights at `model_dir`.
pub fn config_for(server: &ScriptedServer, model_dir: &Path) -> LlmConfig {
    LlmConfig {
        local_url: server.base_url.clone(),
        hosted_url: server.base_url.clone(),
        api_key: None,
        model_dirs: vec![model_dir.to_path_buf()],
        timeout: Duration::from_secs(5),
        ..LlmConfig::default()
    }
}

/// A base URL nothing is listening on.
pub async fn closed_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/v1", addr)
}
