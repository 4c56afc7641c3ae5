//! Scripted HTTP server for stream tests
//!
//! `/flags` answers each successive connection with the next [`Reply`] in the
//! script (the last one repeats). `/sdk/latest-flags[/key]` serves a fixed
//! dataset for fallback requests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use flagstream_core::Config;

/// What the server does with one stream connection
#[derive(Debug, Clone)]
pub enum Reply {
    /// Respond with a bare status code
    Status(u16),
    /// Respond 200 with the wrong content type
    NotEventStream,
    /// Send these raw SSE frames, then either hold the connection open or close it
    Stream { frames: Vec<String>, hold: bool },
}

impl Reply {
    pub fn hold(frames: Vec<String>) -> Self {
        Reply::Stream { frames, hold: true }
    }

    pub fn close(frames: Vec<String>) -> Self {
        Reply::Stream { frames, hold: false }
    }
}

/// Format one SSE frame
pub fn frame(event: &str, data: &str) -> String {
    format!("event: {}\ndata: {}\n\n", event, data)
}

pub struct TestServer {
    addr: SocketAddr,
    connections: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<String>>>,
}

struct Shared {
    script: Vec<Reply>,
    flags: Value,
    connections: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl TestServer {
    pub async fn start(script: Vec<Reply>) -> Self {
        Self::start_with_flags(script, Value::Object(Default::default())).await
    }

    pub async fn start_with_flags(script: Vec<Reply>, flags: Value) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connections = Arc::new(AtomicUsize::new(0));
        let requests = Arc::new(Mutex::new(Vec::new()));

        let shared = Arc::new(Shared {
            script,
            flags,
            connections: connections.clone(),
            requests: requests.clone(),
        });

        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                tokio::spawn(handle(socket, shared.clone()));
            }
        });

        Self {
            addr,
            connections,
            requests,
        }
    }

    /// Config pointing at this server with test-friendly timings
    pub fn config(&self) -> Config {
        Config {
            sdk_key: Some("sdk-test".to_string()),
            stream_uri: format!("http://{}/flags", self.addr),
            base_uri: format!("http://{}", self.addr),
            reconnect_delay_ms: 100,
            read_timeout_secs: 5,
            connect_timeout_secs: 1,
            request_timeout_secs: 1,
            ..Config::default()
        }
    }

    /// Number of stream connections accepted so far
    pub fn stream_connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Raw request heads received so far, lowercased
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

async fn handle(mut socket: TcpStream, shared: Arc<Shared>) {
    let Some(head) = read_head(&mut socket).await else {
        return;
    };
    shared.requests.lock().unwrap().push(head.to_lowercase());

    let path = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string();

    if path == "/flags" {
        let n = shared.connections.fetch_add(1, Ordering::SeqCst);
        let reply = shared
            .script
            .get(n)
            .or_else(|| shared.script.last())
            .cloned()
            .unwrap_or(Reply::Status(500));
        serve_stream(socket, reply).await;
    } else if path == "/sdk/latest-flags" {
        respond_json(&mut socket, 200, &shared.flags.to_string()).await;
    } else if let Some(key) = path.strip_prefix("/sdk/latest-flags/") {
        match shared.flags.get(key) {
            Some(flag) => respond_json(&mut socket, 200, &flag.to_string()).await,
            None => respond_status(&mut socket, 404).await,
        }
    } else {
        respond_status(&mut socket, 404).await;
    }
}

async fn serve_stream(mut socket: TcpStream, reply: Reply) {
    match reply {
        Reply::Status(status) => respond_status(&mut socket, status).await,
        Reply::NotEventStream => {
            let body = "hello";
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            let _ = socket.write_all(response.as_bytes()).await;
        }
        Reply::Stream { frames, hold } => {
            let head = "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nCache-Control: no-cache\r\nConnection: close\r\n\r\n";
            if socket.write_all(head.as_bytes()).await.is_err() {
                return;
            }
            for frame in frames {
                if socket.write_all(frame.as_bytes()).await.is_err() {
                    return;
                }
                let _ = socket.flush().await;
            }
            if hold {
                // Keep the connection open until the client goes away.
                let mut buf = [0u8; 64];
                loop {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(_) => {}
                    }
                }
            }
            let _ = socket.shutdown().await;
        }
    }
}

async fn read_head(socket: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    String::from_utf8(buf).ok()
}

async fn respond_status(socket: &mut TcpStream, status: u16) {
    let response = format!(
        "HTTP/1.1 {} Test\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        status
    );
    let _ = socket.write_all(response.as_bytes()).await;
}

async fn respond_json(socket: &mut TcpStream, status: u16, body: &str) {
    let response = format!(
        "HTTP/1.1 {} Test\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    let _ = socket.write_all(response.as_bytes()).await;
}

/// Poll `check` until it holds or `timeout` passes
pub async fn eventually(timeout: Duration, check: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
