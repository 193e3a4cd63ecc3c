//! Canned HTTP backend for gateway and session tests
//!
//! Each accepted connection gets one response picked by method and target
//! prefix; every request line is recorded so tests can check what was (and
//! was not) sent.

use crate::api::Gateway;
use crate::config::BackendConfig;
use kiln_auth::{AuthUser, Session};
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

pub const USER_ID: &str = "user-1";

#[derive(Debug, Clone)]
pub struct Reply {
    method: String,
    prefix: String,
    status: u16,
    body: String,
    delay: Duration,
}

impl Reply {
    /// Answers `method` requests whose target starts with `prefix`
    pub fn new(method: &str, prefix: &str, status: u16, body: impl Into<String>) -> Self {
        Self {
            method: method.to_string(),
            prefix: prefix.to_string(),
            status,
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    pub fn json(method: &str, prefix: &str, body: serde_json::Value) -> Self {
        Self::new(method, prefix, 200, body.to_string())
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

pub struct StubServer {
    url: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl StubServer {
    pub fn start(replies: Vec<Reply>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let replies = Arc::new(replies);

        let seen = requests.clone();
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let replies = replies.clone();
                let seen = seen.clone();
                thread::spawn(move || answer(stream, &replies, &seen));
            }
        });

        Self { url, requests }
    }

    /// Accepts connections and never answers them
    pub fn silent() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        thread::spawn(move || {
            let mut held = Vec::new();
            for stream in listener.incoming().flatten() {
                held.push(stream);
            }
        });

        Self {
            url,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn backend(&self) -> BackendConfig {
        BackendConfig {
            url: self.url.clone(),
            anon_key: "anon".to_string(),
        }
    }

    /// `METHOD /target` lines in arrival order
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn received(&self, method: &str, prefix: &str) -> bool {
        let wanted = format!("{} {}", method, prefix);
        self.requests().iter().any(|r| r.starts_with(&wanted))
    }

    /// Gateway signed in as [`USER_ID`]
    pub fn gateway(&self) -> Gateway {
        let mut gateway = Gateway::new(&self.backend()).unwrap();
        gateway.set_session(Some(&session(3_600)));
        gateway
    }
}

/// Session for [`USER_ID`] expiring `expires_in` seconds from now
pub fn session(expires_in: i64) -> Session {
    Session {
        access_token: "jwt".into(),
        refresh_token: "refresh".into(),
        token_type: "bearer".into(),
        expires_at: chrono::Utc::now().timestamp() + expires_in,
        user: AuthUser {
            id: USER_ID.into(),
            email: Some("potter@example.com".into()),
            user_metadata: serde_json::json!({"username": "hannah"}),
        },
    }
}

fn answer(stream: TcpStream, replies: &[Reply], seen: &Mutex<Vec<String>>) {
    let mut reader = BufReader::new(stream.try_clone().unwrap());
    let mut request_line = String::new();
    if reader.read_line(&mut request_line).is_err() {
        return;
    }

    let mut content_length = 0;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).unwrap_or(0) == 0 || line == "\r\n" {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
    }
    let mut body = vec![0; content_length];
    let _ = reader.read_exact(&mut body);

    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let target = parts.next().unwrap_or_default().to_string();
    seen.lock().unwrap().push(format!("{} {}", method, target));

    let (status, body, delay) = replies
        .iter()
        .find(|r| r.method == method && target.starts_with(&r.prefix))
        .map(|r| (r.status, r.body.clone(), r.delay))
        .unwrap_or((404, r#"{"message":"no stub"}"#.to_string(), Duration::ZERO));
    thread::sleep(delay);

    let response = format!(
        "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    let mut stream = stream;
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}
