//! Minimal HTTP/1.1 server for integration tests.
//!
//! Serves a fixed route table. `POST /echo` answers with the request body and
//! content type; `/slow` (and any route built with `Route::slow`) streams its
//! body in small chunks with pauses so progress and abort can be observed;
//! unknown paths get 404.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Route {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
    /// When set, the body goes out in 4 KiB chunks with this pause between them.
    pub chunk_delay: Option<Duration>,
}

impl Route {
    pub fn ok(content_type: &'static str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            content_type,
            body: body.into(),
            chunk_delay: None,
        }
    }

    pub fn slow(content_type: &'static str, body: impl Into<Vec<u8>>, delay: Duration) -> Self {
        Self {
            chunk_delay: Some(delay),
            ..Self::ok(content_type, body)
        }
    }
}

/// Running server: base URL plus a count of requests seen.
pub struct TestServer {
    pub base: String,
    hits: Arc<AtomicUsize>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path.trim_start_matches('/'))
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Starts a server in a background thread. Runs until the process exits.
pub fn start(routes: HashMap<String, Route>) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let routes = Arc::new(routes);
    let hits = Arc::new(AtomicUsize::new(0));
    let server_hits = Arc::clone(&hits);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let routes = Arc::clone(&routes);
            server_hits.fetch_add(1, Ordering::SeqCst);
            thread::spawn(move || handle(stream, &routes));
        }
    });
    TestServer {
        base: format!("http://127.0.0.1:{}/", port),
        hits,
    }
}

struct Request {
    method: String,
    path: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

fn read_request(stream: &mut std::net::TcpStream) -> Option<Request> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];
    let header_end = loop {
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };
    let head = std::str::from_utf8(&buf[..header_end]).ok()?.to_string();
    let mut lines = head.lines();
    let mut first = lines.next()?.split_whitespace();
    let method = first.next()?.to_string();
    let path = first.next()?.to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();
    let len = headers
        .iter()
        .find(|(k, _)| k == "content-length")
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = buf[header_end..].to_vec();
    while body.len() < len {
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }
    Some(Request {
        method,
        path,
        headers,
        body,
    })
}

fn handle(mut stream: std::net::TcpStream, routes: &HashMap<String, Route>) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let req = match read_request(&mut stream) {
        Some(r) => r,
        None => return,
    };

    if req.path == "/slow" {
        let total = 64 * 1024;
        let head = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            total
        );
        if stream.write_all(head.as_bytes()).is_err() {
            return;
        }
        for _ in 0..(total / 1024) {
            if stream.write_all(&[b'x'; 1024]).is_err() {
                return;
            }
            let _ = stream.flush();
            thread::sleep(Duration::from_millis(50));
        }
        return;
    }

    let route = if req.method == "POST" && req.path == "/echo" {
        let ct = req
            .headers
            .iter()
            .find(|(k, _)| k == "content-type")
            .map(|(_, v)| v.clone())
            .unwrap_or_default();
        let mut body = format!("{}\n", ct).into_bytes();
        body.extend_from_slice(&req.body);
        Route {
            status: 200,
            content_type: "text/plain",
            body,
            chunk_delay: None,
        }
    } else {
        routes.get(&req.path).cloned().unwrap_or(Route {
            status: 404,
            content_type: "text/plain",
            body: b"not found".to_vec(),
            chunk_delay: None,
        })
    };

    let reason = if route.status < 400 { "OK" } else { "Error" };
    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        route.status,
        reason,
        route.content_type,
        route.body.len()
    );
    if stream.write_all(head.as_bytes()).is_err() || req.method == "HEAD" {
        return;
    }
    match route.chunk_delay {
        None => {
            let _ = stream.write_all(&route.body);
        }
        Some(delay) => {
            for chunk in route.body.chunks(4096) {
                if stream.write_all(chunk).is_err() {
                    return;
                }
                let _ = stream.flush();
                thread::sleep(delay);
            }
        }
    }
}
