//! Minimal HTTP/1.1 object server for integration tests.
//!
//! Serves several bodies by path and honors `Range: bytes=N-` with 206.
//! Every request's Range header is recorded per path. Individual paths can
//! be made to fail with a status code, and the server can be told to ignore
//! Range or to cut bodies short.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RangeServerOptions {
    /// If false, GET ignores Range and always returns 200 with the full body.
    pub support_ranges: bool,
    /// Send only this many body bytes (while advertising the full length)
    /// and then close the connection.
    pub truncate_after: Option<usize>,
}

impl Default for RangeServerOptions {
    fn default() -> Self {
        Self {
            support_ranges: true,
            truncate_after: None,
        }
    }
}

#[derive(Default)]
struct State {
    bodies: HashMap<String, Vec<u8>>,
    failures: Mutex<HashMap<String, u16>>,
    /// (path, Range header value or None) in arrival order.
    requests: Mutex<Vec<(String, Option<String>)>>,
}

pub struct RangeServer {
    base: String,
    state: Arc<State>,
}

impl RangeServer {
    /// Starts a server in a background thread. It runs until the process exits.
    pub fn start(bodies: Vec<(String, Vec<u8>)>) -> Self {
        Self::start_with_options(bodies, RangeServerOptions::default())
    }

    pub fn start_with_options(bodies: Vec<(String, Vec<u8>)>, opts: RangeServerOptions) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().unwrap().port();
        let state = Arc::new(State {
            bodies: bodies.into_iter().collect(),
            ..State::default()
        });
        let shared = Arc::clone(&state);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let state = Arc::clone(&shared);
                thread::spawn(move || handle(stream, &state, opts));
            }
        });
        Self {
            base: format!("http://127.0.0.1:{}", port),
            state,
        }
    }

    /// A signed-looking URL for `path`.
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}?X-Amz-Expires=3600&X-Amz-Signature=deadbeef",
            self.base, path
        )
    }

    /// Makes every later request for `path` answer with `status`.
    pub fn fail_path(&self, path: &str, status: u16) {
        self.state
            .failures
            .lock()
            .unwrap()
            .insert(path.to_string(), status);
    }

    /// Range headers received for `path`, one entry per request.
    pub fn ranges_for(&self, path: &str) -> Vec<Option<String>> {
        self.state
            .requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| p == path)
            .map(|(_, r)| r.clone())
            .collect()
    }

    pub fn hits(&self, path: &str) -> usize {
        self.ranges_for(path).len()
    }

    pub fn total_requests(&self) -> usize {
        self.state.requests.lock().unwrap().len()
    }
}

fn handle(mut stream: TcpStream, state: &State, opts: RangeServerOptions) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let Some(request) = read_head(&mut stream) else {
        return;
    };
    let Some((method, path, range)) = parse_request(&request) else {
        return;
    };
    state
        .requests
        .lock()
        .unwrap()
        .push((path.clone(), range.clone()));

    if !method.eq_ignore_ascii_case("GET") {
        let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
        return;
    }
    if let Some(status) = state.failures.lock().unwrap().get(&path).copied() {
        let body = b"<Error><Code>Injected</Code></Error>";
        let head = format!(
            "HTTP/1.1 {} Injected\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            status,
            body.len()
        );
        let _ = stream.write_all(head.as_bytes());
        let _ = stream.write_all(body);
        return;
    }
    let Some(body) = state.bodies.get(&path) else {
        let _ = stream.write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
        return;
    };

    let total = body.len();
    let start = if opts.support_ranges {
        range.as_deref().and_then(range_start)
    } else {
        None
    };
    let head = match start {
        Some(start) if start >= total => {
            let head = format!(
                "HTTP/1.1 416 Range Not Satisfiable\r\nContent-Range: bytes */{}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                total
            );
            let _ = stream.write_all(head.as_bytes());
            return;
        }
        Some(start) => format!(
            "HTTP/1.1 206 Partial Content\r\nContent-Length: {}\r\nContent-Range: bytes {}-{}/{}\r\nAccept-Ranges: bytes\r\nConnection: close\r\n\r\n",
            total - start,
            start,
            total - 1,
            total
        ),
        None => format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            total
        ),
    };
    let slice = &body[start.unwrap_or(0)..];
    let slice = match opts.truncate_after {
        Some(n) => &slice[..n.min(slice.len())],
        None => slice,
    };
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(slice);
    let _ = stream.flush();
    let _ = stream.shutdown(std::net::Shutdown::Both);
}

fn read_head(stream: &mut TcpStream) -> Option<String> {
    let mut head = Vec::new();
    let mut buf = [0u8; 4096];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut buf).ok()?;
        if n == 0 {
            return None;
        }
        head.extend_from_slice(&buf[..n]);
    }
    String::from_utf8(head).ok()
}

/// Returns (method, path without leading slash or query, Range header value).
fn parse_request(request: &str) -> Option<(String, String, Option<String>)> {
    let mut lines = request.lines();
    let mut first = lines.next()?.split_whitespace();
    let method = first.next()?.to_string();
    let target = first.next()?;
    let path = target.split('?').next()?.trim_start_matches('/').to_string();
    let mut range = None;
    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("range") {
                range = Some(value.trim().to_string());
            }
        }
    }
    Some((method, path, range))
}

fn range_start(value: &str) -> Option<usize> {
    let bytes = value.strip_prefix("bytes=")?;
    let (start, _) = bytes.split_once('-')?;
    start.trim().parse().ok()
}
