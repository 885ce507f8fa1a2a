//! Minimal HTTP/1.1 server for integration tests: static pages on GET and a
//! scripted extraction endpoint on POST /extract.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

/// How POST /extract answers.
#[derive(Debug, Clone)]
pub enum ExtractBehaviour {
    /// 200 with `{"url": <request url>, "length": <content bytes>}`.
    Echo,
    /// Always this status with a short text body.
    Status(u16),
    /// 200 with a body that is not JSON.
    Garbage,
}

#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Path (e.g. "/ok") to (status, body) served on GET.
    pub pages: HashMap<String, (u16, String)>,
    pub extract: ExtractBehaviour,
}

/// Handle to a running server; it runs until the process exits.
#[derive(Debug, Clone)]
pub struct PageServer {
    pub base: String,
    pub page_hits: Arc<AtomicUsize>,
    pub extract_hits: Arc<AtomicUsize>,
}

impl PageServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn extract_endpoint(&self) -> String {
        self.url("/extract")
    }

    pub fn page_hits(&self) -> usize {
        self.page_hits.load(Ordering::SeqCst)
    }

    pub fn extract_hits(&self) -> usize {
        self.extract_hits.load(Ordering::SeqCst)
    }
}

pub fn start(opts: ServerOptions) -> PageServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let server = PageServer {
        base: format!("http://127.0.0.1:{}", port),
        page_hits: Arc::new(AtomicUsize::new(0)),
        extract_hits: Arc::new(AtomicUsize::new(0)),
    };
    let opts = Arc::new(opts);
    let handle = server.clone();
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let opts = Arc::clone(&opts);
            let handle = handle.clone();
            thread::spawn(move || serve(stream, &opts, &handle));
        }
    });
    server
}

fn serve(mut stream: TcpStream, opts: &ServerOptions, counters: &PageServer) {
    let _ = stream.set_read_timeout(Some(std::time::Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(std::time::Duration::from_secs(2)));
    let Some((method, path, body)) = read_request(&mut stream) else {
        return;
    };

    let (status, content_type, payload) = if method.eq_ignore_ascii_case("POST") && path == "/extract" {
        counters.extract_hits.fetch_add(1, Ordering::SeqCst);
        match &opts.extract {
            ExtractBehaviour::Echo => {
                let request: serde_json::Value = serde_json::from_slice(&body).unwrap_or_default();
                let url = request["url"].as_str().unwrap_or_default().to_string();
                let length = request["content"].as_str().map(str::len).unwrap_or(0);
                let reply = serde_json::json!({ "url": url, "length": length });
                (200, "application/json", reply.to_string())
            }
            ExtractBehaviour::Status(code) => (*code, "text/plain", format!("status {code}")),
            ExtractBehaviour::Garbage => (200, "application/json", "<html>not json".to_string()),
        }
    } else if method.eq_ignore_ascii_case("GET") {
        counters.page_hits.fetch_add(1, Ordering::SeqCst);
        match opts.pages.get(&path) {
            Some((status, body)) => (*status, "text/html", body.clone()),
            None => (404, "text/plain", "not found".to_string()),
        }
    } else {
        (405, "text/plain", String::new())
    };

    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        reason(status),
        content_type,
        payload.len()
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.write_all(payload.as_bytes());
}

/// Reads one request: (method, path, body). Honors Content-Length.
fn read_request(stream: &mut TcpStream) -> Option<(String, String, Vec<u8>)> {
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

    let head = std::str::from_utf8(&buf[..header_end]).ok()?;
    let mut lines = head.lines();
    let mut first = lines.next()?.split_whitespace();
    let method = first.next()?.to_string();
    let path = first.next()?.to_string();
    let content_length = lines
        .filter_map(|l| l.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    let mut body = buf[header_end..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }
    Some((method, path, body))
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        401 => "Unauthorized",
        404 => "Not Found",
        405 => "Method Not Allowed",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Status",
    }
}
