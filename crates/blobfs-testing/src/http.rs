//! A local HTTP server standing in for the Blob service endpoint
//!
//! Requests are answered by a handler closure and recorded so tests can
//! check what the client actually sent. The server speaks just enough
//! HTTP/1.1 for keep-alive clients: no chunked bodies, no TLS.

use parking_lot::Mutex;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;

/// A request as it arrived on the wire
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// Request method, e.g. `HEAD`
    pub method: String,
    /// Request target exactly as sent, percent-encoding included
    pub target: String,
    /// Header names (lower-cased) and values
    pub headers: Vec<(String, String)>,
}

impl RecordedRequest {
    /// The target without its query string
    pub fn path(&self) -> &str {
        self.target.split('?').next().unwrap_or_default()
    }

    /// The raw query string, empty when absent
    pub fn query(&self) -> &str {
        self.target.split_once('?').map(|(_, q)| q).unwrap_or_default()
    }

    /// Value of a header, ignoring case
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// A canned response
#[derive(Debug, Clone)]
pub struct FakeResponse {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl FakeResponse {
    /// Empty response with `status`
    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// `200 OK`
    pub fn ok() -> Self {
        Self::status(200)
    }

    /// `404` with the service's error code header and XML body
    pub fn not_found(error_code: &str) -> Self {
        Self::status(404)
            .with_header("x-ms-error-code", error_code)
            .with_header("Content-Type", "application/xml")
            .with_body(format!(
                "<?xml version=\"1.0\" encoding=\"utf-8\"?><Error><Code>{}</Code><Message>The specified resource does not exist.</Message></Error>",
                error_code
            ))
    }

    /// Add a header
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Set the body
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    fn write_to(&self, stream: &mut impl Write, head_only: bool) -> std::io::Result<()> {
        let mut response = format!("HTTP/1.1 {} {}\r\n", self.status, reason(self.status));
        for (name, value) in &self.headers {
            response.push_str(&format!("{}: {}\r\n", name, value));
        }
        let has_length = self
            .headers
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case("content-length"));
        if !has_length {
            response.push_str(&format!("Content-Length: {}\r\n", self.body.len()));
        }
        response.push_str("\r\n");

        stream.write_all(response.as_bytes())?;
        if !head_only {
            stream.write_all(&self.body)?;
        }
        stream.flush()
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        206 => "Partial Content",
        403 => "Forbidden",
        404 => "The specified resource does not exist.",
        _ => "Unknown",
    }
}

type Handler = dyn Fn(&RecordedRequest) -> FakeResponse + Send + Sync;

/// A Blob service endpoint on `127.0.0.1` answering with a handler
pub struct FakeBlobServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl FakeBlobServer {
    /// Starts serving on an ephemeral port; the server lives until the process exits
    pub fn start<F>(handler: F) -> std::io::Result<Self>
    where
        F: Fn(&RecordedRequest) -> FakeResponse + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;
        let requests = Arc::new(Mutex::new(Vec::new()));
        let handler: Arc<Handler> = Arc::new(handler);

        let recorded = requests.clone();
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let handler = handler.clone();
                let recorded = recorded.clone();
                thread::spawn(move || {
                    let _ = serve_connection(stream, handler.as_ref(), &recorded);
                });
            }
        });

        Ok(Self { addr, requests })
    }

    /// Endpoint of `account` on this server, e.g. `http://127.0.0.1:PORT/devstoreaccount1`
    pub fn endpoint(&self, account: &str) -> String {
        format!("http://{}/{}", self.addr, account)
    }

    /// Every request received so far, in arrival order
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }
}

fn serve_connection(
    stream: TcpStream,
    handler: &Handler,
    recorded: &Mutex<Vec<RecordedRequest>>,
) -> std::io::Result<()> {
    let mut writer = stream.try_clone()?;
    let mut reader = BufReader::new(stream);

    loop {
        let mut request_line = String::new();
        if reader.read_line(&mut request_line)? == 0 {
            return Ok(());
        }
        let mut parts = request_line.split_whitespace();
        let (Some(method), Some(target)) = (parts.next(), parts.next()) else {
            return Ok(());
        };
        let request = RecordedRequest {
            method: method.to_string(),
            target: target.to_string(),
            headers: read_headers(&mut reader)?,
        };

        let body_len = request
            .header("content-length")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        let mut body = vec![0u8; body_len];
        reader.read_exact(&mut body)?;

        let response = handler(&request);
        let head_only = request.method.eq_ignore_ascii_case("HEAD");
        recorded.lock().push(request);
        response.write_to(&mut writer, head_only)?;
    }
}

fn read_headers(reader: &mut impl BufRead) -> std::io::Result<Vec<(String, String)>> {
    let mut headers = Vec::new();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            return Ok(headers);
        }
        let line = line.trim_end();
        if line.is_empty() {
            return Ok(headers);
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
        }
    }
}
