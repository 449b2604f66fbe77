//! HTTP surface of the analysis service.
//!
//! A small synchronous HTTP/1.1 server over `TcpListener`:
//! - `POST /api/analyze-ethnicity`: multipart upload, field `image`
//! - `GET /health`: liveness probe
//! - `OPTIONS`: CORS preflight (the browser frontend posts cross-origin)
//!
//! One worker thread accepts and handles connections in sequence. The
//! analysis engine (both models) is built before the thread starts and
//! lives for the life of the server; requests never reload models.

pub mod multipart;

use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::analyze::AnalysisEngine;
use crate::config::ServiceConfig;

const MAX_HEADER_BYTES: usize = 8192;
const ANALYZE_PATH: &str = "/api/analyze-ethnicity";

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub addr: String,
    pub max_upload_bytes: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8707".to_string(),
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

#[derive(Debug)]
pub struct ApiHandle {
    pub addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl ApiHandle {
    pub fn stop(mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("api server thread panicked"))?;
        }
        Ok(())
    }
}

pub struct ApiServer {
    cfg: ApiConfig,
    service_cfg: ServiceConfig,
}

impl ApiServer {
    pub fn new(cfg: ApiConfig, service_cfg: ServiceConfig) -> Self {
        Self { cfg, service_cfg }
    }

    /// Bind, load both models, and start the serving thread.
    pub fn spawn(self) -> Result<ApiHandle> {
        let configured_addr: SocketAddr = self.cfg.addr.parse()?;
        let listener = TcpListener::bind(configured_addr)?;
        let addr = listener.local_addr()?;
        listener.set_nonblocking(true)?;

        // Models load once, before the first connection is accepted.
        let mut engine = AnalysisEngine::from_config(&self.service_cfg)?;
        engine.warm_up()?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_thread = shutdown.clone();
        let cfg = self.cfg.clone();
        let join = std::thread::spawn(move || {
            if let Err(err) = run_api(listener, cfg, engine, shutdown_thread) {
                log::error!("analyze api stopped: {}", err);
            }
        });

        Ok(ApiHandle {
            addr,
            shutdown,
            join: Some(join),
        })
    }
}

fn run_api(
    listener: TcpListener,
    cfg: ApiConfig,
    mut engine: AnalysisEngine,
    shutdown: Arc<AtomicBool>,
) -> Result<()> {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        match listener.accept() {
            Ok((mut stream, _)) => {
                if let Err(err) = handle_connection(&mut stream, &mut engine, &cfg) {
                    log::warn!("analyze request failed: {}", err);
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(50));
                continue;
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

fn handle_connection(
    stream: &mut TcpStream,
    engine: &mut AnalysisEngine,
    cfg: &ApiConfig,
) -> Result<()> {
    let request = match read_request(stream, cfg.max_upload_bytes)? {
        RequestOutcome::Request(request) => request,
        RequestOutcome::BodyTooLarge => {
            return write_json_response(stream, 413, r#"{"error":"upload too large"}"#);
        }
    };

    if request.method == "OPTIONS" {
        return write_preflight_response(stream);
    }
    match (request.method.as_str(), request.path.as_str()) {
        ("GET", "/health") => write_json_response(stream, 200, r#"{"status":"ok"}"#),
        ("POST", ANALYZE_PATH) => handle_analyze(stream, engine, &request),
        ("GET", _) | ("POST", _) => write_json_response(stream, 404, r#"{"error":"not_found"}"#),
        _ => write_json_response(stream, 405, r#"{"error":"method_not_allowed"}"#),
    }
}

fn handle_analyze(
    stream: &mut TcpStream,
    engine: &mut AnalysisEngine,
    request: &HttpRequest,
) -> Result<()> {
    let boundary = request
        .headers
        .get("content-type")
        .and_then(|value| multipart::boundary(value));
    let Some(boundary) = boundary else {
        return write_json_response(
            stream,
            400,
            r#"{"error":"expected multipart/form-data upload"}"#,
        );
    };

    let parts = match multipart::parse(&request.body, &boundary) {
        Ok(parts) => parts,
        Err(err) => {
            return write_error_response(stream, 400, &format!("invalid multipart body: {err}"));
        }
    };

    // File parts carry a filename parameter; a bare form field named
    // "image" does not count as an upload.
    let Some(image) = parts
        .iter()
        .find(|part| part.name == "image" && part.filename.is_some())
    else {
        return write_json_response(stream, 400, r#"{"error":"no image provided"}"#);
    };
    if image.filename.as_deref().unwrap_or_default().is_empty() {
        return write_json_response(stream, 400, r#"{"error":"no selected file"}"#);
    }

    match engine.analyze(&image.data) {
        Ok(report) if report.persons_count == 0 => write_json_response(
            stream,
            400,
            r#"{"error":"no persons detected","persons_count":0}"#,
        ),
        Ok(report) => {
            let payload = serde_json::to_vec(&report)?;
            write_response(stream, 200, "application/json", &payload)
        }
        Err(err) => {
            log::error!("analysis failed: {:#}", err);
            write_error_response(stream, 500, &format!("{err:#}"))
        }
    }
}

// ----------------------------------------------------------------------------
// Request reading
// ----------------------------------------------------------------------------

#[derive(Debug)]
enum RequestOutcome {
    Request(HttpRequest),
    /// Declared `Content-Length` exceeds the upload limit.
    BodyTooLarge,
}

#[derive(Debug)]
struct HttpRequest {
    method: String,
    path: String,
    headers: HashMap<String, String>,
    body: Vec<u8>,
}

fn read_request(stream: &mut TcpStream, max_body_bytes: usize) -> Result<RequestOutcome> {
    stream.set_read_timeout(Some(Duration::from_secs(10)))?;
    let mut buf = [0u8; 4096];
    let mut data = Vec::new();

    let header_end = loop {
        if let Some(idx) = data.windows(4).position(|window| window == b"\r\n\r\n") {
            break idx;
        }
        if data.len() > MAX_HEADER_BYTES {
            return Err(anyhow!("request header section too large"));
        }
        let n = stream.read(&mut buf)?;
        if n == 0 {
            return Err(anyhow!("connection closed before request was complete"));
        }
        data.extend_from_slice(&buf[..n]);
    };

    let head = String::from_utf8_lossy(&data[..header_end]).into_owned();
    let mut lines = head.split("\r\n");
    let request_line = lines.next().ok_or_else(|| anyhow!("empty request"))?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().ok_or_else(|| anyhow!("missing method"))?;
    let raw_path = parts.next().ok_or_else(|| anyhow!("missing path"))?;
    let mut headers = HashMap::new();
    for line in lines {
        if let Some((key, value)) = line.split_once(':') {
            headers.insert(key.trim().to_lowercase(), value.trim().to_string());
        }
    }

    let content_length = headers
        .get("content-length")
        .map(|value| value.parse::<usize>())
        .transpose()
        .map_err(|_| anyhow!("invalid content-length header"))?
        .unwrap_or(0);
    if content_length > max_body_bytes {
        return Ok(RequestOutcome::BodyTooLarge);
    }

    let mut body = data[header_end + 4..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            return Err(anyhow!("connection closed before request body was complete"));
        }
        body.extend_from_slice(&buf[..n]);
    }
    body.truncate(content_length);

    let path = raw_path.split('?').next().unwrap_or(raw_path).to_string();
    Ok(RequestOutcome::Request(HttpRequest {
        method: method.to_string(),
        path,
        headers,
        body,
    }))
}

// ----------------------------------------------------------------------------
// Response writing
// ----------------------------------------------------------------------------

fn write_json_response(stream: &mut TcpStream, status: u16, body: &str) -> Result<()> {
    write_response(stream, status, "application/json", body.as_bytes())
}

fn write_error_response(stream: &mut TcpStream, status: u16, message: &str) -> Result<()> {
    let payload = serde_json::to_vec(&serde_json::json!({ "error": message }))?;
    write_response(stream, status, "application/json", &payload)
}

fn write_preflight_response(stream: &mut TcpStream) -> Result<()> {
    let header = "HTTP/1.1 204 No Content\r\n\
        Access-Control-Allow-Origin: *\r\n\
        Access-Control-Allow-Methods: GET, POST, OPTIONS\r\n\
        Access-Control-Allow-Headers: Content-Type\r\n\
        Content-Length: 0\r\n\r\n";
    stream.write_all(header.as_bytes())?;
    Ok(())
}

fn write_response(
    stream: &mut TcpStream,
    status: u16,
    content_type: &str,
    body: &[u8],
) -> Result<()> {
    let status_line = match status {
        200 => "HTTP/1.1 200 OK",
        400 => "HTTP/1.1 400 Bad Request",
        404 => "HTTP/1.1 404 Not Found",
        405 => "HTTP/1.1 405 Method Not Allowed",
        413 => "HTTP/1.1 413 Payload Too Large",
        _ => "HTTP/1.1 500 Internal Server Error",
    };
    let header = format!(
        "{status_line}\r\nContent-Type: {content_type}\r\nContent-Length: {len}\r\nAccess-Control-Allow-Origin: *\r\nCache-Control: no-store\r\n\r\n",
        status_line = status_line,
        content_type = content_type,
        len = body.len()
    );
    stream.write_all(header.as_bytes())?;
    stream.write_all(body)?;
    Ok(())
}
