use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rustls_pki_types::ServerName;
use thiserror::Error;

use crate::http::header::Headers;
use crate::http::tls::insecure_client_config;
use crate::http::url::TargetUrl;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("connect to {0} failed: {1}")]
    Connect(String, io::Error),

    #[error("TLS handshake with {0} failed: {1}")]
    Tls(String, rustls::Error),

    #[error("invalid TLS server name: {0}")]
    InvalidServerName(String),

    #[error("local I/O error talking to {0}: {1}")]
    Io(String, io::Error),
}

/// The result of a single probe: the wall-clock time from the first byte
/// written to the read loop's exit, and whatever response bytes arrived
/// (possibly empty, on a hard timeout).
#[derive(Debug)]
pub struct ProbeOutcome {
    pub elapsed: Duration,
    pub response_head: Vec<u8>,
}

/// Speaks raw HTTP/1.1 over a fresh TCP or TLS connection per probe — no
/// connection reuse, no header canonicalization. Every call opens a new
/// socket so kernel or front-end buffering from a prior probe can never leak
/// into the next timing measurement.
pub struct RawClient {
    tls_config: Arc<rustls::ClientConfig>,
}

impl RawClient {
    pub fn new() -> Self {
        RawClient {
            tls_config: insecure_client_config(),
        }
    }

    /// Opens a connection, writes `request` in full, and reads the response
    /// until close, timeout, or a confidently-complete head+body. The timer
    /// starts immediately before the first write and stops when reading
    /// ends, by any means — a timeout is a first-class result, not an error.
    pub fn send(
        &self,
        url: &TargetUrl,
        request: &[u8],
        timeout: Duration,
    ) -> Result<ProbeOutcome, ClientError> {
        let addr = format!("{}:{}", url.host, url.port);
        let start = Instant::now();
        let deadline = start + timeout;
        let socket_addr = addr
            .to_socket_addrs()
            .map_err(|e| ClientError::Connect(addr.clone(), e))?
            .next()
            .ok_or_else(|| ClientError::Connect(addr.clone(), io::Error::new(io::ErrorKind::NotFound, "no addresses resolved")))?;
        let mut tcp = TcpStream::connect_timeout(&socket_addr, timeout)
            .map_err(|e| ClientError::Connect(addr.clone(), e))?;
        tcp.set_nodelay(true).ok();

        // Armed before the TLS handshake (not just before the response read):
        // a target that accepts the TCP connection but stalls the handshake,
        // or never reads the request, must still surface at `deadline` rather
        // than blocking the worker thread forever.
        let remaining = deadline
            .saturating_duration_since(Instant::now())
            .max(Duration::from_millis(1));
        tcp.set_read_timeout(Some(remaining)).ok();
        tcp.set_write_timeout(Some(remaining)).ok();

        // A plain `&tcp` borrow can't coexist with the `&mut tcp` the TLS
        // stream holds below, and `Read` alone exposes no way to arm a
        // socket timeout. A clone shares the same underlying fd, so setting
        // its read timeout governs reads through either handle.
        let timeout_handle = tcp
            .try_clone()
            .map_err(|e| ClientError::Io(addr.clone(), e))?;

        let response_head = if url.https {
            let mut conn = self.tls_connection(url)?;
            let mut stream = rustls::Stream::new(&mut conn, &mut tcp);
            stream
                .write_all(request)
                .map_err(|e| ClientError::Io(addr.clone(), e))?;
            read_until_deadline(&mut stream, &timeout_handle, start + timeout)
                .map_err(|e| ClientError::Io(addr.clone(), e))?
        } else {
            tcp.write_all(request)
                .map_err(|e| ClientError::Io(addr.clone(), e))?;
            read_until_deadline(&mut tcp, &timeout_handle, start + timeout)
                .map_err(|e| ClientError::Io(addr.clone(), e))?
        };
        let elapsed = start.elapsed();

        if tracing::enabled!(tracing::Level::DEBUG) {
            log_response_head(url, &response_head);
        }

        Ok(ProbeOutcome {
            elapsed,
            response_head,
        })
    }

    fn tls_connection(&self, url: &TargetUrl) -> Result<rustls::ClientConnection, ClientError> {
        let name = ServerName::try_from(url.host.clone())
            .map_err(|_| ClientError::InvalidServerName(url.host.clone()))?;
        rustls::ClientConnection::new(self.tls_config.clone(), name)
            .map_err(|e| ClientError::Tls(url.host.clone(), e))
    }
}

impl Default for RawClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads from `r` until the peer closes the connection, `deadline` passes, or
/// the response's declared length (from `Content-Length`, or an explicit
/// no-body status) has been fully read. A response that never completes its
/// headers (the desync attack's signature) simply runs to `deadline`.
fn read_until_deadline(r: &mut impl Read, socket: &TcpStream, deadline: Instant) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];
    let mut expected_total: Option<usize> = None;

    loop {
        let now = Instant::now();
        if now >= deadline {
            break;
        }

        // Re-armed every iteration: the remaining budget shrinks as partial
        // reads trickle in, so a slow-but-not-stalled peer doesn't get a
        // fresh full timeout on every byte.
        socket.set_read_timeout(Some(deadline - now)).ok();

        match r.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                if expected_total.is_none() {
                    if let Some(head_end) = find_double_crlf(&buf) {
                        expected_total = Some(head_end.saturating_add(declared_body_len(&buf[..head_end])));
                    }
                }
                if let Some(total) = expected_total {
                    if buf.len() >= total {
                        break;
                    }
                }
            }
            Err(e) if is_timeout(&e) => break,
            Err(e) => return Err(e),
        }
    }

    Ok(buf)
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

fn find_double_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|pos| pos + 4)
}

/// Best-effort: decide how many body bytes follow the head. Unknown-length
/// responses (no `Content-Length`, chunked, or anything else) are treated as
/// "read until close or timeout" by returning `usize::MAX`.
fn declared_body_len(head: &[u8]) -> usize {
    let head_str = match std::str::from_utf8(head) {
        Ok(s) => s,
        Err(_) => return usize::MAX,
    };

    let mut lines = head_str.split("\r\n");
    let status_line = lines.next().unwrap_or("");
    if let Some(code) = status_line.split_whitespace().nth(1) {
        if matches!(code, "204" | "304") {
            return 0;
        }
    }

    let header_text = head_str
        .splitn(2, "\r\n")
        .nth(1)
        .unwrap_or("")
        .trim_end_matches("\r\n");
    let mut headers = Headers::new();
    if headers.parse_headers(header_text).is_err() {
        return usize::MAX;
    }

    if headers.contains("transfer-encoding") {
        return usize::MAX;
    }

    match headers.get("content-length").and_then(|v| v.parse::<usize>().ok()) {
        Some(len) => len,
        None => usize::MAX,
    }
}

fn log_response_head(url: &TargetUrl, response_head: &[u8]) {
    let Some(head_end) = find_double_crlf(response_head) else {
        tracing::debug!(target = %url, bytes = response_head.len(), "no complete response head observed");
        return;
    };
    let head_text = String::from_utf8_lossy(&response_head[..head_end]);
    tracing::debug!(target = %url, head = %head_text, "received response head");
}
