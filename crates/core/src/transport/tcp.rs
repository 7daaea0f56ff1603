use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use crate::auth::RtspTransport;
use crate::client::ClientConfig;
use crate::endpoint::RtspEndpoint;
use crate::error::{DiagnosticError, ErrorKind, IoPhase, Result, classify_io};
use crate::protocol::{RtspRequest, RtspResponse};
use crate::protocol::response::{content_length, find_header_end};

const READ_CHUNK: usize = 4096;

/// A single RTSP client connection.
///
/// Owns the socket and the `CSeq` counter (RFC 2326 §12.17) for that
/// socket: the first request carries `CSeq: 1` and every request after it
/// the next integer. Dropping the connection shuts the socket down, so every
/// exit path from an analysis releases it.
pub struct Connection {
    stream: TcpStream,
    target: String,
    peer_addr: SocketAddr,
    cseq: u32,
    user_agent: String,
    max_response_bytes: usize,
    connect_time: Duration,
}

impl Connection {
    /// Resolve the endpoint and connect, trying each resolved address in
    /// turn. The timeout bounds each connect attempt and every later read
    /// and write.
    pub fn connect(endpoint: &RtspEndpoint, config: &ClientConfig) -> Result<Self> {
        let target = endpoint.socket_target();
        let timeout = config.effective_timeout();

        let addrs: Vec<SocketAddr> = target
            .to_socket_addrs()
            .map_err(|e| classify_io(&e, IoPhase::Resolve, &target))?
            .collect();

        if addrs.is_empty() {
            return Err(DiagnosticError::new(
                ErrorKind::DnsResolutionFailure,
                format!("{target} resolved to no addresses"),
            ));
        }

        let started = Instant::now();
        let mut last_err: Option<io::Error> = None;

        for addr in &addrs {
            match TcpStream::connect_timeout(addr, timeout) {
                Ok(stream) => {
                    let connect_time = started.elapsed();
                    let configure = |s: &TcpStream| -> io::Result<()> {
                        s.set_read_timeout(Some(timeout))?;
                        s.set_write_timeout(Some(timeout))?;
                        s.set_nodelay(true)
                    };
                    configure(&stream).map_err(|e| classify_io(&e, IoPhase::Connect, &target))?;

                    tracing::info!(
                        peer = %addr,
                        connect_ms = connect_time.as_millis() as u64,
                        "connected to RTSP server"
                    );

                    return Ok(Connection {
                        stream,
                        target,
                        peer_addr: *addr,
                        cseq: 1,
                        user_agent: config.user_agent.clone(),
                        max_response_bytes: config.max_response_bytes,
                        connect_time,
                    });
                }
                Err(e) => {
                    tracing::debug!(peer = %addr, error = %e, "connect attempt failed");
                    last_err = Some(e);
                }
            }
        }

        let err = last_err.unwrap_or_else(|| io::Error::from(io::ErrorKind::NotConnected));
        Err(classify_io(&err, IoPhase::Connect, &target))
    }

    /// Time taken by the successful TCP connect.
    pub fn connect_time(&self) -> Duration {
        self.connect_time
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Returns the `CSeq` for the next request and advances the counter.
    fn next_cseq(&mut self) -> u32 {
        let cseq = self.cseq;
        self.cseq += 1;
        cseq
    }

    /// Read one response: accumulate until the header terminator, then, if
    /// `Content-Length` is present, until that many body bytes have arrived.
    fn read_response(&mut self) -> Result<Vec<u8>> {
        let mut buf: Vec<u8> = Vec::with_capacity(READ_CHUNK);
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            if let Some((head_len, body_start)) = find_header_end(&buf) {
                match content_length(&buf[..head_len]) {
                    Some(len) => {
                        let total = match body_start.checked_add(len) {
                            Some(total) if total <= self.max_response_bytes => total,
                            _ => return Err(self.oversized()),
                        };
                        if buf.len() >= total {
                            buf.truncate(total);
                            return Ok(buf);
                        }
                    }
                    None => return Ok(buf),
                }
            }

            let n = match self.stream.read(&mut chunk) {
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(classify_io(&e, IoPhase::Exchange, &self.target)),
            };

            if n == 0 {
                let err = io::Error::from(io::ErrorKind::UnexpectedEof);
                return Err(classify_io(&err, IoPhase::Exchange, &self.target));
            }

            buf.extend_from_slice(&chunk[..n]);
            if buf.len() > self.max_response_bytes {
                return Err(self.oversized());
            }
        }
    }

    fn oversized(&self) -> DiagnosticError {
        DiagnosticError::protocol(format!(
            "response from {} exceeds {} bytes",
            self.target, self.max_response_bytes
        ))
    }
}

impl RtspTransport for Connection {
    fn send(&mut self, request: RtspRequest) -> Result<RtspResponse> {
        let cseq = self.next_cseq();
        let wire = request.serialize(cseq, &self.user_agent);

        tracing::debug!(
            peer = %self.peer_addr,
            method = %request.method,
            uri = %request.uri,
            cseq,
            "request"
        );

        self.stream
            .write_all(wire.as_bytes())
            .and_then(|_| self.stream.flush())
            .map_err(|e| classify_io(&e, IoPhase::Exchange, &self.target))?;

        let raw = self.read_response()?;
        let response = RtspResponse::parse(&raw)?;

        tracing::debug!(
            peer = %self.peer_addr,
            status = response.status_code,
            cseq,
            "response"
        );

        if let Some(echoed) = response.cseq()
            && echoed.trim() != cseq.to_string()
        {
            tracing::warn!(sent = cseq, echoed, "response CSeq does not match request");
        }

        Ok(response)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        let _ = self.stream.shutdown(Shutdown::Both);
        tracing::debug!(peer = %self.peer_addr, "connection closed");
    }
}
