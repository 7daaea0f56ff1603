use std::time::{Duration, Instant};

use serde::{Serialize, Serializer};

use crate::auth::{AuthNegotiator, RtspTransport};
use crate::endpoint::RtspEndpoint;
use crate::error::Result;
use crate::protocol::sdp::{SessionDescription, parse_sdp};
use crate::protocol::{RtspRequest, RtspResponse};
use crate::transport::Connection;

/// Default connect/read timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// `User-Agent` sent with every request (RFC 2326 §12.41).
pub const DEFAULT_USER_AGENT: &str = "rtsp-probe/0.1";

/// Upper bound on a single response, header and body together.
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 1024 * 1024;

/// Client-level configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Bounds the TCP connect and every individual read/write.
    /// A zero duration means [`DEFAULT_TIMEOUT`].
    pub timeout: Duration,
    pub user_agent: String,
    /// Send OPTIONS before DESCRIBE. Some servers refuse DESCRIBE otherwise.
    pub send_options: bool,
    pub max_response_bytes: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            send_options: true,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        }
    }
}

impl ClientConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub(crate) fn effective_timeout(&self) -> Duration {
        if self.timeout.is_zero() {
            DEFAULT_TIMEOUT
        } else {
            self.timeout
        }
    }
}

/// Everything learned about one RTSP endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct StreamAnalysis {
    /// The analyzed URL with its password masked.
    pub url: String,
    pub session: SessionDescription,
    /// SDP body exactly as received.
    pub raw_sdp: String,
    /// Methods listed in the OPTIONS `Public` header.
    pub public_methods: Vec<String>,
    /// `Server` header of the DESCRIBE response.
    pub server: Option<String>,
    #[serde(rename = "connect_time_ms", serialize_with = "as_millis")]
    pub connect_time: Duration,
    #[serde(rename = "total_time_ms", serialize_with = "as_millis")]
    pub total_time: Duration,
}

/// Answers "what is this RTSP endpoint and what does it require".
///
/// Services that report stream characteristics or build pipelines from the
/// detected codecs take a `&dyn StreamAnalyzer` so they can be exercised
/// without a network.
pub trait StreamAnalyzer: Send + Sync {
    fn analyze(&self, url: &str) -> Result<StreamAnalysis>;
}

/// Blocking RTSP introspection client.
///
/// Each [`analyze`](StreamAnalyzer::analyze) call opens its own connection
/// and shares nothing with concurrent calls, so one `Client` can serve many
/// threads.
#[derive(Debug, Clone, Default)]
pub struct Client {
    config: ClientConfig,
}

impl Client {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ClientConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// OPTIONS probe. A non-200 answer is logged, not fatal.
    fn probe_options(&self, conn: &mut Connection, endpoint: &RtspEndpoint) -> Result<Vec<String>> {
        let response = conn.send(RtspRequest::options(endpoint.request_uri()))?;
        if !response.is_success() {
            tracing::info!(status = %response.status_line(), "OPTIONS not accepted, continuing");
            return Ok(Vec::new());
        }
        Ok(public_methods(&response))
    }
}

impl StreamAnalyzer for Client {
    fn analyze(&self, url: &str) -> Result<StreamAnalysis> {
        let started = Instant::now();
        let endpoint = RtspEndpoint::parse(url);

        tracing::info!(
            host = endpoint.host(),
            port = endpoint.port(),
            path = endpoint.path(),
            "analyzing RTSP stream"
        );

        let mut conn = Connection::connect(&endpoint, &self.config)?;

        let public_methods = if self.config.send_options {
            self.probe_options(&mut conn, &endpoint)?
        } else {
            Vec::new()
        };

        let negotiated = AuthNegotiator::new(&endpoint).describe(&mut conn)?;
        let connect_time = conn.connect_time();
        drop(conn);

        let response = negotiated.response;
        if let Some(content_type) = response.get_header("Content-Type")
            && !content_type.to_ascii_lowercase().starts_with("application/sdp")
        {
            tracing::warn!(content_type, "DESCRIBE body is not declared as SDP");
        }

        let raw_sdp = response.body_text();
        let mut session = parse_sdp(&raw_sdp)?;
        session.authentication_method = negotiated.method;

        let total_time = started.elapsed();
        tracing::info!(
            media = session.media.len(),
            auth = %session.authentication_method,
            total_ms = total_time.as_millis() as u64,
            "analysis complete"
        );

        Ok(StreamAnalysis {
            url: endpoint.to_string(),
            session,
            raw_sdp,
            public_methods,
            server: response.get_header("Server").map(str::to_string),
            connect_time,
            total_time,
        })
    }
}

/// Method names from the `Public` header (RFC 2326 §12.28).
fn public_methods(response: &RtspResponse) -> Vec<String> {
    response
        .get_header("Public")
        .map(|public| {
            public
                .split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn as_millis<S: Serializer>(duration: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64() * 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
        assert!(config.send_options);
    }

    #[test]
    fn zero_timeout_uses_default() {
        let config = ClientConfig::default().with_timeout(Duration::ZERO);
        assert_eq!(config.effective_timeout(), DEFAULT_TIMEOUT);
        let config = ClientConfig::default().with_timeout(Duration::from_millis(250));
        assert_eq!(config.effective_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn public_header_is_split() {
        let raw = b"RTSP/1.0 200 OK\r\nCSeq: 1\r\nPublic: OPTIONS, DESCRIBE, SETUP, PLAY, TEARDOWN\r\n\r\n";
        let response = RtspResponse::parse(raw).unwrap();
        assert_eq!(
            public_methods(&response),
            vec!["OPTIONS", "DESCRIBE", "SETUP", "PLAY", "TEARDOWN"]
        );
    }
}
