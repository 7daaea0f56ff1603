//! Error taxonomy for RTSP stream analysis.
//!
//! Every failure inside the crate (socket errors, unexpected RTSP status
//! lines, malformed SDP, exhausted authentication) is translated here into a
//! [`DiagnosticError`] carrying one of a fixed set of [`ErrorKind`]s before it
//! reaches the caller. Callers branch on [`DiagnosticError::kind`] rather
//! than matching on message text.
//!
//! | Kind | Trigger |
//! |------|---------|
//! | [`ConnectionRefused`](ErrorKind::ConnectionRefused) | TCP connect refused |
//! | [`ConnectionTimeout`](ErrorKind::ConnectionTimeout) | connect or read exceeded the timeout |
//! | [`DnsResolutionFailure`](ErrorKind::DnsResolutionFailure) | hostname did not resolve |
//! | [`NetworkUnreachable`](ErrorKind::NetworkUnreachable) | routing failure |
//! | [`AuthenticationRequired`](ErrorKind::AuthenticationRequired) | 401 and no credentials in the URL |
//! | [`AuthenticationFailed`](ErrorKind::AuthenticationFailed) | every offered scheme was rejected |
//! | [`ProtocolError`](ErrorKind::ProtocolError) | malformed or unexpected response / SDP |

use std::fmt;
use std::io;

use serde::Serialize;

use crate::auth::AuthAttemptResult;

/// Caller-facing failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    ConnectionRefused,
    ConnectionTimeout,
    DnsResolutionFailure,
    NetworkUnreachable,
    AuthenticationRequired,
    AuthenticationFailed,
    ProtocolError,
}

impl ErrorKind {
    /// Stable identifier, identical to the variant name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConnectionRefused => "ConnectionRefused",
            Self::ConnectionTimeout => "ConnectionTimeout",
            Self::DnsResolutionFailure => "DnsResolutionFailure",
            Self::NetworkUnreachable => "NetworkUnreachable",
            Self::AuthenticationRequired => "AuthenticationRequired",
            Self::AuthenticationFailed => "AuthenticationFailed",
            Self::ProtocolError => "ProtocolError",
        }
    }

    /// Suggestion attached when the failure site has nothing more specific.
    pub fn default_suggestion(self) -> &'static str {
        match self {
            Self::ConnectionRefused => "server not running or not accepting connections",
            Self::ConnectionTimeout => "server not responding; check reachability",
            Self::DnsResolutionFailure => "check the RTSP URL hostname",
            Self::NetworkUnreachable => "check network/firewall settings",
            Self::AuthenticationRequired => "add username:password to the RTSP URL",
            Self::AuthenticationFailed => "verify credentials",
            Self::ProtocolError => "check that the URL points to an RTSP server and stream",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified analysis failure.
///
/// `attempts` lists every authentication attempt made before the failure,
/// in the order they were made (including schemes that were recorded but
/// never sent because they are unsupported). It is empty when the failure
/// happened before authentication started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct DiagnosticError {
    pub kind: ErrorKind,
    pub message: String,
    pub suggestion: String,
    pub attempts: Vec<AuthAttemptResult>,
}

impl DiagnosticError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            suggestion: kind.default_suggestion().to_string(),
            attempts: Vec::new(),
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ProtocolError, message)
    }

    /// 401 received while the URL carried no credentials.
    ///
    /// `schemes` are the schemes the server advertised, if any parsed.
    pub fn authentication_required(schemes: &[String]) -> Self {
        let message = if schemes.is_empty() {
            "server requires authentication but no credentials were provided".to_string()
        } else {
            format!(
                "server requires authentication ({}) but no credentials were provided",
                schemes.join(", ")
            )
        };
        Self::new(ErrorKind::AuthenticationRequired, message)
    }

    /// Every advertised scheme was tried (or skipped as unsupported) and none succeeded.
    pub fn authentication_failed(attempts: Vec<AuthAttemptResult>, last_response: &str) -> Self {
        let schemes: Vec<String> = attempts.iter().map(|a| a.scheme.to_string()).collect();
        let last_error = attempts
            .iter()
            .rev()
            .find_map(|a| a.error.as_deref())
            .unwrap_or("no usable challenge");
        Self {
            kind: ErrorKind::AuthenticationFailed,
            message: format!(
                "all authentication methods failed; tried: {}; last error: {}; last response: {}",
                schemes.join(", "),
                last_error,
                last_response
            ),
            suggestion: format!("verify credentials; server supports: {}", schemes.join(", ")),
            attempts,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = suggestion.into();
        self
    }

    /// Scheme labels of every recorded authentication attempt, in order.
    pub fn attempted_schemes(&self) -> Vec<String> {
        self.attempts.iter().map(|a| a.scheme.to_string()).collect()
    }
}

/// Where an I/O error happened; the same OS error means different things
/// during name resolution, connect, and request/response exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoPhase {
    Resolve,
    Connect,
    Exchange,
}

/// Map an I/O error into the taxonomy. `target` is the `host:port` being
/// contacted and is only used in the message.
pub fn classify_io(err: &io::Error, phase: IoPhase, target: &str) -> DiagnosticError {
    use io::ErrorKind as Io;

    match phase {
        IoPhase::Resolve => DiagnosticError::new(
            ErrorKind::DnsResolutionFailure,
            format!("cannot resolve {target}: {err}"),
        ),
        IoPhase::Connect => match err.kind() {
            Io::ConnectionRefused => DiagnosticError::new(
                ErrorKind::ConnectionRefused,
                format!("connection to {target} refused"),
            ),
            Io::TimedOut | Io::WouldBlock => DiagnosticError::new(
                ErrorKind::ConnectionTimeout,
                format!("connection to {target} timed out"),
            ),
            _ => DiagnosticError::new(
                ErrorKind::NetworkUnreachable,
                format!("cannot reach {target}: {err}"),
            ),
        },
        IoPhase::Exchange => match err.kind() {
            // SO_RCVTIMEO surfaces as WouldBlock on unix and TimedOut on windows.
            Io::TimedOut | Io::WouldBlock => DiagnosticError::new(
                ErrorKind::ConnectionTimeout,
                format!("no response from {target} within the timeout"),
            ),
            Io::NetworkUnreachable | Io::HostUnreachable => DiagnosticError::new(
                ErrorKind::NetworkUnreachable,
                format!("lost route to {target}: {err}"),
            ),
            Io::ConnectionReset
            | Io::ConnectionAborted
            | Io::BrokenPipe
            | Io::UnexpectedEof => DiagnosticError::protocol(format!(
                "connection closed by {target} before a complete response"
            ))
            .with_suggestion("server dropped the connection; check server logs and stream path"),
            _ => DiagnosticError::protocol(format!("I/O error talking to {target}: {err}")),
        },
    }
}

/// Convenience alias for `Result<T, DiagnosticError>`.
pub type Result<T> = std::result::Result<T, DiagnosticError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refused_connect_is_connection_refused() {
        let err = io::Error::from(io::ErrorKind::ConnectionRefused);
        let diag = classify_io(&err, IoPhase::Connect, "cam:554");
        assert_eq!(diag.kind, ErrorKind::ConnectionRefused);
        assert_eq!(
            diag.suggestion,
            "server not running or not accepting connections"
        );
    }

    #[test]
    fn read_timeout_is_connection_timeout() {
        let err = io::Error::from(io::ErrorKind::WouldBlock);
        let diag = classify_io(&err, IoPhase::Exchange, "cam:554");
        assert_eq!(diag.kind, ErrorKind::ConnectionTimeout);
    }

    #[test]
    fn resolve_phase_is_dns_failure_regardless_of_os_kind() {
        let err = io::Error::other("failed to lookup address information");
        let diag = classify_io(&err, IoPhase::Resolve, "nowhere.invalid:554");
        assert_eq!(diag.kind, ErrorKind::DnsResolutionFailure);
        assert_eq!(diag.suggestion, "check the RTSP URL hostname");
    }

    #[test]
    fn unreachable_connect_is_network_unreachable() {
        let err = io::Error::from(io::ErrorKind::NetworkUnreachable);
        let diag = classify_io(&err, IoPhase::Connect, "10.0.0.1:554");
        assert_eq!(diag.kind, ErrorKind::NetworkUnreachable);
    }

    #[test]
    fn reset_during_exchange_is_protocol_error() {
        let err = io::Error::from(io::ErrorKind::ConnectionReset);
        let diag = classify_io(&err, IoPhase::Exchange, "cam:554");
        assert_eq!(diag.kind, ErrorKind::ProtocolError);
    }

    #[test]
    fn authentication_required_lists_advertised_schemes() {
        let diag = DiagnosticError::authentication_required(&["Digest".to_string()]);
        assert_eq!(diag.kind, ErrorKind::AuthenticationRequired);
        assert!(diag.message.contains("Digest"));
        assert_eq!(diag.suggestion, "add username:password to the RTSP URL");
    }

    #[test]
    fn display_includes_kind_and_message() {
        let diag = DiagnosticError::protocol("empty SDP body");
        assert_eq!(diag.to_string(), "ProtocolError: empty SDP body");
    }
}
