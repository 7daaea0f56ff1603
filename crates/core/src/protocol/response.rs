use crate::error::{DiagnosticError, Result};

/// A parsed RTSP response (RFC 2326 §7).
///
/// RTSP responses follow HTTP/1.1 syntax:
///
/// ```text
/// RTSP-Version SP Status-Code SP Reason-Phrase CRLF
/// *(Header: Value CRLF)
/// CRLF
/// [body]
/// ```
///
/// Header lookup is case-insensitive per RFC 2326 §4.2. Repeated headers
/// (several `WWW-Authenticate` lines, for instance) are all kept, in order.
#[derive(Debug, Clone)]
pub struct RtspResponse {
    /// Protocol version (expected: `RTSP/1.0`).
    pub version: String,
    pub status_code: u16,
    pub reason: String,
    /// Headers as ordered (name, value) pairs, names stored as received.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RtspResponse {
    /// Parse a complete response: status line, headers, blank line and
    /// (already fully received) body.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        if raw.is_empty() {
            return Err(DiagnosticError::protocol("empty response from server"));
        }

        let (head_len, body_start) = find_header_end(raw)
            .ok_or_else(|| DiagnosticError::protocol("response has no header terminator"))?;

        let head = String::from_utf8_lossy(&raw[..head_len]);
        let mut lines = head.lines();

        let status_line = lines
            .next()
            .ok_or_else(|| DiagnosticError::protocol("response has no status line"))?;

        let mut parts = status_line.splitn(3, ' ');
        let version = parts.next().unwrap_or("").trim().to_string();
        let code = parts.next().unwrap_or("").trim();
        let reason = parts.next().unwrap_or("").trim().to_string();

        if !version.starts_with("RTSP/") {
            return Err(DiagnosticError::protocol(format!(
                "not an RTSP response: {status_line}"
            )));
        }
        if version != "RTSP/1.0" {
            tracing::warn!(version, "server replied with non-RTSP/1.0 version");
        }

        let status_code = code.parse::<u16>().map_err(|_| {
            DiagnosticError::protocol(format!("invalid status line: {status_line}"))
        })?;

        let mut headers: Vec<(String, String)> = Vec::new();

        for line in lines {
            if line.is_empty() {
                break;
            }

            // Obsolete line folding (RFC 2616 §2.2): continuation of the previous header.
            if line.starts_with([' ', '\t']) {
                if let Some((_, value)) = headers.last_mut() {
                    value.push(' ');
                    value.push_str(line.trim());
                }
                continue;
            }

            match line.split_once(':') {
                Some((name, value)) => {
                    headers.push((name.trim().to_string(), value.trim().to_string()));
                }
                None => tracing::debug!(line, "ignoring malformed response header"),
            }
        }

        Ok(RtspResponse {
            version,
            status_code,
            reason,
            headers,
            body: raw[body_start..].to_vec(),
        })
    }

    /// First value of a header (case-insensitive).
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Every value of a possibly repeated header, in order received.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Returns the CSeq header value (RFC 2326 §12.17).
    pub fn cseq(&self) -> Option<&str> {
        self.get_header("CSeq")
    }

    /// The status line as received, e.g. `RTSP/1.0 401 Unauthorized`.
    pub fn status_line(&self) -> String {
        if self.reason.is_empty() {
            format!("{} {}", self.version, self.status_code)
        } else {
            format!("{} {} {}", self.version, self.status_code, self.reason)
        }
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }
}

/// Locate the end of the header block.
///
/// Returns `(head_len, body_start)`: the header text is `buf[..head_len]` and
/// the body begins at `body_start`. Accepts `\r\n\r\n` and, from lenient
/// servers, a bare `\n\n`.
pub fn find_header_end(buf: &[u8]) -> Option<(usize, usize)> {
    if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
        return Some((pos, pos + 4));
    }
    buf.windows(2)
        .position(|w| w == b"\n\n")
        .map(|pos| (pos, pos + 2))
}

/// `Content-Length` (RFC 2326 §12.14) from a raw header block, if present
/// and well-formed.
pub fn content_length(head: &[u8]) -> Option<usize> {
    let text = String::from_utf8_lossy(head);
    text.lines().skip(1).find_map(|line| {
        let (name, value) = line.split_once(':')?;
        if name.trim().eq_ignore_ascii_case("Content-Length") {
            value.trim().parse::<usize>().ok()
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn parse_ok_with_body() {
        let raw = b"RTSP/1.0 200 OK\r\nCSeq: 2\r\nContent-Type: application/sdp\r\nContent-Length: 5\r\n\r\nv=0\r\n";
        let resp = RtspResponse::parse(raw).unwrap();
        assert_eq!(resp.status_code, 200);
        assert_eq!(resp.reason, "OK");
        assert_eq!(resp.cseq(), Some("2"));
        assert_eq!(resp.get_header("content-type"), Some("application/sdp"));
        assert_eq!(resp.body_text(), "v=0\r\n");
        assert!(resp.is_success());
    }

    #[test]
    fn repeated_www_authenticate_headers_are_kept() {
        let raw = b"RTSP/1.0 401 Unauthorized\r\nCSeq: 2\r\n\
                    WWW-Authenticate: Digest realm=\"cam\", nonce=\"abc\"\r\n\
                    www-authenticate: Basic realm=\"cam\"\r\n\r\n";
        let resp = RtspResponse::parse(raw).unwrap();
        let values: Vec<&str> = resp.get_all("WWW-Authenticate").collect();
        assert_eq!(values.len(), 2);
        assert!(values[0].starts_with("Digest"));
        assert!(values[1].starts_with("Basic"));
        assert_eq!(resp.status_line(), "RTSP/1.0 401 Unauthorized");
    }

    #[test]
    fn rejects_non_rtsp_status_line() {
        let err = RtspResponse::parse(b"HTTP/1.1 200 OK\r\n\r\n").unwrap_err();
        assert_eq!(err.kind, ErrorKind::ProtocolError);
    }

    #[test]
    fn rejects_non_numeric_status() {
        assert!(RtspResponse::parse(b"RTSP/1.0 abc OK\r\n\r\n").is_err());
    }

    #[test]
    fn rejects_empty() {
        assert!(RtspResponse::parse(b"").is_err());
    }

    #[test]
    fn folded_header_is_joined() {
        let raw = b"RTSP/1.0 401 Unauthorized\r\nWWW-Authenticate: Digest realm=\"x\",\r\n nonce=\"y\"\r\n\r\n";
        let resp = RtspResponse::parse(raw).unwrap();
        assert_eq!(
            resp.get_header("WWW-Authenticate"),
            Some("Digest realm=\"x\", nonce=\"y\"")
        );
    }

    #[test]
    fn header_end_and_content_length() {
        let raw = b"RTSP/1.0 200 OK\r\nContent-Length: 42\r\n\r\nbody";
        let (head_len, body_start) = find_header_end(raw).unwrap();
        assert_eq!(&raw[body_start..], b"body");
        assert_eq!(content_length(&raw[..head_len]), Some(42));
        assert_eq!(content_length(b"RTSP/1.0 200 OK\r\nCSeq: 1"), None);
    }

    #[test]
    fn bare_newline_terminator() {
        let raw = b"RTSP/1.0 200 OK\nCSeq: 1\n\n";
        let resp = RtspResponse::parse(raw).unwrap();
        assert_eq!(resp.cseq(), Some("1"));
        assert!(resp.body.is_empty());
    }
}
