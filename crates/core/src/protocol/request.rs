use std::fmt;

/// RTSP methods this client issues (RFC 2326 §10).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// §10.1 capability discovery.
    Options,
    /// §10.2 session description retrieval.
    Describe,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Options => "OPTIONS",
            Method::Describe => "DESCRIBE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An outgoing RTSP request (RFC 2326 §6).
///
/// Serializes to the standard text format:
///
/// ```text
/// DESCRIBE rtsp://camera/stream RTSP/1.0\r\n
/// CSeq: 2\r\n
/// User-Agent: rtsp-probe/0.1\r\n
/// Accept: application/sdp\r\n
/// \r\n
/// ```
///
/// Uses a builder pattern: chain [`add_header`](Self::add_header), then call
/// [`serialize`](Self::serialize) with the sequence number. `CSeq` is not a
/// header of the builder because it belongs to the connection that sends the
/// request (see [`Connection`](crate::transport::tcp::Connection)).
#[must_use]
#[derive(Debug, Clone)]
pub struct RtspRequest {
    pub method: Method,
    pub uri: String,
    pub headers: Vec<(String, String)>,
}

impl RtspRequest {
    pub fn new(method: Method, uri: &str) -> Self {
        RtspRequest {
            method,
            uri: uri.to_string(),
            headers: Vec::new(),
        }
    }

    /// OPTIONS request (§10.1).
    pub fn options(uri: &str) -> Self {
        Self::new(Method::Options, uri)
    }

    /// DESCRIBE request asking for an SDP body (§10.2).
    pub fn describe(uri: &str) -> Self {
        Self::new(Method::Describe, uri).add_header("Accept", "application/sdp")
    }

    pub fn add_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Look up a header value by name (case-insensitive, per RFC 2326 §4.2).
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Serialize to the RTSP text wire format.
    ///
    /// `CSeq` (§12.17) comes first, then `User-Agent` (§12.41), then the
    /// caller-supplied headers in insertion order.
    pub fn serialize(&self, cseq: u32, user_agent: &str) -> String {
        let mut request = format!("{} {} RTSP/1.0\r\n", self.method, self.uri);
        request.push_str(&format!("CSeq: {}\r\n", cseq));
        request.push_str(&format!("User-Agent: {}\r\n", user_agent));

        for (name, value) in &self.headers {
            request.push_str(&format!("{}: {}\r\n", name, value));
        }

        request.push_str("\r\n");
        request
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_describe() {
        let req = RtspRequest::describe("rtsp://cam/live");
        let s = req.serialize(2, "rtsp-probe/0.1");
        assert!(s.starts_with("DESCRIBE rtsp://cam/live RTSP/1.0\r\n"));
        assert!(s.contains("CSeq: 2\r\n"));
        assert!(s.contains("User-Agent: rtsp-probe/0.1\r\n"));
        assert!(s.contains("Accept: application/sdp\r\n"));
        assert!(!s.contains("Authorization"));
        assert!(s.ends_with("\r\n\r\n"));
    }

    #[test]
    fn serialize_options_has_no_accept() {
        let s = RtspRequest::options("rtsp://cam/live").serialize(1, "ua");
        assert!(s.starts_with("OPTIONS rtsp://cam/live RTSP/1.0\r\n"));
        assert!(!s.contains("Accept:"));
    }

    #[test]
    fn authorization_header_is_carried() {
        let req = RtspRequest::describe("rtsp://cam/live").add_header("Authorization", "Basic YTpi");
        assert_eq!(req.get_header("authorization"), Some("Basic YTpi"));
        let s = req.serialize(3, "ua");
        assert!(s.contains("Authorization: Basic YTpi\r\n"));

        // CSeq precedes caller headers.
        let cseq_idx = s.find("CSeq:").expect("CSeq present");
        let auth_idx = s.find("Authorization:").expect("Authorization present");
        assert!(cseq_idx < auth_idx);
    }
}
