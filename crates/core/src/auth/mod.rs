//! RTSP authentication (RFC 2326 §12.5 / RFC 2617).
//!
//! A server that wants credentials answers DESCRIBE with `401 Unauthorized`
//! and one or more `WWW-Authenticate` headers. Each header may carry several
//! challenges:
//!
//! ```text
//! WWW-Authenticate: Digest realm="IP Camera", nonce="a1b2c3", qop="auth"
//! WWW-Authenticate: Basic realm="IP Camera"
//! WWW-Authenticate: Basic realm="x", Digest realm="x", nonce="y"
//! ```
//!
//! [`parse_challenges`] turns all of them into an ordered list of
//! [`AuthChallenge`]s, [`sort_by_preference`] puts the most secure supported
//! scheme first, and the [`negotiator`] walks that list.
//!
//! | Scheme | Supported | Header |
//! |--------|-----------|--------|
//! | Digest | yes (MD5) | [`digest::authorization`] |
//! | Basic | yes | [`basic_authorization`] |
//! | anything else | recorded, never sent | none |

pub mod digest;
pub mod negotiator;

use std::collections::HashMap;
use std::fmt;

use base64::prelude::{BASE64_STANDARD, Engine as _};
use serde::{Serialize, Serializer};

pub use negotiator::{AuthNegotiator, Negotiated, NegotiationState, RtspTransport};

/// Authentication scheme named by a challenge.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AuthScheme {
    Digest,
    Basic,
    /// Any scheme this client cannot answer (NTLM, Negotiate, Bearer, ...),
    /// kept with its spelling from the header.
    Other(String),
}

impl AuthScheme {
    pub fn from_token(token: &str) -> Self {
        if token.eq_ignore_ascii_case("digest") {
            AuthScheme::Digest
        } else if token.eq_ignore_ascii_case("basic") {
            AuthScheme::Basic
        } else {
            AuthScheme::Other(token.to_string())
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, AuthScheme::Other(_))
    }

    /// Lower ranks are tried first: Digest, then Basic, then the rest.
    pub fn preference(&self) -> u8 {
        match self {
            AuthScheme::Digest => 0,
            AuthScheme::Basic => 1,
            AuthScheme::Other(_) => 2,
        }
    }
}

impl fmt::Display for AuthScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthScheme::Digest => f.write_str("Digest"),
            AuthScheme::Basic => f.write_str("Basic"),
            AuthScheme::Other(name) => f.write_str(name),
        }
    }
}

impl Serialize for AuthScheme {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// The method that finally produced a 200 OK for DESCRIBE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AuthMethod {
    None,
    Basic,
    Digest,
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMethod::None => f.write_str("None"),
            AuthMethod::Basic => f.write_str("Basic"),
            AuthMethod::Digest => f.write_str("Digest"),
        }
    }
}

/// One challenge from a `WWW-Authenticate` header.
///
/// Parameter names are stored lower-cased; values are unquoted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChallenge {
    pub scheme: AuthScheme,
    pub params: HashMap<String, String>,
}

impl AuthChallenge {
    pub fn new(scheme: AuthScheme) -> Self {
        AuthChallenge {
            scheme,
            params: HashMap::new(),
        }
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn realm(&self) -> &str {
        self.param("realm").unwrap_or("")
    }
}

/// Outcome of one authentication attempt, kept for error reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthAttemptResult {
    pub scheme: AuthScheme,
    pub success: bool,
    /// Status line of the server's answer; `None` when nothing was sent.
    pub status_line: Option<String>,
    pub error: Option<String>,
}

impl AuthAttemptResult {
    pub fn succeeded(scheme: AuthScheme, status_line: String) -> Self {
        AuthAttemptResult {
            scheme,
            success: true,
            status_line: Some(status_line),
            error: None,
        }
    }

    pub fn failed(scheme: AuthScheme, status_line: String, error: String) -> Self {
        AuthAttemptResult {
            scheme,
            success: false,
            status_line: Some(status_line),
            error: Some(error),
        }
    }

    /// A scheme the server offered that this client cannot answer.
    pub fn unsupported(scheme: AuthScheme) -> Self {
        let error = format!("{scheme} authentication is not supported");
        AuthAttemptResult {
            scheme,
            success: false,
            status_line: None,
            error: Some(error),
        }
    }
}

/// Parse every challenge out of a set of `WWW-Authenticate` header values,
/// preserving the order the server listed them in.
pub fn parse_challenges<'a>(values: impl IntoIterator<Item = &'a str>) -> Vec<AuthChallenge> {
    let mut challenges = Vec::new();
    for value in values {
        parse_header_value(value, &mut challenges);
    }
    challenges
}

/// Stable sort: Digest before Basic before unsupported schemes; ties keep
/// server order.
pub fn sort_by_preference(challenges: &mut [AuthChallenge]) {
    challenges.sort_by_key(|c| c.scheme.preference());
}

/// `Basic base64(user:pass)` (RFC 2617 §2).
pub fn basic_authorization(username: &str, password: &str) -> String {
    format!(
        "Basic {}",
        BASE64_STANDARD.encode(format!("{username}:{password}"))
    )
}

/// Split one header value into challenges.
///
/// Grammar (RFC 2617 §1.2): `challenge = scheme 1*SP 1#auth-param`. Commas
/// separate both parameters and challenges, so a bare token that is not
/// followed by `=` starts a new challenge. Parameters separated only by
/// whitespace are accepted as well; some cameras send them that way.
fn parse_header_value(value: &str, out: &mut Vec<AuthChallenge>) {
    let bytes = value.as_bytes();
    let len = bytes.len();
    let is_sep = |b: u8| b == b',' || b.is_ascii_whitespace();

    let mut pos = 0;
    let mut current: Option<AuthChallenge> = None;

    loop {
        while pos < len && is_sep(bytes[pos]) {
            pos += 1;
        }
        if pos >= len {
            break;
        }

        let start = pos;
        while pos < len && !is_sep(bytes[pos]) && bytes[pos] != b'=' {
            pos += 1;
        }
        let token = &value[start..pos];

        let mut after = pos;
        while after < len && bytes[after].is_ascii_whitespace() {
            after += 1;
        }

        if after < len && bytes[after] == b'=' {
            let (param_value, next) = read_param_value(value, after + 1);
            pos = next;
            match current.as_mut() {
                Some(challenge) if !token.is_empty() => {
                    challenge
                        .params
                        .insert(token.to_ascii_lowercase(), param_value);
                }
                _ => tracing::debug!(token, "ignoring auth parameter outside a challenge"),
            }
        } else {
            if let Some(done) = current.take() {
                out.push(done);
            }
            current = Some(AuthChallenge::new(AuthScheme::from_token(token)));
        }
    }

    if let Some(done) = current {
        out.push(done);
    }
}

/// Read a quoted-string or token starting at `pos` (after the `=`).
/// Returns the unquoted value and the index just past it.
fn read_param_value(value: &str, mut pos: usize) -> (String, usize) {
    let bytes = value.as_bytes();
    let len = bytes.len();

    while pos < len && bytes[pos].is_ascii_whitespace() {
        pos += 1;
    }

    if pos < len && bytes[pos] == b'"' {
        let mut out = Vec::new();
        pos += 1;
        while pos < len {
            match bytes[pos] {
                b'\\' if pos + 1 < len => {
                    out.push(bytes[pos + 1]);
                    pos += 2;
                }
                b'"' => {
                    pos += 1;
                    break;
                }
                b => {
                    out.push(b);
                    pos += 1;
                }
            }
        }
        return (String::from_utf8_lossy(&out).into_owned(), pos);
    }

    let start = pos;
    while pos < len && bytes[pos] != b',' && !bytes[pos].is_ascii_whitespace() {
        pos += 1;
    }
    (value[start..pos].to_string(), pos)
}
