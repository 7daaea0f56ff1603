//! Digest access authentication (RFC 2617 §3), MD5 only.
//!
//! ```text
//! HA1      = MD5(username:realm:password)
//! HA2      = MD5(method:uri)
//! response = MD5(HA1:nonce:nc:cnonce:qop:HA2)   when the challenge offers qop=auth
//! response = MD5(HA1:nonce:HA2)                 otherwise (RFC 2069)
//! ```
//!
//! Each challenge is answered exactly once, so the nonce count is always
//! `00000001` and no counter is kept between attempts.

use md5::{Digest, Md5};
use rand::RngExt;

use super::AuthChallenge;

/// Nonce count for the single request made per challenge.
pub const NONCE_COUNT: &str = "00000001";

/// Inputs to the response computation, borrowed from the endpoint and the
/// challenge.
#[derive(Debug, Clone, Copy)]
pub struct DigestParams<'a> {
    pub username: &'a str,
    pub password: &'a str,
    pub realm: &'a str,
    pub nonce: &'a str,
    pub method: &'a str,
    pub uri: &'a str,
    /// Raw `qop` option list from the challenge, e.g. `auth,auth-int`.
    pub qop: Option<&'a str>,
    pub algorithm: Option<&'a str>,
}

/// A computed digest response plus the values that must be echoed in the
/// `Authorization` header alongside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestResponse {
    pub response: String,
    /// `Some` when the qop=auth form was used.
    pub cnonce: Option<String>,
}

impl DigestParams<'_> {
    /// Whether the challenge offers `qop=auth` (token match, not substring).
    pub fn offers_auth_qop(&self) -> bool {
        self.qop
            .is_some_and(|qop| qop.split(',').any(|q| q.trim().eq_ignore_ascii_case("auth")))
    }
}

/// Compute the digest response, generating a fresh client nonce when the
/// qop=auth form applies.
pub fn compute_response(params: &DigestParams<'_>) -> DigestResponse {
    check_algorithm(params.algorithm);
    let cnonce = params.offers_auth_qop().then(generate_cnonce);
    compute_response_with_cnonce(params, cnonce.as_deref())
}

/// Deterministic core of [`compute_response`]. `cnonce` is only used when
/// the challenge offers qop=auth.
pub fn compute_response_with_cnonce(
    params: &DigestParams<'_>,
    cnonce: Option<&str>,
) -> DigestResponse {
    let ha1 = md5_hex(&[params.username, params.realm, params.password]);
    let ha2 = md5_hex(&[params.method, params.uri]);

    match cnonce.filter(|_| params.offers_auth_qop()) {
        Some(cnonce) => DigestResponse {
            response: md5_hex(&[
                ha1.as_str(),
                params.nonce,
                NONCE_COUNT,
                cnonce,
                "auth",
                ha2.as_str(),
            ]),
            cnonce: Some(cnonce.to_string()),
        },
        None => DigestResponse {
            response: md5_hex(&[ha1.as_str(), params.nonce, ha2.as_str()]),
            cnonce: None,
        },
    }
}

/// Build the full `Authorization` header value answering `challenge`.
///
/// `opaque` is echoed verbatim. `algorithm` is echoed only as
/// `algorithm=MD5` and only when the challenge named MD5: for any other
/// algorithm the response is still an MD5 digest, so claiming that
/// algorithm in the header would be false and it is omitted.
pub fn authorization(
    username: &str,
    password: &str,
    method: &str,
    uri: &str,
    challenge: &AuthChallenge,
) -> String {
    let params = DigestParams {
        username,
        password,
        realm: challenge.realm(),
        nonce: challenge.param("nonce").unwrap_or(""),
        method,
        uri,
        qop: challenge.param("qop"),
        algorithm: challenge.param("algorithm"),
    };
    let digest = compute_response(&params);

    let mut header = format!(
        r#"Digest username="{}", realm="{}", nonce="{}", uri="{}", response="{}""#,
        quote_escape(username),
        quote_escape(params.realm),
        quote_escape(params.nonce),
        uri,
        digest.response
    );
    if let Some(cnonce) = &digest.cnonce {
        header.push_str(&format!(r#", qop=auth, nc={NONCE_COUNT}, cnonce="{cnonce}""#));
    }
    if let Some(opaque) = challenge.param("opaque") {
        header.push_str(&format!(r#", opaque="{}""#, quote_escape(opaque)));
    }
    if params.algorithm.is_some_and(|a| a.eq_ignore_ascii_case("MD5")) {
        header.push_str(", algorithm=MD5");
    }
    header
}

/// 8 hex characters of client nonce.
pub fn generate_cnonce() -> String {
    format!("{:08x}", rand::rng().random::<u32>())
}

/// Lower-case hex MD5 of the parts joined with `:`.
pub fn md5_hex(parts: &[&str]) -> String {
    let mut hasher = Md5::new();
    hasher.update(parts.join(":"));
    format!("{:x}", hasher.finalize())
}

fn check_algorithm(algorithm: Option<&str>) {
    if let Some(algorithm) = algorithm
        && !algorithm.eq_ignore_ascii_case("MD5")
    {
        tracing::warn!(algorithm, "unsupported digest algorithm, using MD5");
    }
}

fn quote_escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::parse_challenges;

    fn params<'a>(qop: Option<&'a str>) -> DigestParams<'a> {
        DigestParams {
            username: "Mufasa",
            password: "Circle Of Life",
            realm: "testrealm@host.com",
            nonce: "dcd98b7102dd2f0e8b11d0f600bfb0c093",
            method: "GET",
            uri: "/dir/index.html",
            qop,
            algorithm: None,
        }
    }

    #[test]
    fn md5_of_empty_string() {
        assert_eq!(md5_hex(&[""]), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn rfc2617_worked_example() {
        // RFC 2617 §3.5.
        let digest =
            compute_response_with_cnonce(&params(Some("auth,auth-int")), Some("0a4f113b"));
        assert_eq!(digest.response, "6629fae49393a05397450978507c4ef1");
        assert_eq!(digest.cnonce.as_deref(), Some("0a4f113b"));
    }

    #[test]
    fn legacy_response_without_qop() {
        let p = DigestParams {
            username: "user",
            password: "pass",
            realm: "x",
            nonce: "y",
            method: "DESCRIBE",
            uri: "rtsp://cam/live",
            qop: None,
            algorithm: None,
        };
        let expected = md5_hex(&[
            md5_hex(&["user", "x", "pass"]).as_str(),
            "y",
            md5_hex(&["DESCRIBE", "rtsp://cam/live"]).as_str(),
        ]);
        let digest = compute_response(&p);
        assert_eq!(digest.response, expected);
        assert_eq!(digest.cnonce, None);
    }

    #[test]
    fn auth_int_only_uses_legacy_form() {
        let p = params(Some("auth-int"));
        assert!(!p.offers_auth_qop());
        assert_eq!(compute_response(&p).cnonce, None);
    }

    #[test]
    fn cnonce_is_eight_hex_chars() {
        let cnonce = generate_cnonce();
        assert_eq!(cnonce.len(), 8);
        assert!(cnonce.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn non_md5_algorithm_still_computes_md5() {
        let mut p = params(None);
        let plain = compute_response(&p).response;
        p.algorithm = Some("SHA-256");
        assert_eq!(compute_response(&p).response, plain);
    }

    #[test]
    fn header_with_qop_and_opaque() {
        let challenges = parse_challenges([
            r#"Digest realm="cam", nonce="n1", qop="auth", opaque="op", algorithm=MD5"#,
        ]);
        let header = authorization("admin", "pw", "DESCRIBE", "rtsp://cam/live", &challenges[0]);
        assert!(header.starts_with(r#"Digest username="admin", realm="cam", nonce="n1", uri="rtsp://cam/live", response=""#));
        assert!(header.contains(", qop=auth, nc=00000001, cnonce=\""));
        assert!(header.contains(r#", opaque="op""#));
        assert!(header.ends_with(", algorithm=MD5"));
    }

    #[test]
    fn non_md5_algorithm_is_not_echoed() {
        let challenges = parse_challenges([r#"Digest realm="x", nonce="y", algorithm=SHA-256"#]);
        let header = authorization("user", "pass", "DESCRIBE", "rtsp://cam/live", &challenges[0]);
        assert!(!header.contains("algorithm="));
    }

    #[test]
    fn header_without_qop() {
        let challenges = parse_challenges([r#"Digest realm="x", nonce="y""#]);
        let header = authorization("user", "pass", "DESCRIBE", "rtsp://cam/live", &challenges[0]);
        let expected = md5_hex(&[
            md5_hex(&["user", "x", "pass"]).as_str(),
            "y",
            md5_hex(&["DESCRIBE", "rtsp://cam/live"]).as_str(),
        ]);
        assert_eq!(
            header,
            format!(
                r#"Digest username="user", realm="x", nonce="y", uri="rtsp://cam/live", response="{expected}""#
            )
        );
    }
}
