//! DESCRIBE with authentication fallback.
//!
//! ```text
//! Unauthenticated ──200──────────────────────────────► Authenticated(None)
//!       │
//!       └──401──► ChallengeReceived ──► Authenticating(Digest) ──200──► Authenticated(Digest)
//!                                             │ 401
//!                                             ▼
//!                                       Authenticating(Basic) ───200──► Authenticated(Basic)
//!                                             │ 401
//!                                             ▼
//!                                          Failed
//! ```
//!
//! The negotiator owns no socket. It drives any [`RtspTransport`], which
//! stamps each request with the next `CSeq` of its own connection.

use crate::endpoint::RtspEndpoint;
use crate::error::{DiagnosticError, ErrorKind, Result};
use crate::protocol::{Method, RtspRequest, RtspResponse};

use super::{
    AuthAttemptResult, AuthChallenge, AuthMethod, AuthScheme, basic_authorization, digest,
    parse_challenges, sort_by_preference,
};

/// Request/response exchange over one RTSP connection.
///
/// Implementations assign the `CSeq` and `User-Agent` headers; callers only
/// describe the request. Every failure must already be classified.
pub trait RtspTransport {
    fn send(&mut self, request: RtspRequest) -> Result<RtspResponse>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NegotiationState {
    Unauthenticated,
    ChallengeReceived,
    Authenticating(AuthScheme),
    Authenticated(AuthMethod),
    Failed(ErrorKind),
}

/// Successful DESCRIBE outcome.
#[derive(Debug, Clone)]
pub struct Negotiated {
    /// The 200 OK response carrying the SDP body.
    pub response: RtspResponse,
    pub method: AuthMethod,
    pub attempts: Vec<AuthAttemptResult>,
}

/// Runs the DESCRIBE exchange for one endpoint.
pub struct AuthNegotiator<'a> {
    endpoint: &'a RtspEndpoint,
    state: NegotiationState,
    attempts: Vec<AuthAttemptResult>,
}

impl<'a> AuthNegotiator<'a> {
    pub fn new(endpoint: &'a RtspEndpoint) -> Self {
        AuthNegotiator {
            endpoint,
            state: NegotiationState::Unauthenticated,
            attempts: Vec::new(),
        }
    }

    pub fn state(&self) -> &NegotiationState {
        &self.state
    }

    /// Attempts made so far, in order.
    pub fn attempts(&self) -> &[AuthAttemptResult] {
        &self.attempts
    }

    /// Send DESCRIBE, answering a 401 with each advertised scheme in
    /// preference order until one is accepted.
    pub fn describe<T: RtspTransport + ?Sized>(&mut self, transport: &mut T) -> Result<Negotiated> {
        let uri = self.endpoint.request_uri().to_string();

        let response = match transport.send(RtspRequest::describe(&uri)) {
            Ok(response) => response,
            Err(e) => return Err(self.fail(e)),
        };

        match response.status_code {
            200 => {
                tracing::info!("no authentication required");
                self.state = NegotiationState::Authenticated(AuthMethod::None);
                Ok(Negotiated {
                    response,
                    method: AuthMethod::None,
                    attempts: Vec::new(),
                })
            }
            401 => self.handle_challenge(transport, &uri, response),
            _ => Err(self.fail(unexpected_status(&response))),
        }
    }

    fn handle_challenge<T: RtspTransport + ?Sized>(
        &mut self,
        transport: &mut T,
        uri: &str,
        response: RtspResponse,
    ) -> Result<Negotiated> {
        let mut challenges = parse_challenges(response.get_all("WWW-Authenticate"));

        if !self.endpoint.has_credentials() {
            let schemes: Vec<String> = challenges.iter().map(|c| c.scheme.to_string()).collect();
            tracing::warn!(schemes = ?schemes, "server requires authentication, no credentials in URL");
            return Err(self.fail(DiagnosticError::authentication_required(&schemes)));
        }

        self.state = NegotiationState::ChallengeReceived;

        if challenges.is_empty() {
            return Err(self.fail(DiagnosticError::new(
                ErrorKind::AuthenticationFailed,
                format!(
                    "server advertised 401 with no usable challenge ({})",
                    response.status_line()
                ),
            )));
        }

        sort_by_preference(&mut challenges);
        tracing::info!(
            schemes = ?challenges.iter().map(|c| c.scheme.to_string()).collect::<Vec<_>>(),
            "authentication required"
        );

        let mut last_response = response.status_line();

        for challenge in &challenges {
            let scheme = challenge.scheme.clone();

            let Some(authorization) = self.authorization_for(challenge, uri) else {
                tracing::warn!(%scheme, "skipping unsupported authentication scheme");
                self.attempts.push(AuthAttemptResult::unsupported(scheme));
                continue;
            };

            self.state = NegotiationState::Authenticating(scheme.clone());
            tracing::debug!(%scheme, "attempting authentication");

            let request = RtspRequest::describe(uri).add_header("Authorization", &authorization);
            let reply = match transport.send(request) {
                Ok(reply) => reply,
                Err(e) => return Err(self.fail(e)),
            };
            let status_line = reply.status_line();

            match reply.status_code {
                200 => {
                    let method = match scheme {
                        AuthScheme::Basic => AuthMethod::Basic,
                        _ => AuthMethod::Digest,
                    };
                    tracing::info!(%scheme, "authentication succeeded");
                    self.attempts
                        .push(AuthAttemptResult::succeeded(scheme, status_line));
                    self.state = NegotiationState::Authenticated(method);
                    return Ok(Negotiated {
                        response: reply,
                        method,
                        attempts: self.attempts.clone(),
                    });
                }
                401 => {
                    tracing::warn!(%scheme, status = %status_line, "authentication rejected");
                    let error = format!("{scheme} authentication failed: invalid credentials");
                    self.attempts
                        .push(AuthAttemptResult::failed(scheme, status_line.clone(), error));
                    last_response = status_line;
                }
                _ => {
                    let error = format!("{scheme} authentication failed: {status_line}");
                    self.attempts
                        .push(AuthAttemptResult::failed(scheme, status_line, error));
                    return Err(self.fail(unexpected_status(&reply)));
                }
            }
        }

        let err = DiagnosticError::authentication_failed(self.attempts.clone(), &last_response);
        Err(self.fail(err))
    }

    /// `Authorization` header value for a supported challenge, `None` for
    /// schemes this client cannot answer.
    fn authorization_for(&self, challenge: &AuthChallenge, uri: &str) -> Option<String> {
        let (user, pass) = (self.endpoint.username(), self.endpoint.password());
        match challenge.scheme {
            AuthScheme::Digest => Some(digest::authorization(
                user,
                pass,
                Method::Describe.as_str(),
                uri,
                challenge,
            )),
            AuthScheme::Basic => Some(basic_authorization(user, pass)),
            AuthScheme::Other(_) => None,
        }
    }

    /// Record the terminal state and attach the attempt log to the error.
    fn fail(&mut self, mut err: DiagnosticError) -> DiagnosticError {
        self.state = NegotiationState::Failed(err.kind);
        if err.attempts.is_empty() {
            err.attempts = self.attempts.clone();
        }
        err
    }
}

/// Anything other than 200/401 in answer to DESCRIBE.
fn unexpected_status(response: &RtspResponse) -> DiagnosticError {
    let err = DiagnosticError::protocol(format!(
        "unexpected server response: {}",
        response.status_line()
    ));
    match response.status_code {
        403 => err.with_suggestion("credentials are valid but not allowed to view this stream"),
        404 => err.with_suggestion("check the stream path in the RTSP URL"),
        454 | 455 | 459 => err.with_suggestion("server rejected the request; check the stream path"),
        500..=599 => err.with_suggestion("server error; retry later or check server logs"),
        _ => err,
    }
}
