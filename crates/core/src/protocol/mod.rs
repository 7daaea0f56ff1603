//! RTSP protocol messages (RFC 2326) and SDP parsing (RFC 4566).
//!
//! This module handles the text-based side of the exchange: building the
//! requests the client sends, parsing the responses it receives, and turning
//! the DESCRIBE body into a [`sdp::SessionDescription`].
//!
//! ## RTSP message format (RFC 2326 §4)
//!
//! RTSP messages follow HTTP/1.1 syntax with a different method set:
//!
//! ```text
//! DESCRIBE rtsp://camera/stream RTSP/1.0\r\n
//! CSeq: 2\r\n
//! User-Agent: rtsp-probe/0.1\r\n
//! Accept: application/sdp\r\n
//! \r\n
//! ```
//!
//! ## Methods issued
//!
//! | Method | RFC section | Purpose |
//! |--------|-------------|---------|
//! | OPTIONS | §10.1 | Capability discovery (`Public` header) |
//! | DESCRIBE | §10.2 | Retrieve SDP session description |
//!
//! SETUP, PLAY and TEARDOWN are never sent: this crate describes streams,
//! it does not play them.

pub mod request;
pub mod response;
pub mod sdp;

pub use request::{Method, RtspRequest};
pub use response::RtspResponse;
pub use sdp::{MediaDescription, SessionDescription, parse_sdp};
