//! Network transport for RTSP signaling.
//!
//! One blocking TCP connection per analysis ([`tcp::Connection`]), opened,
//! used for OPTIONS and the DESCRIBE round-trips, and closed within the
//! call. No state is shared between connections.

pub mod tcp;

pub use tcp::Connection;
