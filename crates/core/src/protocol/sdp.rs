//! SDP (Session Description Protocol) parsing (RFC 4566 / RFC 8866).
//!
//! Turns the body of a DESCRIBE response into a [`SessionDescription`]. A
//! typical camera body:
//!
//! ```text
//! v=0                                          ← protocol version (required first)
//! o=- 1 1 IN IP4 192.168.1.10                  ← origin (ignored)
//! s=Media Presentation                          ← session title
//! i=Front door                                  ← session description
//! a=tool:LIVE555 Streaming Media v2020.01.01    ← server software
//! m=video 0 RTP/AVP 96                          ← media block starts
//! b=AS:4096                                     ← bitrate, kbps
//! a=rtpmap:96 H264/90000                        ← codec / clock rate
//! a=framerate:25                                ← video frame rate
//! a=fmtp:96 packetization-mode=1;profile-level-id=640028
//! m=audio 0 RTP/AVP 97
//! a=rtpmap:97 MPEG4-GENERIC/16000/1
//! a=fmtp:97 streamtype=5;profile=1;config=1408
//! ```
//!
//! The parser is a single forward pass with a "current media" cursor.
//! `s=`, `i=` and `a=tool:` only count before the first `m=` line; `b=`,
//! `a=rtpmap`, `a=framerate`, `a=fmtp` and `a=control` apply to the media
//! block they follow. Unrecognized lines are skipped.

use serde::Serialize;

use crate::auth::AuthMethod;
use crate::error::{DiagnosticError, Result};

/// One `m=` block.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MediaDescription {
    /// `video`, `audio`, or whatever the `m=` line named. Never empty.
    #[serde(rename = "type")]
    pub media_type: String,
    pub port: Option<u16>,
    /// Transport protocol, e.g. `RTP/AVP`.
    pub protocol: Option<String>,
    /// Format list from the `m=` line (RTP payload types for RTP/AVP).
    pub formats: Vec<String>,
    pub payload_type: Option<u8>,
    /// Encoding name exactly as the server wrote it in `a=rtpmap`.
    pub encoding_name: Option<String>,
    /// Normalized codec label, e.g. `H.264`, `AAC`, `G.711 μ-law`.
    pub codec: Option<String>,
    /// RTP clock rate in Hz.
    pub clock_rate: Option<u32>,
    pub channels: Option<u16>,
    /// `b=AS:` value in kbps.
    pub bitrate_kbps: Option<u32>,
    pub framerate: Option<f64>,
    /// `profile-level-id` for video, `profile` for audio.
    pub profile: Option<String>,
    /// Audio-specific config (`config=` in AAC fmtp).
    pub config: Option<String>,
    /// Raw `a=fmtp` parameter string.
    pub format_parameters: Option<String>,
    /// `a=control` track URL.
    pub control: Option<String>,
}

impl MediaDescription {
    fn new(media_type: &str) -> Self {
        MediaDescription {
            media_type: media_type.to_string(),
            ..Default::default()
        }
    }

    pub fn is_video(&self) -> bool {
        self.media_type.eq_ignore_ascii_case("video")
    }

    pub fn is_audio(&self) -> bool {
        self.media_type.eq_ignore_ascii_case("audio")
    }

    /// Clock rate formatted for reports, e.g. `90000 Hz`.
    pub fn clock_rate_label(&self) -> Option<String> {
        self.clock_rate.map(|rate| format!("{rate} Hz"))
    }

    /// Bitrate formatted for reports, e.g. `4096 kbps`.
    pub fn bitrate_label(&self) -> Option<String> {
        self.bitrate_kbps.map(|kbps| format!("{kbps} kbps"))
    }

    /// The payload type the `m=` line lists first, which is the one the
    /// server prefers.
    fn preferred_payload(&self) -> Option<u8> {
        self.formats.first().and_then(|f| f.parse().ok())
    }

    fn apply_rtpmap(&mut self, value: &str) {
        let Some((pt, encoding)) = value.trim().split_once(char::is_whitespace) else {
            tracing::debug!(value, "ignoring malformed rtpmap");
            return;
        };
        let Ok(pt) = pt.parse::<u8>() else {
            tracing::debug!(value, "ignoring rtpmap with invalid payload type");
            return;
        };

        // Several rtpmaps in one block: first wins, unless a later one names
        // the preferred payload type.
        let preferred = self.preferred_payload();
        if self.encoding_name.is_some() && (Some(pt) != preferred || self.payload_type == preferred)
        {
            return;
        }

        let mut parts = encoding.trim().split('/');
        let name = parts.next().unwrap_or("").trim();
        if name.is_empty() {
            return;
        }
        let clock_rate = parts.next().and_then(|r| r.trim().parse::<u32>().ok());
        let channels = parts.next().and_then(|c| c.trim().parse::<u16>().ok());

        let codec = codec_label(name);
        if codec == "H.265" {
            tracing::info!(payload_type = pt, "H.265/HEVC video detected");
        } else {
            tracing::debug!(payload_type = pt, %codec, "codec detected");
        }

        self.payload_type = Some(pt);
        self.encoding_name = Some(name.to_string());
        self.codec = Some(codec);
        self.clock_rate = clock_rate;
        self.channels = channels;
    }

    fn apply_fmtp(&mut self, value: &str) {
        let (pt, params) = match value.trim().split_once(char::is_whitespace) {
            Some((pt, params)) => (pt.parse::<u8>().ok(), params.trim()),
            None => (None, ""),
        };
        if self.format_parameters.is_some() && pt != self.payload_type {
            return;
        }
        // This fmtp now owns the derived fields; drop any left by an earlier one.
        self.format_parameters = Some(params.to_string());
        self.profile = None;
        self.config = None;

        for param in params.split(';') {
            let Some((key, val)) = param.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let val = val.trim().to_string();

            if self.is_video() {
                if key.eq_ignore_ascii_case("profile-level-id") {
                    self.profile = Some(val);
                }
            } else if self.is_audio() {
                if key.eq_ignore_ascii_case("config") {
                    self.config = Some(val);
                } else if key.eq_ignore_ascii_case("profile") {
                    self.profile = Some(val);
                }
            }
        }
    }

    /// Fill codec details from the RFC 3551 static payload table when the
    /// block never named its encoding via `a=rtpmap`.
    fn apply_static_payload(&mut self) {
        if self.codec.is_some() {
            return;
        }
        let Some(pt) = self.preferred_payload() else {
            return;
        };
        if let Some((name, clock_rate, channels)) = static_payload(pt) {
            self.payload_type = Some(pt);
            self.encoding_name = Some(name.to_string());
            self.codec = Some(codec_label(name));
            self.clock_rate = Some(clock_rate);
            self.channels = channels;
        }
    }
}

/// Parsed session description plus the authentication method that
/// retrieved it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionDescription {
    /// `s=` session name.
    pub title: Option<String>,
    /// `i=` session information.
    pub description: Option<String>,
    /// `a=tool:` server software.
    pub tool: Option<String>,
    pub media: Vec<MediaDescription>,
    pub authentication_method: AuthMethod,
}

impl SessionDescription {
    pub fn video(&self) -> impl Iterator<Item = &MediaDescription> {
        self.media.iter().filter(|m| m.is_video())
    }

    pub fn audio(&self) -> impl Iterator<Item = &MediaDescription> {
        self.media.iter().filter(|m| m.is_audio())
    }
}

/// Map an `a=rtpmap` encoding name to a normalized codec label.
///
/// | Encoding | Label |
/// |----------|-------|
/// | `H264`, `AVC` | `H.264` |
/// | `H265`, `HEVC` | `H.265` |
/// | `MPEG4-GENERIC` | `AAC` |
/// | `PCMU`, `G711U` | `G.711 μ-law` |
/// | `PCMA`, `G711A` | `G.711 A-law` |
/// | `G722` | `G.722` |
///
/// Anything else is returned upper-cased.
pub fn codec_label(encoding: &str) -> String {
    match encoding.to_ascii_lowercase().as_str() {
        "h264" | "avc" => "H.264".to_string(),
        "h265" | "hevc" => "H.265".to_string(),
        "mpeg4-generic" => "AAC".to_string(),
        "pcmu" | "g711u" => "G.711 μ-law".to_string(),
        "pcma" | "g711a" => "G.711 A-law".to_string(),
        "g722" => "G.722".to_string(),
        _ => encoding.to_ascii_uppercase(),
    }
}

/// Static RTP payload types (RFC 3551 §6): encoding, clock rate, channels.
fn static_payload(pt: u8) -> Option<(&'static str, u32, Option<u16>)> {
    match pt {
        0 => Some(("PCMU", 8000, Some(1))),
        3 => Some(("GSM", 8000, Some(1))),
        8 => Some(("PCMA", 8000, Some(1))),
        9 => Some(("G722", 8000, Some(1))),
        14 => Some(("MPA", 90000, None)),
        26 => Some(("JPEG", 90000, None)),
        32 => Some(("MPV", 90000, None)),
        33 => Some(("MP2T", 90000, None)),
        34 => Some(("H263", 90000, None)),
        _ => None,
    }
}

/// Parse an SDP body.
///
/// Fails with a `ProtocolError` when the body is empty or does not begin
/// with a `v=` line. The returned description has
/// [`AuthMethod::None`]; the caller records the real method.
pub fn parse_sdp(text: &str) -> Result<SessionDescription> {
    let text = text.trim_start_matches(['\u{feff}', ' ', '\t', '\r', '\n']);

    if text.is_empty() {
        return Err(DiagnosticError::protocol("empty SDP body")
            .with_suggestion("server returned 200 OK without a session description"));
    }
    if !text.starts_with("v=") {
        return Err(DiagnosticError::protocol("SDP body does not start with a v= line")
            .with_suggestion("check that the URL points to a media stream"));
    }

    let mut session = SessionDescription {
        title: None,
        description: None,
        tool: None,
        media: Vec::new(),
        authentication_method: AuthMethod::None,
    };
    let mut current: Option<MediaDescription> = None;
    let mut seen_media = false;

    for line in text.lines() {
        let line = line.trim();
        let Some((kind, value)) = line.split_once('=') else {
            continue;
        };

        match kind {
            "s" if !seen_media => session.title = non_empty(value),
            "i" if !seen_media => session.description = non_empty(value),
            "m" => {
                seen_media = true;
                if let Some(done) = current.take() {
                    session.media.push(finish(done));
                }
                current = parse_media_line(value);
            }
            "b" => {
                if let (Some(media), Some(kbps)) = (current.as_mut(), value.strip_prefix("AS:")) {
                    media.bitrate_kbps = kbps.trim().parse().ok();
                }
            }
            "a" => {
                let (name, attr) = value.split_once(':').unwrap_or((value, ""));
                match (name, current.as_mut()) {
                    ("tool", _) if !seen_media => session.tool = non_empty(attr),
                    ("rtpmap", Some(media)) => media.apply_rtpmap(attr),
                    ("fmtp", Some(media)) => media.apply_fmtp(attr),
                    ("framerate", Some(media)) if media.is_video() => {
                        media.framerate = attr.trim().parse().ok();
                    }
                    ("control", Some(media)) => media.control = non_empty(attr),
                    _ => {}
                }
            }
            _ => {}
        }
    }

    if let Some(done) = current.take() {
        session.media.push(finish(done));
    }

    tracing::debug!(
        media = session.media.len(),
        title = session.title.as_deref().unwrap_or(""),
        "parsed SDP"
    );

    Ok(session)
}

/// `m=<type> <port>[/<count>] <proto> <fmt> ...`
fn parse_media_line(value: &str) -> Option<MediaDescription> {
    let mut parts = value.split_whitespace();
    let Some(media_type) = parts.next() else {
        tracing::warn!(line = value, "ignoring m= line without a media type");
        return None;
    };

    let mut media = MediaDescription::new(media_type);
    media.port = parts
        .next()
        .and_then(|p| p.split('/').next())
        .and_then(|p| p.parse().ok());
    media.protocol = parts.next().map(str::to_string);
    media.formats = parts.map(str::to_string).collect();
    Some(media)
}

fn finish(mut media: MediaDescription) -> MediaDescription {
    media.apply_static_payload();
    media
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}
