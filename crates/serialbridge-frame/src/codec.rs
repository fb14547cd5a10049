use bytes::{BufMut, BytesMut};
use tracing::{trace, warn};

/// Start marker: `<` (0x3C).
pub const START_MARKER: u8 = 0x3C;

/// End marker: `>` (0x3E).
pub const END_MARKER: u8 = 0x3E;

/// Configuration for the frame codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameConfig {
    /// Byte that opens a frame.
    pub start_marker: u8,
    /// Byte that closes a frame.
    pub end_marker: u8,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            start_marker: START_MARKER,
            end_marker: END_MARKER,
        }
    }
}

/// Encode a payload into the wire format.
///
/// Wire format:
/// ```text
/// ┌────────┬─────────────────────┬────────┐
/// │ 0x3C   │ UTF-8 payload bytes │ 0x3E   │
/// │ "<"    │ (no escaping)       │ ">"    │
/// └────────┴─────────────────────┴────────┘
/// ```
///
/// Any payload is accepted, whatever its length. Marker bytes inside
/// `payload` are written as-is; the peer's decoder will treat them as framing.
pub fn encode_frame(payload: &str, config: &FrameConfig, dst: &mut BytesMut) {
    let bytes = payload.as_bytes();
    if bytes
        .iter()
        .any(|&b| b == config.start_marker || b == config.end_marker)
    {
        warn!(payload, "payload contains a frame marker and will be split by the peer");
    }

    dst.reserve(bytes.len() + 2);
    dst.put_u8(config.start_marker);
    dst.put_slice(bytes);
    dst.put_u8(config.end_marker);
}

/// Decode one frame from a byte source.
///
/// `next_byte` yields one byte per call and may block. Bytes before the first
/// start marker are discarded. Returns as soon as the end marker is seen, so
/// bytes after it stay in the source for the next call.
pub fn decode_frame<F, E>(config: &FrameConfig, mut next_byte: F) -> std::result::Result<String, E>
where
    F: FnMut() -> std::result::Result<u8, E>,
{
    let mut decoder = FrameDecoder::new(config);
    loop {
        if let Some(payload) = decoder.push(next_byte()?) {
            return Ok(payload);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    Scanning,
    Accumulating,
}

/// Incremental frame decoder.
///
/// Feed bytes one at a time with [`FrameDecoder::push`]; a complete payload is
/// returned when the end marker arrives.
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    start_marker: u8,
    end_marker: u8,
    state: DecodeState,
    buf: BytesMut,
    discarded: usize,
    restarts: usize,
}

impl FrameDecoder {
    pub fn new(config: &FrameConfig) -> Self {
        Self {
            start_marker: config.start_marker,
            end_marker: config.end_marker,
            state: DecodeState::Scanning,
            buf: BytesMut::new(),
            discarded: 0,
            restarts: 0,
        }
    }

    /// Feed one byte. Returns the payload when this byte completes a frame.
    pub fn push(&mut self, byte: u8) -> Option<String> {
        match self.state {
            DecodeState::Scanning => {
                if byte == self.start_marker {
                    self.state = DecodeState::Accumulating;
                    self.buf.clear();
                } else {
                    self.discarded += 1;
                }
                None
            }
            DecodeState::Accumulating => {
                if byte == self.start_marker {
                    // Spurious start marker: drop what we have and keep accumulating.
                    self.restarts += 1;
                    self.discarded += self.buf.len();
                    self.buf.clear();
                    None
                } else if byte == self.end_marker {
                    let payload = String::from_utf8_lossy(&self.buf).into_owned();
                    if self.discarded > 0 || self.restarts > 0 {
                        trace!(
                            discarded = self.discarded,
                            restarts = self.restarts,
                            "resynchronized before frame"
                        );
                    }
                    self.reset();
                    Some(payload)
                } else {
                    self.buf.put_u8(byte);
                    None
                }
            }
        }
    }

    /// True between a start marker and its end marker.
    pub fn is_mid_frame(&self) -> bool {
        self.state == DecodeState::Accumulating
    }

    /// Bytes dropped since the last completed frame.
    pub fn discarded(&self) -> usize {
        self.discarded
    }

    /// Drop any partial frame and return to scanning.
    pub fn reset(&mut self) {
        self.state = DecodeState::Scanning;
        self.buf.clear();
        self.discarded = 0;
        self.restarts = 0;
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use super::*;

    fn decode_all(bytes: &[u8]) -> (Option<String>, usize) {
        let mut iter = bytes.iter().copied();
        let mut consumed = 0usize;
        let result: std::result::Result<String, ()> = decode_frame(&FrameConfig::default(), || {
            let byte = iter.next().ok_or(())?;
            consumed += 1;
            Ok(byte)
        });
        (result.ok(), consumed)
    }

    #[test]
    fn test_encode_wraps_payload_in_markers() {
        let mut buf = BytesMut::new();
        encode_frame("3,12,1.23:45:01", &FrameConfig::default(), &mut buf);
        assert_eq!(buf.as_ref(), b"<3,12,1.23:45:01>");
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        for payload in ["", "OK", "99,99,9.99:99:99", "héllo wörld"] {
            let mut buf = BytesMut::new();
            encode_frame(payload, &FrameConfig::default(), &mut buf);

            let (decoded, consumed) = decode_all(&buf);
            assert_eq!(decoded.as_deref(), Some(payload));
            assert_eq!(consumed, buf.len());
        }
    }

    #[test]
    fn test_decode_discards_leading_noise() {
        let (decoded, consumed) = decode_all(b"garbage>>\r\n<OK>");
        assert_eq!(decoded.as_deref(), Some("OK"));
        assert_eq!(consumed, 15);
    }

    #[test]
    fn test_decode_restarts_on_spurious_start_marker() {
        let (decoded, _) = decode_all(b"<A<BCD>");
        assert_eq!(decoded.as_deref(), Some("BCD"));
    }

    #[test]
    fn test_decode_stops_at_first_end_marker() {
        let bytes = b"<first><second>";
        let (decoded, consumed) = decode_all(bytes);
        assert_eq!(decoded.as_deref(), Some("first"));
        assert_eq!(&bytes[consumed..], b"<second>");
    }

    #[test]
    fn test_decode_incomplete_frame_never_yields() {
        let (decoded, consumed) = decode_all(b"noise<partial");
        assert!(decoded.is_none());
        assert_eq!(consumed, 13);
    }

    #[test]
    fn test_decode_invalid_utf8_is_lossy() {
        let (decoded, _) = decode_all(&[START_MARKER, b'o', 0xFF, b'k', END_MARKER]);
        assert_eq!(decoded.as_deref(), Some("o\u{FFFD}k"));
    }

    #[test]
    fn test_embedded_end_marker_splits_payload() {
        let mut buf = BytesMut::new();
        encode_frame("a>b", &FrameConfig::default(), &mut buf);
        let (decoded, consumed) = decode_all(&buf);
        assert_eq!(decoded.as_deref(), Some("a"));
        assert_eq!(&buf[consumed..], b"b>");
    }

    #[test]
    fn test_long_payload_is_framed_unchanged() {
        let payload = format!("{}9.99:99:99", "1,".repeat(600));
        let mut buf = BytesMut::new();
        encode_frame(&payload, &FrameConfig::default(), &mut buf);
        assert_eq!(buf.len(), payload.len() + 2);

        let (decoded, consumed) = decode_all(&buf);
        assert_eq!(decoded.as_deref(), Some(payload.as_str()));
        assert_eq!(consumed, buf.len());
    }

    #[test]
    fn test_custom_markers() {
        let config = FrameConfig {
            start_marker: b'[',
            end_marker: b']',
        };
        let mut buf = BytesMut::new();
        encode_frame("<x>", &config, &mut buf);
        assert_eq!(buf.as_ref(), b"[<x>]");

        let mut iter = buf.iter().copied();
        let decoded: std::result::Result<String, Infallible> =
            decode_frame(&config, || Ok(iter.next().unwrap_or(b']')));
        assert_eq!(decoded.unwrap(), "<x>");
    }

    #[test]
    fn test_decoder_tracks_state_across_frames() {
        let mut decoder = FrameDecoder::new(&FrameConfig::default());
        let mut out = Vec::new();
        for &byte in b"xx<one>y<t<two>" {
            if let Some(payload) = decoder.push(byte) {
                out.push(payload);
            }
        }
        assert_eq!(out, vec!["one".to_string(), "two".to_string()]);
        assert!(!decoder.is_mid_frame());

        decoder.push(START_MARKER);
        decoder.push(b'z');
        assert!(decoder.is_mid_frame());
        decoder.reset();
        assert!(!decoder.is_mid_frame());
        assert_eq!(decoder.discarded(), 0);
    }
}
