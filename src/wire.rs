//! Wire framing for the memcached ASCII protocol over UDP.
//!
//! Every datagram starts with the standard 8-byte memcached UDP frame header
//! (big-endian):
//!
//! ```text
//! bytes 0-1  request id (GET only; SET sends 0, fire-and-forget)
//! bytes 2-3  fragment sequence number (always 0, single-datagram requests)
//! bytes 4-5  total datagrams in this request (always 1)
//! bytes 6-7  reserved on send; on receive byte 7 carries the LetheInfo
//!            auxiliary header consumed by the statistics
//! ```
//!
//! The textual command follows the header. There is no checksum and no length
//! prefix beyond buffer bounds: UDP preserves message boundaries and a
//! cooperating server answers one datagram per request, so the framing stays
//! allocation-light with per-request overhead in the microsecond range.

use std::fmt;

/// Length of the UDP frame header.
pub const FRAME_HEADER_LEN: usize = 8;

/// Length of the `"VALUE "` token that starts a hit response payload.
const VALUE_TOKEN_LEN: usize = 6;

/// Receive buffer size for response datagrams: header + `"VALUE "` + key.
///
/// Decoding only needs the header and the first payload byte; the rest of the
/// datagram is deliberately left to UDP truncation.
#[inline]
pub const fn recv_buffer_len(key_length: usize) -> usize {
    FRAME_HEADER_LEN + VALUE_TOKEN_LEN + key_length
}

/// Minimum decodable datagram: header plus the first payload byte.
const MIN_RESPONSE_LEN: usize = FRAME_HEADER_LEN + 1;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("malformed frame: {len} bytes is shorter than the minimum decodable response")]
    MalformedFrame { len: usize },
}

/// Temperature tier reported by the server in the LetheInfo byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Cold,
    Warm1,
    Hot,
    Warm2,
}

/// The one-byte auxiliary header returned in header byte 7 of a response.
///
/// Layout: bits 0-2 temperature tier, bit 4 database-origin flag, bits 5-7
/// cache instance id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LetheInfo(pub u8);

impl LetheInfo {
    /// Raw 3-bit hotness field. Values >= 4 are unknown tiers.
    #[inline]
    pub fn hotness(self) -> u8 {
        self.0 & 0b0000_0111
    }

    /// Decoded temperature tier, or `None` for unknown values.
    pub fn tier(self) -> Option<Tier> {
        match self.hotness() {
            0 => Some(Tier::Cold),
            1 => Some(Tier::Warm1),
            2 => Some(Tier::Hot),
            3 => Some(Tier::Warm2),
            _ => None,
        }
    }

    /// Whether the value was served from the persistent store rather than a cache.
    #[inline]
    pub fn from_database(self) -> bool {
        (self.0 >> 4) & 1 == 1
    }

    /// Identifier of the cache instance that answered.
    #[inline]
    pub fn cache_id(self) -> u8 {
        (self.0 >> 5) & 0b0000_0111
    }
}

impl fmt::Display for LetheInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010b}", self.0)
    }
}

/// A decoded response datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response {
    pub request_id: u16,
    pub is_hit: bool,
    pub info: LetheInfo,
}

#[inline]
fn push_header(buf: &mut Vec<u8>, request_id: u16) {
    buf.extend_from_slice(&request_id.to_be_bytes());
    buf.extend_from_slice(&0u16.to_be_bytes()); // fragment sequence
    buf.extend_from_slice(&1u16.to_be_bytes()); // total datagrams
    buf.extend_from_slice(&0u16.to_be_bytes()); // reserved
}

/// Encode a SET request: `set {key} {flags} {exptime} {len}\r\n{value}\r\n`.
///
/// SET is fire-and-forget, so the request id field is always zero.
pub fn encode_set(key: &str, value: &[u8], flags: u32, exptime: u32) -> Vec<u8> {
    let line = format!("set {key} {flags} {exptime} {}\r\n", value.len());
    let mut buf = Vec::with_capacity(FRAME_HEADER_LEN + line.len() + value.len() + 2);
    push_header(&mut buf, 0);
    buf.extend_from_slice(line.as_bytes());
    buf.extend_from_slice(value);
    buf.extend_from_slice(b"\r\n");
    buf
}

/// Encode a GET request: `get {key}\r\n`, carrying `request_id` in the header.
pub fn encode_get(request_id: u16, key: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(FRAME_HEADER_LEN + 4 + key.len() + 2);
    push_header(&mut buf, request_id);
    buf.extend_from_slice(b"get ");
    buf.extend_from_slice(key.as_bytes());
    buf.extend_from_slice(b"\r\n");
    buf
}

/// Decode a response datagram.
///
/// A hit payload starts with `VALUE`, a miss with `END`; only the first payload
/// byte is inspected. Header byte 7 carries the LetheInfo auxiliary header.
pub fn decode_response(datagram: &[u8]) -> Result<Response, FrameError> {
    if datagram.len() < MIN_RESPONSE_LEN {
        return Err(FrameError::MalformedFrame {
            len: datagram.len(),
        });
    }
    Ok(Response {
        request_id: u16::from_be_bytes([datagram[0], datagram[1]]),
        is_hit: datagram[FRAME_HEADER_LEN] == b'V',
        info: LetheInfo(datagram[7]),
    })
}

/// Encode a hit response the way the server does. Used by the simulated
/// endpoint in tests: `VALUE {key} 0 {len}\r\n{value}\r\nEND\r\n`.
pub fn encode_hit_response(request_id: u16, key: &str, value: &[u8], info: LetheInfo) -> Vec<u8> {
    let line = format!("VALUE {key} 0 {}\r\n", value.len());
    let mut buf = Vec::with_capacity(FRAME_HEADER_LEN + line.len() + value.len() + 7);
    push_header(&mut buf, request_id);
    buf[7] = info.0;
    buf.extend_from_slice(line.as_bytes());
    buf.extend_from_slice(value);
    buf.extend_from_slice(b"\r\nEND\r\n");
    buf
}

/// Encode a miss response (`END\r\n`) for the simulated endpoint.
pub fn encode_miss_response(request_id: u16) -> Vec<u8> {
    let mut buf = Vec::with_capacity(FRAME_HEADER_LEN + 5);
    push_header(&mut buf, request_id);
    buf.extend_from_slice(b"END\r\n");
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_frame_layout() {
        let frame = encode_get(0xBEEF, "mykey");
        assert_eq!(&frame[0..2], &[0xBE, 0xEF]);
        assert_eq!(&frame[2..4], &[0, 0]);
        assert_eq!(&frame[4..6], &[0, 1]);
        assert_eq!(&frame[6..8], &[0, 0]);
        assert_eq!(&frame[8..], b"get mykey\r\n");
    }

    #[test]
    fn set_frame_layout_has_zero_request_id() {
        let frame = encode_set("k1", b"hello", 0, 0);
        assert_eq!(&frame[0..8], &[0, 0, 0, 0, 0, 1, 0, 0]);
        assert_eq!(&frame[8..], b"set k1 0 0 5\r\nhello\r\n");
    }

    #[test]
    fn hit_response_round_trip() {
        let frame = encode_hit_response(4711, "somekey", b"payload", LetheInfo(0x32));
        let resp = decode_response(&frame).unwrap();
        assert_eq!(resp.request_id, 4711);
        assert!(resp.is_hit);
        assert_eq!(resp.info, LetheInfo(0x32));
    }

    #[test]
    fn miss_response_decodes_as_miss() {
        let frame = encode_miss_response(7);
        let resp = decode_response(&frame).unwrap();
        assert_eq!(resp.request_id, 7);
        assert!(!resp.is_hit);
    }

    #[test]
    fn truncated_datagram_is_malformed() {
        assert_eq!(
            decode_response(&[0u8; 8]),
            Err(FrameError::MalformedFrame { len: 8 })
        );
        assert!(decode_response(&[]).is_err());
    }

    #[test]
    fn decode_only_needs_header_and_first_payload_byte() {
        let full = encode_hit_response(99, "kkkkkkkk", b"vvvv", LetheInfo(0x02));
        // Simulate UDP truncation at the receive buffer boundary.
        let truncated = &full[..recv_buffer_len(8)];
        let resp = decode_response(truncated).unwrap();
        assert_eq!(resp.request_id, 99);
        assert!(resp.is_hit);
        assert_eq!(resp.info, LetheInfo(0x02));
    }

    #[test]
    fn letheinfo_bit_fields() {
        // tier=2 (hot), db flag set, cache id 3 -> 0b011_1_0_010
        let info = LetheInfo(0b0111_0010);
        assert_eq!(info.hotness(), 2);
        assert_eq!(info.tier(), Some(Tier::Hot));
        assert!(info.from_database());
        assert_eq!(info.cache_id(), 3);

        let unknown = LetheInfo(0b0000_0101);
        assert_eq!(unknown.tier(), None);
        assert!(!unknown.from_database());
    }
}
