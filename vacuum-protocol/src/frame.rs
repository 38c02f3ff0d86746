//! The outer wire frame.
//!
//! ```text
//! version(3) | seq(u32 BE) | random(u32 BE) | timestamp(u32 BE)
//! | protocol(u16 BE) | payload_len(u16 BE) | ciphertext(payload_len) | crc32(u32 BE)
//! ```
//!
//! `version` is the three ASCII bytes `1.0`. `crc32` covers every byte that
//! precedes it. The frame is a pure function of its inputs — no state, no I/O.

use vacuum_crypto::{aes, crc32, key::derive_frame_key};

use crate::ProtocolError;

/// Three ASCII bytes that must prefix every frame.
pub const VERSION: [u8; 3] = *b"1.0";

const HEADER_LEN: usize = 3 + 4 + 4 + 4 + 2 + 2; // 19
const TRAILER_LEN: usize = 4;
const MIN_FRAME_LEN: usize = HEADER_LEN + TRAILER_LEN; // 23

/// One of the protocol IDs carried in the frame header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProtocolId {
    /// Outbound command.
    Request,
    /// Inbound small-JSON response.
    Response,
    /// Inbound remote-control notification (logged and dropped).
    RemoteControl,
    /// Inbound large-binary secure response.
    SecureResponse,
    /// Anything else — logged and dropped.
    Unknown(u16),
}

impl From<u16> for ProtocolId {
    fn from(v: u16) -> Self {
        match v {
            101 => Self::Request,
            102 => Self::Response,
            121 => Self::RemoteControl,
            301 => Self::SecureResponse,
            other => Self::Unknown(other),
        }
    }
}

impl From<ProtocolId> for u16 {
    fn from(p: ProtocolId) -> u16 {
        match p {
            ProtocolId::Request => 101,
            ProtocolId::Response => 102,
            ProtocolId::RemoteControl => 121,
            ProtocolId::SecureResponse => 301,
            ProtocolId::Unknown(v) => v,
        }
    }
}

/// A decoded (and decrypted) frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub seq: u32,
    pub random: u32,
    pub timestamp: u32,
    pub protocol: ProtocolId,
    /// Decrypted, un-padded payload bytes.
    pub payload: Vec<u8>,
}

/// Fields needed to build a new outgoing frame; `payload` is supplied
/// separately to [`encode`] since it must be encrypted under `local_key`.
pub struct FrameFields {
    pub seq: u32,
    pub random: u32,
    pub timestamp: u32,
    pub protocol: ProtocolId,
}

/// Encode `payload_plain` into a complete outer frame, encrypted under the
/// per-frame key derived from `fields.timestamp` and `local_key`.
pub fn encode(fields: &FrameFields, payload_plain: &[u8], local_key: &[u8]) -> Vec<u8> {
    let frame_key = derive_frame_key(fields.timestamp, local_key);
    let ciphertext = aes::frame_encrypt(&frame_key, payload_plain);
    debug_assert!(ciphertext.len() <= u16::MAX as usize);

    let mut buf = Vec::with_capacity(HEADER_LEN + ciphertext.len() + TRAILER_LEN);
    buf.extend_from_slice(&VERSION);
    buf.extend_from_slice(&fields.seq.to_be_bytes());
    buf.extend_from_slice(&fields.random.to_be_bytes());
    buf.extend_from_slice(&fields.timestamp.to_be_bytes());
    buf.extend_from_slice(&u16::from(fields.protocol).to_be_bytes());
    buf.extend_from_slice(&(ciphertext.len() as u16).to_be_bytes());
    buf.extend_from_slice(&ciphertext);

    let crc = crc32(&buf);
    buf.extend_from_slice(&crc.to_be_bytes());
    buf
}

/// Decode and decrypt a frame received on the wire.
///
/// The CRC is verified before any attempt at decryption, per the protocol's
/// invariant that a corrupt frame never reaches the cipher.
pub fn decode(bytes: &[u8], local_key: &[u8]) -> Result<Frame, ProtocolError> {
    if bytes.len() < MIN_FRAME_LEN {
        return Err(ProtocolError::Truncated);
    }
    if bytes[0..3] != VERSION {
        return Err(ProtocolError::BadVersion);
    }

    let seq = u32::from_be_bytes(bytes[3..7].try_into().unwrap());
    let random = u32::from_be_bytes(bytes[7..11].try_into().unwrap());
    let timestamp = u32::from_be_bytes(bytes[11..15].try_into().unwrap());
    let protocol = ProtocolId::from(u16::from_be_bytes(bytes[15..17].try_into().unwrap()));
    let payload_len = u16::from_be_bytes(bytes[17..19].try_into().unwrap()) as usize;

    let expected_total = HEADER_LEN + payload_len + TRAILER_LEN;
    if bytes.len() != expected_total {
        return Err(ProtocolError::Truncated);
    }

    let ciphertext = &bytes[HEADER_LEN..HEADER_LEN + payload_len];
    let crc_given = u32::from_be_bytes(
        bytes[HEADER_LEN + payload_len..expected_total].try_into().unwrap(),
    );
    let crc_computed = crc32(&bytes[..HEADER_LEN + payload_len]);
    if crc_given != crc_computed {
        return Err(ProtocolError::ChecksumFailed);
    }

    let frame_key = derive_frame_key(timestamp, local_key);
    let payload = aes::frame_decrypt(&frame_key, ciphertext)
        .map_err(|_| ProtocolError::FrameCorrupt)?;

    Ok(Frame { seq, random, timestamp, protocol, payload })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOCAL_KEY: &[u8] = b"0123456789abcdef";

    #[test]
    fn round_trip() {
        let fields = FrameFields { seq: 7, random: 42, timestamp: 1_700_000_000, protocol: ProtocolId::Request };
        let payload = br#"{"t":1700000000,"dps":{"101":"{\"id\":1,\"method\":\"get_status\"}"}}"#;

        let wire = encode(&fields, payload, LOCAL_KEY);
        let decoded = decode(&wire, LOCAL_KEY).unwrap();

        assert_eq!(decoded.seq, 7);
        assert_eq!(decoded.random, 42);
        assert_eq!(decoded.timestamp, 1_700_000_000);
        assert_eq!(decoded.protocol, ProtocolId::Request);
        assert_eq!(decoded.payload, payload);
    }

    #[test]
    fn crc_mismatch_is_detected_before_decrypt() {
        let fields = FrameFields { seq: 1, random: 1, timestamp: 1_700_000_000, protocol: ProtocolId::Response };
        let mut wire = encode(&fields, b"hello", LOCAL_KEY);
        let last = wire.len() - 1;
        wire[last] ^= 0xff;
        assert_eq!(decode(&wire, LOCAL_KEY), Err(ProtocolError::ChecksumFailed));
    }

    #[test]
    fn truncated_frame_is_rejected() {
        assert_eq!(decode(&[0u8; 10], LOCAL_KEY), Err(ProtocolError::Truncated));
    }

    #[test]
    fn wrong_version_is_rejected() {
        let fields = FrameFields { seq: 1, random: 1, timestamp: 1, protocol: ProtocolId::Response };
        let mut wire = encode(&fields, b"x", LOCAL_KEY);
        wire[0] = b'2';
        assert_eq!(decode(&wire, LOCAL_KEY), Err(ProtocolError::BadVersion));
    }

    #[test]
    fn protocol_id_round_trips_through_u16() {
        for id in [ProtocolId::Request, ProtocolId::Response, ProtocolId::RemoteControl, ProtocolId::SecureResponse] {
            let v: u16 = id.into();
            assert_eq!(ProtocolId::from(v), id);
        }
        assert_eq!(ProtocolId::from(9999), ProtocolId::Unknown(9999));
    }
}
