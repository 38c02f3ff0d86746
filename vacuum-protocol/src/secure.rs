//! The secure (protocol-301) inner framing.
//!
//! The outer frame's decrypted payload begins with a 24-byte prelude, in
//! **little-endian**, unlike the outer frame header which is big-endian:
//!
//! ```text
//! endpoint(15) | unknown1(u8) | request_id(u16 LE) | unknown2(6)
//! ```
//!
//! `endpoint` must match the client's own endpoint identifier or the frame
//! is silently ignored — this is not an error, just a message meant for a
//! different client sharing the topic. The bytes after the prelude are the
//! AES-CBC + gzip secure payload, keyed by the nonce the client sent with
//! the originating request.

use vacuum_crypto::aes::secure_decrypt;

use crate::ProtocolError;

const PRELUDE_LEN: usize = 15 + 1 + 2 + 6;

/// The parsed 24-byte secure prelude.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SecurePrelude {
    pub endpoint: [u8; 15],
    pub unknown1: u8,
    pub request_id: u16,
    pub unknown2: [u8; 6],
}

/// Split `payload` into its prelude and the remaining ciphertext.
pub fn parse_secure_prelude(payload: &[u8]) -> Result<(SecurePrelude, &[u8]), ProtocolError> {
    if payload.len() < PRELUDE_LEN {
        return Err(ProtocolError::Truncated);
    }
    let mut endpoint = [0u8; 15];
    endpoint.copy_from_slice(&payload[0..15]);
    let unknown1 = payload[15];
    let request_id = u16::from_le_bytes(payload[16..18].try_into().unwrap());
    let mut unknown2 = [0u8; 6];
    unknown2.copy_from_slice(&payload[18..24]);

    Ok((SecurePrelude { endpoint, unknown1, request_id, unknown2 }, &payload[PRELUDE_LEN..]))
}

/// Parse the prelude, check the endpoint, and (if it matches) decrypt the
/// remaining bytes with `nonce`.
///
/// `our_endpoint` is the short identifier the client announced in the
/// originating request; the wire field is a fixed 15 bytes padded with
/// unspecified trailing bytes, so the match is a prefix match, not an
/// exact-length comparison. Returns `Ok(None)` when the prelude's endpoint
/// does not start with `our_endpoint` — per the protocol this is a silent
/// drop, not an error.
pub fn decode_secure(
    payload: &[u8],
    our_endpoint: &[u8],
    nonce: &[u8; 16],
) -> Result<Option<(u16, Vec<u8>)>, ProtocolError> {
    let (prelude, ciphertext) = parse_secure_prelude(payload)?;
    if !prelude.endpoint.starts_with(our_endpoint) {
        return Ok(None);
    }
    let bytes = secure_decrypt(nonce, ciphertext).map_err(|_| ProtocolError::FrameCorrupt)?;
    Ok(Some((prelude.request_id, bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn foreign_endpoint_is_ignored_not_errored() {
        let mut payload = vec![0u8; PRELUDE_LEN + 16];
        payload[0..15].copy_from_slice(b"someone-else!!!");
        let our_endpoint = b"us-ABCDE";
        let nonce = [0u8; 16];
        let result = decode_secure(&payload, our_endpoint, &nonce).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn endpoint_match_is_a_prefix_match_not_exact_equality() {
        // The wire field is a fixed 15 bytes; the real identifier is shorter
        // and the rest is unspecified padding on the device side.
        let mut payload = vec![0u8; PRELUDE_LEN];
        payload[0..15].copy_from_slice(b"us-ABCDE-123456");
        let our_endpoint = b"us-ABCDE";
        let (prelude, _rest) = parse_secure_prelude(&payload).unwrap();
        assert!(prelude.endpoint.starts_with(our_endpoint));
        assert_ne!(&prelude.endpoint[..], our_endpoint);
    }

    #[test]
    fn prelude_round_trips_request_id() {
        let mut payload = vec![0u8; PRELUDE_LEN];
        payload[0..15].copy_from_slice(b"us-endpoint1234");
        payload[16..18].copy_from_slice(&42u16.to_le_bytes());
        let (prelude, rest) = parse_secure_prelude(&payload).unwrap();
        assert_eq!(prelude.request_id, 42);
        assert!(rest.is_empty());
    }

    #[test]
    fn truncated_prelude_is_rejected() {
        assert_eq!(parse_secure_prelude(&[0u8; 4]), Err(ProtocolError::Truncated));
    }
}
