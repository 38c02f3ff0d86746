//! AES layers used by the two frame variants.
//!
//! - [`frame_encrypt`]/[`frame_decrypt`]: AES-128-ECB with PKCS#7 padding,
//!   keyed by [`crate::key::derive_frame_key`]. This is the outer frame
//!   cipher (protocols 101/102/121).
//! - [`secure_decrypt`]: AES-128-CBC with a 16-byte all-zero IV, keyed by
//!   the per-request nonce, followed by gzip decompression. This is the
//!   inner cipher of the secure (binary, protocol 301) response path.

use aes::Aes128;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyInit, KeyIvInit, block_padding::Pkcs7};
use ecb::cipher::block_padding::UnpadError;
use std::io::Read;

use crate::CryptoError;

type EcbEnc = ecb::Encryptor<Aes128>;
type EcbDec = ecb::Decryptor<Aes128>;
type CbcDec = cbc::Decryptor<Aes128>;

/// Encrypt `plaintext` with AES-128-ECB + PKCS#7, the outer frame cipher.
pub fn frame_encrypt(key: &[u8; 16], plaintext: &[u8]) -> Vec<u8> {
    EcbEnc::new(key.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext)
}

/// Decrypt an AES-128-ECB + PKCS#7 outer-frame ciphertext.
pub fn frame_decrypt(key: &[u8; 16], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    EcbDec::new(key.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_: UnpadError| CryptoError::FrameCorrupt)
}

/// Decrypt the secure (protocol-301) inner payload: AES-128-CBC with a
/// 16-byte zero IV, key = `nonce`, PKCS#7-unpadded, then gzip-inflated.
pub fn secure_decrypt(nonce: &[u8; 16], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let zero_iv = [0u8; 16];
    let plain = CbcDec::new(nonce.into(), (&zero_iv).into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_: UnpadError| CryptoError::FrameCorrupt)?;

    let mut gz = flate2::read::GzDecoder::new(&plain[..]);
    let mut out = Vec::new();
    gz.read_to_end(&mut out).map_err(|_| CryptoError::FrameCorrupt)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ecb_round_trip() {
        let key = [0x11u8; 16];
        let plain = b"{\"t\":1,\"dps\":{\"101\":\"{}\"}}";
        let ct = frame_encrypt(&key, plain);
        let pt = frame_decrypt(&key, &ct).unwrap();
        assert_eq!(pt, plain);
    }

    #[test]
    fn ecb_decrypt_rejects_corrupt_ciphertext() {
        let key = [0x22u8; 16];
        let mut ct = frame_encrypt(&key, b"hello world12345");
        // flip a byte so padding validation fails
        let last = ct.len() - 1;
        ct[last] ^= 0xff;
        assert!(matches!(frame_decrypt(&key, &ct), Err(CryptoError::FrameCorrupt)));
    }
}
