//! Cryptographic primitives for the cloud vacuum protocol.
//!
//! Provides:
//! - MD5 digest helpers ([`md5_bytes!`], [`md5_hex!`])
//! - Timestamp scrambling + frame-key derivation ([`key`])
//! - AES-128-ECB framing and AES-128-CBC secure-payload decryption ([`aes`])
//! - CRC-32 trailer verification ([`crc`])

#![deny(unsafe_code)]

pub mod aes;
pub mod crc;
pub mod digest;
pub mod key;

pub use crc::crc32;
pub use key::{SALT, derive_frame_key, scramble_timestamp};

/// Errors from the crypto layer. Both variants are dispositionally
/// equivalent per the protocol design: drop the frame, log, move on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CryptoError {
    /// Decryption or PKCS#7 unpadding failed.
    FrameCorrupt,
    /// CRC-32 trailer did not match the preceding bytes.
    ChecksumFailed,
}

impl std::fmt::Display for CryptoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FrameCorrupt => write!(f, "frame corrupt (decrypt/unpad failed)"),
            Self::ChecksumFailed => write!(f, "checksum failed (CRC-32 mismatch)"),
        }
    }
}

impl std::error::Error for CryptoError {}
