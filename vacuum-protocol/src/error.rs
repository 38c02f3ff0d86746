//! Errors from decoding a frame. Every variant here is dispositionally the
//! same for a caller wired into the dispatcher: log it, drop the frame,
//! let the pending request (if any) time out.

use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProtocolError {
    /// Not enough bytes for a complete frame (or declared length mismatch).
    Truncated,
    /// The 3-byte version prefix was not `1.0`.
    BadVersion,
    /// CRC-32 trailer did not match.
    ChecksumFailed,
    /// AES decryption or PKCS#7 unpadding failed.
    FrameCorrupt,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated => write!(f, "frame truncated or length mismatch"),
            Self::BadVersion => write!(f, "unexpected frame version"),
            Self::ChecksumFailed => write!(f, "CRC-32 checksum failed"),
            Self::FrameCorrupt => write!(f, "frame corrupt (decrypt/unpad failed)"),
        }
    }
}

impl std::error::Error for ProtocolError {}
