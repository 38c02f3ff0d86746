//! CRC-32 (IEEE) trailer used by the outer frame.

/// Compute the ordinary IEEE CRC-32 of `data`.
pub fn crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vector() {
        // CRC-32(b"123456789") == 0xCBF43926, the standard IEEE check value.
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
    }
}
