//! Frame-key derivation.
//!
//! The per-frame AES key is derived from the frame's Unix timestamp and the
//! device's `local_key`, scrambled through a fixed digit permutation before
//! hashing. See [`scramble_timestamp`] and [`derive_frame_key`].

/// Index permutation applied to the 8 hex digits of a timestamp.
///
/// `scramble_timestamp(t)[i] == hex(t)[SCRAMBLE[i]]`.
const SCRAMBLE: [usize; 8] = [5, 6, 3, 7, 1, 2, 0, 4];

/// Salt appended after `local_key` in the frame-key hash.
pub const SALT: &[u8] = b"TXdfu$jyZ#TZHsg4";

/// Reorder the 8 lowercase-hex digits of `t` using the fixed [`SCRAMBLE`]
/// permutation.
///
/// `t` is formatted as zero-padded lowercase hex first (`{:08x}`), then each
/// output position `i` takes the input digit at `SCRAMBLE[i]`.
pub fn scramble_timestamp(t: u32) -> [u8; 8] {
    let hex = format!("{t:08x}");
    let digits = hex.as_bytes();
    let mut out = [0u8; 8];
    for (i, &idx) in SCRAMBLE.iter().enumerate() {
        out[i] = digits[idx];
    }
    out
}

/// Derive the 16-byte AES key for a frame: `MD5(scramble(t) || local_key || SALT)`.
pub fn derive_frame_key(t: u32, local_key: &[u8]) -> [u8; 16] {
    let scrambled = scramble_timestamp(t);
    crate::md5_bytes!(&scrambled, local_key, SALT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scramble_is_a_permutation_of_the_hex_digits() {
        let t = 0x1a2b_3c4d;
        let hex = format!("{t:08x}");
        let digits = hex.as_bytes();
        let scrambled = scramble_timestamp(t);

        let mut expected: Vec<u8> = digits.to_vec();
        expected.sort();
        let mut got: Vec<u8> = scrambled.to_vec();
        got.sort();
        assert_eq!(expected, got, "scramble must be a permutation, not a transformation");
    }

    #[test]
    fn scramble_matches_fixed_index_vector() {
        let t = 0x0000_0000;
        assert_eq!(scramble_timestamp(t), *b"00000000");

        // distinguishable digits so we can check ordering, not just multiset
        let hex = "01234567";
        let t = u32::from_str_radix(hex, 16).unwrap();
        let scrambled = scramble_timestamp(t);
        let expected: [u8; 8] = [
            hex.as_bytes()[5], hex.as_bytes()[6], hex.as_bytes()[3], hex.as_bytes()[7],
            hex.as_bytes()[1], hex.as_bytes()[2], hex.as_bytes()[0], hex.as_bytes()[4],
        ];
        assert_eq!(scrambled, expected);
    }

    #[test]
    fn derive_frame_key_is_16_bytes_and_deterministic() {
        let k1 = derive_frame_key(1_700_000_000, b"0123456789abcdef");
        let k2 = derive_frame_key(1_700_000_000, b"0123456789abcdef");
        assert_eq!(k1, k2);
        assert_eq!(k1.len(), 16);
    }
}
