//! MD5 helpers used for frame-key derivation and the MQTT credential hashes.

/// Calculate the MD5 digest of one or more byte slices concatenated.
#[macro_export]
macro_rules! md5_bytes {
    ( $( $x:expr ),+ ) => {{
        use md5::{Digest, Md5};
        let mut h = Md5::new();
        $( h.update($x); )+
        let out: [u8; 16] = h.finalize().into();
        out
    }};
}

/// Calculate the lowercase hex MD5 digest of one or more byte slices concatenated.
#[macro_export]
macro_rules! md5_hex {
    ( $( $x:expr ),+ ) => {{
        let bytes = $crate::md5_bytes!( $( $x ),+ );
        $crate::digest::to_hex(&bytes)
    }};
}

/// Render bytes as lowercase hex, the same way every MQTT credential and
/// signature string in this protocol expects.
pub fn to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push_str(&format!("{b:02x}"));
    }
    s
}
