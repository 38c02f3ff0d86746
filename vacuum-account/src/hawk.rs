//! Hawk-style `Authorization` header for the home-data endpoint.
//!
//! `mac = base64(HMAC-SHA256(rriot.h, prestr))` with
//! `prestr = join(":", [u, s, nonce, ts, md5_hex("/user/homes/"+id), "", ""])`.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use vacuum_crypto::md5_hex;

type HmacSha256 = Hmac<Sha256>;

/// A ready-to-send `Authorization: Hawk ...` header value.
pub struct HawkHeader {
    pub value: String,
}

fn random_nonce() -> String {
    let mut buf = [0u8; 6];
    getrandom::getrandom(&mut buf).expect("getrandom failed");
    URL_SAFE_NO_PAD.encode(buf)
}

/// Build the Hawk header for `GET {a}/user/homes/{home_id}`.
pub fn sign_home_request(u: &str, s: &str, h: &str, home_id: i64, ts: u64) -> HawkHeader {
    let nonce = random_nonce();
    let path_hash = md5_hex!(format!("/user/homes/{home_id}").as_bytes());
    let prestr = [u, s, nonce.as_str(), &ts.to_string(), path_hash.as_str(), "", ""].join(":");

    let mut mac = HmacSha256::new_from_slice(h.as_bytes()).expect("HMAC accepts any key length");
    mac.update(prestr.as_bytes());
    let mac_b64 = STANDARD.encode(mac.finalize().into_bytes());

    let value = format!(
        r#"Hawk id="{u}", s="{s}", ts="{ts}", nonce="{nonce}", mac="{mac_b64}""#
    );
    HawkHeader { value }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_contains_all_fields() {
        let h = sign_home_request("user-u", "secret-s", "hmac-h", 12345, 1_700_000_000);
        assert!(h.value.starts_with("Hawk id=\"user-u\""));
        assert!(h.value.contains("s=\"secret-s\""));
        assert!(h.value.contains("ts=\"1700000000\""));
        assert!(h.value.contains("mac=\""));
        assert!(h.value.contains("nonce=\""));
    }

    #[test]
    fn mac_is_deterministic_given_fixed_nonce_inputs() {
        // The prestr construction itself (excluding the random nonce) must
        // be stable for a given path and timestamp.
        let path_hash_1 = md5_hex!(b"/user/homes/1");
        let path_hash_2 = md5_hex!(b"/user/homes/1");
        assert_eq!(path_hash_1, path_hash_2);
    }
}
