//! HMAC-SHA512 parameter signing.
//!
//! The gateway signs a flat parameter map: strip any signature fields, sort
//! the remaining keys lexicographically, URL-encode each value, join as
//! `key=value` pairs with `&`, and HMAC-SHA512 the UTF-8 bytes. The same
//! procedure signs outbound URLs and verifies inbound callbacks.

use std::collections::HashMap;

use hmac::{Hmac, Mac};
use sha2::Sha512;

type HmacSha512 = Hmac<Sha512>;

/// The signature field stripped before canonicalization.
pub const SECURE_HASH_FIELD: &str = "vnp_SecureHash";

/// Legacy companion field, also stripped.
pub const SECURE_HASH_TYPE_FIELD: &str = "vnp_SecureHashType";

/// Produces the canonical signing string for a parameter map.
pub fn canonicalize(params: &HashMap<String, String>) -> String {
    let mut keys: Vec<&str> = params
        .keys()
        .map(String::as_str)
        .filter(|k| *k != SECURE_HASH_FIELD && *k != SECURE_HASH_TYPE_FIELD)
        .collect();
    keys.sort_unstable();

    let mut out = String::new();
    for key in keys {
        if !out.is_empty() {
            out.push('&');
        }
        out.push_str(key);
        out.push('=');
        out.push_str(&urlencoding::encode(&params[key]));
    }
    out
}

/// Signs a parameter map, returning the hex-encoded HMAC-SHA512 digest.
pub fn sign(params: &HashMap<String, String>, secret: &str) -> String {
    let mut mac = HmacSha512::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(canonicalize(params).as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Verifies a hex signature against a parameter map.
///
/// Comparison is constant-time via `Mac::verify_slice`. A signature that is
/// not valid hex fails verification.
pub fn verify(params: &HashMap<String, String>, secret: &str, signature: &str) -> bool {
    let Ok(sig_bytes) = hex::decode(signature) else {
        return false;
    };

    let mut mac = HmacSha512::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(canonicalize(params).as_bytes());
    mac.verify_slice(&sig_bytes).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_params() -> HashMap<String, String> {
        HashMap::from([
            ("vnp_TxnRef".to_string(), "ORD-20260806-1".to_string()),
            ("vnp_Amount".to_string(), "4500000".to_string()),
            ("vnp_OrderInfo".to_string(), "Thanh toan don hang".to_string()),
            ("vnp_ResponseCode".to_string(), "00".to_string()),
        ])
    }

    #[test]
    fn test_canonical_form_is_sorted_and_encoded() {
        let canonical = canonicalize(&sample_params());
        assert_eq!(
            canonical,
            "vnp_Amount=4500000&vnp_OrderInfo=Thanh%20toan%20don%20hang\
             &vnp_ResponseCode=00&vnp_TxnRef=ORD-20260806-1"
        );
    }

    #[test]
    fn test_signature_fields_are_stripped() {
        let mut params = sample_params();
        let without = canonicalize(&params);

        params.insert(SECURE_HASH_FIELD.to_string(), "deadbeef".to_string());
        params.insert(SECURE_HASH_TYPE_FIELD.to_string(), "SHA512".to_string());
        assert_eq!(canonicalize(&params), without);
    }

    #[test]
    fn test_sign_verify_roundtrip() {
        let params = sample_params();
        let signature = sign(&params, "secret-key");
        assert!(verify(&params, "secret-key", &signature));
    }

    #[test]
    fn test_flipped_character_fails_verification() {
        let params = sample_params();
        let signature = sign(&params, "secret-key");

        let mut tampered: Vec<char> = signature.chars().collect();
        tampered[0] = if tampered[0] == '0' { '1' } else { '0' };
        let tampered: String = tampered.into_iter().collect();

        assert!(!verify(&params, "secret-key", &tampered));
    }

    #[test]
    fn test_wrong_secret_fails_verification() {
        let params = sample_params();
        let signature = sign(&params, "secret-key");
        assert!(!verify(&params, "other-key", &signature));
    }

    #[test]
    fn test_changed_parameter_fails_verification() {
        let params = sample_params();
        let signature = sign(&params, "secret-key");

        let mut changed = params.clone();
        changed.insert("vnp_Amount".to_string(), "9900000".to_string());
        assert!(!verify(&changed, "secret-key", &signature));
    }

    #[test]
    fn test_non_hex_signature_rejected() {
        assert!(!verify(&sample_params(), "secret-key", "not-hex!"));
    }

    #[test]
    fn test_uppercase_hex_verifies() {
        let params = sample_params();
        let signature = sign(&params, "secret-key").to_uppercase();
        assert!(verify(&params, "secret-key", &signature));
    }
}
