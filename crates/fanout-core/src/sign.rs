use hmac::{Hmac, Mac};
use sha2::Sha256;

/// Header carrying the HMAC of the request body.
pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";
/// Header carrying the delivery id, for receiver-side deduplication.
pub const DELIVERY_ID_HEADER: &str = "X-Webhook-Delivery-Id";
/// Header carrying the event type name.
pub const EVENT_TYPE_HEADER: &str = "X-Webhook-Event";

/// Sign the exact bytes of an outgoing body with HMAC-SHA256.
///
/// Note: new_from_slice only fails for algorithms with key length
/// constraints. SHA256 accepts any key length, so this is infallible in
/// practice.
pub fn sign_payload(secret: &str, body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .expect("HMAC-SHA256 accepts any key length");
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

/// Receiver-side verification of a signature produced by [`sign_payload`].
pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    let expected = sign_payload(secret, body);
    subtle::ConstantTimeEq::ct_eq(expected.as_bytes(), signature.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_payload_format() {
        let signature = sign_payload("whsec_test", br#"{"event":"order.created"}"#);
        assert!(signature.starts_with("sha256="), "signature should have sha256= prefix");
        assert_eq!(signature.len(), 7 + 64, "signature should be prefix(7) + hex(64)");
    }

    #[test]
    fn test_sign_payload_deterministic() {
        let sig1 = sign_payload("secret", b"body");
        let sig2 = sign_payload("secret", b"body");
        assert_eq!(sig1, sig2, "same inputs should produce same signature");
    }

    #[test]
    fn test_sign_payload_different_secrets() {
        let sig1 = sign_payload("secret1", b"body");
        let sig2 = sign_payload("secret2", b"body");
        assert_ne!(sig1, sig2, "different secrets should produce different signatures");
    }

    #[test]
    fn test_sign_payload_covers_exact_bytes() {
        let sig1 = sign_payload("secret", br#"{"a":1}"#);
        let sig2 = sign_payload("secret", br#"{"a": 1}"#);
        assert_ne!(sig1, sig2, "whitespace changes the signed bytes");
    }

    #[test]
    fn test_verify_signature_valid() {
        let body = br#"{"event":"order.created","deliveryId":"del_123"}"#;
        let signature = sign_payload("whsec_abc", body);
        assert!(verify_signature("whsec_abc", body, &signature));
    }

    #[test]
    fn test_verify_signature_wrong_secret() {
        let signature = sign_payload("secret1", b"body");
        assert!(!verify_signature("secret2", b"body", &signature));
    }

    #[test]
    fn test_verify_signature_tampered_body() {
        let signature = sign_payload("secret", b"original body");
        assert!(!verify_signature("secret", b"tampered body", &signature));
    }

    #[test]
    fn test_verify_signature_malformed() {
        assert!(!verify_signature("secret", b"body", "not_a_valid_signature"));
        assert!(!verify_signature("secret", b"body", "sha256=invalid"));
    }
}
