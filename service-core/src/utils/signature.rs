//! HMAC-SHA256 signatures over raw webhook bodies.
//!
//! Payment providers sign the exact bytes they POST; the signature is the
//! lowercase hex digest of `HMAC-SHA256(body, secret)`.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Compute the hex HMAC-SHA256 signature of `body`.
pub fn sign_body(secret: &str, body: &[u8]) -> Result<String, anyhow::Error> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("Invalid key length: {}", e))?;
    mac.update(body);

    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verify a body signature using constant-time comparison.
///
/// Accepts upper- or lowercase hex. An empty secret never verifies.
pub fn verify_body_signature(
    secret: &str,
    body: &[u8],
    signature: &str,
) -> Result<bool, anyhow::Error> {
    if secret.is_empty() {
        return Ok(false);
    }

    let expected = sign_body(secret, body)?;
    let provided = signature.trim().to_ascii_lowercase();

    if expected.len() != provided.len() {
        return Ok(false);
    }

    Ok(expected.as_bytes().ct_eq(provided.as_bytes()).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";
    const BODY: &[u8] = br#"{"order_status":"paid","Customer":{"email":"ana@example.com"}}"#;

    #[test]
    fn signed_body_verifies() {
        let signature = sign_body(SECRET, BODY).unwrap();
        assert_eq!(signature.len(), 64);
        assert!(verify_body_signature(SECRET, BODY, &signature).unwrap());
    }

    #[test]
    fn uppercase_signature_verifies() {
        let signature = sign_body(SECRET, BODY).unwrap().to_uppercase();
        assert!(verify_body_signature(SECRET, BODY, &signature).unwrap());
    }

    #[test]
    fn tampered_body_fails() {
        let signature = sign_body(SECRET, BODY).unwrap();
        let tampered = br#"{"order_status":"paid","Customer":{"email":"eve@example.com"}}"#;
        assert!(!verify_body_signature(SECRET, tampered, &signature).unwrap());
    }

    #[test]
    fn wrong_secret_fails() {
        let signature = sign_body("other", BODY).unwrap();
        assert!(!verify_body_signature(SECRET, BODY, &signature).unwrap());
    }

    #[test]
    fn empty_secret_never_verifies() {
        let signature = sign_body("", BODY).unwrap();
        assert!(!verify_body_signature("", BODY, &signature).unwrap());
    }

    #[test]
    fn truncated_signature_fails() {
        let signature = sign_body(SECRET, BODY).unwrap();
        assert!(!verify_body_signature(SECRET, BODY, &signature[..40]).unwrap());
    }
}
