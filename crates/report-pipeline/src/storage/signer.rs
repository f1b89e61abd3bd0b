//! HMAC signatures for presigned object URLs

use ring::hmac;

use crate::error::{Error, Result};

/// Signs `(key, expires)` pairs so links can be checked without server-side state
pub struct UrlSigner {
    key: hmac::Key,
}

impl UrlSigner {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, secret),
        }
    }

    fn message(object_key: &str, expires: i64) -> String {
        format!("{}\n{}", object_key, expires)
    }

    /// Hex signature for an object key valid until `expires` (unix seconds)
    pub fn sign(&self, object_key: &str, expires: i64) -> String {
        let tag = hmac::sign(&self.key, Self::message(object_key, expires).as_bytes());
        hex::encode(tag.as_ref())
    }

    /// Accept a link until `expires` inclusive, if the signature matches
    pub fn verify(&self, object_key: &str, expires: i64, signature: &str, now: i64) -> Result<()> {
        if now > expires {
            return Err(Error::Forbidden("Presigned URL has expired".to_string()));
        }

        let tag = hex::decode(signature)
            .map_err(|_| Error::Forbidden("Malformed URL signature".to_string()))?;

        hmac::verify(
            &self.key,
            Self::message(object_key, expires).as_bytes(),
            &tag,
        )
        .map_err(|_| Error::Forbidden("URL signature does not match".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: i64 = 3600;

    #[test]
    fn test_accepts_until_ttl_boundary() {
        let signer = UrlSigner::new(b"secret");
        let issued = 1_700_000_000;
        let expires = issued + TTL;
        let sig = signer.sign("Raw_PDFs/2024/Q1.pdf", expires);

        assert!(signer.verify("Raw_PDFs/2024/Q1.pdf", expires, &sig, issued).is_ok());
        assert!(signer.verify("Raw_PDFs/2024/Q1.pdf", expires, &sig, issued + TTL).is_ok());

        let err = signer
            .verify("Raw_PDFs/2024/Q1.pdf", expires, &sig, issued + TTL + 1)
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
    }

    #[test]
    fn test_rejects_tampering() {
        let signer = UrlSigner::new(b"secret");
        let sig = signer.sign("Raw_PDFs/2024/Q1.pdf", 100);

        // different key, extended expiry, foreign secret, garbage
        assert!(signer.verify("Raw_PDFs/2024/Q2.pdf", 100, &sig, 0).is_err());
        assert!(signer.verify("Raw_PDFs/2024/Q1.pdf", 200, &sig, 0).is_err());
        assert!(UrlSigner::new(b"other")
            .verify("Raw_PDFs/2024/Q1.pdf", 100, &sig, 0)
            .is_err());
        assert!(signer.verify("Raw_PDFs/2024/Q1.pdf", 100, "zz", 0).is_err());
    }
}
