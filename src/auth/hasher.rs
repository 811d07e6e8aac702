//! Password hashing strategies
//!
//! Encoded form is the lowercase hex digest of `salt || input`. A non-empty
//! salt is stored in front of the digest as `salt$digest` so that `verify`
//! can recompute it. Digests are compared in constant time.

use crate::error::{QueueError, Result};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::debug;

const SALT_SEPARATOR: char = '$';

/// Pluggable password hashing strategy
pub trait Hasher: Send + Sync {
    /// Algorithm name as used in configuration
    fn algorithm(&self) -> &'static str;

    /// Hash `input` with `salt` into its stored form
    fn encode(&self, input: &str, salt: &str) -> String;

    /// Check `input` against a stored form produced by `encode`
    fn verify(&self, input: &str, encoded: &str) -> bool;
}

/// SHA-1 strategy, the historical default for game account passwords
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha1Hasher;

/// SHA-256 strategy
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256Hasher;

impl Hasher for Sha1Hasher {
    fn algorithm(&self) -> &'static str {
        "sha1"
    }

    fn encode(&self, input: &str, salt: &str) -> String {
        encode_with::<Sha1>(input, salt)
    }

    fn verify(&self, input: &str, encoded: &str) -> bool {
        verify_with::<Sha1>(self.algorithm(), input, encoded)
    }
}

impl Hasher for Sha256Hasher {
    fn algorithm(&self) -> &'static str {
        "sha256"
    }

    fn encode(&self, input: &str, salt: &str) -> String {
        encode_with::<Sha256>(input, salt)
    }

    fn verify(&self, input: &str, encoded: &str) -> bool {
        verify_with::<Sha256>(self.algorithm(), input, encoded)
    }
}

/// Look up the hashing strategy for a configured algorithm name
pub fn hasher_for(algorithm: &str) -> Result<Box<dyn Hasher>> {
    match algorithm.to_lowercase().as_str() {
        "sha1" => Ok(Box::new(Sha1Hasher)),
        "sha256" => Ok(Box::new(Sha256Hasher)),
        _ => Err(QueueError::UnsupportedHashAlgorithm {
            algorithm: algorithm.to_string(),
        }
        .into()),
    }
}

fn digest<D: Digest>(input: &str, salt: &str) -> Vec<u8> {
    let mut hasher = D::new();
    hasher.update(salt.as_bytes());
    hasher.update(input.as_bytes());
    hasher.finalize().to_vec()
}

fn encode_with<D: Digest>(input: &str, salt: &str) -> String {
    let digest = hex::encode(digest::<D>(input, salt));
    if salt.is_empty() {
        digest
    } else {
        format!("{}{}{}", salt, SALT_SEPARATOR, digest)
    }
}

fn verify_with<D: Digest>(algorithm: &str, input: &str, encoded: &str) -> bool {
    match split_encoded::<D>(encoded) {
        Ok((salt, stored)) => {
            bool::from(digest::<D>(input, salt).as_slice().ct_eq(stored.as_slice()))
        }
        Err(e) => {
            debug!("Rejecting {} credential: {}", algorithm, e);
            false
        }
    }
}

/// Split a stored form into salt and decoded digest
fn split_encoded<D: Digest>(encoded: &str) -> Result<(&str, Vec<u8>)> {
    let (salt, digest) = encoded
        .rsplit_once(SALT_SEPARATOR)
        .unwrap_or(("", encoded));

    let stored = hex::decode(digest).map_err(|e| QueueError::MalformedCredential {
        reason: format!("digest is not hexadecimal: {}", e),
    })?;

    let expected_len = <D as Digest>::output_size();
    if stored.len() != expected_len {
        return Err(QueueError::MalformedCredential {
            reason: format!(
                "expected a {}-byte digest, found {} bytes",
                expected_len,
                stored.len()
            ),
        }
        .into());
    }

    Ok((salt, stored))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha1_known_digest() {
        let hasher = Sha1Hasher;
        assert_eq!(hasher.algorithm(), "sha1");
        assert_eq!(
            hasher.encode("abc", ""),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
    }

    #[test]
    fn test_sha256_known_digest() {
        let hasher = Sha256Hasher;
        assert_eq!(hasher.algorithm(), "sha256");
        assert_eq!(
            hasher.encode("abc", ""),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_verify_matches_encode() {
        for hasher in [hasher_for("sha1").unwrap(), hasher_for("sha256").unwrap()] {
            let stored = hasher.encode("correct horse", "");
            assert!(hasher.verify("correct horse", &stored));
            assert!(!hasher.verify("wrong horse", &stored));
        }
    }

    #[test]
    fn test_salted_encoding() {
        let hasher = Sha1Hasher;
        let stored = hasher.encode("secret", "pepper");

        assert!(stored.starts_with("pepper$"));
        assert_ne!(stored, hasher.encode("secret", "salt"));
        assert!(hasher.verify("secret", &stored));
        // Dropping the salt from the stored form breaks verification
        assert!(!hasher.verify("secret", &stored.replace("pepper$", "")));
        assert!(!hasher.verify("other", &stored));
    }

    #[test]
    fn test_salt_may_contain_separator() {
        let hasher = Sha256Hasher;
        let stored = hasher.encode("secret", "a$b");
        assert!(hasher.verify("secret", &stored));
    }

    #[test]
    fn test_verify_accepts_uppercase_digest() {
        let hasher = Sha1Hasher;
        let stored = hasher.encode("abc", "").to_uppercase();
        assert!(hasher.verify("abc", &stored));
    }

    #[test]
    fn test_verify_rejects_near_miss_digest() {
        let hasher = Sha256Hasher;
        let stored = hasher.encode("secret", "salt");

        // Same length and prefix, last byte differs
        let mut tampered = stored.clone();
        let last = if tampered.ends_with('0') { "1" } else { "0" };
        tampered.replace_range(tampered.len() - 1.., last);
        assert!(!hasher.verify("secret", &tampered));

        // Odd number of hex characters cannot decode
        assert!(!hasher.verify("secret", &stored[..stored.len() - 1]));
    }

    #[test]
    fn test_split_encoded_decodes_digest() {
        let stored = Sha1Hasher.encode("abc", "pepper");
        let upper = stored.to_uppercase();
        let (salt, digest) = split_encoded::<Sha1>(&upper).unwrap();

        assert_eq!(salt, "PEPPER");
        assert_eq!(digest.len(), 20);
        assert_eq!(format!("pepper${}", hex::encode(digest)), stored);
    }

    #[test]
    fn test_malformed_encoded_forms_rejected() {
        let hasher = Sha1Hasher;
        assert!(!hasher.verify("abc", ""));
        assert!(!hasher.verify("abc", "not-a-digest"));
        assert!(!hasher.verify("abc", &"z".repeat(40)));
        // A sha256 digest is the wrong length for sha1
        assert!(!hasher.verify("abc", &Sha256Hasher.encode("abc", "")));
    }

    #[test]
    fn test_hasher_lookup() {
        assert_eq!(hasher_for("SHA1").unwrap().algorithm(), "sha1");
        assert_eq!(hasher_for("sha256").unwrap().algorithm(), "sha256");

        let err = hasher_for("md5").err().unwrap();
        assert!(matches!(
            err.downcast_ref::<QueueError>(),
            Some(QueueError::UnsupportedHashAlgorithm { .. })
        ));
    }
}
