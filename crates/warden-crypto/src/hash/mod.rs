//! Password digest utilities
//!
//! The local credential table stores `hex(hash(password))` together with the
//! name of the digest algorithm. Verification recomputes the digest and
//! compares it in constant time.

use digest::Digest;
use md5::Md5;
use sha1::Sha1;
use sha2::{Sha224, Sha256, Sha384, Sha512, Sha512_224, Sha512_256};
use std::fmt;
use std::str::FromStr;
use subtle::ConstantTimeEq;
use thiserror::Error;

/// Hash verification errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HashError {
    #[error("Unsupported hash algorithm: {0}")]
    UnsupportedAlgorithm(String),
}

/// Digest algorithms available to the password table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
    Sha512_224,
    Sha512_256,
}

impl HashAlgorithm {
    pub const ALL: [HashAlgorithm; 8] = [
        HashAlgorithm::Md5,
        HashAlgorithm::Sha1,
        HashAlgorithm::Sha224,
        HashAlgorithm::Sha256,
        HashAlgorithm::Sha384,
        HashAlgorithm::Sha512,
        HashAlgorithm::Sha512_224,
        HashAlgorithm::Sha512_256,
    ];

    /// Canonical lowercase name
    pub fn name(&self) -> &'static str {
        match self {
            HashAlgorithm::Md5 => "md5",
            HashAlgorithm::Sha1 => "sha1",
            HashAlgorithm::Sha224 => "sha224",
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha384 => "sha384",
            HashAlgorithm::Sha512 => "sha512",
            HashAlgorithm::Sha512_224 => "sha512-224",
            HashAlgorithm::Sha512_256 => "sha512-256",
        }
    }

    /// Digest length in bytes
    pub fn output_len(&self) -> usize {
        match self {
            HashAlgorithm::Md5 => 16,
            HashAlgorithm::Sha1 => 20,
            HashAlgorithm::Sha224 | HashAlgorithm::Sha512_224 => 28,
            HashAlgorithm::Sha256 | HashAlgorithm::Sha512_256 => 32,
            HashAlgorithm::Sha384 => 48,
            HashAlgorithm::Sha512 => 64,
        }
    }

    /// Raw digest of `data`
    pub fn digest(&self, data: &[u8]) -> Vec<u8> {
        match self {
            HashAlgorithm::Md5 => Md5::digest(data).to_vec(),
            HashAlgorithm::Sha1 => Sha1::digest(data).to_vec(),
            HashAlgorithm::Sha224 => Sha224::digest(data).to_vec(),
            HashAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
            HashAlgorithm::Sha384 => Sha384::digest(data).to_vec(),
            HashAlgorithm::Sha512 => Sha512::digest(data).to_vec(),
            HashAlgorithm::Sha512_224 => Sha512_224::digest(data).to_vec(),
            HashAlgorithm::Sha512_256 => Sha512_256::digest(data).to_vec(),
        }
    }

    /// Lowercase hex digest of `data`
    pub fn digest_hex(&self, data: &[u8]) -> String {
        hex::encode(self.digest(data))
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = HashError;

    /// Accepts "sha256", "SHA-256", "sha_256" and "RSA-SHA256" spellings
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        let name = lowered.strip_prefix("rsa-").unwrap_or(&lowered);
        let normalized: String = name.chars().filter(|c| *c != '-' && *c != '_').collect();

        let algorithm = match normalized.as_str() {
            "md5" => HashAlgorithm::Md5,
            "sha1" => HashAlgorithm::Sha1,
            "sha224" => HashAlgorithm::Sha224,
            "sha256" => HashAlgorithm::Sha256,
            "sha384" => HashAlgorithm::Sha384,
            "sha512" => HashAlgorithm::Sha512,
            "sha512224" | "sha512/224" => HashAlgorithm::Sha512_224,
            "sha512256" | "sha512/256" => HashAlgorithm::Sha512_256,
            _ => return Err(HashError::UnsupportedAlgorithm(s.to_string())),
        };

        Ok(algorithm)
    }
}

/// Hex digest of a password under a named algorithm
pub fn digest_hex(algorithm: &str, password: &str) -> Result<String, HashError> {
    let algorithm: HashAlgorithm = algorithm.parse()?;
    Ok(algorithm.digest_hex(password.as_bytes()))
}

/// Check a password against a stored hex digest
///
/// The comparison is exact: case-sensitive on the hex text and
/// length-sensitive, and it does not short-circuit on the first differing
/// byte.
pub fn verify_digest(
    algorithm: &str,
    password: &str,
    expected_digest_hex: &str,
) -> Result<bool, HashError> {
    let computed = digest_hex(algorithm, password)?;
    Ok(constant_time_eq(computed.as_bytes(), expected_digest_hex.as_bytes()))
}

/// Constant-time byte comparison (lengths are not secret)
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}
