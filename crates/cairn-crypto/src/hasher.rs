use std::fmt;
use std::str::FromStr;

use cairn_types::Address;
use serde::{Deserialize, Serialize};
use sha2::Digest;

/// Digest algorithm used to derive addresses.
///
/// Fixed when a store is created and persisted in its configuration; a store
/// never mixes algorithms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HashAlgorithm {
    #[default]
    Blake3,
    Sha256,
}

impl HashAlgorithm {
    /// Name as written in store configuration.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Blake3 => "blake3",
            Self::Sha256 => "sha256",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blake3" => Ok(Self::Blake3),
            "sha256" => Ok(Self::Sha256),
            other => Err(format!("unknown hash algorithm: {other}")),
        }
    }
}

/// Content hasher producing [`Address`]es.
///
/// The hash input is exactly the canonical bytes of an object; the variant
/// tag inside the encoding keeps a blob and a tree with similar content apart,
/// so no extra domain prefix is mixed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentHasher {
    algorithm: HashAlgorithm,
}

impl ContentHasher {
    /// BLAKE3 hasher.
    pub const BLAKE3: Self = Self {
        algorithm: HashAlgorithm::Blake3,
    };
    /// SHA-256 hasher.
    pub const SHA256: Self = Self {
        algorithm: HashAlgorithm::Sha256,
    };

    pub const fn new(algorithm: HashAlgorithm) -> Self {
        Self { algorithm }
    }

    /// Hash raw bytes.
    pub fn hash(&self, data: &[u8]) -> Address {
        let digest: [u8; 32] = match self.algorithm {
            HashAlgorithm::Blake3 => *blake3::hash(data).as_bytes(),
            HashAlgorithm::Sha256 => sha2::Sha256::digest(data).into(),
        };
        Address::from_digest(digest)
    }

    /// Verify that data produces the expected address.
    pub fn verify(&self, data: &[u8], expected: &Address) -> bool {
        self.hash(data) == *expected
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::BLAKE3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        let data = b"hello world";
        assert_eq!(ContentHasher::BLAKE3.hash(data), ContentHasher::BLAKE3.hash(data));
        assert_eq!(ContentHasher::SHA256.hash(data), ContentHasher::SHA256.hash(data));
    }

    #[test]
    fn algorithms_disagree() {
        let data = b"same content";
        assert_ne!(ContentHasher::BLAKE3.hash(data), ContentHasher::SHA256.hash(data));
    }

    #[test]
    fn sha256_known_vector() {
        let addr = ContentHasher::SHA256.hash(b"abc");
        assert_eq!(
            addr.to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn blake3_known_vector() {
        let addr = ContentHasher::BLAKE3.hash(b"");
        assert_eq!(
            addr.to_hex(),
            "af1349b9f5f9a1a6a0404dea36dcc9499bcb25c9adc112b7cc9a93cae41f3262"
        );
    }

    #[test]
    fn verify_correct_data() {
        let id = ContentHasher::BLAKE3.hash(b"test data");
        assert!(ContentHasher::BLAKE3.verify(b"test data", &id));
    }

    #[test]
    fn verify_incorrect_data() {
        let id = ContentHasher::BLAKE3.hash(b"original");
        assert!(!ContentHasher::BLAKE3.verify(b"tampered", &id));
    }

    #[test]
    fn algorithm_names_roundtrip() {
        for alg in [HashAlgorithm::Blake3, HashAlgorithm::Sha256] {
            assert_eq!(alg.name().parse::<HashAlgorithm>().unwrap(), alg);
            assert_eq!(ContentHasher::new(alg).algorithm(), alg);
        }
        assert!("md5".parse::<HashAlgorithm>().is_err());
    }

    #[test]
    fn algorithm_serde_uses_lowercase_names() {
        let json = serde_json::to_string(&HashAlgorithm::Sha256).unwrap();
        assert_eq!(json, "\"sha256\"");
        let parsed: HashAlgorithm = serde_json::from_str("\"blake3\"").unwrap();
        assert_eq!(parsed, HashAlgorithm::Blake3);
    }

    #[test]
    fn default_is_blake3() {
        assert_eq!(HashAlgorithm::default(), HashAlgorithm::Blake3);
        assert_eq!(ContentHasher::default(), ContentHasher::BLAKE3);
    }
}
