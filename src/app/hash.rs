//! SHA-1 digest type for firmware staleness checks
//!
//! The firmware lookup service publishes a SHA-1 digest for every image. The
//! digest is stored as its raw 20-byte representation and compared against a
//! digest computed from the previously downloaded file.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use tokio::fs::File;
use tokio::io::AsyncReadExt;

use crate::constants::files;
use crate::errors::{FeedError, FeedResult};

/// SHA-1 digest storage using a 20-byte array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Sha1Digest([u8; 20]);

impl Sha1Digest {
    /// Create a digest from a hex string
    ///
    /// # Arguments
    ///
    /// * `hex` - 40-character hexadecimal string (case insensitive)
    ///
    /// # Returns
    ///
    /// `Ok(Sha1Digest)` if the string is a valid SHA-1 hex representation,
    /// `Err(FeedError::MalformedRecord)` otherwise
    ///
    /// # Examples
    ///
    /// ```rust
    /// use precache::app::Sha1Digest;
    ///
    /// let digest = Sha1Digest::from_hex("da39a3ee5e6b4b0d3255bfef95601890afd80709")?;
    /// let upper = Sha1Digest::from_hex("DA39A3EE5E6B4B0D3255BFEF95601890AFD80709")?;
    /// assert_eq!(digest, upper);
    /// # Ok::<(), precache::errors::FeedError>(())
    /// ```
    pub fn from_hex(hex: &str) -> FeedResult<Self> {
        let malformed = || FeedError::MalformedRecord {
            field: "sha1sum".to_string(),
            reason: format!("{hex} is not a SHA-1 hex digest"),
        };

        if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(malformed());
        }

        let mut bytes = [0u8; 20];
        for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
            let pair = std::str::from_utf8(chunk).map_err(|_| malformed())?;
            bytes[i] = u8::from_str_radix(pair, 16).map_err(|_| malformed())?;
        }

        Ok(Sha1Digest(bytes))
    }

    /// Convert the digest to a lowercase hex string
    pub fn to_hex(&self) -> String {
        use std::fmt::Write;
        self.0.iter().fold(String::with_capacity(40), |mut acc, b| {
            let _ = write!(&mut acc, "{:02x}", b);
            acc
        })
    }

    /// Get the raw byte array representation
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Sha1Digest(bytes)
    }

    /// Compute the digest of a file on disk
    ///
    /// The file is read in fixed-size blocks so multi-gigabyte firmware
    /// images are never held in memory.
    pub async fn of_file(path: &Path) -> std::io::Result<Self> {
        let mut file = File::open(path).await?;
        let mut hasher = Sha1::new();
        let mut buffer = vec![0u8; files::DIGEST_BLOCK_SIZE];

        loop {
            let read = file.read(&mut buffer).await?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
        }

        Ok(Sha1Digest(hasher.finalize().into()))
    }

    /// Compute the digest of an in-memory buffer
    pub fn of_bytes(data: &[u8]) -> Self {
        Sha1Digest(Sha1::digest(data).into())
    }
}

impl fmt::Display for Sha1Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Sha1Digest {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for Sha1Digest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Sha1Digest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let hex_string = String::deserialize(deserializer)?;
        Self::from_hex(&hex_string).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const EMPTY_SHA1: &str = "da39a3ee5e6b4b0d3255bfef95601890afd80709";

    #[test]
    fn test_valid_hex_strings() {
        let test_cases = [
            EMPTY_SHA1,
            "a9993e364706816aba3e25717850c26c9cd0d89d",
            "0000000000000000000000000000000000000000",
        ];

        for hex in &test_cases {
            let digest = Sha1Digest::from_hex(hex).unwrap();
            assert_eq!(digest.to_hex(), *hex);
        }
    }

    #[test]
    fn test_invalid_hex_strings() {
        let invalid_cases = [
            "",
            "da39a3ee5e6b4b0d3255bfef95601890afd8070",   // Too short
            "da39a3ee5e6b4b0d3255bfef95601890afd807090", // Too long
            "da39a3ee5e6b4b0d3255bfef95601890afd8070g",  // Invalid character
            "50c9d1c465f3cbff652be1509c2e2a4e",          // MD5 length
        ];

        for hex in &invalid_cases {
            assert!(Sha1Digest::from_hex(hex).is_err(), "Should reject: {}", hex);
        }
    }

    #[test]
    fn test_of_bytes_known_vector() {
        assert_eq!(Sha1Digest::of_bytes(b"").to_hex(), EMPTY_SHA1);
        assert_eq!(
            Sha1Digest::of_bytes(b"abc").to_hex(),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
    }

    #[tokio::test]
    async fn test_of_file_matches_in_memory_digest() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("image.ipsw");
        let content: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        tokio::fs::write(&path, &content).await.unwrap();

        let from_file = Sha1Digest::of_file(&path).await.unwrap();
        assert_eq!(from_file, Sha1Digest::of_bytes(&content));
    }

    #[tokio::test]
    async fn test_of_file_missing() {
        let temp_dir = TempDir::new().unwrap();
        let result = Sha1Digest::of_file(&temp_dir.path().join("missing.ipsw")).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_serialization() {
        let digest = Sha1Digest::from_hex(EMPTY_SHA1).unwrap();
        let json = serde_json::to_string(&digest).unwrap();
        assert_eq!(json, format!("\"{}\"", EMPTY_SHA1));

        let back: Sha1Digest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, digest);
    }
}
