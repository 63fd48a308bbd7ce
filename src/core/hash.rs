// Content hashes identify headers (and therefore blocks) and transaction payloads.
// Both are plain SHA-256 digests; what differs is which bytes go in.

use crate::core::{Header, Transaction};
use crate::error::{BlockchainError, Result};
use crate::utils::sha256_digest;
use data_encoding::HEXLOWER;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const HASH_LEN: usize = 32;

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    bincode::Encode,
    bincode::Decode,
)]
pub struct Hash([u8; HASH_LEN]);

impl Hash {
    pub const fn zero() -> Hash {
        Hash([0u8; HASH_LEN])
    }

    pub fn new(bytes: [u8; HASH_LEN]) -> Hash {
        Hash(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Hash> {
        let hash: [u8; HASH_LEN] = bytes.try_into().map_err(|_| {
            BlockchainError::Decode(format!(
                "Given bytes with length {} should be {HASH_LEN}",
                bytes.len()
            ))
        })?;
        Ok(Hash(hash))
    }

    pub fn digest(data: &[u8]) -> Hash {
        Hash(sha256_digest(data))
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    #[cfg(test)]
    pub fn random() -> Hash {
        Hash(rand::random())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", HEXLOWER.encode(&self.0))
    }
}

/// Hash of the header's fixed binary encoding. This is also the block's identity.
pub fn hash_header(header: &Header) -> Hash {
    Hash::digest(&header.to_bytes())
}

/// Hash of the opaque payload only. Sender, recipient and value are not covered,
/// so two transactions with the same payload share a content hash.
pub fn hash_transaction(tx: &Transaction) -> Hash {
    Hash::digest(tx.get_data())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::PublicKey;

    #[test]
    fn test_zero_hash() {
        assert!(Hash::zero().is_zero());
        assert!(!Hash::digest(b"").is_zero());
    }

    #[test]
    fn test_from_slice_checks_length() {
        assert!(Hash::from_slice(&[1u8; 31]).is_err());
        let hash = Hash::from_slice(&[1u8; 32]).unwrap();
        assert_eq!(hash.as_bytes(), &[1u8; 32]);
    }

    #[test]
    fn test_display_is_lower_hex() {
        let hash = Hash::new([0xab; 32]);
        assert_eq!(hash.to_string(), "ab".repeat(32));
    }

    #[test]
    fn test_transaction_hash_covers_payload_only() {
        let a = Transaction::new(b"same payload".to_vec());
        let b = Transaction::new_transfer(b"same payload".to_vec(), PublicKey::default(), 99);

        assert_eq!(hash_transaction(&a), hash_transaction(&b));
        assert_ne!(
            hash_transaction(&a),
            hash_transaction(&Transaction::new(b"other".to_vec()))
        );
    }
}
