use crate::error::{BlockchainError, Result};
use crate::utils::{
    ecdsa_p256_sha256_sign_digest, ecdsa_p256_sha256_sign_verify, new_key_pair, sha256_digest,
};
use data_encoding::HEXLOWER;
use ring::rand::SystemRandom;
use ring::signature::{EcdsaKeyPair, KeyPair, ECDSA_P256_SHA256_FIXED_SIGNING};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use zeroize::{Zeroize, ZeroizeOnDrop};

pub const ADDRESS_LEN: usize = 20;
const UNCOMPRESSED_POINT_LEN: usize = 65;
const UNCOMPRESSED_TAG: u8 = 0x04;

/// A P-256 signing key. The PKCS#8 document is wiped when the wallet is dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Wallet {
    pkcs8: Vec<u8>,
    #[zeroize(skip)]
    key_pair: Arc<EcdsaKeyPair>,
    #[zeroize(skip)]
    public_key: PublicKey,
}

impl Wallet {
    pub fn new() -> Result<Wallet> {
        let pkcs8 = new_key_pair()?;
        Self::from_pkcs8(&pkcs8)
    }

    pub fn from_pkcs8(pkcs8: &[u8]) -> Result<Wallet> {
        let rng = SystemRandom::new();
        let key_pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, pkcs8, &rng)
            .map_err(|e| {
                BlockchainError::Crypto(format!("Failed to create key pair from PKCS8: {e}"))
            })?;
        let public_key = PublicKey(key_pair.public_key().as_ref().to_vec());
        Ok(Wallet {
            pkcs8: pkcs8.to_vec(),
            key_pair: Arc::new(key_pair),
            public_key,
        })
    }

    /// Hex form used for key files
    pub fn to_hex(&self) -> String {
        HEXLOWER.encode(&self.pkcs8)
    }

    pub fn from_hex(encoded: &str) -> Result<Wallet> {
        let mut pkcs8 = HEXLOWER
            .decode(encoded.trim().as_bytes())
            .map_err(|e| BlockchainError::Crypto(format!("Invalid key encoding: {e}")))?;
        let wallet = Self::from_pkcs8(&pkcs8);
        pkcs8.zeroize();
        wallet
    }

    pub fn sign(&self, message: &[u8]) -> Result<Signature> {
        ecdsa_p256_sha256_sign_digest(&self.key_pair, message).map(Signature)
    }

    pub fn public_key(&self) -> PublicKey {
        self.public_key.clone()
    }

    pub fn address(&self) -> Address {
        self.public_key.address()
    }
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

/// Uncompressed SEC1 encoding of a P-256 point. The empty key is the coinbase sender.
#[derive(
    Debug,
    Clone,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    bincode::Encode,
    bincode::Decode,
)]
pub struct PublicKey(Vec<u8>);

impl PublicKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<PublicKey> {
        if bytes.len() != UNCOMPRESSED_POINT_LEN || bytes[0] != UNCOMPRESSED_TAG {
            return Err(BlockchainError::Crypto(format!(
                "Malformed public key of {} bytes",
                bytes.len()
            )));
        }
        Ok(PublicKey(bytes.to_vec()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 33-byte compressed form: parity tag of Y followed by X
    pub fn to_compressed(&self) -> Vec<u8> {
        if self.0.len() != UNCOMPRESSED_POINT_LEN {
            return self.0.clone();
        }
        let (x, y) = self.0[1..].split_at(32);
        let mut out = Vec::with_capacity(33);
        out.push(0x02 | (y[31] & 1));
        out.extend_from_slice(x);
        out
    }

    /// Last 20 bytes of the SHA-256 of the compressed key
    pub fn address(&self) -> Address {
        let digest = sha256_digest(&self.to_compressed());
        let mut address = [0u8; ADDRESS_LEN];
        address.copy_from_slice(&digest[digest.len() - ADDRESS_LEN..]);
        Address(address)
    }

    pub fn verify(&self, signature: &Signature, message: &[u8]) -> bool {
        ecdsa_p256_sha256_sign_verify(&self.0, &signature.0, message)
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", HEXLOWER.encode(&self.to_compressed()))
    }
}

/// Fixed-size (r || s) ECDSA signature
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct Signature(Vec<u8>);

impl Signature {
    pub fn from_bytes(bytes: &[u8]) -> Signature {
        Signature(bytes.to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", HEXLOWER.encode(&self.0))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    pub fn from_slice(bytes: &[u8]) -> Result<Address> {
        let address: [u8; ADDRESS_LEN] = bytes.try_into().map_err(|_| {
            BlockchainError::Crypto(format!(
                "Given bytes with length {} should be {ADDRESS_LEN}",
                bytes.len()
            ))
        })?;
        Ok(Address(address))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", HEXLOWER.encode(&self.0))
    }
}
