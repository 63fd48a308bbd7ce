// A transaction carries an opaque payload plus sender, recipient and amount.
// Nothing is executed: the node only checks the sender's signature and moves the
// transaction through the pool and into blocks.

use crate::core::hash::{hash_transaction, Hash};
use crate::error::{BlockchainError, Result};
use crate::wallet::{PublicKey, Signature, Wallet};
use serde::{Deserialize, Serialize};

#[derive(
    Debug,
    Clone,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    bincode::Encode,
    bincode::Decode,
)]
pub struct Transaction {
    data: Vec<u8>,
    from: PublicKey,
    to: PublicKey,
    value: u64,
    signature: Option<Signature>,
}

impl Transaction {
    pub fn new(data: Vec<u8>) -> Transaction {
        Transaction {
            data,
            ..Default::default()
        }
    }

    pub fn new_transfer(data: Vec<u8>, to: PublicKey, value: u64) -> Transaction {
        Transaction {
            data,
            to,
            value,
            ..Default::default()
        }
    }

    /// Unsigned transaction minting `value` out of nothing; only valid inside genesis
    pub fn new_coinbase(value: u64) -> Transaction {
        Transaction {
            value,
            ..Default::default()
        }
    }

    pub fn get_data(&self) -> &[u8] {
        &self.data
    }

    pub fn get_from(&self) -> &PublicKey {
        &self.from
    }

    pub fn get_to(&self) -> &PublicKey {
        &self.to
    }

    pub fn get_value(&self) -> u64 {
        self.value
    }

    pub fn get_signature(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }

    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    pub fn hash(&self) -> Hash {
        hash_transaction(self)
    }

    /// Bytes covered by the signature: every field except the signature itself.
    pub fn signing_bytes(&self) -> Vec<u8> {
        let from = self.from.as_bytes();
        let to = self.to.as_bytes();
        let mut out = Vec::with_capacity(self.data.len() + from.len() + to.len() + 32);
        write_prefixed(&mut out, &self.data);
        write_prefixed(&mut out, from);
        write_prefixed(&mut out, to);
        out.extend_from_slice(&self.value.to_le_bytes());
        out
    }

    /// Signing bytes followed by the signature; this is what a block's data hash commits to.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = self.signing_bytes();
        match &self.signature {
            Some(signature) => {
                out.push(1);
                write_prefixed(&mut out, signature.as_bytes());
            }
            None => out.push(0),
        }
        out
    }

    /// Sets `from` to the signer's public key and replaces any earlier signature.
    pub fn sign(&mut self, wallet: &Wallet) -> Result<()> {
        self.from = wallet.public_key();
        self.signature = None;
        let signature = wallet.sign(&self.signing_bytes())?;
        self.signature = Some(signature);
        Ok(())
    }

    pub fn verify(&self) -> Result<()> {
        let signature = self
            .signature
            .as_ref()
            .ok_or(BlockchainError::MissingSignature)?;

        if !self.from.verify(signature, &self.signing_bytes()) {
            return Err(BlockchainError::InvalidSignature);
        }
        Ok(())
    }
}

// u64 prefix: usize never exceeds 64 bits, so the length is never truncated
fn write_prefixed(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u64).to_le_bytes());
    out.extend_from_slice(bytes);
}
