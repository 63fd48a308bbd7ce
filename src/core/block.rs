use crate::core::hash::{hash_header, Hash, HASH_LEN};
use crate::core::Transaction;
use crate::error::{BlockchainError, Result};
use crate::utils::current_timestamp;
use crate::wallet::{PublicKey, Signature, Wallet};
use log::debug;
use serde::{Deserialize, Serialize};

/// version | prev hash | data hash | timestamp | height | nonce
pub const HEADER_LEN: usize = 4 + HASH_LEN + HASH_LEN + 8 + 4 + 8;

/// Value minted by the genesis coinbase transaction
pub const GENESIS_COINBASE_VALUE: u64 = 10_000_000;

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
pub struct Header {
    version: u32,
    prev_block_hash: Hash,
    data_hash: Hash,
    timestamp: i64,
    height: u32,
    nonce: u64,
}

impl Header {
    pub fn new(
        version: u32,
        prev_block_hash: Hash,
        timestamp: i64,
        height: u32,
        nonce: u64,
    ) -> Header {
        Header {
            version,
            prev_block_hash,
            data_hash: Hash::zero(),
            timestamp,
            height,
            nonce,
        }
    }

    /// Fixed little-endian layout; the input to hashing and block signing
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0..4].copy_from_slice(&self.version.to_le_bytes());
        out[4..36].copy_from_slice(self.prev_block_hash.as_bytes());
        out[36..68].copy_from_slice(self.data_hash.as_bytes());
        out[68..76].copy_from_slice(&self.timestamp.to_le_bytes());
        out[76..80].copy_from_slice(&self.height.to_le_bytes());
        out[80..88].copy_from_slice(&self.nonce.to_le_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Header> {
        if bytes.len() != HEADER_LEN {
            return Err(BlockchainError::Decode(format!(
                "Header must be {HEADER_LEN} bytes, got {}",
                bytes.len()
            )));
        }

        Ok(Header {
            version: u32::from_le_bytes(read_array(bytes, 0)),
            prev_block_hash: Hash::new(read_array(bytes, 4)),
            data_hash: Hash::new(read_array(bytes, 36)),
            timestamp: i64::from_le_bytes(read_array(bytes, 68)),
            height: u32::from_le_bytes(read_array(bytes, 76)),
            nonce: u64::from_le_bytes(read_array(bytes, 80)),
        })
    }

    pub fn hash(&self) -> Hash {
        hash_header(self)
    }

    pub fn get_version(&self) -> u32 {
        self.version
    }

    pub fn get_prev_block_hash(&self) -> Hash {
        self.prev_block_hash
    }

    pub fn get_data_hash(&self) -> Hash {
        self.data_hash
    }

    pub fn get_timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn get_height(&self) -> u32 {
        self.height
    }

    pub fn get_nonce(&self) -> u64 {
        self.nonce
    }
}

#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct Block {
    header: Header,
    transactions: Vec<Transaction>,
    validator: PublicKey,
    signature: Option<Signature>,
}

impl Block {
    /// Builds an unsigned block and commits the header to the transaction set.
    pub fn new_block(mut header: Header, transactions: Vec<Transaction>) -> Block {
        header.data_hash = Self::hash_transactions(&transactions);
        Block {
            header,
            transactions,
            validator: PublicKey::default(),
            signature: None,
        }
    }

    /// Next block on top of `prev_header`, stamped with the current time.
    pub fn new_block_from_prev_header(
        prev_header: &Header,
        transactions: Vec<Transaction>,
    ) -> Result<Block> {
        let header = Header::new(
            prev_header.version,
            prev_header.hash(),
            current_timestamp()?,
            prev_header.height + 1,
            0,
        );
        Ok(Self::new_block(header, transactions))
    }

    /// The shared first block. Its header is fixed so every node derives the same
    /// genesis hash; the signature comes from a throwaway key and is never checked.
    pub fn generate_genesis_block() -> Result<Block> {
        let header = Header::new(1, Hash::zero(), 0, 0, 0);
        let coinbase = Transaction::new_coinbase(GENESIS_COINBASE_VALUE);
        let mut block = Self::new_block(header, vec![coinbase]);
        block.sign(&Wallet::new()?)?;
        Ok(block)
    }

    /// Content hash over the canonical bytes of every transaction, in order
    pub fn hash_transactions(transactions: &[Transaction]) -> Hash {
        let mut buf = vec![];
        for tx in transactions {
            buf.extend(tx.canonical_bytes());
        }
        Hash::digest(&buf)
    }

    /// Identity of the block: the hash of its header
    pub fn hash(&self) -> Hash {
        self.header.hash()
    }

    /// Sets the validator key and signature together.
    pub fn sign(&mut self, wallet: &Wallet) -> Result<()> {
        let signature = wallet.sign(&self.header.to_bytes())?;
        self.validator = wallet.public_key();
        self.signature = Some(signature);
        debug!("Signed block {} at height {}", self.hash(), self.header.height);
        Ok(())
    }

    pub fn verify(&self) -> Result<()> {
        let signature = self
            .signature
            .as_ref()
            .ok_or(BlockchainError::InvalidSignature)?;

        if !self.validator.verify(signature, &self.header.to_bytes()) {
            return Err(BlockchainError::InvalidSignature);
        }

        if Self::hash_transactions(&self.transactions) != self.header.data_hash {
            return Err(BlockchainError::DataHashMismatch);
        }

        for (index, tx) in self.transactions.iter().enumerate() {
            tx.verify()
                .map_err(|reason| BlockchainError::TransactionInvalid {
                    index,
                    reason: Box::new(reason),
                })?;
        }

        Ok(())
    }

    pub fn get_header(&self) -> &Header {
        &self.header
    }

    pub fn get_height(&self) -> u32 {
        self.header.height
    }

    pub fn get_transactions(&self) -> &[Transaction] {
        self.transactions.as_slice()
    }

    pub fn get_validator(&self) -> &PublicKey {
        &self.validator
    }

    pub fn get_signature(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }

    /// Build a block with an arbitrary height and parent (for testing only)
    #[cfg(test)]
    pub fn new_test_block(
        height: u32,
        prev_block_hash: Hash,
        transactions: Vec<Transaction>,
    ) -> Block {
        let timestamp = current_timestamp().unwrap_or_default();
        Self::new_block(Header::new(1, prev_block_hash, timestamp, height, 0), transactions)
    }
}

// Caller guarantees `at + N <= bytes.len()`
fn read_array<const N: usize>(bytes: &[u8], at: usize) -> [u8; N] {
    let mut buf = [0u8; N];
    buf.copy_from_slice(&bytes[at..at + N]);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> Header {
        Header::new(1, Hash::random(), current_timestamp().unwrap(), 10, 98_319_381)
    }

    fn signed_tx(payload: &[u8]) -> Transaction {
        let mut tx = Transaction::new(payload.to_vec());
        tx.sign(&Wallet::new().unwrap()).unwrap();
        tx
    }

    #[test]
    fn test_header_binary_round_trip() {
        let mut header = sample_header();
        header.data_hash = Hash::random();

        let bytes = header.to_bytes();
        assert_eq!(bytes.len(), HEADER_LEN);
        assert_eq!(Header::from_bytes(&bytes).unwrap(), header);
    }

    #[test]
    fn test_header_decode_rejects_wrong_length() {
        let bytes = sample_header().to_bytes();
        assert!(Header::from_bytes(&bytes[..HEADER_LEN - 1]).is_err());
    }

    #[test]
    fn test_header_hash_changes_with_every_field() {
        let header = sample_header();
        let base = header.hash();
        assert_eq!(base, header.clone().hash());

        let mut variants = vec![header.clone(); 6];
        variants[0].version += 1;
        variants[1].prev_block_hash = Hash::random();
        variants[2].data_hash = Hash::random();
        variants[3].timestamp += 1;
        variants[4].height += 1;
        variants[5].nonce += 1;

        for variant in variants {
            assert_ne!(variant.hash(), base);
        }
    }

    #[test]
    fn test_block_hash_is_header_hash() {
        let block = Block::new_block(sample_header(), vec![signed_tx(b"a")]);
        assert_eq!(block.hash(), block.get_header().hash());
        assert!(!block.hash().is_zero());
    }

    #[test]
    fn test_sign_block() {
        let wallet = Wallet::new().unwrap();
        let mut block = Block::new_block(sample_header(), vec![]);

        block.sign(&wallet).unwrap();
        assert!(block.get_signature().is_some());
        assert_eq!(block.get_validator(), &wallet.public_key());
        assert!(block.verify().is_ok());
    }

    #[test]
    fn test_verify_unsigned_block() {
        let block = Block::new_block(sample_header(), vec![]);
        assert_eq!(block.verify(), Err(BlockchainError::InvalidSignature));
    }

    #[test]
    fn test_tampered_header_fails_verification() {
        let wallet = Wallet::new().unwrap();
        let mut block = Block::new_block(sample_header(), vec![]);
        block.sign(&wallet).unwrap();

        block.header.height = 100;
        assert_eq!(block.verify(), Err(BlockchainError::InvalidSignature));
    }

    #[test]
    fn test_foreign_validator_fails_verification() {
        let mut block = Block::new_block(sample_header(), vec![]);
        block.sign(&Wallet::new().unwrap()).unwrap();

        block.validator = Wallet::new().unwrap().public_key();
        assert_eq!(block.verify(), Err(BlockchainError::InvalidSignature));
    }

    #[test]
    fn test_data_hash_mismatch() {
        let wallet = Wallet::new().unwrap();
        let mut block = Block::new_block(sample_header(), vec![signed_tx(b"a")]);
        block.sign(&wallet).unwrap();

        block.transactions.push(signed_tx(b"b"));
        assert_eq!(block.verify(), Err(BlockchainError::DataHashMismatch));
    }

    #[test]
    fn test_invalid_transaction_in_block() {
        let wallet = Wallet::new().unwrap();
        let unsigned = Transaction::new(b"unsigned".to_vec());
        let mut block = Block::new_block(sample_header(), vec![signed_tx(b"a"), unsigned]);
        block.sign(&wallet).unwrap();

        assert_eq!(
            block.verify(),
            Err(BlockchainError::TransactionInvalid {
                index: 1,
                reason: Box::new(BlockchainError::MissingSignature),
            })
        );
    }

    #[test]
    fn test_block_from_prev_header() {
        let prev = sample_header();
        let block = Block::new_block_from_prev_header(&prev, vec![signed_tx(b"a")]).unwrap();

        assert_eq!(block.get_height(), prev.get_height() + 1);
        assert_eq!(block.get_header().get_prev_block_hash(), prev.hash());
        assert_eq!(
            block.get_header().get_data_hash(),
            Block::hash_transactions(block.get_transactions())
        );
    }

    #[test]
    fn test_genesis_header_is_shared() {
        let a = Block::generate_genesis_block().unwrap();
        let b = Block::generate_genesis_block().unwrap();

        assert_eq!(a.hash(), b.hash());
        assert_eq!(a.get_height(), 0);
        assert!(a.get_header().get_prev_block_hash().is_zero());
        assert_eq!(a.get_transactions()[0].get_value(), GENESIS_COINBASE_VALUE);
    }
}
