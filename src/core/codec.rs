//! Envelope encodings for transactions and blocks on the wire.
//!
//! The server holds an `Arc<dyn Codec>`, so the serialization format is picked at
//! construction time. Both ends of a connection must agree on it.

use crate::core::{Block, Transaction};
use crate::error::Result;
use crate::utils::{deserialize, serialize};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

pub trait Codec: Send + Sync {
    fn name(&self) -> &'static str;
    fn encode_transaction(&self, tx: &Transaction) -> Result<Vec<u8>>;
    fn decode_transaction(&self, bytes: &[u8]) -> Result<Transaction>;
    fn encode_block(&self, block: &Block) -> Result<Vec<u8>>;
    fn decode_block(&self, bytes: &[u8]) -> Result<Block>;
}

/// Compact binary encoding (default)
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeCodec;

impl Codec for BincodeCodec {
    fn name(&self) -> &'static str {
        "bincode"
    }

    fn encode_transaction(&self, tx: &Transaction) -> Result<Vec<u8>> {
        serialize(tx)
    }

    fn decode_transaction(&self, bytes: &[u8]) -> Result<Transaction> {
        deserialize(bytes)
    }

    fn encode_block(&self, block: &Block) -> Result<Vec<u8>> {
        serialize(block)
    }

    fn decode_block(&self, bytes: &[u8]) -> Result<Block> {
        deserialize(bytes)
    }
}

/// Human-readable encoding, handy when sniffing traffic between nodes
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn encode_transaction(&self, tx: &Transaction) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(tx)?)
    }

    fn decode_transaction(&self, bytes: &[u8]) -> Result<Transaction> {
        Ok(serde_json::from_slice(bytes)?)
    }

    fn encode_block(&self, block: &Block) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(block)?)
    }

    fn decode_block(&self, bytes: &[u8]) -> Result<Block> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecKind {
    #[default]
    Bincode,
    Json,
}

impl CodecKind {
    pub fn build(self) -> Arc<dyn Codec> {
        match self {
            CodecKind::Bincode => Arc::new(BincodeCodec),
            CodecKind::Json => Arc::new(JsonCodec),
        }
    }
}

impl FromStr for CodecKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bincode" => Ok(CodecKind::Bincode),
            "json" => Ok(CodecKind::Json),
            _ => Err(format!("Invalid codec: {s}. Valid options: bincode, json")),
        }
    }
}

impl fmt::Display for CodecKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecKind::Bincode => write!(f, "bincode"),
            CodecKind::Json => write!(f, "json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hash::Hash;
    use crate::wallet::Wallet;

    fn signed_block() -> Block {
        let wallet = Wallet::new().unwrap();
        let mut tx = Transaction::new(b"payload".to_vec());
        tx.sign(&wallet).unwrap();
        let mut block = Block::new_test_block(3, Hash::random(), vec![tx]);
        block.sign(&wallet).unwrap();
        block
    }

    #[test]
    fn test_every_codec_preserves_signed_block() {
        let block = signed_block();
        for kind in [CodecKind::Bincode, CodecKind::Json] {
            let codec = kind.build();
            let bytes = codec.encode_block(&block).unwrap();
            let decoded = codec.decode_block(&bytes).unwrap();

            assert_eq!(decoded, block, "codec {}", codec.name());
            assert!(decoded.verify().is_ok());
        }
    }

    #[test]
    fn test_codecs_are_not_interchangeable() {
        let tx = signed_block().get_transactions()[0].clone();
        let bytes = BincodeCodec.encode_transaction(&tx).unwrap();
        assert!(JsonCodec.decode_transaction(&bytes).is_err());
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(BincodeCodec.decode_block(&[0xff, 0x01]).is_err());
        assert!(JsonCodec.decode_block(b"{not json").is_err());
    }

    #[test]
    fn test_codec_kind_parsing() {
        assert_eq!("JSON".parse::<CodecKind>().unwrap(), CodecKind::Json);
        assert_eq!("bincode".parse::<CodecKind>().unwrap(), CodecKind::Bincode);
        assert!("gob".parse::<CodecKind>().is_err());
        assert_eq!(CodecKind::default().to_string(), "bincode");
    }
}
