//! Core chain functionality
//!
//! Headers, transactions and blocks with their hashing and signing rules, the
//! envelope codecs, the block validator and the chain itself.

pub mod block;
pub mod blockchain;
pub mod codec;
pub mod hash;
pub mod transaction;
pub mod validator;

pub use block::{Block, Header, GENESIS_COINBASE_VALUE, HEADER_LEN};
pub use blockchain::Blockchain;
pub use codec::{BincodeCodec, Codec, CodecKind, JsonCodec};
pub use hash::{hash_header, hash_transaction, Hash};
pub use transaction::Transaction;
pub use validator::{BlockValidator, ChainReader, Validator};
