//! # Authority Chain
//!
//! A single-authority blockchain node. One validator holds the signing key and
//! produces a block on a fixed interval; every other node verifies, stores and
//! gossips what it receives, and catches up from peers that report a higher chain.
//!
//! ## Layout
//! - `core/`: headers, transactions, blocks, hashing and signing, codecs, the
//!   block validator and the chain store
//! - `storage/`: the in-memory block store and the transaction pool
//! - `network/`: transports, wire messages, peers, sync, and the server loop
//! - `wallet/`: P-256 keys, signatures and addresses
//! - `config/`: node configuration
//! - `utils/`: hashing, signing and serialization helpers
//! - `cli/`: the commands behind the binary

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod network;
pub mod storage;
pub mod utils;
pub mod wallet;

#[cfg(test)]
pub mod testnet;

// Re-export commonly used types for convenience
pub use cli::{Command, NodeArgs, Opt};
pub use config::NodeConfig;
pub use core::{
    Block, BlockValidator, Blockchain, ChainReader, Codec, CodecKind, Hash, Header, Transaction,
    Validator,
};
pub use error::{BlockchainError, Result};
pub use network::{
    LocalTransport, Server, ServerHandle, ServerOpts, TcpTransport, Transport, TransportEvent,
};
pub use storage::{MemoryStore, Storage, TxPool};
pub use utils::{current_timestamp, sha256_digest};
pub use wallet::{Address, PublicKey, Signature, Wallet};
