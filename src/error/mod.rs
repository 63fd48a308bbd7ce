//! Error handling for the node
//!
//! One error type covers validation, transport, decoding and setup failures.
//! Validation and transport errors are expected at runtime and never take the
//! node down; setup errors abort startup.

use std::fmt;

/// Result type alias for node operations
pub type Result<T> = std::result::Result<T, BlockchainError>;

/// Error types for chain, pool, protocol and setup operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockchainError {
    /// A block already exists at this height (expected under gossip)
    BlockKnown { height: u32 },
    /// Candidate block does not extend the current tip
    HeightMismatch { expected: u32, actual: u32 },
    /// Candidate block failed its own verification
    SignatureInvalid {
        height: u32,
        reason: Box<BlockchainError>,
    },
    /// Candidate block does not point at the header below it
    PrevHashMismatch { height: u32 },
    /// Header data hash does not match the transactions
    DataHashMismatch,
    /// Block or transaction carries no signature
    MissingSignature,
    /// Signature does not verify against the signer and payload
    InvalidSignature,
    /// A transaction inside a block failed verification
    TransactionInvalid {
        index: usize,
        reason: Box<BlockchainError>,
    },
    /// Requested height is above the chain tip
    HeightTooHigh { requested: u32, height: u32 },
    /// Message addressed to a peer nobody knows about
    PeerNotFound(String),
    /// Peer connection went away
    ConnectionClosed(String),
    /// Other network communication errors
    Network(String),
    /// Wire message carried an unknown kind tag
    UnknownMessageType(u8),
    /// Malformed wire payload
    Decode(String),
    /// Serialization/deserialization errors
    Serialization(String),
    /// Cryptographic operation errors
    Crypto(String),
    /// Configuration errors
    Config(String),
    /// File I/O errors
    Io(String),
}

impl BlockchainError {
    /// Duplicate block delivery is inherent to gossip and is not worth an error log.
    pub fn is_block_known(&self) -> bool {
        matches!(self, BlockchainError::BlockKnown { .. })
    }
}

impl fmt::Display for BlockchainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockchainError::BlockKnown { height } => {
                write!(f, "Block already known at height {height}")
            }
            BlockchainError::HeightMismatch { expected, actual } => {
                write!(f, "Height mismatch: expected {expected}, got {actual}")
            }
            BlockchainError::SignatureInvalid { height, reason } => {
                write!(f, "Block at height {height} failed verification: {reason}")
            }
            BlockchainError::PrevHashMismatch { height } => {
                write!(f, "Previous block hash mismatch at height {height}")
            }
            BlockchainError::DataHashMismatch => write!(f, "Block data hash mismatch"),
            BlockchainError::MissingSignature => write!(f, "Missing signature"),
            BlockchainError::InvalidSignature => write!(f, "Invalid signature"),
            BlockchainError::TransactionInvalid { index, reason } => {
                write!(f, "Transaction {index} is invalid: {reason}")
            }
            BlockchainError::HeightTooHigh { requested, height } => {
                write!(f, "Given height ({requested}) too high, chain height is {height}")
            }
            BlockchainError::PeerNotFound(addr) => write!(f, "Peer {addr} not known"),
            BlockchainError::ConnectionClosed(addr) => {
                write!(f, "Connection to {addr} closed")
            }
            BlockchainError::Network(msg) => write!(f, "Network error: {msg}"),
            BlockchainError::UnknownMessageType(tag) => {
                write!(f, "Unknown message type: {tag:#04x}")
            }
            BlockchainError::Decode(msg) => write!(f, "Decode error: {msg}"),
            BlockchainError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            BlockchainError::Crypto(msg) => write!(f, "Cryptographic error: {msg}"),
            BlockchainError::Config(msg) => write!(f, "Configuration error: {msg}"),
            BlockchainError::Io(msg) => write!(f, "I/O error: {msg}"),
        }
    }
}

impl std::error::Error for BlockchainError {}

impl From<std::io::Error> for BlockchainError {
    fn from(err: std::io::Error) -> Self {
        BlockchainError::Io(err.to_string())
    }
}

impl From<bincode::error::EncodeError> for BlockchainError {
    fn from(err: bincode::error::EncodeError) -> Self {
        BlockchainError::Serialization(err.to_string())
    }
}

impl From<bincode::error::DecodeError> for BlockchainError {
    fn from(err: bincode::error::DecodeError) -> Self {
        BlockchainError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for BlockchainError {
    fn from(err: serde_json::Error) -> Self {
        BlockchainError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for BlockchainError {
    fn from(err: toml::de::Error) -> Self {
        BlockchainError::Config(err.to_string())
    }
}
