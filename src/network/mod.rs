//! Peer-to-peer networking
//!
//! Transports move raw bytes between nodes; the server decodes them into
//! protocol messages, keeps track of peers and drives block production and sync.

pub mod local_transport;
pub mod message;
pub mod peer_manager;
pub mod server;
pub mod sync;
pub mod tcp_transport;
pub mod transport;

pub use local_transport::LocalTransport;
pub use message::{
    decode_message, BlocksMessage, DecodedMessage, GetBlocksMessage, GetStatusMessage, Message,
    MessageType, Payload, StatusMessage,
};
pub use peer_manager::{PeerManager, DEFAULT_MAX_PEERS};
pub use server::{Event, Server, ServerHandle, ServerOpts, ShutdownSignal};
pub use sync::SyncLoop;
pub use tcp_transport::TcpTransport;
pub use transport::{Rpc, Transport, TransportEvent};
