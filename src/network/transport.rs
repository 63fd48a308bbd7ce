use crate::error::Result;
use std::sync::mpsc::Receiver;

/// Raw payload received from a peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rpc {
    pub from: String,
    pub payload: Vec<u8>,
}

impl Rpc {
    pub fn new(from: String, payload: Vec<u8>) -> Rpc {
        Rpc { from, payload }
    }
}

/// What a transport surfaces to the node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connected(String),
    Disconnected(String),
    Message(Rpc),
}

/// Moves raw bytes between logical addresses. The protocol does not care whether
/// the bytes cross a socket or stay in the process.
pub trait Transport: Send + Sync {
    fn addr(&self) -> String;

    fn send_message(&self, to: &str, payload: Vec<u8>) -> Result<()>;

    /// Hands out the inbound stream. Only the first call succeeds.
    fn consume(&self) -> Result<Receiver<TransportEvent>>;
}
