//! In-process transport: nodes in the same process hand each other bytes over channels.

use crate::error::{BlockchainError, Result};
use crate::network::transport::{Rpc, Transport, TransportEvent};
use std::collections::HashMap;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex, RwLock, Weak};

pub struct LocalTransport {
    address: String,
    peers: RwLock<HashMap<String, Weak<LocalTransport>>>,
    tx: Sender<TransportEvent>,
    rx: Mutex<Option<Receiver<TransportEvent>>>,
}

impl LocalTransport {
    pub fn new(address: &str) -> Arc<LocalTransport> {
        let (tx, rx) = channel();
        Arc::new(LocalTransport {
            address: address.to_string(),
            peers: RwLock::new(HashMap::new()),
            tx,
            rx: Mutex::new(Some(rx)),
        })
    }

    /// Links both transports and announces the connection on both sides.
    pub fn connect(self: &Arc<Self>, other: &Arc<LocalTransport>) -> Result<()> {
        if self.address == other.address {
            return Err(BlockchainError::Network(format!(
                "{}: refusing to connect to itself",
                self.address
            )));
        }
        if self.add_peer(other)? {
            let _ = self.tx.send(TransportEvent::Connected(other.address.clone()));
        }
        if other.add_peer(self)? {
            let _ = other.tx.send(TransportEvent::Connected(self.address.clone()));
        }
        Ok(())
    }

    fn add_peer(&self, peer: &Arc<LocalTransport>) -> Result<bool> {
        let mut peers = self
            .peers
            .write()
            .map_err(|e| BlockchainError::Network(format!("Failed to acquire peer lock: {e}")))?;
        Ok(peers
            .insert(peer.address.clone(), Arc::downgrade(peer))
            .is_none())
    }
}

impl Transport for LocalTransport {
    fn addr(&self) -> String {
        self.address.clone()
    }

    fn send_message(&self, to: &str, payload: Vec<u8>) -> Result<()> {
        let peer = {
            let peers = self.peers.read().map_err(|e| {
                BlockchainError::Network(format!("Failed to acquire peer lock: {e}"))
            })?;
            peers
                .get(to)
                .cloned()
                .ok_or_else(|| BlockchainError::PeerNotFound(to.to_string()))?
        };

        let peer = peer
            .upgrade()
            .ok_or_else(|| BlockchainError::ConnectionClosed(to.to_string()))?;

        peer.tx
            .send(TransportEvent::Message(Rpc::new(self.address.clone(), payload)))
            .map_err(|_| BlockchainError::ConnectionClosed(to.to_string()))
    }

    fn consume(&self) -> Result<Receiver<TransportEvent>> {
        self.rx
            .lock()
            .map_err(|e| BlockchainError::Network(format!("Failed to acquire receiver lock: {e}")))?
            .take()
            .ok_or_else(|| {
                BlockchainError::Network(format!("{}: receiver already taken", self.address))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(1);

    #[test]
    fn test_connect_is_bidirectional() {
        let tr_a = LocalTransport::new("A");
        let tr_b = LocalTransport::new("B");
        let rx_a = tr_a.consume().unwrap();
        let rx_b = tr_b.consume().unwrap();

        tr_a.connect(&tr_b).unwrap();

        assert_eq!(
            rx_a.recv_timeout(WAIT).unwrap(),
            TransportEvent::Connected("B".to_string())
        );
        assert_eq!(
            rx_b.recv_timeout(WAIT).unwrap(),
            TransportEvent::Connected("A".to_string())
        );
    }

    #[test]
    fn test_reconnect_is_announced_once() {
        let tr_a = LocalTransport::new("A");
        let tr_b = LocalTransport::new("B");
        let rx_a = tr_a.consume().unwrap();

        tr_a.connect(&tr_b).unwrap();
        tr_b.connect(&tr_a).unwrap();

        assert!(rx_a.recv_timeout(WAIT).is_ok());
        assert!(rx_a.try_recv().is_err());
    }

    #[test]
    fn test_send_message() {
        let tr_a = LocalTransport::new("A");
        let tr_b = LocalTransport::new("B");
        let rx_b = tr_b.consume().unwrap();
        tr_a.connect(&tr_b).unwrap();
        let _ = rx_b.recv_timeout(WAIT);

        tr_a.send_message("B", b"hello world".to_vec()).unwrap();

        assert_eq!(
            rx_b.recv_timeout(WAIT).unwrap(),
            TransportEvent::Message(Rpc::new("A".to_string(), b"hello world".to_vec()))
        );
    }

    #[test]
    fn test_send_to_unknown_peer_fails() {
        let tr_a = LocalTransport::new("A");
        assert_eq!(
            tr_a.send_message("C", vec![1]),
            Err(BlockchainError::PeerNotFound("C".to_string()))
        );
    }

    #[test]
    fn test_send_to_dropped_peer_fails() {
        let tr_a = LocalTransport::new("A");
        let tr_b = LocalTransport::new("B");
        tr_a.connect(&tr_b).unwrap();
        drop(tr_b);

        assert_eq!(
            tr_a.send_message("B", vec![1]),
            Err(BlockchainError::ConnectionClosed("B".to_string()))
        );
    }

    #[test]
    fn test_consume_only_once() {
        let tr = LocalTransport::new("A");
        assert!(tr.consume().is_ok());
        assert!(tr.consume().is_err());
        assert!(tr.connect(&tr).is_err());
    }
}
