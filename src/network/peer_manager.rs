use crate::error::{BlockchainError, Result};
use crate::network::transport::Transport;
use log::{info, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

pub const DEFAULT_MAX_PEERS: usize = 64;

/// Peer manager for the node
///
/// Tracks which transport reaches each peer and which peers we are
/// currently syncing from:
/// - Broadcast takes the read lock, connect/disconnect take the write lock
/// - At most one sync loop per peer, its target raised by later status replies
pub struct PeerManager {
    /// Connected peers and the transport that reaches them
    connected_peers: RwLock<HashMap<String, Arc<dyn Transport>>>,
    /// Peers with an active sync loop, mapped to the height we want to reach
    syncing: Mutex<HashMap<String, u32>>,
    /// Maximum number of connections
    max_connections: usize,
}

impl PeerManager {
    pub fn new(max_connections: usize) -> Self {
        Self {
            connected_peers: RwLock::new(HashMap::new()),
            syncing: Mutex::new(HashMap::new()),
            max_connections,
        }
    }

    /// Record a connection. Returns false when the limit is reached.
    pub fn record_connection(&self, address: &str, transport: Arc<dyn Transport>) -> Result<bool> {
        let mut connected = self
            .connected_peers
            .write()
            .map_err(|e| BlockchainError::Network(format!("Failed to acquire peer lock: {e}")))?;

        if !connected.contains_key(address) && connected.len() >= self.max_connections {
            warn!("Rejecting peer {address}: connection limit reached");
            return Ok(false);
        }

        connected.insert(address.to_string(), transport);
        info!("Connected to peer: {address}");
        Ok(true)
    }

    /// Record a disconnection. Any sync loop against the peer winds down on its next tick.
    pub fn record_disconnection(&self, address: &str) -> Result<()> {
        let mut connected = self
            .connected_peers
            .write()
            .map_err(|e| BlockchainError::Network(format!("Failed to acquire peer lock: {e}")))?;

        connected.remove(address);
        info!("Disconnected from peer: {address}");
        Ok(())
    }

    pub fn get_connected_count(&self) -> Result<usize> {
        let connected = self
            .connected_peers
            .read()
            .map_err(|e| BlockchainError::Network(format!("Failed to acquire peer lock: {e}")))?;
        Ok(connected.len())
    }

    pub fn is_connected(&self, address: &str) -> bool {
        self.connected_peers
            .read()
            .map(|connected| connected.contains_key(address))
            .unwrap_or(false)
    }

    pub fn send_to(&self, address: &str, payload: Vec<u8>) -> Result<()> {
        let transport = self
            .connected_peers
            .read()
            .map_err(|e| BlockchainError::Network(format!("Failed to acquire peer lock: {e}")))?
            .get(address)
            .cloned()
            .ok_or_else(|| BlockchainError::PeerNotFound(address.to_string()))?;

        transport.send_message(address, payload)
    }

    /// Send to every connected peer except `except`. Failures are logged and skipped.
    /// Returns how many peers the payload reached.
    pub fn broadcast(&self, payload: &[u8], except: Option<&str>) -> Result<usize> {
        let connected = self
            .connected_peers
            .read()
            .map_err(|e| BlockchainError::Network(format!("Failed to acquire peer lock: {e}")))?;

        let mut sent = 0;
        for (address, transport) in connected.iter() {
            if Some(address.as_str()) == except {
                continue;
            }
            match transport.send_message(address, payload.to_vec()) {
                Ok(()) => sent += 1,
                Err(e) => warn!("Failed to broadcast to {address}: {e}"),
            }
        }
        Ok(sent)
    }

    /// Registers a sync target for `address`. Returns true when the caller must start
    /// the loop; false when one is already running (its target is raised instead).
    pub fn begin_sync(&self, address: &str, target: u32) -> Result<bool> {
        let mut syncing = self
            .syncing
            .lock()
            .map_err(|e| BlockchainError::Network(format!("Failed to acquire sync lock: {e}")))?;

        match syncing.get_mut(address) {
            Some(current) => {
                *current = (*current).max(target);
                Ok(false)
            }
            None => {
                syncing.insert(address.to_string(), target);
                Ok(true)
            }
        }
    }

    pub fn sync_target(&self, address: &str) -> Option<u32> {
        self.syncing
            .lock()
            .ok()
            .and_then(|syncing| syncing.get(address).copied())
    }

    pub fn is_syncing(&self, address: &str) -> bool {
        self.sync_target(address).is_some()
    }

    /// Clears the entry once `height` reached the target. Returns true when the loop must stop.
    pub fn finish_sync_if_caught_up(&self, address: &str, height: u32) -> Result<bool> {
        let mut syncing = self
            .syncing
            .lock()
            .map_err(|e| BlockchainError::Network(format!("Failed to acquire sync lock: {e}")))?;

        match syncing.get(address) {
            Some(target) if height < *target => Ok(false),
            _ => {
                syncing.remove(address);
                Ok(true)
            }
        }
    }

    pub fn end_sync(&self, address: &str) {
        match self.syncing.lock() {
            Ok(mut syncing) => {
                syncing.remove(address);
            }
            Err(e) => warn!("Failed to acquire sync lock: {e}"),
        }
    }
}

impl Default for PeerManager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PEERS)
    }
}
