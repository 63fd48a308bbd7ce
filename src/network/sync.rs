//! Block-range sync against a single peer that reported a higher chain.
//!
//! The loop polls the peer with `GetBlocks` on a fixed interval. Blocks come back
//! through the dispatch loop like any other message; this task only asks. It
//! re-reads the local height on every tick and stops once the target is reached,
//! the peer disconnects, or the node shuts down.

use crate::core::{Blockchain, Codec};
use crate::error::{BlockchainError, Result};
use crate::network::message::{GetBlocksMessage, Payload};
use crate::network::peer_manager::PeerManager;
use crate::network::server::ShutdownSignal;
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub struct SyncLoop {
    peer: String,
    chain: Arc<Blockchain>,
    peers: Arc<PeerManager>,
    codec: Arc<dyn Codec>,
    interval: Duration,
    shutdown: ShutdownSignal,
}

impl SyncLoop {
    pub fn new(
        peer: &str,
        chain: Arc<Blockchain>,
        peers: Arc<PeerManager>,
        codec: Arc<dyn Codec>,
        interval: Duration,
        shutdown: ShutdownSignal,
    ) -> SyncLoop {
        SyncLoop {
            peer: peer.to_string(),
            chain,
            peers,
            codec,
            interval,
            shutdown,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        thread::spawn(move || self.run())
    }

    pub fn run(self) {
        info!(
            "Syncing from {} up to height {}",
            self.peer,
            self.peers.sync_target(&self.peer).unwrap_or_default()
        );

        loop {
            let height = self.chain.height();
            match self.peers.finish_sync_if_caught_up(&self.peer, height) {
                Ok(true) => {
                    info!("Caught up with {} at height {height}", self.peer);
                    return;
                }
                Ok(false) => {}
                Err(e) => {
                    error!("Stopping sync with {}: {e}", self.peer);
                    self.peers.end_sync(&self.peer);
                    return;
                }
            }

            match self.request_blocks(height + 1) {
                Ok(()) => {}
                Err(BlockchainError::PeerNotFound(_)) | Err(BlockchainError::ConnectionClosed(_)) => {
                    warn!("Stopping sync with {}: peer is gone", self.peer);
                    self.peers.end_sync(&self.peer);
                    return;
                }
                Err(e) => warn!("Failed to request blocks from {}: {e}", self.peer),
            }

            if self.shutdown.wait_timeout(self.interval) {
                debug!("Stopping sync with {}: shutting down", self.peer);
                self.peers.end_sync(&self.peer);
                return;
            }
        }
    }

    fn request_blocks(&self, from: u32) -> Result<()> {
        let message = Payload::GetBlocks(GetBlocksMessage { from, to: 0 }).encode(&*self.codec)?;
        debug!("Requesting blocks from {} starting at {from}", self.peer);
        self.peers.send_to(&self.peer, message.to_bytes())
    }
}
