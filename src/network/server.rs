use crate::config::NodeConfig;
use crate::core::{BincodeCodec, Block, Blockchain, Codec, Transaction};
use crate::error::{BlockchainError, Result};
use crate::network::message::{
    decode_message, BlocksMessage, DecodedMessage, GetBlocksMessage, GetStatusMessage, Payload,
    StatusMessage,
};
use crate::network::peer_manager::{PeerManager, DEFAULT_MAX_PEERS};
use crate::network::sync::SyncLoop;
use crate::network::tcp_transport::MAX_FRAME_LEN;
use crate::network::transport::{Rpc, Transport, TransportEvent};
use crate::storage::{TxPool, DEFAULT_POOL_CAPACITY};
use crate::wallet::Wallet;
use log::{debug, error, info, warn};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

pub const DEFAULT_BLOCK_TIME: Duration = Duration::from_secs(5);
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(3);
const FORWARD_POLL_INTERVAL: Duration = Duration::from_millis(100);
/// Encoded size a single `Blocks` reply may reach; stays well below the TCP frame cap.
pub const DEFAULT_MAX_REPLY_BYTES: usize = MAX_FRAME_LEN / 2;

pub struct ServerOpts {
    pub id: String,
    pub transports: Vec<Arc<dyn Transport>>,
    pub block_time: Duration,
    pub sync_interval: Duration,
    /// Present only on the validator
    pub private_key: Option<Wallet>,
    pub codec: Arc<dyn Codec>,
    pub pool_capacity: usize,
    pub max_peers: usize,
    /// A `GetBlocks` reply stops adding blocks once it would grow past this.
    /// The first block is always sent.
    pub max_reply_bytes: usize,
}

impl ServerOpts {
    pub fn new(id: &str) -> ServerOpts {
        ServerOpts {
            id: id.to_string(),
            transports: vec![],
            block_time: DEFAULT_BLOCK_TIME,
            sync_interval: DEFAULT_SYNC_INTERVAL,
            private_key: None,
            codec: Arc::new(BincodeCodec),
            pool_capacity: DEFAULT_POOL_CAPACITY,
            max_peers: DEFAULT_MAX_PEERS,
            max_reply_bytes: DEFAULT_MAX_REPLY_BYTES,
        }
    }

    pub fn from_config(
        config: &NodeConfig,
        transports: Vec<Arc<dyn Transport>>,
        private_key: Option<Wallet>,
    ) -> ServerOpts {
        ServerOpts {
            id: config.id.clone(),
            transports,
            block_time: Duration::from_millis(config.block_time_ms),
            sync_interval: Duration::from_millis(config.sync_interval_ms),
            private_key,
            codec: config.codec.build(),
            pool_capacity: config.pool_capacity,
            max_peers: config.max_peers,
            max_reply_bytes: DEFAULT_MAX_REPLY_BYTES,
        }
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> ServerOpts {
        self.transports.push(transport);
        self
    }

    pub fn with_private_key(mut self, private_key: Wallet) -> ServerOpts {
        self.private_key = Some(private_key);
        self
    }

    pub fn is_validator(&self) -> bool {
        self.private_key.is_some()
    }
}

/// Everything the dispatch loop reacts to
pub enum Event {
    Transport {
        transport: Arc<dyn Transport>,
        event: TransportEvent,
    },
    LocalTransaction(Transaction),
    ProduceBlock,
    Shutdown,
}

/// Set once, observed by every background loop of a node
#[derive(Clone, Default)]
pub struct ShutdownSignal(Arc<(Mutex<bool>, Condvar)>);

impl ShutdownSignal {
    pub fn new() -> ShutdownSignal {
        ShutdownSignal::default()
    }

    pub fn trigger(&self) {
        let (lock, cvar) = &*self.0;
        *lock.lock().unwrap_or_else(PoisonError::into_inner) = true;
        cvar.notify_all();
    }

    pub fn is_triggered(&self) -> bool {
        let (lock, _) = &*self.0;
        *lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleeps up to `timeout`. Returns true if the signal fired.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (lock, cvar) = &*self.0;
        let guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = cvar
            .wait_timeout_while(guard, timeout, |stopped| !*stopped)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}

/// Cloneable way into a running server
#[derive(Clone)]
pub struct ServerHandle {
    events: Sender<Event>,
    shutdown: ShutdownSignal,
}

impl ServerHandle {
    pub fn submit_transaction(&self, tx: Transaction) -> Result<()> {
        self.events
            .send(Event::LocalTransaction(tx))
            .map_err(|_| BlockchainError::Network("Server is not running".to_string()))
    }

    pub fn shutdown(&self) {
        self.shutdown.trigger();
        let _ = self.events.send(Event::Shutdown);
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_triggered()
    }
}

/// A node: owns the chain and the pool and mutates both only from its dispatch loop
pub struct Server {
    opts: ServerOpts,
    chain: Arc<Blockchain>,
    mem_pool: TxPool,
    peers: Arc<PeerManager>,
    events_tx: Sender<Event>,
    events_rx: Receiver<Event>,
    shutdown: ShutdownSignal,
}

impl Server {
    pub fn new(opts: ServerOpts) -> Result<Server> {
        let genesis = Block::generate_genesis_block()?;
        let chain = Arc::new(Blockchain::new(genesis)?);
        let (events_tx, events_rx) = channel();

        Ok(Server {
            mem_pool: TxPool::new(opts.pool_capacity),
            peers: Arc::new(PeerManager::new(opts.max_peers)),
            opts,
            chain,
            events_tx,
            events_rx,
            shutdown: ShutdownSignal::new(),
        })
    }

    pub fn id(&self) -> &str {
        &self.opts.id
    }

    pub fn chain(&self) -> Arc<Blockchain> {
        Arc::clone(&self.chain)
    }

    pub fn mem_pool(&self) -> &TxPool {
        &self.mem_pool
    }

    pub fn peers(&self) -> Arc<PeerManager> {
        Arc::clone(&self.peers)
    }

    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            events: self.events_tx.clone(),
            shutdown: self.shutdown.clone(),
        }
    }

    /// Runs the node until [`ServerHandle::shutdown`] is called.
    pub fn start(self) -> Result<()> {
        info!(
            "Starting node {} (validator: {}, codec: {})",
            self.opts.id,
            self.opts.is_validator(),
            self.opts.codec.name()
        );

        for transport in &self.opts.transports {
            let inbound = transport.consume()?;
            self.spawn_forwarder(Arc::clone(transport), inbound);
        }

        if self.opts.is_validator() {
            self.spawn_validator_loop();
        }

        while let Ok(event) = self.events_rx.recv() {
            if let Event::Shutdown = event {
                break;
            }
            self.handle_event(event);
        }

        self.shutdown.trigger();
        info!("Node {} stopped at height {}", self.opts.id, self.chain.height());
        Ok(())
    }

    /// One step of the dispatch loop. Errors are logged, never returned.
    pub fn handle_event(&self, event: Event) {
        match event {
            Event::Transport { transport, event } => match event {
                TransportEvent::Connected(addr) => self.on_peer_connected(&addr, transport),
                TransportEvent::Disconnected(addr) => {
                    if let Err(e) = self.peers.record_disconnection(&addr) {
                        warn!("Failed to record disconnection: {e}");
                    }
                }
                TransportEvent::Message(rpc) => self.on_rpc(rpc),
            },
            Event::LocalTransaction(tx) => {
                if let Err(e) = self.process_transaction(None, tx) {
                    error!("Rejected local transaction: {e}");
                }
            }
            Event::ProduceBlock => {
                if let Err(e) = self.create_new_block() {
                    error!("Failed to create block: {e}");
                }
            }
            Event::Shutdown => self.shutdown.trigger(),
        }
    }

    fn on_peer_connected(&self, addr: &str, transport: Arc<dyn Transport>) {
        match self.peers.record_connection(addr, transport) {
            Ok(true) => {
                if let Err(e) = self.send_payload(addr, &Payload::GetStatus(GetStatusMessage)) {
                    warn!("Failed to request status from {addr}: {e}");
                }
            }
            Ok(false) => {}
            Err(e) => error!("Failed to record connection to {addr}: {e}"),
        }
    }

    fn on_rpc(&self, rpc: Rpc) {
        let msg = match decode_message(&rpc, &*self.opts.codec) {
            Ok(msg) => msg,
            Err(e) => {
                warn!("Dropping message from {}: {e}", rpc.from);
                return;
            }
        };

        let from = msg.from.clone();
        if let Err(e) = self.process_message(msg) {
            if e.is_block_known() {
                debug!("Ignoring block from {from}: {e}");
            } else {
                error!("Failed to process message from {from}: {e}");
            }
        }
    }

    pub fn process_message(&self, msg: DecodedMessage) -> Result<()> {
        let from = msg.from.as_str();
        match msg.data {
            Payload::Transaction(tx) => self.process_transaction(Some(from), tx),
            Payload::Block(block) => self.process_block(Some(from), block),
            Payload::GetStatus(_) => self.process_get_status(from),
            Payload::Status(status) => self.process_status(from, status),
            Payload::GetBlocks(request) => self.process_get_blocks(from, request),
            Payload::Blocks(blocks) => self.process_blocks(from, blocks),
        }
    }

    fn process_transaction(&self, from: Option<&str>, tx: Transaction) -> Result<()> {
        tx.verify()?;

        let hash = tx.hash();
        if self.mem_pool.contains(&hash) {
            debug!("Transaction {hash} is already pooled");
            return Ok(());
        }

        self.mem_pool.add(tx.clone());
        info!(
            "Added transaction {hash} from {} to the pool ({} pending)",
            from.unwrap_or("local"),
            self.mem_pool.len()
        );

        self.broadcast(&Payload::Transaction(tx), from)
    }

    fn process_block(&self, from: Option<&str>, block: Block) -> Result<()> {
        match self.accept_block(&block) {
            Ok(()) => self.broadcast(&Payload::Block(block), from),
            // A block from beyond our tip means we missed some: catch up from the sender
            Err(BlockchainError::HeightMismatch { expected, actual }) if actual > expected => {
                if let Some(peer) = from {
                    self.start_sync(peer, actual)?;
                }
                Err(BlockchainError::HeightMismatch { expected, actual })
            }
            Err(e) => Err(e),
        }
    }

    fn accept_block(&self, block: &Block) -> Result<()> {
        self.chain.add_block(block)?;
        let included = self.mem_pool.remove_included(block);
        if included > 0 {
            debug!(
                "Dropped {included} included transactions from the pool at height {}",
                block.get_height()
            );
        }
        Ok(())
    }

    fn process_get_status(&self, from: &str) -> Result<()> {
        let status = StatusMessage {
            id: self.opts.id.clone(),
            current_height: self.chain.height(),
        };
        self.send_payload(from, &Payload::Status(status))
    }

    fn process_status(&self, from: &str, status: StatusMessage) -> Result<()> {
        let height = self.chain.height();
        if status.current_height <= height {
            debug!(
                "Peer {from} ({}) at height {}, we are at {height}",
                status.id, status.current_height
            );
            return Ok(());
        }

        info!(
            "Peer {from} ({}) is ahead: {} > {height}",
            status.id, status.current_height
        );
        self.start_sync(from, status.current_height)
    }

    fn start_sync(&self, peer: &str, target: u32) -> Result<()> {
        if self.peers.begin_sync(peer, target)? {
            SyncLoop::new(
                peer,
                Arc::clone(&self.chain),
                Arc::clone(&self.peers),
                Arc::clone(&self.opts.codec),
                self.opts.sync_interval,
                self.shutdown.clone(),
            )
            .spawn();
        } else {
            debug!("Sync with {peer} already running, target raised to at least {target}");
        }
        Ok(())
    }

    fn process_get_blocks(&self, from: &str, request: GetBlocksMessage) -> Result<()> {
        let height = self.chain.height();
        let to = if request.to == 0 {
            height
        } else {
            request.to.min(height)
        };

        // Only a prefix of the range when it is too large for one reply;
        // the requester asks again from its new height.
        let mut blocks = vec![];
        let mut reply_bytes = 0;
        for block_height in request.from..=to {
            let block = self.chain.get_block(block_height)?;
            reply_bytes += self.opts.codec.encode_block(&block)?.len() + 4;
            if !blocks.is_empty() && reply_bytes > self.opts.max_reply_bytes {
                break;
            }
            blocks.push(block);
        }

        debug!(
            "Sending {} blocks from {} (requested up to {to}) to {from}",
            blocks.len(),
            request.from
        );
        self.send_payload(from, &Payload::Blocks(BlocksMessage { blocks }))
    }

    /// Applied in order; the first failure aborts the rest of the batch.
    fn process_blocks(&self, from: &str, msg: BlocksMessage) -> Result<()> {
        let count = msg.blocks.len();
        for block in &msg.blocks {
            self.accept_block(block)?;
        }
        if count > 0 {
            info!(
                "Applied {count} blocks from {from}, height is now {}",
                self.chain.height()
            );
        }
        Ok(())
    }

    fn create_new_block(&self) -> Result<()> {
        let private_key = self.opts.private_key.as_ref().ok_or_else(|| {
            BlockchainError::Crypto("Node holds no validator key".to_string())
        })?;

        let prev_header = self.chain.get_header(self.chain.height())?;
        let transactions = self.mem_pool.pending();
        let mut block = Block::new_block_from_prev_header(&prev_header, transactions)?;
        block.sign(private_key)?;

        info!(
            "Created block {} at height {} with {} transactions",
            block.hash(),
            block.get_height(),
            block.get_transactions().len()
        );
        self.process_block(None, block)
    }

    fn send_payload(&self, to: &str, payload: &Payload) -> Result<()> {
        let message = payload.encode(&*self.opts.codec)?;
        self.peers.send_to(to, message.to_bytes())
    }

    fn broadcast(&self, payload: &Payload, except: Option<&str>) -> Result<()> {
        let message = payload.encode(&*self.opts.codec)?;
        let sent = self.peers.broadcast(&message.to_bytes(), except)?;
        debug!("Broadcast {:?} to {sent} peers", message.header);
        Ok(())
    }

    fn spawn_forwarder(&self, transport: Arc<dyn Transport>, inbound: Receiver<TransportEvent>) {
        let events = self.events_tx.clone();
        let shutdown = self.shutdown.clone();

        thread::spawn(move || {
            while !shutdown.is_triggered() {
                match inbound.recv_timeout(FORWARD_POLL_INTERVAL) {
                    Ok(event) => {
                        let event = Event::Transport {
                            transport: Arc::clone(&transport),
                            event,
                        };
                        if events.send(event).is_err() {
                            break;
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            debug!("Stopped reading from {}", transport.addr());
        });
    }

    fn spawn_validator_loop(&self) {
        let events = self.events_tx.clone();
        let shutdown = self.shutdown.clone();
        let block_time = self.opts.block_time;
        info!("Starting validator loop, one block every {block_time:?}");

        thread::spawn(move || loop {
            if events.send(Event::ProduceBlock).is_err() {
                break;
            }
            if shutdown.wait_timeout(block_time) {
                break;
            }
        });
    }
}
