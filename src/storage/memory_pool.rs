use crate::core::{Block, Hash, Transaction};
use log::debug;
use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;

pub const DEFAULT_POOL_CAPACITY: usize = 1000;

#[derive(Default)]
struct PoolInner {
    // K -> content hash, V -> transaction
    all: HashMap<Hash, Transaction>,
    // insertion order, oldest first
    order: VecDeque<Hash>,
}

/// Pending transactions waiting for a block, deduplicated by content hash
pub struct TxPool {
    inner: RwLock<PoolInner>,
    capacity: usize,
}

impl Default for TxPool {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_CAPACITY)
    }
}

impl TxPool {
    pub fn new(capacity: usize) -> TxPool {
        TxPool {
            inner: RwLock::new(PoolInner::default()),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Inserts the transaction unless its hash is already pooled. Returns whether it
    /// was inserted. Going over capacity evicts the oldest entries.
    pub fn add(&self, tx: Transaction) -> bool {
        let hash = tx.hash();
        match self.inner.write() {
            Ok(mut pool) => {
                if pool.all.contains_key(&hash) {
                    return false;
                }
                pool.all.insert(hash, tx);
                pool.order.push_back(hash);

                while pool.order.len() > self.capacity {
                    if let Some(oldest) = pool.order.pop_front() {
                        pool.all.remove(&oldest);
                        debug!("Evicted transaction {oldest} from full pool");
                    }
                }
                true
            }
            Err(_) => {
                log::error!("Failed to acquire write lock on memory pool");
                false
            }
        }
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        match self.inner.read() {
            Ok(pool) => pool.all.contains_key(hash),
            Err(_) => {
                log::error!("Failed to acquire read lock on memory pool");
                false
            }
        }
    }

    pub fn get(&self, hash: &Hash) -> Option<Transaction> {
        match self.inner.read() {
            Ok(pool) => pool.all.get(hash).cloned(),
            Err(_) => {
                log::error!("Failed to acquire read lock on memory pool");
                None
            }
        }
    }

    /// Snapshot in insertion order; nothing is removed
    pub fn pending(&self) -> Vec<Transaction> {
        match self.inner.read() {
            Ok(pool) => pool
                .order
                .iter()
                .filter_map(|hash| pool.all.get(hash).cloned())
                .collect(),
            Err(_) => {
                log::error!("Failed to acquire read lock on memory pool");
                Vec::new()
            }
        }
    }

    pub fn remove(&self, hash: &Hash) -> Option<Transaction> {
        match self.inner.write() {
            Ok(mut pool) => {
                let removed = pool.all.remove(hash)?;
                pool.order.retain(|h| h != hash);
                Some(removed)
            }
            Err(_) => {
                log::error!("Failed to acquire write lock on memory pool");
                None
            }
        }
    }

    /// Drops every pooled transaction the block includes. Returns how many went.
    pub fn remove_included(&self, block: &Block) -> usize {
        match self.inner.write() {
            Ok(mut pool) => {
                let before = pool.all.len();
                for tx in block.get_transactions() {
                    pool.all.remove(&tx.hash());
                }
                let PoolInner { all, order } = &mut *pool;
                order.retain(|h| all.contains_key(h));
                before - pool.all.len()
            }
            Err(_) => {
                log::error!("Failed to acquire write lock on memory pool");
                0
            }
        }
    }

    pub fn len(&self) -> usize {
        match self.inner.read() {
            Ok(pool) => pool.all.len(),
            Err(_) => {
                log::error!("Failed to acquire read lock on memory pool");
                0
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn flush(&self) {
        match self.inner.write() {
            Ok(mut pool) => {
                pool.all.clear();
                pool.order.clear();
            }
            Err(_) => {
                log::error!("Failed to acquire write lock on memory pool");
            }
        }
    }
}
