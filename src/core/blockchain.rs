// The chain: an append-only run of headers and blocks indexed by height, genesis at 0.
// All reads and the validate-then-append step go through one RwLock, so a rejected
// block never leaves a partial append behind.

use crate::core::validator::{BlockValidator, ChainReader, Validator};
use crate::core::{Block, Header};
use crate::error::{BlockchainError, Result};
use crate::storage::{MemoryStore, Storage};
use log::info;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

struct ChainState {
    headers: Vec<Header>,
    store: Box<dyn Storage>,
}

impl ChainState {
    fn append(&mut self, block: &Block) -> Result<()> {
        // Store first: if it fails the header list is untouched
        self.store.put(block)?;
        self.headers.push(block.get_header().clone());
        Ok(())
    }

    fn height_too_high(&self, requested: u32) -> BlockchainError {
        BlockchainError::HeightTooHigh {
            requested,
            height: self.height(),
        }
    }
}

impl ChainReader for ChainState {
    // [0, 1, 2] : height = 2
    fn height(&self) -> u32 {
        self.headers.len().saturating_sub(1) as u32
    }

    fn has_block(&self, height: u32) -> bool {
        (height as usize) < self.headers.len()
    }

    fn get_header(&self, height: u32) -> Result<Header> {
        self.headers
            .get(height as usize)
            .cloned()
            .ok_or_else(|| self.height_too_high(height))
    }
}

pub struct Blockchain {
    state: RwLock<ChainState>,
    validator: RwLock<Arc<dyn Validator>>,
}

impl Blockchain {
    pub fn new(genesis: Block) -> Result<Blockchain> {
        Self::with_store(genesis, Box::new(MemoryStore::new()))
    }

    /// Genesis goes in without validation: there is nothing to check it against.
    pub fn with_store(genesis: Block, store: Box<dyn Storage>) -> Result<Blockchain> {
        let mut state = ChainState {
            headers: vec![],
            store,
        };
        state.append(&genesis)?;
        info!("Created chain with genesis block {}", genesis.hash());

        Ok(Blockchain {
            state: RwLock::new(state),
            validator: RwLock::new(Arc::new(BlockValidator)),
        })
    }

    pub fn set_validator(&self, validator: Arc<dyn Validator>) {
        *self
            .validator
            .write()
            .unwrap_or_else(PoisonError::into_inner) = validator;
    }

    /// Validates and appends in one step under the write lock.
    pub fn add_block(&self, block: &Block) -> Result<()> {
        let validator = self
            .validator
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let mut state = self.write_state();
        validator.validate_block(&*state, block)?;
        state.append(block)?;

        info!(
            "Added block {} at height {} with {} transactions",
            block.hash(),
            block.get_height(),
            block.get_transactions().len()
        );
        Ok(())
    }

    pub fn get_block(&self, height: u32) -> Result<Block> {
        let state = self.read_state();
        state
            .store
            .get(height)
            .cloned()
            .ok_or_else(|| state.height_too_high(height))
    }

    pub fn get_header(&self, height: u32) -> Result<Header> {
        self.read_state().get_header(height)
    }

    pub fn height(&self) -> u32 {
        self.read_state().height()
    }

    pub fn has_block(&self, height: u32) -> bool {
        self.read_state().has_block(height)
    }

    pub fn header_count(&self) -> usize {
        self.read_state().headers.len()
    }

    fn read_state(&self) -> RwLockReadGuard<'_, ChainState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, ChainState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ChainReader for Blockchain {
    fn height(&self) -> u32 {
        Blockchain::height(self)
    }

    fn has_block(&self, height: u32) -> bool {
        Blockchain::has_block(self, height)
    }

    fn get_header(&self, height: u32) -> Result<Header> {
        Blockchain::get_header(self, height)
    }
}
