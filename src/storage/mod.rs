//! Data storage
//!
//! The in-memory block store behind the chain and the memory pool that holds
//! transactions until a block includes them.

pub mod memory_pool;
pub mod memory_store;

pub use memory_pool::{TxPool, DEFAULT_POOL_CAPACITY};
pub use memory_store::{MemoryStore, Storage};
