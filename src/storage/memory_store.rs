use crate::core::Block;
use crate::error::Result;

/// Where accepted blocks live. Blocks are appended in height order and never removed.
pub trait Storage: Send + Sync {
    fn put(&mut self, block: &Block) -> Result<()>;
    fn get(&self, height: u32) -> Option<&Block>;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Blocks kept in a vector indexed by height
#[derive(Debug, Default)]
pub struct MemoryStore {
    blocks: Vec<Block>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore { blocks: vec![] }
    }
}

impl Storage for MemoryStore {
    fn put(&mut self, block: &Block) -> Result<()> {
        self.blocks.push(block.clone());
        Ok(())
    }

    fn get(&self, height: u32) -> Option<&Block> {
        self.blocks.get(height as usize)
    }

    fn len(&self) -> usize {
        self.blocks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Hash;

    #[test]
    fn test_put_and_get_by_height() {
        let mut store = MemoryStore::new();
        assert!(store.is_empty());

        let genesis = Block::new_test_block(0, Hash::zero(), vec![]);
        let next = Block::new_test_block(1, genesis.hash(), vec![]);
        store.put(&genesis).unwrap();
        store.put(&next).unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.get(0), Some(&genesis));
        assert_eq!(store.get(1).map(|b| b.hash()), Some(next.hash()));
        assert!(store.get(2).is_none());
    }
}
