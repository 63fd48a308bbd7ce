// The validator decides whether a candidate block may extend the chain. It only reads;
// the chain appends after a successful check. Swapping the validator swaps the
// consensus rule without touching the chain store.

use crate::core::{Block, Header};
use crate::error::{BlockchainError, Result};

/// Read access to chain state, as seen by a validator
pub trait ChainReader {
    fn height(&self) -> u32;
    fn has_block(&self, height: u32) -> bool;
    fn get_header(&self, height: u32) -> Result<Header>;
}

pub trait Validator: Send + Sync {
    fn validate_block(&self, chain: &dyn ChainReader, block: &Block) -> Result<()>;
}

/// Strictly sequential chain: no gaps, no forks, every block signed and linked
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockValidator;

impl Validator for BlockValidator {
    fn validate_block(&self, chain: &dyn ChainReader, block: &Block) -> Result<()> {
        let height = block.get_height();

        if chain.has_block(height) {
            return Err(BlockchainError::BlockKnown { height });
        }

        let expected = chain.height() + 1;
        if height != expected {
            return Err(BlockchainError::HeightMismatch {
                expected,
                actual: height,
            });
        }

        block
            .verify()
            .map_err(|reason| BlockchainError::SignatureInvalid {
                height,
                reason: Box::new(reason),
            })?;

        // height >= 1 here: the known-block check rejects anything at or below the tip
        let prev_header = chain.get_header(height - 1)?;
        if block.get_header().get_prev_block_hash() != prev_header.hash() {
            return Err(BlockchainError::PrevHashMismatch { height });
        }

        Ok(())
    }
}
