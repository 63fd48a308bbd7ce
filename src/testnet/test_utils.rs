//! Test utilities for chain and network testing

use crate::core::{Block, Blockchain, Hash, Header, Transaction};
use crate::wallet::Wallet;
use rand::Rng;

/// Chain holding only the shared genesis block
pub fn new_blockchain_with_genesis() -> Blockchain {
    let genesis = Block::generate_genesis_block().expect("genesis block");
    Blockchain::new(genesis).expect("blockchain")
}

/// Transaction with a random payload, signed by a fresh key
pub fn random_tx() -> Transaction {
    let payload = rand::thread_rng().gen::<u64>().to_string();
    signed_tx(payload.as_bytes())
}

pub fn signed_tx(payload: &[u8]) -> Transaction {
    let mut tx = Transaction::new(payload.to_vec());
    tx.sign(&Wallet::new().expect("wallet")).expect("sign tx");
    tx
}

/// Signed block at `height` on top of `prev_block_hash`, carrying one random transaction
pub fn random_block(wallet: &Wallet, height: u32, prev_block_hash: Hash) -> Block {
    let header = Header::new(1, prev_block_hash, 0, height, rand::random());
    let mut block = Block::new_block(header, vec![random_tx()]);
    block.sign(wallet).expect("sign block");
    block
}

/// Signed block extending the current tip of `chain`
pub fn next_block(chain: &Blockchain, wallet: &Wallet, transactions: Vec<Transaction>) -> Block {
    let tip = chain.get_header(chain.height()).expect("tip header");
    let mut block = Block::new_block_from_prev_header(&tip, transactions).expect("next block");
    block.sign(wallet).expect("sign block");
    block
}

/// Extends `chain` by `count` signed blocks
pub fn grow_chain(chain: &Blockchain, wallet: &Wallet, count: u32) {
    for _ in 0..count {
        let block = next_block(chain, wallet, vec![random_tx()]);
        chain.add_block(&block).expect("add block");
    }
}
