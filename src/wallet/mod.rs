//! Key management
//!
//! Signing keys, public keys, signatures and the 20-byte addresses derived from them.

pub mod wallet;

pub use wallet::{Address, PublicKey, Signature, Wallet, ADDRESS_LEN};
