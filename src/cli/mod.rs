//! Command-line interface
//!
//! Argument parsing for the node binary and the commands behind it.

pub mod commands;
pub mod node;

pub use commands::{Command, NodeArgs, Opt};
pub use node::{create_key, read_key_file, run_localnet, start_node, write_key_file};
