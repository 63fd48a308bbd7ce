//! Configuration management
//!
//! Node settings loaded from a TOML file or from defaults, with environment
//! overrides for the listen address and node id.

pub mod settings;

pub use settings::{NodeConfig, DEFAULT_NODE_ADDR};
