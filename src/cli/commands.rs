use crate::config::NodeConfig;
use crate::core::CodecKind;
use crate::error::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "authority-chain")]
pub struct Opt {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(name = "startnode", about = "Start a node listening on TCP")]
    StartNode(NodeArgs),
    #[command(name = "createkey", about = "Generate a validator key and write it to FILE")]
    CreateKey {
        #[arg(help = "Where to write the hex encoded PKCS#8 key")]
        file: PathBuf,
    },
    #[command(
        name = "localnet",
        about = "Run a validator and a peer in one process, the peer sending a transaction every second"
    )]
    Localnet {
        #[arg(long = "block-time-ms", default_value_t = 5000, help = "Block time of the validator")]
        block_time_ms: u64,
        #[arg(long = "duration", help = "Stop after this many seconds")]
        duration: Option<u64>,
    },
}

#[derive(Args, Debug, Default, Clone)]
pub struct NodeArgs {
    #[arg(long = "config", help = "TOML config file")]
    pub config: Option<PathBuf>,
    #[arg(long = "id", help = "Node id announced to peers")]
    pub id: Option<String>,
    #[arg(long = "listen", help = "Address to listen on, e.g. 127.0.0.1:2001")]
    pub listen_addr: Option<String>,
    #[arg(long = "seed", help = "Peer to connect to on startup (repeatable)")]
    pub seed_nodes: Vec<String>,
    #[arg(long = "validator-key", help = "Key file; makes this node the validator")]
    pub validator_key: Option<PathBuf>,
    #[arg(long = "codec", help = "Envelope codec (bincode, json)")]
    pub codec: Option<CodecKind>,
    #[arg(long = "block-time-ms", help = "Block time when running as validator")]
    pub block_time_ms: Option<u64>,
}

impl NodeArgs {
    /// Config file (or defaults and environment), then flags on top
    pub fn to_config(&self) -> Result<NodeConfig> {
        let mut config = match &self.config {
            Some(path) => NodeConfig::from_file(path)?,
            None => NodeConfig::from_env(),
        };

        if let Some(id) = &self.id {
            config.id = id.clone();
        }
        if let Some(addr) = &self.listen_addr {
            config.listen_addr = addr.clone();
        }
        config.seed_nodes.extend(self.seed_nodes.iter().cloned());
        if let Some(key_file) = &self.validator_key {
            config.validator = true;
            config.key_file = Some(key_file.clone());
        }
        if let Some(codec) = self.codec {
            config.codec = codec;
        }
        if let Some(block_time_ms) = self.block_time_ms {
            config.block_time_ms = block_time_ms;
        }

        config.validate()?;
        Ok(config)
    }
}
