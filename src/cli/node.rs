// Entry points behind the CLI commands: key files, a TCP node, and the in-process demo network.

use crate::config::NodeConfig;
use crate::core::Transaction;
use crate::error::{BlockchainError, Result};
use crate::network::{LocalTransport, Server, ServerOpts, TcpTransport, Transport};
use crate::wallet::{PublicKey, Wallet};
use log::{error, info, warn};
use rand::Rng;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const LOCALNET_TX_INTERVAL: Duration = Duration::from_secs(1);

pub fn write_key_file<P: AsRef<Path>>(path: P, wallet: &Wallet) -> Result<()> {
    let path = path.as_ref();
    if path.exists() {
        return Err(BlockchainError::Config(format!(
            "{} already exists, refusing to overwrite a key",
            path.display()
        )));
    }
    fs::write(path, wallet.to_hex())?;
    Ok(())
}

pub fn read_key_file<P: AsRef<Path>>(path: P) -> Result<Wallet> {
    let path = path.as_ref();
    let encoded = fs::read_to_string(path).map_err(|e| {
        BlockchainError::Config(format!("Failed to read key file {}: {e}", path.display()))
    })?;
    Wallet::from_hex(encoded.trim())
}

/// Generates a key, writes it to `path` and returns the public key in hex.
pub fn create_key<P: AsRef<Path>>(path: P) -> Result<String> {
    let wallet = Wallet::new()?;
    write_key_file(path, &wallet)?;
    Ok(wallet.public_key().to_string())
}

/// Runs a TCP node until the process is stopped.
pub fn start_node(config: &NodeConfig) -> Result<()> {
    let private_key = if config.validator {
        let key_file = config.key_file.as_ref().ok_or_else(|| {
            BlockchainError::Config("validator nodes need a key_file".to_string())
        })?;
        let wallet = read_key_file(key_file)?;
        info!("Validating as {}", wallet.public_key());
        Some(wallet)
    } else {
        None
    };

    let transport = TcpTransport::bind(&config.listen_addr)?;
    let shared: Arc<dyn Transport> = transport.clone();
    let server = Server::new(ServerOpts::from_config(config, vec![shared], private_key))?;

    for seed in &config.seed_nodes {
        if *seed == transport.addr() {
            continue;
        }
        if let Err(e) = transport.connect(seed) {
            warn!("Failed to connect to seed node {seed}: {e}");
        }
    }

    server.start()
}

/// Transfer of a random small value to `to`, signed by a throwaway key.
/// The payload is the value as decimal text.
pub fn random_signed_transaction(to: &PublicKey) -> Result<Transaction> {
    let value: u64 = rand::thread_rng().gen_range(0..1000);
    let mut tx = Transaction::new_transfer(value.to_string().into_bytes(), to.clone(), value);
    tx.sign(&Wallet::new()?)?;
    Ok(tx)
}

/// Two nodes in one process: a validator and a peer that submits a
/// transaction every second. Runs until `duration` elapses, or forever.
pub fn run_localnet(block_time: Duration, duration: Option<Duration>) -> Result<()> {
    let tr_local = LocalTransport::new("LOCAL");
    let tr_remote = LocalTransport::new("REMOTE");

    let validator_key = Wallet::new()?;
    let recipient = validator_key.public_key();
    let mut validator_opts = ServerOpts::new("LOCAL")
        .with_transport(tr_local.clone())
        .with_private_key(validator_key);
    validator_opts.block_time = block_time;
    let validator = Server::new(validator_opts)?;
    let remote = Server::new(ServerOpts::new("REMOTE").with_transport(tr_remote.clone()))?;

    tr_local.connect(&tr_remote)?;

    let validator_handle = validator.handle();
    let remote_handle = remote.handle();
    let validator_chain = validator.chain();
    let remote_chain = remote.chain();

    let nodes = vec![
        thread::spawn(move || validator.start()),
        thread::spawn(move || remote.start()),
    ];

    let started = Instant::now();
    while duration.map_or(true, |limit| started.elapsed() < limit) {
        match random_signed_transaction(&recipient) {
            Ok(tx) => {
                if let Err(e) = remote_handle.submit_transaction(tx) {
                    error!("Failed to send transaction from remote: {e}");
                    break;
                }
            }
            Err(e) => error!("Failed to build transaction: {e}"),
        }
        info!(
            "Heights: LOCAL {} / REMOTE {}",
            validator_chain.height(),
            remote_chain.height()
        );
        thread::sleep(LOCALNET_TX_INTERVAL);
    }

    validator_handle.shutdown();
    remote_handle.shutdown();
    for node in nodes {
        node.join()
            .map_err(|_| BlockchainError::Network("Node thread panicked".to_string()))??;
    }
    Ok(())
}
