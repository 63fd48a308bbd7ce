// Entry point for the node binary: parse the command, set up logging, run it
use authority_chain::cli::{create_key, run_localnet, start_node};
use authority_chain::{Command, Opt};
use clap::Parser;
use log::{error, info, LevelFilter};
use std::process;
use std::time::Duration;

fn main() {
    // Info by default, RUST_LOG still wins
    env_logger::builder()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let opt = Opt::parse();

    if let Err(e) = run_command(opt.command) {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn run_command(command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::StartNode(args) => {
            let config = args.to_config()?;
            info!(
                "Starting node {} on {} ({} seed nodes)",
                config.id,
                config.listen_addr,
                config.seed_nodes.len()
            );
            start_node(&config)?;
        }
        Command::CreateKey { file } => {
            let public_key = create_key(&file)?;
            println!("Wrote key to {}", file.display());
            println!("Public key: {public_key}");
        }
        Command::Localnet {
            block_time_ms,
            duration,
        } => {
            run_localnet(
                Duration::from_millis(block_time_ms),
                duration.map(Duration::from_secs),
            )?;
        }
    }
    Ok(())
}
