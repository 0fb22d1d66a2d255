use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hashchain_core::{constants::GENESIS_TIMESTAMP, Block, Chain, ChainConfig, StopSignal};
use serde_json::json;
use std::{
    fs,
    path::{Path, PathBuf},
    process::ExitCode,
    time::Duration,
};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "hashchain")]
#[command(about = "Build and verify in-memory hash chains")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build a chain of `{"amount": n}` blocks and print it as JSON
    Build {
        /// Blocks to append after genesis
        #[arg(long, default_value_t = 2)]
        blocks: u64,
        /// JSON file holding a chain config; flags below override it
        #[arg(long)]
        config: Option<PathBuf>,
        /// Leading zero hex digits required per block (enables proof-of-work)
        #[arg(long)]
        difficulty: Option<u32>,
        /// Mine on all cores
        #[arg(long)]
        parallel: bool,
        /// Give up if a single block takes longer than this to mine
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Check a chain JSON document produced by `build`
    Verify {
        file: PathBuf,
        /// Also require every block's index to equal its position
        #[arg(long)]
        strict: bool,
    },
}

fn load_config(path: Option<&Path>) -> Result<ChainConfig> {
    let Some(path) = path else {
        return Ok(ChainConfig::default());
    };
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
}

fn build(
    blocks: u64,
    mut config: ChainConfig,
    difficulty: Option<u32>,
    parallel: bool,
    timeout: Option<Duration>,
) -> Result<()> {
    if difficulty.is_some() {
        config.difficulty = difficulty;
    }
    config.parallel_mining |= parallel;

    let mut chain = Chain::from_config(&config);
    for index in 1..=blocks {
        let candidate = Block::new(index, GENESIS_TIMESTAMP, json!({ "amount": index }));
        let stop = match timeout {
            Some(timeout) => StopSignal::new().with_timeout(timeout),
            None => StopSignal::new(),
        };
        chain
            .add_block_until(candidate, &stop)
            .with_context(|| format!("mining block {index}"))?;
    }

    println!("{}", serde_json::to_string_pretty(&chain)?);
    info!("Valid Block Chain? {}", chain.is_chain_valid());
    Ok(())
}

fn verify(file: &Path, strict: bool) -> Result<bool> {
    let raw = fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    let chain: Chain =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", file.display()))?;
    let outcome = if strict {
        chain.validate_strict()
    } else {
        chain.validate()
    };
    match outcome {
        Ok(()) => {
            println!("valid ({} blocks)", chain.len());
            Ok(true)
        }
        Err(err) => {
            warn!(file = %file.display(), "verification failed");
            println!("invalid: {err}");
            Ok(false)
        }
    }
}

fn main() -> Result<ExitCode> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Build {
            blocks,
            config,
            difficulty,
            parallel,
            timeout_secs,
        } => {
            let config = load_config(config.as_deref())?;
            build(
                blocks,
                config,
                difficulty,
                parallel,
                timeout_secs.map(Duration::from_secs),
            )?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Verify { file, strict } => {
            if verify(&file, strict)? {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
    }
}
