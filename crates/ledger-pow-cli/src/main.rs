mod report;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ledger_pow::{
    fingerprint, mine_with, validate, Block, CancelToken, ChainConfig, SystemClock,
};
use report::RateStats;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "ledger-pow")]
#[command(about = "Mine, validate and benchmark proof-of-work blocks")]
struct Cli {
    /// JSON file with chain timing settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Target time between blocks in milliseconds; overrides --config
    #[arg(long, global = true)]
    mine_rate_ms: Option<u64>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Mine blocks in memory and report how long each one took
    Rate {
        /// Number of blocks to mine
        #[arg(long, default_value_t = 1000)]
        blocks: u64,
    },
    /// Mine one block and print its record
    Mine {
        /// Payload, as JSON (plain text is taken as a string)
        #[arg(long, default_value = "[]")]
        data: String,
        /// Predecessor block record; defaults to genesis
        #[arg(long)]
        prev: Option<PathBuf>,
    },
    /// Check a block record against its predecessor
    Validate {
        #[arg(long)]
        prev: PathBuf,
        #[arg(long)]
        block: PathBuf,
    },
    /// Print the fingerprint of the given values
    Hash {
        /// Values as JSON (plain text is taken as a string)
        #[arg(required = true)]
        values: Vec<String>,
    },
    /// Mine a block, rewrite its last_hash and show the rejection
    Tamper,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref(), cli.mine_rate_ms)?;

    match cli.cmd {
        Command::Rate { blocks } => rate(blocks, config).await?,
        Command::Mine { data, prev } => {
            let prev = match prev {
                Some(path) => read_block(&path)?,
                None => Block::genesis(),
            };
            let block = mine_cancellable(prev, parse_value(&data), config).await?;
            match block {
                Some(block) => println!("{}", serde_json::to_string_pretty(&block)?),
                None => bail!("mining interrupted"),
            }
        }
        Command::Validate { prev, block } => {
            let prev = read_block(&prev)?;
            let block = read_block(&block)?;
            if let Err(err) = validate(&prev, &block) {
                bail!("invalid block: {err}");
            }
            println!("valid");
        }
        Command::Hash { values } => {
            let values: Vec<Value> = values.iter().map(String::as_str).map(parse_value).collect();
            println!("{}", fingerprint(&values));
        }
        Command::Tamper => {
            let genesis = Block::genesis();
            let Some(block) = mine_cancellable(genesis.clone(), json!("foo"), config).await? else {
                bail!("mining interrupted");
            };
            let mut record = block.to_json();
            record["last_hash"] = json!("evil_data");
            let bad_block = Block::from_json(record)?;
            match validate(&genesis, &bad_block) {
                Ok(()) => println!("is_valid_block: accepted"),
                Err(err) => println!("is_valid_block: {err}"),
            }
        }
    }
    Ok(())
}

fn load_config(path: Option<&Path>, mine_rate_ms: Option<u64>) -> Result<ChainConfig> {
    let mut config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => ChainConfig::default(),
    };
    if let Some(ms) = mine_rate_ms {
        config = config.with_mine_rate(Duration::from_millis(ms));
    }
    Ok(config)
}

fn read_block(path: &Path) -> Result<Block> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading block {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing block {}", path.display()))
}

fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Mine on a blocking thread; Ctrl-C cancels the search and yields `None`.
async fn mine_cancellable(prev: Block, data: Value, config: ChainConfig) -> Result<Option<Block>> {
    let cancel = CancelToken::new();
    let token = cancel.clone();
    let mut task = tokio::task::spawn_blocking(move || {
        mine_with(&prev, data, &config, &SystemClock, &token)
    });

    tokio::select! {
        joined = &mut task => Ok(Some(joined.context("mining task failed")??)),
        _ = tokio::signal::ctrl_c() => {
            cancel.cancel();
            // The search sees the flag on its next attempt.
            let _ = task.await;
            warn!("mining interrupted");
            Ok(None)
        }
    }
}

async fn rate(blocks: u64, config: ChainConfig) -> Result<()> {
    let mut chain = vec![Block::genesis()];
    let mut stats = RateStats::default();

    for i in 0..blocks {
        let head = chain.last().cloned().unwrap_or_else(Block::genesis);
        let start = Instant::now();
        let Some(block) = mine_cancellable(head.clone(), json!(i), config).await? else {
            break;
        };
        let elapsed = u64::try_from(start.elapsed().as_nanos()).unwrap_or(u64::MAX);

        validate(&head, &block).context("freshly mined block was rejected")?;
        let line = stats.record(block.difficulty().get(), elapsed, &config);
        chain.push(block);
        println!("{line}");
    }

    info!(blocks = chain.len() - 1, "rate run finished");
    Ok(())
}
