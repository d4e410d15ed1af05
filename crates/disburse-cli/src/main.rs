use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use disburse_core::domain::Address;
use disburse_core::impls::{DevSigner, FileQueueStore, SimulatedLedger};
use disburse_core::{FulfillmentWorker, RunOutcome, Scheduler, WorkerConfig};

// Well-known development account; never holds real value.
const DEV_SENDER: &str = "0x90f8bf6a479f320ead074411a4b0e7944ea8c9c1";
const DEV_KEY: &str = "0x4f3edf983ac636a65a842ce7c78d9aa706d3b113bce9c46f30d7d21715b23b1d";

#[derive(Parser)]
#[command(author, version, about = "Fulfill queued transfer requests", long_about = None)]
struct Cli {
    /// JSON file holding the request queue
    #[arg(long, env = "QUEUE_FILE", default_value = "queue.json")]
    queue_file: PathBuf,

    #[command(flatten)]
    worker: WorkerArgs,

    #[command(flatten)]
    ledger: LedgerArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a request and append it to the queue
    Enqueue { amount: String, recipient: String },
    /// Process every pending request once and print the run report
    Once,
    /// Print the worker status
    Status,
    /// Print the sender account and its balances on the ledger
    Balance,
    /// Process the queue periodically until interrupted
    Serve,
}

#[derive(Args)]
struct WorkerArgs {
    #[arg(long, env = "QUEUE_PROCESS_INTERVAL_MS", default_value_t = 10_000)]
    interval_ms: u64,

    /// Attempts per transfer within one run
    #[arg(long, env = "MAX_RETRIES", default_value_t = 3)]
    max_attempts: u32,

    #[arg(long, env = "RETRY_DELAY_MS", default_value_t = 5_000)]
    retry_delay_ms: u64,

    #[arg(long, env = "INTER_REQUEST_DELAY_MS", default_value_t = 2_000)]
    inter_request_delay_ms: u64,

    #[arg(long, env = "TOKEN_DECIMALS", default_value_t = 2)]
    token_decimals: u32,

    #[arg(long, env = "NATIVE_DECIMALS", default_value_t = 18)]
    native_decimals: u32,

    /// Native currency sent along with every request
    #[arg(long, env = "INCENTIVE_AMOUNT", default_value = "0.000001")]
    incentive_amount: String,

    #[arg(long, env = "FEE_BUFFER_PERCENT", default_value_t = 20)]
    fee_buffer_percent: u32,

    /// Fixed gas price in native base units
    #[arg(long, env = "GAS_PRICE")]
    gas_price: Option<u128>,

    /// Mark a request dead after this many failed runs
    #[arg(long, env = "DEAD_AFTER_RUNS")]
    dead_after_runs: Option<u32>,
}

impl From<&WorkerArgs> for WorkerConfig {
    fn from(args: &WorkerArgs) -> Self {
        Self {
            interval_ms: args.interval_ms,
            max_attempts: args.max_attempts,
            retry_delay_ms: args.retry_delay_ms,
            inter_request_delay_ms: args.inter_request_delay_ms,
            token_decimals: args.token_decimals,
            native_decimals: args.native_decimals,
            incentive_amount: args.incentive_amount.clone(),
            fee_buffer_percent: args.fee_buffer_percent,
            gas_price_override: args.gas_price,
            dead_after_runs: args.dead_after_runs,
        }
    }
}

#[derive(Args)]
struct LedgerArgs {
    #[arg(long, env = "SENDER_ADDRESS", default_value = DEV_SENDER)]
    sender: String,

    #[arg(long, env = "PRIVATE_KEY", default_value = DEV_KEY, hide_env_values = true, hide_default_value = true)]
    private_key: String,

    /// Token balance of the sender on the simulated ledger, in base units
    #[arg(long, env = "SIM_TOKEN_BALANCE", default_value_t = 100_000_000)]
    token_balance: u128,

    /// Native balance of the sender on the simulated ledger, in base units
    #[arg(long, env = "SIM_NATIVE_BALANCE", default_value_t = 10_000_000_000_000_000_000)]
    native_balance: u128,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,disburse_core=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// What the subcommands act on.
struct Wiring {
    sender: Address,
    ledger: Arc<SimulatedLedger>,
    worker: Arc<FulfillmentWorker>,
}

fn build(cli: &Cli) -> Result<Wiring> {
    let sender = Address::parse(&cli.ledger.sender).context("invalid sender address")?;
    let signer =
        DevSigner::new(sender.clone(), &cli.ledger.private_key).context("invalid private key")?;
    let ledger = Arc::new(SimulatedLedger::new(
        &sender,
        cli.ledger.token_balance,
        cli.ledger.native_balance,
    ));
    let queue = FileQueueStore::new(&cli.queue_file);

    let worker = FulfillmentWorker::new(
        Arc::new(queue),
        ledger.clone(),
        Arc::new(signer),
        WorkerConfig::from(&cli.worker),
    )
    .context("invalid worker configuration")?;
    Ok(Wiring {
        sender,
        ledger,
        worker: Arc::new(worker),
    })
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let Wiring {
        sender,
        ledger,
        worker,
    } = build(&cli)?;

    match cli.command {
        Command::Enqueue { amount, recipient } => {
            let id = worker.enqueue(&amount, &recipient).await?;
            print_json(&serde_json::json!({ "id": id }))?;
        }
        Command::Once => {
            worker.check().await.context("queue store check failed")?;
            match worker.run_once().await? {
                RunOutcome::Completed(report) => print_json(&report)?,
                RunOutcome::Skipped => print_json(&serde_json::json!({ "skipped": true }))?,
            }
        }
        Command::Status => print_json(&worker.status().await)?,
        Command::Balance => {
            let balance = ledger.balance_of(&sender).await;
            print_json(&serde_json::json!({ "sender": sender, "balance": balance }))?;
        }
        Command::Serve => {
            let scheduler = Scheduler::start(worker)
                .await
                .context("queue store check failed")?;
            tokio::signal::ctrl_c().await?;
            info!("interrupt received, shutting down");
            scheduler.shutdown().await;
        }
    }

    Ok(())
}
