use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use solana_sdk::signature::Keypair;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use token_workflow::{
    Config, Context, Ledger, MemoryLedger, RpcLedger, StepError, WorkflowReport,
};

#[derive(Parser)]
#[command(name = "token-workflow")]
#[command(
    about = "Fund a fresh wallet from the faucet, create an SPL token and transfer part of its supply",
    version
)]
struct Cli {
    #[command(flatten)]
    config: Config,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match run(cli.config).await {
        Ok(report) => {
            report.log_summary();
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(event = "workflow_failed", "Error occurred: {}", err);
            if let Some(step) = err.downcast_ref::<StepError>() {
                for line in step.logs() {
                    error!(event = "remote_log", "{}", line);
                }
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> Result<WorkflowReport> {
    let settings = config.settings()?;
    let wallet = Keypair::new();

    if config.offline {
        info!(event = "ledger_selected", "Using in-memory ledger");
        execute(Context::new(MemoryLedger::new(), wallet, settings)).await
    } else {
        let endpoint = config.endpoint();
        info!(event = "ledger_selected", endpoint = %endpoint, "Connecting to {}", endpoint);
        let ledger = RpcLedger::new(endpoint, config.commitment_config());
        execute(Context::new(ledger, wallet, settings)).await
    }
}

async fn execute<L: Ledger>(context: Context<L>) -> Result<WorkflowReport> {
    Ok(context.run().await?)
}
