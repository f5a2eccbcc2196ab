use std::time::Duration;

use clap::{Args, ValueEnum};
use solana_sdk::commitment_config::CommitmentConfig;

use crate::error::Result;
use crate::funding::ConfirmationPolicy;
use crate::workflow::WorkflowSettings;

/// Networks that run a faucet. Mainnet has none, so it is not offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Cluster {
    Devnet,
    Testnet,
    Localnet,
}

impl Cluster {
    pub fn url(self) -> &'static str {
        match self {
            Cluster::Devnet => "https://api.devnet.solana.com",
            Cluster::Testnet => "https://api.testnet.solana.com",
            Cluster::Localnet => "http://127.0.0.1:8899",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Commitment {
    Processed,
    Confirmed,
    Finalized,
}

impl From<Commitment> for CommitmentConfig {
    fn from(commitment: Commitment) -> Self {
        match commitment {
            Commitment::Processed => CommitmentConfig::processed(),
            Commitment::Confirmed => CommitmentConfig::confirmed(),
            Commitment::Finalized => CommitmentConfig::finalized(),
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct Config {
    /// Cluster to run against
    #[arg(long, env = "SOLANA_CLUSTER", value_enum, default_value_t = Cluster::Devnet)]
    pub cluster: Cluster,

    /// RPC endpoint, overrides the cluster default
    #[arg(long, env = "SOLANA_RPC_URL")]
    pub rpc_url: Option<String>,

    /// Commitment level used for queries and confirmations
    #[arg(long, env = "SOLANA_COMMITMENT", value_enum, default_value_t = Commitment::Confirmed)]
    pub commitment: Commitment,

    /// Amount requested from the faucet (in SOL)
    #[arg(long, env = "AIRDROP_SOL", default_value_t = 2)]
    pub airdrop_sol: u64,

    /// Decimal places of the new token
    #[arg(long, env = "TOKEN_DECIMALS", default_value_t = 9)]
    pub decimals: u8,

    /// Base units minted into the wallet's token account
    #[arg(long, env = "MINT_AMOUNT", default_value_t = 1_000_000)]
    pub mint_amount: u64,

    /// Base units transferred to the recipient
    #[arg(long, env = "TRANSFER_AMOUNT", default_value_t = 500_000)]
    pub transfer_amount: u64,

    /// Delay between faucet confirmation checks (e.g. "500ms", "2s")
    #[arg(long, env = "CONFIRM_INTERVAL", value_parser = humantime::parse_duration, default_value = "500ms")]
    pub confirm_interval: Duration,

    /// Number of faucet confirmation checks before giving up
    #[arg(long, env = "CONFIRM_ATTEMPTS", default_value_t = 60)]
    pub confirm_attempts: u32,

    /// Run against an in-memory ledger instead of a cluster
    #[arg(long, env = "OFFLINE")]
    pub offline: bool,
}

impl Config {
    pub fn endpoint(&self) -> String {
        self.rpc_url
            .clone()
            .unwrap_or_else(|| self.cluster.url().to_string())
    }

    pub fn commitment_config(&self) -> CommitmentConfig {
        self.commitment.into()
    }

    pub fn settings(&self) -> Result<WorkflowSettings> {
        let settings = WorkflowSettings {
            airdrop_sol: self.airdrop_sol,
            decimals: self.decimals,
            mint_amount: self.mint_amount,
            transfer_amount: self.transfer_amount,
            confirmation: ConfirmationPolicy {
                interval: self.confirm_interval,
                max_attempts: self.confirm_attempts,
            },
        };
        settings.validate()?;
        Ok(settings)
    }
}
