//! Faucet-funded SPL token issuance against a Solana cluster.
//!
//! A fresh wallet is funded from the faucet, its balance checked, then a mint
//! is created, supply minted into the wallet's associated token account and
//! part of it transferred to a second wallet. Remote calls go through the
//! [`Ledger`] trait so the same workflow runs against a cluster
//! ([`RpcLedger`]) or in memory ([`MemoryLedger`]).

pub mod balance;
pub mod config;
pub mod error;
pub mod funding;
pub mod ledger;
pub mod workflow;

pub use config::{Cluster, Commitment, Config};
pub use error::{Error, Result};
pub use funding::{Airdrop, ConfirmationPolicy};
pub use ledger::{Ledger, MemoryLedger, RpcLedger};
pub use workflow::{Context, Step, StepError, WorkflowReport, WorkflowSettings};
