//! Remote ledger operations used by the workflow.
//!
//! `RpcLedger` talks to a cluster over JSON-RPC, `MemoryLedger` keeps the
//! whole ledger in process so the workflow can run without a network.

pub mod memory;
pub mod rpc;

use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature};

use crate::error::Result;

pub use memory::MemoryLedger;
pub use rpc::RpcLedger;

#[async_trait]
pub trait Ledger: Send + Sync {
    /// Native balance in lamports.
    async fn balance(&self, owner: &Pubkey) -> Result<u64>;

    /// Ask the faucet for `lamports`. Returns the airdrop transaction signature.
    async fn request_airdrop(&self, recipient: &Pubkey, lamports: u64) -> Result<Signature>;

    /// Single status lookup. A transaction that landed with an error is `Err`.
    async fn is_confirmed(&self, signature: &Signature) -> Result<bool>;

    /// Create and initialize a new mint, paid for by `payer`.
    async fn create_mint(
        &self,
        payer: &Keypair,
        mint_authority: &Pubkey,
        freeze_authority: Option<&Pubkey>,
        decimals: u8,
    ) -> Result<Pubkey>;

    /// Associated token account of `owner` for `mint`, created if missing.
    async fn get_or_create_associated_token_account(
        &self,
        payer: &Keypair,
        mint: &Pubkey,
        owner: &Pubkey,
    ) -> Result<Pubkey>;

    async fn mint_to(
        &self,
        payer: &Keypair,
        mint: &Pubkey,
        destination: &Pubkey,
        authority: &Keypair,
        amount: u64,
    ) -> Result<Signature>;

    async fn transfer(
        &self,
        payer: &Keypair,
        source: &Pubkey,
        destination: &Pubkey,
        owner: &Keypair,
        amount: u64,
    ) -> Result<Signature>;

    /// Token account balance in base units.
    async fn token_balance(&self, token_account: &Pubkey) -> Result<u64>;
}
