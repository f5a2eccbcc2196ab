//! In-memory ledger backed by a `Mutex<State>`.
//!
//! Keeps just enough of the system and token program rules for the workflow
//! to behave like it does on a cluster: fees, rent-exempt deposits, mint
//! authority and token account ownership checks. Rejections carry program
//! style log lines.

use std::collections::{HashMap, HashSet};
use std::fmt;

use async_trait::async_trait;
use parking_lot::Mutex;
use solana_sdk::program_pack::Pack;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::rent::Rent;
use solana_sdk::signature::{Keypair, Signature, Signer};
use spl_associated_token_account_client::address::get_associated_token_address;
use spl_token::state::{Account as TokenAccount, Mint};

use super::Ledger;
use crate::error::{Error, Result};

pub const FEE_PER_SIGNATURE: u64 = 5_000;

/// Calls recorded in the journal, one per `Ledger` method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Balance,
    RequestAirdrop,
    SignatureStatus,
    CreateMint,
    CreateAssociatedTokenAccount,
    MintTo,
    Transfer,
    TokenBalance,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Balance => "getBalance",
            Operation::RequestAirdrop => "requestAirdrop",
            Operation::SignatureStatus => "getSignatureStatuses",
            Operation::CreateMint => "createMint",
            Operation::CreateAssociatedTokenAccount => "createAssociatedTokenAccount",
            Operation::MintTo => "mintTo",
            Operation::Transfer => "transfer",
            Operation::TokenBalance => "getTokenAccountBalance",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
struct MintState {
    authority: Pubkey,
    decimals: u8,
    supply: u64,
}

#[derive(Debug, Clone)]
struct TokenAccountState {
    mint: Pubkey,
    owner: Pubkey,
    amount: u64,
}

#[derive(Default)]
struct State {
    lamports: HashMap<Pubkey, u64>,
    confirmed: HashSet<Signature>,
    mints: HashMap<Pubkey, MintState>,
    token_accounts: HashMap<Pubkey, TokenAccountState>,
    journal: Vec<Operation>,
    signatures_issued: u64,
}

impl State {
    fn next_signature(&mut self) -> Signature {
        self.signatures_issued += 1;
        let mut bytes = [0u8; 64];
        bytes[..8].copy_from_slice(&self.signatures_issued.to_le_bytes());
        Signature::from(bytes)
    }

    /// Debit `payer` for fees plus `deposit`, all or nothing.
    fn charge(&mut self, payer: &Pubkey, signers: u64, deposit: u64) -> Result<()> {
        let fee = FEE_PER_SIGNATURE * signers;
        let balance = self.lamports.get(payer).copied().unwrap_or(0);
        if balance < fee {
            return Err(Error::rejected(
                "Attempt to debit an account but found no record of a prior credit.",
            ));
        }
        if balance - fee < deposit {
            return Err(Error::rejected_with_logs(
                "Transaction simulation failed: Error processing Instruction 0: custom program error: 0x1",
                vec![
                    "Program 11111111111111111111111111111111 invoke [1]".to_string(),
                    format!("Transfer: insufficient lamports {}, need {}", balance - fee, deposit),
                    "Program 11111111111111111111111111111111 failed: custom program error: 0x1"
                        .to_string(),
                ],
            ));
        }
        self.lamports.insert(*payer, balance - fee - deposit);
        Ok(())
    }

    fn confirm(&mut self) -> Signature {
        let signature = self.next_signature();
        self.confirmed.insert(signature);
        signature
    }
}

fn token_error(instruction: &str, error: &str) -> Error {
    Error::rejected_with_logs(
        format!("Transaction simulation failed: {}", error),
        vec![
            format!("Program {} invoke [1]", spl_token::id()),
            format!("Program log: Instruction: {}", instruction),
            format!("Program log: Error: {}", error),
            format!("Program {} failed: custom program error", spl_token::id()),
        ],
    )
}

fn signer_count(payer: &Keypair, other: &Keypair) -> u64 {
    if payer.pubkey() == other.pubkey() {
        1
    } else {
        2
    }
}

/// In-memory ledger for tests and offline runs.
pub struct MemoryLedger {
    state: Mutex<State>,
    airdrops_confirm: bool,
    fail_on: Option<(Operation, Option<usize>)>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            airdrops_confirm: true,
            fail_on: None,
        }
    }

    /// Faucet requests are accepted but never land.
    pub fn without_airdrop_confirmation(mut self) -> Self {
        self.airdrops_confirm = false;
        self
    }

    /// Reject every call of `operation` with a simulated remote failure.
    pub fn failing_on(mut self, operation: Operation) -> Self {
        self.fail_on = Some((operation, None));
        self
    }

    /// Reject only the `call`-th call of `operation`, counting from 1.
    pub fn failing_on_call(mut self, operation: Operation, call: usize) -> Self {
        self.fail_on = Some((operation, Some(call)));
        self
    }

    /// Operations in the order they were called.
    pub fn journal(&self) -> Vec<Operation> {
        self.state.lock().journal.clone()
    }

    pub fn mint_supply(&self, mint: &Pubkey) -> Option<u64> {
        self.state.lock().mints.get(mint).map(|m| m.supply)
    }

    pub fn mint_decimals(&self, mint: &Pubkey) -> Option<u8> {
        self.state.lock().mints.get(mint).map(|m| m.decimals)
    }

    pub fn token_account_count(&self) -> usize {
        self.state.lock().token_accounts.len()
    }

    fn begin(&self, state: &mut State, operation: Operation) -> Result<()> {
        state.journal.push(operation);
        let calls = state.journal.iter().filter(|op| **op == operation).count();
        let fails = match self.fail_on {
            Some((target, None)) => target == operation,
            Some((target, Some(call))) => target == operation && call == calls,
            None => false,
        };
        if fails {
            return Err(Error::rejected_with_logs(
                format!("{} rejected by the remote service", operation),
                vec![format!("Program log: {} failed", operation)],
            ));
        }
        Ok(())
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn balance(&self, owner: &Pubkey) -> Result<u64> {
        let mut state = self.state.lock();
        self.begin(&mut state, Operation::Balance)?;
        Ok(state.lamports.get(owner).copied().unwrap_or(0))
    }

    async fn request_airdrop(&self, recipient: &Pubkey, lamports: u64) -> Result<Signature> {
        let mut state = self.state.lock();
        self.begin(&mut state, Operation::RequestAirdrop)?;

        if !self.airdrops_confirm {
            return Ok(state.next_signature());
        }
        let balance = state.lamports.entry(*recipient).or_insert(0);
        *balance = balance.saturating_add(lamports);
        Ok(state.confirm())
    }

    async fn is_confirmed(&self, signature: &Signature) -> Result<bool> {
        let mut state = self.state.lock();
        self.begin(&mut state, Operation::SignatureStatus)?;
        Ok(state.confirmed.contains(signature))
    }

    async fn create_mint(
        &self,
        payer: &Keypair,
        mint_authority: &Pubkey,
        _freeze_authority: Option<&Pubkey>,
        decimals: u8,
    ) -> Result<Pubkey> {
        let mut state = self.state.lock();
        self.begin(&mut state, Operation::CreateMint)?;

        let mint = Keypair::new().pubkey();
        let rent = Rent::default().minimum_balance(Mint::LEN);
        // payer and the new mint account both sign
        state.charge(&payer.pubkey(), 2, rent)?;
        state.mints.insert(
            mint,
            MintState {
                authority: *mint_authority,
                decimals,
                supply: 0,
            },
        );
        state.lamports.insert(mint, rent);
        state.confirm();
        Ok(mint)
    }

    async fn get_or_create_associated_token_account(
        &self,
        payer: &Keypair,
        mint: &Pubkey,
        owner: &Pubkey,
    ) -> Result<Pubkey> {
        let mut state = self.state.lock();
        self.begin(&mut state, Operation::CreateAssociatedTokenAccount)?;

        if !state.mints.contains_key(mint) {
            return Err(token_error("InitializeAccount3", "InvalidMint"));
        }

        let address = get_associated_token_address(owner, mint);
        if let Some(existing) = state.token_accounts.get(&address) {
            if existing.mint != *mint || existing.owner != *owner {
                return Err(Error::rejected(format!(
                    "Account {} does not belong to owner {} for mint {}",
                    address, owner, mint
                )));
            }
            return Ok(address);
        }

        let rent = Rent::default().minimum_balance(TokenAccount::LEN);
        state.charge(&payer.pubkey(), 1, rent)?;
        state.token_accounts.insert(
            address,
            TokenAccountState {
                mint: *mint,
                owner: *owner,
                amount: 0,
            },
        );
        state.lamports.insert(address, rent);
        state.confirm();
        Ok(address)
    }

    async fn mint_to(
        &self,
        payer: &Keypair,
        mint: &Pubkey,
        destination: &Pubkey,
        authority: &Keypair,
        amount: u64,
    ) -> Result<Signature> {
        let mut state = self.state.lock();
        self.begin(&mut state, Operation::MintTo)?;

        let mint_state = state
            .mints
            .get(mint)
            .cloned()
            .ok_or_else(|| token_error("MintTo", "InvalidMint"))?;
        let account = state
            .token_accounts
            .get(destination)
            .cloned()
            .ok_or_else(|| token_error("MintTo", "UninitializedState"))?;
        if account.mint != *mint {
            return Err(token_error("MintTo", "Account not associated with this Mint"));
        }
        if mint_state.authority != authority.pubkey() {
            return Err(token_error("MintTo", "owner does not match"));
        }
        let supply = mint_state
            .supply
            .checked_add(amount)
            .ok_or_else(|| token_error("MintTo", "Operation overflowed"))?;

        state.charge(&payer.pubkey(), signer_count(payer, authority), 0)?;
        if let Some(m) = state.mints.get_mut(mint) {
            m.supply = supply;
        }
        if let Some(a) = state.token_accounts.get_mut(destination) {
            a.amount += amount;
        }
        Ok(state.confirm())
    }

    async fn transfer(
        &self,
        payer: &Keypair,
        source: &Pubkey,
        destination: &Pubkey,
        owner: &Keypair,
        amount: u64,
    ) -> Result<Signature> {
        let mut state = self.state.lock();
        self.begin(&mut state, Operation::Transfer)?;

        let from = state
            .token_accounts
            .get(source)
            .cloned()
            .ok_or_else(|| token_error("Transfer", "UninitializedState"))?;
        let to = state
            .token_accounts
            .get(destination)
            .cloned()
            .ok_or_else(|| token_error("Transfer", "UninitializedState"))?;
        if from.mint != to.mint {
            return Err(token_error("Transfer", "Account not associated with this Mint"));
        }
        if from.owner != owner.pubkey() {
            return Err(token_error("Transfer", "owner does not match"));
        }
        if from.amount < amount {
            return Err(token_error("Transfer", "insufficient funds"));
        }

        state.charge(&payer.pubkey(), signer_count(payer, owner), 0)?;
        if let Some(a) = state.token_accounts.get_mut(source) {
            a.amount -= amount;
        }
        if let Some(a) = state.token_accounts.get_mut(destination) {
            a.amount += amount;
        }
        Ok(state.confirm())
    }

    async fn token_balance(&self, token_account: &Pubkey) -> Result<u64> {
        let mut state = self.state.lock();
        self.begin(&mut state, Operation::TokenBalance)?;
        state
            .token_accounts
            .get(token_account)
            .map(|a| a.amount)
            .ok_or_else(|| {
                Error::rejected(format!(
                    "Invalid param: could not find account {}",
                    token_account
                ))
            })
    }
}
