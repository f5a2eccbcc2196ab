use async_trait::async_trait;
use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_request::{RpcError, RpcResponseErrorData};
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::instruction::Instruction;
use solana_sdk::program_pack::Pack;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::transaction::Transaction;
use solana_system_interface::instruction as system_instruction;
use spl_associated_token_account_client::address::get_associated_token_address;
use spl_associated_token_account_client::instruction::create_associated_token_account_idempotent;
use spl_token::state::{Account as TokenAccount, Mint};
use tracing::debug;

use super::Ledger;
use crate::error::{Error, Result};

impl From<ClientError> for Error {
    fn from(err: ClientError) -> Self {
        match err.kind() {
            ClientErrorKind::Io(_)
            | ClientErrorKind::Reqwest(_)
            | ClientErrorKind::Middleware(_) => Error::Transport(err.to_string()),
            ClientErrorKind::RpcError(RpcError::RpcResponseError {
                data: RpcResponseErrorData::SendTransactionPreflightFailure(simulation),
                ..
            }) => Error::rejected_with_logs(
                err.to_string(),
                simulation.logs.clone().unwrap_or_default(),
            ),
            _ => Error::rejected(err.to_string()),
        }
    }
}

/// Ledger backed by a cluster's JSON-RPC endpoint.
pub struct RpcLedger {
    client: RpcClient,
}

impl RpcLedger {
    pub fn new(url: impl Into<String>, commitment: CommitmentConfig) -> Self {
        Self {
            client: RpcClient::new_with_commitment(url.into(), commitment),
        }
    }

    pub fn url(&self) -> String {
        self.client.url()
    }

    async fn send(
        &self,
        instructions: &[Instruction],
        payer: &Keypair,
        signers: &[&Keypair],
    ) -> Result<Signature> {
        let blockhash = self.client.get_latest_blockhash().await?;
        let signers = unique_signers(payer, signers);
        let transaction = Transaction::new_signed_with_payer(
            instructions,
            Some(&payer.pubkey()),
            &signers,
            blockhash,
        );

        let signature = self.client.send_and_confirm_transaction(&transaction).await?;
        debug!(%signature, instructions = instructions.len(), "Transaction confirmed");
        Ok(signature)
    }
}

/// Payer first, then every other signer once.
fn unique_signers<'a>(payer: &'a Keypair, others: &[&'a Keypair]) -> Vec<&'a Keypair> {
    let mut signers: Vec<&Keypair> = vec![payer];
    for signer in others {
        if !signers.iter().any(|s| s.pubkey() == signer.pubkey()) {
            signers.push(signer);
        }
    }
    signers
}

/// Allocate a rent-exempt mint account owned by the token program, then initialize it.
fn mint_instructions(
    payer: &Pubkey,
    mint: &Pubkey,
    rent: u64,
    mint_authority: &Pubkey,
    freeze_authority: Option<&Pubkey>,
    decimals: u8,
) -> Result<[Instruction; 2]> {
    Ok([
        system_instruction::create_account(
            payer,
            mint,
            rent,
            Mint::LEN as u64,
            &spl_token::id(),
        ),
        spl_token::instruction::initialize_mint2(
            &spl_token::id(),
            mint,
            mint_authority,
            freeze_authority,
            decimals,
        )
        .map_err(|e| Error::rejected(e.to_string()))?,
    ])
}

#[async_trait]
impl Ledger for RpcLedger {
    async fn balance(&self, owner: &Pubkey) -> Result<u64> {
        Ok(self.client.get_balance(owner).await?)
    }

    async fn request_airdrop(&self, recipient: &Pubkey, lamports: u64) -> Result<Signature> {
        Ok(self.client.request_airdrop(recipient, lamports).await?)
    }

    async fn is_confirmed(&self, signature: &Signature) -> Result<bool> {
        let status = self
            .client
            .get_signature_status_with_commitment(signature, self.client.commitment())
            .await?;

        match status {
            Some(Ok(())) => Ok(true),
            Some(Err(err)) => Err(Error::rejected(format!(
                "Transaction {} failed: {}",
                signature, err
            ))),
            None => Ok(false),
        }
    }

    async fn create_mint(
        &self,
        payer: &Keypair,
        mint_authority: &Pubkey,
        freeze_authority: Option<&Pubkey>,
        decimals: u8,
    ) -> Result<Pubkey> {
        let mint = Keypair::new();
        let rent = self
            .client
            .get_minimum_balance_for_rent_exemption(Mint::LEN)
            .await?;

        let instructions = mint_instructions(
            &payer.pubkey(),
            &mint.pubkey(),
            rent,
            mint_authority,
            freeze_authority,
            decimals,
        )?;

        self.send(&instructions, payer, &[&mint]).await?;
        Ok(mint.pubkey())
    }

    async fn get_or_create_associated_token_account(
        &self,
        payer: &Keypair,
        mint: &Pubkey,
        owner: &Pubkey,
    ) -> Result<Pubkey> {
        let address = get_associated_token_address(owner, mint);
        let existing = self
            .client
            .get_account_with_commitment(&address, self.client.commitment())
            .await?
            .value;

        match existing {
            Some(account) => {
                if account.owner != spl_token::id() {
                    return Err(Error::rejected(format!(
                        "Account {} is not owned by the token program",
                        address
                    )));
                }
                let state = TokenAccount::unpack(&account.data)
                    .map_err(|e| Error::rejected(e.to_string()))?;
                if state.mint != *mint || state.owner != *owner {
                    return Err(Error::rejected(format!(
                        "Account {} does not belong to owner {} for mint {}",
                        address, owner, mint
                    )));
                }
                debug!(%address, "Associated token account already exists");
            }
            None => {
                let instruction = create_associated_token_account_idempotent(
                    &payer.pubkey(),
                    owner,
                    mint,
                    &spl_token::id(),
                );
                self.send(&[instruction], payer, &[]).await?;
            }
        }

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
        let instruction = spl_token::instruction::mint_to(
            &spl_token::id(),
            mint,
            destination,
            &authority.pubkey(),
            &[],
            amount,
        )
        .map_err(|e| Error::rejected(e.to_string()))?;

        self.send(&[instruction], payer, &[authority]).await
    }

    async fn transfer(
        &self,
        payer: &Keypair,
        source: &Pubkey,
        destination: &Pubkey,
        owner: &Keypair,
        amount: u64,
    ) -> Result<Signature> {
        let instruction = spl_token::instruction::transfer(
            &spl_token::id(),
            source,
            destination,
            &owner.pubkey(),
            &[],
            amount,
        )
        .map_err(|e| Error::rejected(e.to_string()))?;

        self.send(&[instruction], payer, &[owner]).await
    }

    async fn token_balance(&self, token_account: &Pubkey) -> Result<u64> {
        let balance = self.client.get_token_account_balance(token_account).await?;
        balance
            .amount
            .parse::<u64>()
            .map_err(|e| Error::rejected(format!("Invalid token amount {:?}: {}", balance.amount, e)))
    }
}
