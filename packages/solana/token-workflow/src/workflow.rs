//! Token issuance workflow: fund a wallet, create a mint, mint supply into
//! the wallet's associated token account and transfer part of it to a second
//! wallet.
//!
//! Steps run strictly in order, each one needing the output of the previous
//! one. The first failure stops the run. Nothing created on the ledger before
//! the failure is rolled back.

use std::fmt;

use solana_sdk::native_token::{lamports_to_sol, LAMPORTS_PER_SOL};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use spl_token::amount_to_ui_amount;
use thiserror::Error;
use tracing::info;

use crate::balance;
use crate::error::{Error, Result};
use crate::funding::{self, Airdrop, ConfirmationPolicy};
use crate::ledger::Ledger;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkflowSettings {
    /// Faucet request, in SOL. Also the minimum balance required afterwards.
    pub airdrop_sol: u64,
    pub decimals: u8,
    /// Base units minted into the wallet's token account.
    pub mint_amount: u64,
    /// Base units moved to the recipient.
    pub transfer_amount: u64,
    pub confirmation: ConfirmationPolicy,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            airdrop_sol: 2,
            decimals: 9,
            mint_amount: 1_000_000,
            transfer_amount: 500_000,
            confirmation: ConfirmationPolicy::default(),
        }
    }
}

impl WorkflowSettings {
    pub fn validate(&self) -> Result<()> {
        if self.airdrop_sol == 0 {
            return Err(Error::Config("airdrop amount must be positive".to_string()));
        }
        if self.airdrop_sol.checked_mul(LAMPORTS_PER_SOL).is_none() {
            return Err(Error::Config(format!(
                "airdrop of {} SOL does not fit in u64 lamports",
                self.airdrop_sol
            )));
        }
        if self.mint_amount == 0 {
            return Err(Error::Config("mint amount must be positive".to_string()));
        }
        if self.transfer_amount > self.mint_amount {
            return Err(Error::Config(format!(
                "transfer amount {} exceeds minted amount {}",
                self.transfer_amount, self.mint_amount
            )));
        }
        if self.confirmation.max_attempts == 0 {
            return Err(Error::Config(
                "at least one confirmation attempt is required".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Airdrop,
    VerifyBalance,
    CreateMint,
    CreateTokenAccount,
    MintTo,
    CreateRecipientAccount,
    Transfer,
    Reconcile,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Airdrop => "airdrop",
            Step::VerifyBalance => "balance verification",
            Step::CreateMint => "mint creation",
            Step::CreateTokenAccount => "token account creation",
            Step::MintTo => "minting",
            Step::CreateRecipientAccount => "recipient token account creation",
            Step::Transfer => "transfer",
            Step::Reconcile => "balance reconciliation",
        };
        f.write_str(name)
    }
}

/// A workflow failure and the step it interrupted.
#[derive(Debug, Error)]
#[error("{step} failed: {source}")]
pub struct StepError {
    pub step: Step,
    #[source]
    pub source: Error,
}

impl StepError {
    pub fn logs(&self) -> &[String] {
        self.source.logs()
    }
}

trait AtStep<T> {
    fn at(self, step: Step) -> std::result::Result<T, StepError>;
}

impl<T> AtStep<T> for Result<T> {
    fn at(self, step: Step) -> std::result::Result<T, StepError> {
        self.map_err(|source| StepError { step, source })
    }
}

#[derive(Debug, Clone)]
pub struct WorkflowReport {
    pub wallet: Pubkey,
    pub recipient: Pubkey,
    pub airdrop: Airdrop,
    pub mint: Pubkey,
    pub decimals: u8,
    pub token_account: Pubkey,
    pub recipient_token_account: Pubkey,
    pub mint_signature: Signature,
    pub transfer_signature: Signature,
    /// Token balances read back after the transfer, in base units.
    pub token_balance: u64,
    pub recipient_token_balance: u64,
}

impl WorkflowReport {
    /// Log the outcome of a completed run, one `workflow_summary` event per line.
    pub fn log_summary(&self) {
        info!(
            event = "workflow_completed",
            wallet = %self.wallet,
            mint = %self.mint,
            "Workflow completed"
        );
        info!(
            event = "workflow_summary",
            signature = %self.airdrop.signature,
            "  Airdrop:                 {} SOL ({})",
            lamports_to_sol(self.airdrop.lamports),
            self.airdrop.signature
        );
        info!(event = "workflow_summary", mint = %self.mint, "  Mint:                    {}", self.mint);
        info!(
            event = "workflow_summary",
            signature = %self.mint_signature,
            "  Mint signature:          {}",
            self.mint_signature
        );
        info!(
            event = "workflow_summary",
            token_account = %self.token_account,
            amount = self.token_balance,
            "  Wallet token account:    {} ({} tokens)",
            self.token_account,
            amount_to_ui_amount(self.token_balance, self.decimals)
        );
        info!(
            event = "workflow_summary",
            recipient = %self.recipient,
            "  Recipient wallet:        {}",
            self.recipient
        );
        info!(
            event = "workflow_summary",
            token_account = %self.recipient_token_account,
            amount = self.recipient_token_balance,
            "  Recipient token account: {} ({} tokens)",
            self.recipient_token_account,
            amount_to_ui_amount(self.recipient_token_balance, self.decimals)
        );
        info!(
            event = "workflow_summary",
            signature = %self.transfer_signature,
            "  Transfer signature:      {}",
            self.transfer_signature
        );
    }
}

/// Everything a workflow run needs: the ledger, the paying wallet and the
/// amounts to use.
pub struct Context<L> {
    pub ledger: L,
    pub wallet: Keypair,
    pub settings: WorkflowSettings,
}

impl<L: Ledger> Context<L> {
    pub fn new(ledger: L, wallet: Keypair, settings: WorkflowSettings) -> Self {
        Self {
            ledger,
            wallet,
            settings,
        }
    }

    pub async fn run(&self) -> std::result::Result<WorkflowReport, StepError> {
        let ledger = &self.ledger;
        let wallet = &self.wallet;
        let settings = &self.settings;
        let owner = wallet.pubkey();

        info!(event = "workflow_started", wallet = %owner, "Starting workflow...");

        let airdrop = funding::airdrop_sol(
            ledger,
            &owner,
            settings.airdrop_sol,
            &settings.confirmation,
        )
        .await
        .at(Step::Airdrop)?;

        balance::verify_balance(ledger, &owner, airdrop.lamports)
            .await
            .at(Step::VerifyBalance)?;
        info!(
            event = "wallet_funded",
            wallet = %owner,
            "Airdropped {} SOL to {}",
            settings.airdrop_sol,
            owner
        );

        info!(event = "mint_creating", decimals = settings.decimals, "Creating new SPL token...");
        let mint = ledger
            .create_mint(wallet, &owner, None, settings.decimals)
            .await
            .at(Step::CreateMint)?;
        info!(event = "mint_created", mint = %mint, "Token created: {}", mint);

        info!(event = "token_account_creating", "Creating token account for the wallet...");
        let token_account = ledger
            .get_or_create_associated_token_account(wallet, &mint, &owner)
            .await
            .at(Step::CreateTokenAccount)?;
        info!(
            event = "token_account_created",
            token_account = %token_account,
            "Token account created: {}",
            token_account
        );

        info!(
            event = "tokens_minting",
            amount = settings.mint_amount,
            "Minting {} base units to the token account...",
            settings.mint_amount
        );
        let mint_signature = ledger
            .mint_to(wallet, &mint, &token_account, wallet, settings.mint_amount)
            .await
            .at(Step::MintTo)?;
        info!(
            event = "tokens_minted",
            signature = %mint_signature,
            "Minted {} tokens to {}",
            amount_to_ui_amount(settings.mint_amount, settings.decimals),
            token_account
        );

        // The recipient never signs, only its address is needed.
        let recipient = Keypair::new().pubkey();
        info!(event = "recipient_generated", recipient = %recipient, "Recipient wallet: {}", recipient);

        let recipient_token_account = ledger
            .get_or_create_associated_token_account(wallet, &mint, &recipient)
            .await
            .at(Step::CreateRecipientAccount)?;
        info!(
            event = "recipient_token_account_created",
            token_account = %recipient_token_account,
            "Recipient token account: {}",
            recipient_token_account
        );

        let transfer_signature = ledger
            .transfer(
                wallet,
                &token_account,
                &recipient_token_account,
                wallet,
                settings.transfer_amount,
            )
            .await
            .at(Step::Transfer)?;
        info!(
            event = "tokens_transferred",
            signature = %transfer_signature,
            amount = settings.transfer_amount,
            "Transferred {} tokens to {}",
            amount_to_ui_amount(settings.transfer_amount, settings.decimals),
            recipient_token_account
        );

        let token_balance = ledger
            .token_balance(&token_account)
            .await
            .at(Step::Reconcile)?;
        let recipient_token_balance = ledger
            .token_balance(&recipient_token_account)
            .await
            .at(Step::Reconcile)?;

        Ok(WorkflowReport {
            wallet: owner,
            recipient,
            airdrop,
            mint,
            decimals: settings.decimals,
            token_account,
            recipient_token_account,
            mint_signature,
            transfer_signature,
            token_balance,
            recipient_token_balance,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_default_settings_are_valid() {
        assert!(WorkflowSettings::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_settings() {
        let base = WorkflowSettings::default();
        let cases = [
            WorkflowSettings {
                airdrop_sol: 0,
                ..base
            },
            WorkflowSettings {
                airdrop_sol: u64::MAX,
                ..base
            },
            WorkflowSettings {
                mint_amount: 0,
                transfer_amount: 0,
                ..base
            },
            WorkflowSettings {
                transfer_amount: base.mint_amount + 1,
                ..base
            },
            WorkflowSettings {
                confirmation: ConfirmationPolicy {
                    max_attempts: 0,
                    ..base.confirmation
                },
                ..base
            },
        ];
        for settings in cases {
            assert!(
                matches!(settings.validate(), Err(Error::Config(_))),
                "{:?} should be rejected",
                settings
            );
        }
    }

    #[test]
    fn test_transfer_of_whole_supply_is_allowed() {
        let settings = WorkflowSettings {
            transfer_amount: 1_000_000,
            ..WorkflowSettings::default()
        };
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_step_error_keeps_remote_logs() {
        let err = StepError {
            step: Step::Transfer,
            source: Error::rejected_with_logs(
                "custom program error: 0x1",
                vec!["Program log: Error: insufficient funds".to_string()],
            ),
        };
        assert_eq!(err.logs().len(), 1);
        assert!(err.to_string().starts_with("transfer failed"));
    }

    #[test]
    fn test_summary_lines_are_structured_events() {
        let report = WorkflowReport {
            wallet: Pubkey::new_unique(),
            recipient: Pubkey::new_unique(),
            airdrop: Airdrop {
                recipient: Pubkey::new_unique(),
                lamports: 2 * LAMPORTS_PER_SOL,
                signature: Signature::default(),
                confirmed: true,
            },
            mint: Pubkey::new_unique(),
            decimals: 9,
            token_account: Pubkey::new_unique(),
            recipient_token_account: Pubkey::new_unique(),
            mint_signature: Signature::default(),
            transfer_signature: Signature::default(),
            token_balance: 500_000,
            recipient_token_balance: 500_000,
        };
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        tracing::subscriber::with_default(subscriber, || report.log_summary());

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 8);
        assert!(lines[0].contains("event=\"workflow_completed\""));
        for line in &lines[1..] {
            assert!(line.contains("event=\"workflow_summary\""), "{}", line);
        }
        assert!(output.contains("0.0005 tokens"));
    }
}
