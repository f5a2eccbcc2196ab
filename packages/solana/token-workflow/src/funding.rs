//! Faucet funding for freshly generated wallets.

use std::time::Duration;

use solana_sdk::native_token::LAMPORTS_PER_SOL;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::ledger::Ledger;

/// How long to wait for the faucet transaction to be confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
            max_attempts: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Airdrop {
    pub recipient: Pubkey,
    pub lamports: u64,
    pub signature: Signature,
    /// False when the policy ran out before the faucet transaction landed.
    pub confirmed: bool,
}

/// Request `sol` from the faucet and wait for the transaction to confirm.
///
/// Faucet and transport failures are returned as errors. A transaction that
/// never confirms is not an error here: the returned `Airdrop` is marked
/// unconfirmed and the balance check that follows catches the shortfall.
pub async fn airdrop_sol<L: Ledger + ?Sized>(
    ledger: &L,
    recipient: &Pubkey,
    sol: u64,
    policy: &ConfirmationPolicy,
) -> Result<Airdrop> {
    let lamports = sol
        .checked_mul(LAMPORTS_PER_SOL)
        .ok_or_else(|| Error::Config(format!("Airdrop of {} SOL overflows u64 lamports", sol)))?;

    info!(
        event = "airdrop_requested",
        recipient = %recipient,
        lamports,
        "Requesting airdrop of {} SOL to {}",
        sol,
        recipient
    );
    let signature = ledger.request_airdrop(recipient, lamports).await?;

    let confirmed = wait_for_confirmation(ledger, &signature, policy).await?;
    if confirmed {
        info!(
            event = "airdrop_confirmed",
            signature = %signature,
            "Airdrop successful: {}",
            signature
        );
    } else {
        warn!(
            event = "airdrop_unconfirmed",
            signature = %signature,
            attempts = policy.max_attempts,
            "Airdrop {} not confirmed after {} checks",
            signature,
            policy.max_attempts
        );
    }

    Ok(Airdrop {
        recipient: *recipient,
        lamports,
        signature,
        confirmed,
    })
}

/// Poll the signature status until it is confirmed or the policy runs out.
pub async fn wait_for_confirmation<L: Ledger + ?Sized>(
    ledger: &L,
    signature: &Signature,
    policy: &ConfirmationPolicy,
) -> Result<bool> {
    for attempt in 1..=policy.max_attempts {
        if ledger.is_confirmed(signature).await? {
            debug!(%signature, attempt, "Signature confirmed");
            return Ok(true);
        }
        if attempt < policy.max_attempts {
            tokio::time::sleep(policy.interval).await;
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::memory::Operation;
    use crate::ledger::MemoryLedger;

    fn policy(max_attempts: u32) -> ConfirmationPolicy {
        ConfirmationPolicy {
            interval: Duration::from_secs(1),
            max_attempts,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_airdrop_confirms_on_first_check() {
        let ledger = MemoryLedger::new();
        let recipient = Pubkey::new_unique();

        let airdrop = airdrop_sol(&ledger, &recipient, 2, &policy(5)).await.unwrap();

        assert!(airdrop.confirmed);
        assert_eq!(airdrop.lamports, 2 * LAMPORTS_PER_SOL);
        assert_eq!(
            ledger.journal(),
            vec![Operation::RequestAirdrop, Operation::SignatureStatus]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_stops_after_max_attempts() {
        let ledger = MemoryLedger::new().without_airdrop_confirmation();
        let recipient = Pubkey::new_unique();
        let started = tokio::time::Instant::now();

        let airdrop = airdrop_sol(&ledger, &recipient, 1, &policy(4)).await.unwrap();

        assert!(!airdrop.confirmed);
        let checks = ledger
            .journal()
            .into_iter()
            .filter(|op| *op == Operation::SignatureStatus)
            .count();
        assert_eq!(checks, 4);
        // no sleep after the last check
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(3) && elapsed < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_faucet_failure_is_propagated() {
        let ledger = MemoryLedger::new().failing_on(Operation::RequestAirdrop);

        let err = airdrop_sol(&ledger, &Pubkey::new_unique(), 2, &policy(1))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Rejected { .. }));
        assert_eq!(ledger.journal(), vec![Operation::RequestAirdrop]);
    }

    #[tokio::test]
    async fn test_overflowing_amount_is_rejected_before_request() {
        let ledger = MemoryLedger::new();

        let err = airdrop_sol(&ledger, &Pubkey::new_unique(), u64::MAX, &policy(1))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Config(_)));
        assert!(ledger.journal().is_empty());
    }
}
