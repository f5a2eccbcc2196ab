use solana_sdk::native_token::lamports_to_sol;
use solana_sdk::pubkey::Pubkey;
use tracing::info;

use crate::error::{Error, Result};
use crate::ledger::Ledger;

/// Current balance of `owner` in lamports.
pub async fn check_balance<L: Ledger + ?Sized>(ledger: &L, owner: &Pubkey) -> Result<u64> {
    let balance = ledger.balance(owner).await?;
    info!(
        event = "balance_checked",
        owner = %owner,
        lamports = balance,
        "Current balance of wallet {}: {} SOL",
        owner,
        lamports_to_sol(balance)
    );
    Ok(balance)
}

pub fn ensure_minimum(address: &Pubkey, actual: u64, expected: u64) -> Result<()> {
    if actual < expected {
        return Err(Error::InsufficientFunds {
            address: *address,
            expected,
            actual,
        });
    }
    Ok(())
}

/// Fails with `InsufficientFunds` when `owner` holds less than `expected` lamports.
pub async fn verify_balance<L: Ledger + ?Sized>(
    ledger: &L,
    owner: &Pubkey,
    expected: u64,
) -> Result<u64> {
    let balance = check_balance(ledger, owner).await?;
    ensure_minimum(owner, balance, expected)?;
    Ok(balance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MemoryLedger;
    use proptest::prelude::*;
    use solana_sdk::native_token::LAMPORTS_PER_SOL;
    use solana_sdk::signature::{Keypair, Signer};

    #[tokio::test]
    async fn test_check_balance_reports_lamports() {
        let ledger = MemoryLedger::new();
        let wallet = Keypair::new();
        ledger
            .request_airdrop(&wallet.pubkey(), 500_000_000)
            .await
            .unwrap();

        let balance = check_balance(&ledger, &wallet.pubkey()).await.unwrap();

        assert_eq!(balance, 500_000_000);
        assert_eq!(lamports_to_sol(balance), 0.5);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let address = Pubkey::new_unique();
        assert!(ensure_minimum(&address, 2 * LAMPORTS_PER_SOL, 2 * LAMPORTS_PER_SOL).is_ok());
        assert!(ensure_minimum(&address, 0, 0).is_ok());
    }

    proptest! {
        #[test]
        fn test_below_threshold_always_fails(expected in 1u64..=u64::MAX, shortfall in 1u64..=u64::MAX) {
            let address = Pubkey::new_unique();
            let actual = expected.saturating_sub(shortfall);
            prop_assume!(actual < expected);

            match ensure_minimum(&address, actual, expected) {
                Err(Error::InsufficientFunds { address: a, expected: e, actual: got }) => {
                    prop_assert_eq!(a, address);
                    prop_assert_eq!(e, expected);
                    prop_assert_eq!(got, actual);
                }
                other => prop_assert!(false, "expected InsufficientFunds, got {:?}", other),
            }
        }

        #[test]
        fn test_at_or_above_threshold_passes(expected in 0u64..u64::MAX / 2, surplus in 0u64..u64::MAX / 2) {
            let address = Pubkey::new_unique();
            prop_assert!(ensure_minimum(&address, expected + surplus, expected).is_ok());
        }
    }

    #[tokio::test]
    async fn test_verify_balance_on_empty_wallet() {
        let ledger = MemoryLedger::new();
        let owner = Pubkey::new_unique();

        let err = verify_balance(&ledger, &owner, LAMPORTS_PER_SOL)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::InsufficientFunds { actual: 0, expected, .. } if expected == LAMPORTS_PER_SOL
        ));
    }
}
