use std::time::Duration;

use proptest::prelude::*;
use solana_sdk::native_token::LAMPORTS_PER_SOL;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};

use token_workflow::balance::verify_balance;
use token_workflow::funding::airdrop_sol;
use token_workflow::{ConfirmationPolicy, Context, Ledger, MemoryLedger, WorkflowSettings};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
}

fn policy() -> ConfirmationPolicy {
    ConfirmationPolicy {
        interval: Duration::from_millis(1),
        max_attempts: 1,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_funded_balance_covers_request(sol in 1u64..=1_000) {
        let ledger = MemoryLedger::new();
        let recipient = Pubkey::new_unique();

        let balance = runtime().block_on(async {
            let airdrop = airdrop_sol(&ledger, &recipient, sol, &policy()).await.unwrap();
            assert!(airdrop.confirmed);
            verify_balance(&ledger, &recipient, airdrop.lamports).await.unwrap()
        });

        prop_assert!(balance >= sol * LAMPORTS_PER_SOL);
    }

    #[test]
    fn test_transfer_moves_exactly_the_amount(mint_amount in 1u64..=u64::MAX / 2, ratio in 0.0f64..=1.0) {
        let transfer_amount = ((mint_amount as f64) * ratio) as u64;
        let transfer_amount = transfer_amount.min(mint_amount);
        let settings = WorkflowSettings {
            mint_amount,
            transfer_amount,
            confirmation: policy(),
            ..WorkflowSettings::default()
        };
        let ctx = Context::new(MemoryLedger::new(), Keypair::new(), settings);

        let report = runtime().block_on(ctx.run()).unwrap();

        prop_assert_eq!(report.token_balance, mint_amount - transfer_amount);
        prop_assert_eq!(report.recipient_token_balance, transfer_amount);
        prop_assert_eq!(ctx.ledger.mint_supply(&report.mint), Some(mint_amount));
    }

    #[test]
    fn test_unfunded_wallet_never_passes(expected in 1u64..=100 * LAMPORTS_PER_SOL) {
        let ledger = MemoryLedger::new().without_airdrop_confirmation();
        let wallet = Keypair::new();

        let result = runtime().block_on(async {
            ledger.request_airdrop(&wallet.pubkey(), expected).await.unwrap();
            verify_balance(&ledger, &wallet.pubkey(), expected).await
        });

        prop_assert!(result.is_err());
    }
}
