//! End-to-end mining and wallet scenarios
//!
//! Drives the public `MiningCoordinator` surface:
//! - Proof-gated minting with base rewards and multipliers
//! - Supply cap enforcement under concurrent mints
//! - All-or-nothing transfers
//! - Replay protection and supply/balance conservation

use std::sync::Arc;

use futures::future::join_all;
use mint::{
    ActivityClaim, EconomicIndicators, MintConfig, MintError, MiningCoordinator, Multipliers,
    ProofStatus, ProofValidator,
};

fn coordinator_with_cap(max_supply: u64) -> MiningCoordinator {
    let mut config = MintConfig::default();
    config.supply.max_supply = max_supply;
    MiningCoordinator::with_config(config).unwrap()
}

// =============================================================================
// Minting
// =============================================================================

#[tokio::test]
async fn test_quiz_passed_mints_25_to_wallet() {
    let coordinator = MiningCoordinator::new().unwrap();
    let claim = ActivityClaim::new("a1", "u1", "quiz_passed");

    let result = coordinator.mine("u1", &claim).await.unwrap();

    assert_eq!(result.reward, 25);
    assert_eq!(result.new_balance, 25);
    assert!(result.proof.verified);
    assert_eq!(coordinator.wallets().balance("u1", "AZR").await.unwrap(), 25);
    assert_eq!(
        coordinator.get_global_mining_stats().await.unwrap().total_supply,
        25
    );

    let history = coordinator.get_history("u1", 10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert!(history[0].is_reward_in("AZR"));
}

#[tokio::test]
async fn test_multipliers_scale_and_clamp() {
    let coordinator = MiningCoordinator::new().unwrap();

    let doubled = Multipliers {
        streak: 2.0,
        quality: 1.5,
        ..Default::default()
    };
    let claim = ActivityClaim::new("quiz-2", "u1", "quiz_passed");
    assert_eq!(coordinator.mine_with("u1", &claim, &doubled).await.unwrap().reward, 75);

    // Every multiplier clamps to 5.
    let huge = Multipliers {
        streak: 1000.0,
        quality: 1000.0,
        difficulty: 1000.0,
    };
    let claim = ActivityClaim::new("content-9", "u1", "content_created");
    assert_eq!(coordinator.mine_with("u1", &claim, &huge).await.unwrap().reward, 12_500);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_mints_respect_cap() {
    let coordinator = Arc::new(coordinator_with_cap(30));
    let mut alerts = coordinator.subscribe_alerts();

    let tasks = ["a1", "a2"].into_iter().map(|id| {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move {
            let claim = ActivityClaim::new(id, id, "quiz_passed");
            coordinator.mine(id, &claim).await
        })
    });
    let results: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let successes = results.iter().filter(|r| r.is_ok()).count();
    let capped = results
        .iter()
        .filter(|r| matches!(r, Err(MintError::SupplyCapExceeded { max: 30, would_have: 50 })))
        .count();
    assert_eq!(successes, 1);
    assert_eq!(capped, 1);

    let global = coordinator.get_global_mining_stats().await.unwrap();
    assert_eq!(global.total_supply, 25);
    assert!(alerts.try_recv().is_ok());

    // The refused mint credited nobody.
    let report = coordinator.audit_conservation().await.unwrap();
    assert!(report.balanced);
    assert_eq!(report.circulating, 25);
}

// =============================================================================
// Transfers
// =============================================================================

#[tokio::test]
async fn test_transfer_with_insufficient_balance_changes_nothing() {
    let coordinator = MiningCoordinator::new().unwrap();
    let streak = Multipliers {
        streak: 5.0,
        ..Default::default()
    };
    let claim = ActivityClaim::new("lesson-1", "u1", "lesson_complete");
    assert_eq!(coordinator.mine_with("u1", &claim, &streak).await.unwrap().reward, 50);

    let err = coordinator.transfer("u1", "u2", "AZR", 100).await.unwrap_err();
    assert_eq!(err, MintError::InsufficientBalance { have: 50, need: 100 });

    let wallets = coordinator.wallets();
    assert_eq!(wallets.balance("u1", "AZR").await.unwrap(), 50);
    assert_eq!(wallets.balance("u2", "AZR").await.unwrap(), 0);
    assert_eq!(coordinator.get_history("u1", 10).await.unwrap().len(), 1);
    assert!(coordinator.get_history("u2", 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_transfer_moves_balance_and_records_both_sides() {
    let coordinator = MiningCoordinator::new().unwrap();
    let claim = ActivityClaim::new("content-1", "u1", "content_created");
    coordinator.mine("u1", &claim).await.unwrap();

    let record = coordinator.transfer("u1", "u2", "AZR", 40).await.unwrap();
    assert_eq!(record.debit.amount, 40);
    assert_eq!(record.credit.amount, 40);

    let wallets = coordinator.wallets();
    assert_eq!(wallets.balance("u1", "AZR").await.unwrap(), 60);
    assert_eq!(wallets.balance("u2", "AZR").await.unwrap(), 40);

    let sender = coordinator.get_history("u1", 10).await.unwrap();
    let recipient = coordinator.get_history("u2", 10).await.unwrap();
    assert_eq!(sender.len(), 2);
    assert_eq!(sender[0].id, record.debit.id);
    assert_eq!(recipient.len(), 1);
    assert_eq!(recipient[0].id, record.credit.id);

    // Transfers move tokens without issuing any.
    assert_eq!(
        coordinator.get_global_mining_stats().await.unwrap().total_supply,
        100
    );
}

#[tokio::test]
async fn test_transfer_rejects_bad_requests() {
    let coordinator = MiningCoordinator::new().unwrap();
    coordinator
        .mine("u1", &ActivityClaim::new("p-1", "u1", "project_submitted"))
        .await
        .unwrap();

    assert_eq!(
        coordinator.transfer("u1", "u1", "AZR", 10).await.unwrap_err(),
        MintError::SelfTransfer
    );
    assert!(matches!(
        coordinator.transfer("u1", "u2", "AZR", 0).await,
        Err(MintError::InvalidAmount(_))
    ));
    assert!(matches!(
        coordinator.transfer("u1", "u2", "DOGE", 10).await,
        Err(MintError::UnsupportedCurrency(_))
    ));
    assert_eq!(coordinator.wallets().balance("u1", "AZR").await.unwrap(), 50);
}

// =============================================================================
// Replay, conservation and rate bounds
// =============================================================================

#[tokio::test]
async fn test_proof_cannot_be_redeemed_twice() {
    let coordinator = MiningCoordinator::new().unwrap();
    let proof = coordinator
        .validator()
        .validate(&ActivityClaim::new("quiz-7", "u1", "quiz_passed"))
        .unwrap();
    let multipliers = Multipliers::default();

    coordinator
        .redeem("u1", proof.clone(), &multipliers)
        .await
        .unwrap();
    assert_eq!(
        coordinator.supply().proof_status(&proof).await.unwrap(),
        ProofStatus::Consumed
    );

    let replay = coordinator.redeem("u1", proof, &multipliers).await;
    assert!(matches!(replay, Err(MintError::ProofAlreadyConsumed(_))));

    // A fresh validation of the same activity is still the same activity.
    let again = coordinator
        .mine("u1", &ActivityClaim::new("quiz-7", "u1", "quiz_passed"))
        .await;
    assert!(matches!(again, Err(MintError::ProofAlreadyConsumed(_))));

    assert_eq!(coordinator.wallets().balance("u1", "AZR").await.unwrap(), 25);
    assert_eq!(coordinator.supply().recent_mints(10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_proof_from_another_issuer_is_rejected() {
    let coordinator = MiningCoordinator::new().unwrap();
    let foreign = ProofValidator::generate()
        .validate(&ActivityClaim::new("quiz-8", "u1", "quiz_passed"))
        .unwrap();

    assert!(matches!(
        coordinator.redeem("u1", foreign, &Multipliers::default()).await,
        Err(MintError::InvalidProof(_))
    ));
    assert_eq!(
        coordinator.get_global_mining_stats().await.unwrap().total_supply,
        0
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_supply_matches_balances_under_concurrency() {
    let coordinator = Arc::new(MiningCoordinator::new().unwrap());
    let users = ["u1", "u2", "u3", "u4"];

    let mines = (0..40).map(|i| {
        let coordinator = Arc::clone(&coordinator);
        let user = users[i % users.len()];
        tokio::spawn(async move {
            let claim = ActivityClaim::new(format!("lesson-{i}"), user, "lesson_complete");
            coordinator.mine(user, &claim).await
        })
    });
    for joined in join_all(mines).await {
        joined.unwrap().unwrap();
    }

    let transfers = (0..40).map(|i| {
        let coordinator = Arc::clone(&coordinator);
        let from = users[i % users.len()];
        let to = users[(i + 1) % users.len()];
        tokio::spawn(async move { coordinator.transfer(from, to, "AZR", 7).await })
    });
    for joined in join_all(transfers).await {
        // Some transfers may lose the race for funds; none may half-apply.
        match joined.unwrap() {
            Ok(_) | Err(MintError::InsufficientBalance { .. }) => {}
            Err(e) => panic!("unexpected transfer error: {e}"),
        }
    }

    let report = coordinator.audit_conservation().await.unwrap();
    assert!(report.balanced);
    assert_eq!(report.total_supply, 400);
    assert_eq!(report.minted_total, 400);
    assert_eq!(report.circulating, 400);
}

#[tokio::test]
async fn test_public_operations_keep_supply_and_balances_equal() {
    let coordinator = MiningCoordinator::new().unwrap();
    let assert_balanced = |report: mint::ConservationReport| {
        assert!(report.balanced, "{report:?}");
    };

    coordinator
        .mine("u1", &ActivityClaim::new("a1", "u1", "quiz_passed"))
        .await
        .unwrap();
    assert_balanced(coordinator.audit_conservation().await.unwrap());

    // The reward currency cannot be conjured or destroyed through wallets.
    let wallets = coordinator.wallets();
    assert_eq!(
        wallets.credit("u2", "AZR", 1_000_000).await.unwrap_err(),
        MintError::ReservedCurrency("AZR".to_string())
    );
    assert_eq!(
        wallets.debit("u1", "AZR", 25).await.unwrap_err(),
        MintError::ReservedCurrency("AZR".to_string())
    );
    assert_balanced(coordinator.audit_conservation().await.unwrap());

    // Other currencies move freely without touching the reward supply.
    wallets.credit("u2", "LEARN", 500).await.unwrap();
    wallets.debit("u2", "LEARN", 200).await.unwrap();
    assert_balanced(coordinator.audit_conservation().await.unwrap());

    coordinator.transfer("u1", "u2", "AZR", 10).await.unwrap();
    let _ = coordinator.transfer("u1", "u2", "AZR", 1_000).await;
    assert_balanced(coordinator.audit_conservation().await.unwrap());

    coordinator
        .adjust_minting_rate(EconomicIndicators {
            demand_index: 1.0,
            supply_index: 3.0,
            velocity_index: 1.0,
        })
        .await
        .unwrap();
    coordinator.get_mining_stats("u1").await.unwrap();
    coordinator.get_history("u2", 5).await.unwrap();

    let report = coordinator.audit_conservation().await.unwrap();
    assert_eq!(report.total_supply, 25);
    assert_eq!(report.circulating, 25);
    assert_balanced(report);
}

#[tokio::test]
async fn test_minting_rate_stays_bounded() {
    let coordinator = MiningCoordinator::new().unwrap();
    let signals = [
        (10.0, 1.0),
        (1.0, 10.0),
        (f64::NAN, 1.0),
        (f64::INFINITY, 0.0),
        (0.0, f64::INFINITY),
        (-5.0, 3.0),
    ];

    for _ in 0..30 {
        for &(demand, supply) in &signals {
            let rate = coordinator
                .adjust_minting_rate(EconomicIndicators {
                    demand_index: demand,
                    supply_index: supply,
                    velocity_index: 1.0,
                })
                .await
                .unwrap();
            assert!((0.5..=1.0).contains(&rate));
        }
    }

    let stats = coordinator.get_global_mining_stats().await.unwrap();
    assert!((0.5..=1.0).contains(&stats.minting_rate));
    assert_eq!(stats.inflation.minting_rate, stats.minting_rate);
}

#[tokio::test]
async fn test_issued_proofs_form_ordered_chain() {
    let coordinator = MiningCoordinator::new().unwrap();
    let start = chrono::Utc::now();

    let proofs: Vec<_> = (0..3)
        .map(|i| {
            let claim = ActivityClaim::new(format!("q-{i}"), "u1", "quiz_passed")
                .at(start + chrono::Duration::minutes(i));
            coordinator.validator().validate(&claim).unwrap()
        })
        .collect();
    assert!(ProofValidator::verify_chain(&proofs));

    let mut shuffled = proofs.clone();
    shuffled.swap(0, 2);
    assert!(!ProofValidator::verify_chain(&shuffled));
}
