//! Manager controls, manual rebalancing and fee collection

mod helpers;

use helpers::*;
use meridian_core::events::NoopReason;
use meridian_core::interfaces::OwnershipLedger;
use meridian_core::testing::MemoryVault;
use meridian_core::{ErrorKind, RebalanceReport, ValuationMode, VaultError, VaultEvent};

fn funded_vault() -> MemoryVault {
    let mut vault = vault_at_prices(fee_free_config(), 0, 0);
    deposit(&mut vault, &ALICE, 10_000);
    vault.take_events();
    vault
}

#[test]
fn test_manager_only_entry_points() {
    let mut vault = funded_vault();
    let outsider = ctx(ALICE);

    let err = vault
        .set_target_weights(&outsider, vec![0, 5_000, 5_000])
        .unwrap_err();
    assert_eq!(err, VaultError::Unauthorized { caller: ALICE });
    assert_eq!(err.kind(), ErrorKind::Authorization);

    assert!(matches!(
        vault.set_dev_wallet(&outsider, BOB),
        Err(VaultError::Unauthorized { .. })
    ));
    assert!(matches!(
        vault.set_auto_rebalance(&outsider, false),
        Err(VaultError::Unauthorized { .. })
    ));
    assert!(matches!(vault.rebalance(&outsider), Err(VaultError::Unauthorized { .. })));

    assert!(vault.events().is_empty());
    assert_eq!(vault.state().target_weights, vec![0, 6_000, 4_000]);
}

#[test]
fn test_weight_validation() {
    let mut vault = funded_vault();
    let version = vault.state().state_version;

    assert_eq!(
        vault.set_target_weights(&ctx(MANAGER), vec![0, 5_000, 4_000]),
        Err(VaultError::InvalidWeightSum { sum: 9_000 })
    );
    assert_eq!(
        vault.set_target_weights(&ctx(MANAGER), vec![5_000, 5_000]),
        Err(VaultError::LengthMismatch { assets: 3, weights: 2 })
    );
    assert_eq!(vault.state().state_version, version);
}

#[test]
fn test_weight_change_without_auto_rebalance_signals() {
    let mut vault = funded_vault();
    vault.set_auto_rebalance(&ctx(MANAGER), false).unwrap();
    vault.set_target_weights(&ctx(MANAGER), vec![0, 4_000, 6_000]).unwrap();

    let events = vault.take_events();
    assert!(events.iter().any(|e| matches!(
        e,
        VaultEvent::WeightsUpdated { weights, .. } if *weights == vec![0, 4_000, 6_000]
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        VaultEvent::RebalanceNeeded { asset, deviation_bps: 5_000, band_bps: 100, .. }
            if *asset == ASSET_A
    )));
    assert!(!events.iter().any(|e| matches!(e, VaultEvent::SwapExecuted { .. })));
    assert_eq!(balance(&vault, &ASSET_A, &VAULT), 6_000);

    // The manager trades it: sell 2000 A, buy 2000 B
    let report = vault.rebalance(&ctx(MANAGER)).unwrap();
    assert_eq!(report, RebalanceReport { sells: 1, buys: 1, noop: None });
    assert_eq!(balance(&vault, &ASSET_A, &VAULT), 4_000);
    assert_eq!(balance(&vault, &ASSET_B, &VAULT), 6_000);
    assert_eq!(balance(&vault, &NUMERAIRE, &VAULT), 0);

    let plan = vault.plan(ValuationMode::Strict).unwrap();
    assert!(!plan.needs_rebalance());
}

#[test]
fn test_weight_change_with_auto_rebalance_trades() {
    let mut vault = funded_vault();
    let version = vault.state().state_version;
    vault.set_target_weights(&ctx(MANAGER), vec![0, 4_000, 6_000]).unwrap();

    assert_eq!(balance(&vault, &ASSET_A, &VAULT), 4_000);
    assert_eq!(balance(&vault, &ASSET_B, &VAULT), 6_000);
    assert!(vault.state().state_version > version);
    assert!(matches!(vault.events().last(), Some(VaultEvent::Snapshot { .. })));
}

#[test]
fn test_rebalance_noops() {
    let mut empty = vault_at_prices(fee_free_config(), 0, 0);
    assert_eq!(
        empty.rebalance(&ctx(MANAGER)).unwrap(),
        RebalanceReport::noop(NoopReason::ZeroNav)
    );

    let mut vault = funded_vault();
    let version = vault.state().state_version;
    assert_eq!(
        vault.rebalance(&ctx(MANAGER)).unwrap(),
        RebalanceReport::noop(NoopReason::WithinBand)
    );
    assert_eq!(vault.state().state_version, version);
    assert!(vault.events().iter().any(|e| matches!(
        e,
        VaultEvent::Rebalanced { noop: Some(NoopReason::WithinBand), .. }
    )));
}

#[test]
fn test_failed_rebalance_swap_aborts() {
    let mut vault = funded_vault();
    vault.set_auto_rebalance(&ctx(MANAGER), false).unwrap();
    vault.set_target_weights(&ctx(MANAGER), vec![0, 4_000, 6_000]).unwrap();
    vault.swapper_mut().set_rejecting(true);

    let err = vault
        .transact(|v| v.rebalance(&ctx(MANAGER)))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Liquidity);
    assert_eq!(balance(&vault, &ASSET_A, &VAULT), 6_000);
    assert!(!vault.is_locked());
}

#[test]
fn test_dev_wallet_receives_later_fees() {
    let mut vault = vault_at_prices(config(), 0, 0);
    deposit(&mut vault, &ALICE, 10_000);

    assert_eq!(
        vault.set_dev_wallet(&ctx(MANAGER), meridian_core::Address::ZERO),
        Err(VaultError::ZeroAddress("dev wallet"))
    );
    vault.set_dev_wallet(&ctx(MANAGER), BOB).unwrap();
    assert_eq!(vault.state().dev_wallet, BOB);

    let year_later = START + 365 * 24 * 60 * 60;
    let minted = vault.collect_fees(&ctx_at(ALICE, year_later)).unwrap();
    assert!(minted > 0);
    let bob = shares_of(&vault, &BOB);
    let protocol = shares_of(&vault, &PROTOCOL);
    assert_eq!(bob + protocol, minted);
    assert!(bob > protocol);

    // Same instant again mints nothing
    assert_eq!(vault.collect_fees(&ctx_at(ALICE, year_later)).unwrap(), 0);
    let deposit_fees = shares_of(&vault, &DEV_WALLET) + shares_of(&vault, &REWARDS);
    assert_eq!(
        vault.shares().total_supply(),
        shares_of(&vault, &ALICE) + deposit_fees + minted
    );
}

#[test]
fn test_weight_change_with_dead_pool() {
    let mut vault = funded_vault();
    for pool in vault.oracle_mut().pools_mut().pair_mut(&ASSET_B, &NUMERAIRE) {
        pool.set_liquidity(0);
    }
    assert_eq!(
        vault.nav(ValuationMode::Strict).unwrap_err().kind(),
        ErrorKind::Valuation
    );

    // Auto-rebalance on: the follow-up is skipped, the weights still change
    vault.set_target_weights(&ctx(MANAGER), vec![0, 10_000, 0]).unwrap();
    assert_eq!(vault.state().target_weights, vec![0, 10_000, 0]);
    assert_eq!(balance(&vault, &ASSET_A, &VAULT), 6_000);
    assert_eq!(balance(&vault, &ASSET_B, &VAULT), 4_000);

    let events = vault.take_events();
    assert!(matches!(events.first(), Some(VaultEvent::WeightsUpdated { .. })));
    assert!(!events.iter().any(|e| matches!(
        e,
        VaultEvent::SwapExecuted { .. } | VaultEvent::RebalanceNeeded { .. }
    )));
    match events.last() {
        Some(VaultEvent::Snapshot { fully_priced, .. }) => assert!(!fully_priced),
        other => panic!("expected a snapshot, got {:?}", other),
    }

    vault.set_auto_rebalance(&ctx(MANAGER), false).unwrap();
    vault.set_target_weights(&ctx(MANAGER), vec![0, 6_000, 4_000]).unwrap();
    assert_eq!(vault.state().target_weights, vec![0, 6_000, 4_000]);
}

#[test]
fn test_frequent_fee_collection_mints_the_full_fee() {
    let mut config = fee_free_config();
    config.fees.aum_fee_bps = 200;
    let mut frequent = vault_at_prices(config, 0, 0);
    deposit(&mut frequent, &ALICE, 1_000_000_000);
    frequent.take_events();
    let mut once = frequent.clone();

    let day = 24 * 60 * 60;
    let mut minted = 0;
    for second in 1..=day {
        minted += frequent.collect_fees(&ctx_at(BOB, START + second)).unwrap();
        frequent.take_events();
    }
    let single = once.collect_fees(&ctx_at(BOB, START + day)).unwrap();

    // 1e9 * 2% / 365
    assert_eq!(single, 54_794);
    assert!(minted.abs_diff(single) <= 5, "minted {} vs {}", minted, single);
    assert_eq!(frequent.state().last_fee_collection, START + day);
    assert_eq!(
        frequent.shares().total_supply(),
        shares_of(&frequent, &ALICE) + minted
    );
}
