//! Test helpers

#![allow(dead_code)]

use meridian_core::config::{
    DepositLimits, FeeConfig, FeeSinks, OracleConfig, RebalanceConfig, WithdrawalMode,
};
use meridian_core::interfaces::{AssetLedger, OwnershipLedger};
use meridian_core::testing::{MarketBuilder, MemoryVault};
use meridian_core::{Address, CallContext, VaultConfig};

pub const NUMERAIRE: Address = Address::repeat_byte(0x10);
/// Sorts above the numeraire
pub const ASSET_A: Address = Address::repeat_byte(0x20);
/// Sorts below the numeraire
pub const ASSET_B: Address = Address::repeat_byte(0x05);

pub const VAULT: Address = Address::repeat_byte(0xaa);
pub const ROUTER: Address = Address::repeat_byte(0xee);
pub const MANAGER: Address = Address::repeat_byte(0x90);
pub const DEV_WALLET: Address = Address::repeat_byte(0xd1);
pub const REWARDS: Address = Address::repeat_byte(0xd2);
pub const PROTOCOL: Address = Address::repeat_byte(0xd3);
pub const ALICE: Address = Address::repeat_byte(0xa1);
pub const BOB: Address = Address::repeat_byte(0xb1);

pub const START: u64 = 1_700_000_000;
pub const LIQUIDITY: u128 = 1_000_000_000_000;

/// Basket {numeraire, A, B} targeting 0 / 60 / 40
pub fn config() -> VaultConfig {
    VaultConfig {
        numeraire: NUMERAIRE,
        manager: MANAGER,
        allowed_assets: vec![NUMERAIRE, ASSET_A, ASSET_B],
        initial_weights: vec![0, 6_000, 4_000],
        fees: FeeConfig::default(),
        sinks: FeeSinks {
            dev_wallet: DEV_WALLET,
            rewards: REWARDS,
            protocol: PROTOCOL,
        },
        oracle: OracleConfig::default(),
        rebalance: RebalanceConfig::default(),
        limits: DepositLimits::default(),
        withdrawal_mode: WithdrawalMode::Both,
        auto_rebalance: true,
        seed_shares: 0,
        swap_deadline_secs: 300,
    }
}

/// Same basket without deposit or AUM fees
pub fn fee_free_config() -> VaultConfig {
    let mut config = config();
    config.fees.deposit_fee_bps = 0;
    config.fees.aum_fee_bps = 0;
    config
}

/// Vault over a market pricing A at 1 and B at ~2 numeraire
pub fn vault_with(config: VaultConfig) -> MemoryVault {
    vault_at_prices(config, 0, 6_932)
}

pub fn vault_at_prices(config: VaultConfig, tick_a: i32, tick_b: i32) -> MemoryVault {
    MarketBuilder::new(NUMERAIRE, ROUTER)
        .asset(ASSET_A, tick_a, LIQUIDITY)
        .asset(ASSET_B, tick_b, LIQUIDITY)
        .build()
        .unwrap()
        .into_vault(VAULT, config, START)
        .unwrap()
}

pub fn ctx(caller: Address) -> CallContext {
    CallContext::new(caller, START)
}

pub fn ctx_at(caller: Address, now: u64) -> CallContext {
    CallContext::new(caller, now)
}

/// Give `who` numeraire and let the vault pull it
pub fn fund(vault: &mut MemoryVault, who: &Address, amount: u128) {
    let assets = vault.assets_mut();
    assets.mint(&NUMERAIRE, who, amount).unwrap();
    let allowance = assets.allowance(&NUMERAIRE, who, &VAULT);
    assets.approve(&NUMERAIRE, who, &VAULT, allowance + amount).unwrap();
}

pub fn deposit(vault: &mut MemoryVault, who: &Address, amount: u128) -> u128 {
    fund(vault, who, amount);
    vault.deposit(&ctx(*who), amount, who).unwrap()
}

pub fn balance(vault: &MemoryVault, asset: &Address, owner: &Address) -> u128 {
    vault.assets().balance_of(asset, owner)
}

pub fn shares_of(vault: &MemoryVault, holder: &Address) -> u128 {
    vault.shares().balance_of(holder)
}

/// Numeraire value of the vault's holding of `asset`
pub fn value_held(vault: &MemoryVault, asset: &Address) -> u128 {
    let amount = balance(vault, asset, &VAULT);
    vault.oracle().value_in_numeraire(asset, amount).unwrap()
}

/// `|actual - target| * 10000 / target`
pub fn deviation_bps(actual: u128, target: u128) -> u128 {
    actual.abs_diff(target) * 10_000 / target
}
