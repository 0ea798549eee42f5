//! # Vault Configuration
//!
//! Immutable creation parameters, loaded from TOML and validated before a
//! vault is built from them.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use meridian_math::BPS_DENOMINATOR;
use serde::{Deserialize, Serialize};

use crate::errors::{ConfigError, VaultError, VaultResult};
use crate::types::Address;

/// Maximum number of assets a vault can hold
pub const MAX_ASSETS: usize = 16;

/// Cap on the upfront deposit fee
pub const MAX_DEPOSIT_FEE_BPS: u32 = 500;

/// Cap on the annual AUM fee
pub const MAX_AUM_FEE_BPS: u32 = 1_000;

/// Sum every weight vector must reach
pub const WEIGHT_TOTAL_BPS: u64 = BPS_DENOMINATOR as u64;

/// Vault creation parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Asset all values are expressed in
    pub numeraire: Address,

    /// Agent allowed to change weights, dev wallet and auto-rebalance
    pub manager: Address,

    /// Ordered basket, must contain the numeraire exactly once
    pub allowed_assets: Vec<Address>,

    /// Initial target weights in bps, one per allowed asset
    pub initial_weights: Vec<u32>,

    #[serde(default)]
    pub fees: FeeConfig,

    pub sinks: FeeSinks,

    #[serde(default)]
    pub oracle: OracleConfig,

    #[serde(default)]
    pub rebalance: RebalanceConfig,

    #[serde(default)]
    pub limits: DepositLimits,

    #[serde(default)]
    pub withdrawal_mode: WithdrawalMode,

    #[serde(default = "default_auto_rebalance")]
    pub auto_rebalance: bool,

    /// Shares minted to the burn address at creation, paid for by the manager
    #[serde(default)]
    pub seed_shares: u64,

    /// Deadline given to rebalance swaps, relative to the call time
    #[serde(default = "default_swap_deadline_secs")]
    pub swap_deadline_secs: u64,
}

/// Fee rates and how they are split
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeConfig {
    /// Upfront fee charged on deposits
    pub deposit_fee_bps: u32,

    /// Whether the deposit fee is taken from minted shares or deposited assets
    pub deposit_fee_basis: FeeBasis,

    /// Dev wallet share of the deposit fee; the rest goes to the rewards sink
    pub deposit_dev_share_bps: u32,

    /// Annual fee on NAV, accrued continuously
    pub aum_fee_bps: u32,

    /// Agent (dev wallet) share of the AUM fee; the rest goes to the protocol sink
    pub aum_agent_share_bps: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeBasis {
    /// Fee is a slice of the gross shares, minted to the sinks
    #[default]
    GrossShares,
    /// Fee is a slice of the deposited numeraire, transferred to the sinks
    Assets,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSinks {
    /// Initial dev wallet. The live value is vault state and can be changed.
    pub dev_wallet: Address,
    pub rewards: Address,
    pub protocol: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Default TWAP window in seconds
    pub window_secs: u32,

    /// Fee tiers in valuation order: the default tier, then the alternates
    pub fee_tiers: Vec<u32>,

    /// Minimum observation buffer cardinality for a pool to be usable
    pub min_cardinality: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RebalanceConfig {
    /// Deviation from target, in bps of the target, that triggers a rebalance
    pub band_bps: u32,

    /// Maximum slippage against the oracle-predicted output
    pub max_slippage_bps: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DepositLimits {
    pub min_deposit: u64,

    /// Applies while the share supply is zero
    pub min_first_deposit: u64,
}

/// Which withdrawal paths a vault offers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalMode {
    Basket,
    SingleAsset,
    #[default]
    Both,
}

impl WithdrawalMode {
    pub fn allows_basket(self) -> bool {
        matches!(self, WithdrawalMode::Basket | WithdrawalMode::Both)
    }

    pub fn allows_single_asset(self) -> bool {
        matches!(self, WithdrawalMode::SingleAsset | WithdrawalMode::Both)
    }
}

fn default_auto_rebalance() -> bool {
    true
}

fn default_swap_deadline_secs() -> u64 {
    300
}

// ============================================================================
// Loading
// ============================================================================

impl VaultConfig {
    /// Load and validate a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: VaultConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Index of `asset` in the basket
    pub fn asset_index(&self, asset: &Address) -> Option<usize> {
        self.allowed_assets.iter().position(|a| a == asset)
    }

    pub fn is_allowed(&self, asset: &Address) -> bool {
        self.asset_index(asset).is_some()
    }

    // ========================================================================
    // Validation
    // ========================================================================

    /// Check every creation-time constraint
    pub fn validate(&self) -> VaultResult<()> {
        if self.numeraire.is_zero() {
            return Err(VaultError::ZeroAddress("numeraire"));
        }
        if self.manager.is_zero() {
            return Err(VaultError::ZeroAddress("manager"));
        }

        let count = self.allowed_assets.len();
        if count == 0 || count > MAX_ASSETS {
            return Err(VaultError::AssetCount { count, max: MAX_ASSETS });
        }

        let mut seen = BTreeSet::new();
        for asset in &self.allowed_assets {
            if asset.is_zero() {
                return Err(VaultError::ZeroAddress("allowed asset"));
            }
            if !seen.insert(*asset) {
                return Err(VaultError::DuplicateAsset(*asset));
            }
        }
        if !seen.contains(&self.numeraire) {
            return Err(VaultError::NumeraireNotAllowed(self.numeraire));
        }

        validate_weights(&self.initial_weights, count)?;

        self.fees.validate()?;
        self.sinks.validate()?;
        self.oracle.validate()?;
        self.rebalance.validate()?;
        self.limits.validate()?;

        if self.swap_deadline_secs == 0 {
            return Err(VaultError::InvalidParameter {
                name: "swap_deadline_secs",
                reason: "must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

/// Weights must match the basket length and sum to exactly 10000 bps
pub fn validate_weights(weights: &[u32], asset_count: usize) -> VaultResult<()> {
    if weights.len() != asset_count {
        return Err(VaultError::LengthMismatch {
            assets: asset_count,
            weights: weights.len(),
        });
    }
    let sum: u64 = weights.iter().map(|w| u64::from(*w)).sum();
    if sum != WEIGHT_TOTAL_BPS {
        return Err(VaultError::InvalidWeightSum { sum });
    }
    Ok(())
}

fn check_share_bps(name: &'static str, bps: u32) -> VaultResult<()> {
    if u128::from(bps) > BPS_DENOMINATOR {
        return Err(VaultError::InvalidParameter {
            name,
            reason: format!("{} bps exceeds 10000", bps),
        });
    }
    Ok(())
}

impl FeeConfig {
    fn validate(&self) -> VaultResult<()> {
        if self.deposit_fee_bps > MAX_DEPOSIT_FEE_BPS {
            return Err(VaultError::FeeAboveCap {
                name: "deposit fee",
                bps: self.deposit_fee_bps,
                cap: MAX_DEPOSIT_FEE_BPS,
            });
        }
        if self.aum_fee_bps > MAX_AUM_FEE_BPS {
            return Err(VaultError::FeeAboveCap {
                name: "AUM fee",
                bps: self.aum_fee_bps,
                cap: MAX_AUM_FEE_BPS,
            });
        }
        check_share_bps("deposit_dev_share_bps", self.deposit_dev_share_bps)?;
        check_share_bps("aum_agent_share_bps", self.aum_agent_share_bps)
    }
}

impl FeeSinks {
    fn validate(&self) -> VaultResult<()> {
        if self.dev_wallet.is_zero() {
            return Err(VaultError::ZeroAddress("dev wallet"));
        }
        if self.rewards.is_zero() {
            return Err(VaultError::ZeroAddress("rewards sink"));
        }
        if self.protocol.is_zero() {
            return Err(VaultError::ZeroAddress("protocol sink"));
        }
        Ok(())
    }
}

impl OracleConfig {
    fn validate(&self) -> VaultResult<()> {
        if self.window_secs == 0 {
            return Err(VaultError::InvalidParameter {
                name: "oracle.window_secs",
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.fee_tiers.is_empty() {
            return Err(VaultError::InvalidParameter {
                name: "oracle.fee_tiers",
                reason: "at least one fee tier is required".to_string(),
            });
        }
        let unique: BTreeSet<_> = self.fee_tiers.iter().collect();
        if unique.len() != self.fee_tiers.len() {
            return Err(VaultError::InvalidParameter {
                name: "oracle.fee_tiers",
                reason: "fee tiers must be distinct".to_string(),
            });
        }
        Ok(())
    }

    /// Tier used when no selection is made
    pub fn default_tier(&self) -> Option<u32> {
        self.fee_tiers.first().copied()
    }
}

impl RebalanceConfig {
    fn validate(&self) -> VaultResult<()> {
        check_share_bps("rebalance.band_bps", self.band_bps)?;
        if u128::from(self.max_slippage_bps) >= BPS_DENOMINATOR {
            return Err(VaultError::InvalidParameter {
                name: "rebalance.max_slippage_bps",
                reason: format!("{} bps leaves no minimum output", self.max_slippage_bps),
            });
        }
        Ok(())
    }
}

impl DepositLimits {
    fn validate(&self) -> VaultResult<()> {
        if self.min_first_deposit < self.min_deposit {
            return Err(VaultError::InvalidParameter {
                name: "limits.min_first_deposit",
                reason: format!("must be at least min_deposit ({})", self.min_deposit),
            });
        }
        Ok(())
    }
}

// ============================================================================
// Defaults
// ============================================================================

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            deposit_fee_bps: 50,
            deposit_fee_basis: FeeBasis::GrossShares,
            deposit_dev_share_bps: 8_000,
            aum_fee_bps: 200,
            aum_agent_share_bps: 8_000,
        }
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            window_secs: 1_800,
            fee_tiers: vec![3_000, 500, 10_000],
            min_cardinality: 10,
        }
    }
}

impl Default for RebalanceConfig {
    fn default() -> Self {
        Self {
            band_bps: 100,
            max_slippage_bps: 100,
        }
    }
}

impl Default for DepositLimits {
    fn default() -> Self {
        Self {
            min_deposit: 1,
            min_first_deposit: 1_000,
        }
    }
}
