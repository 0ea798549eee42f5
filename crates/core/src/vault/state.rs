//! # Vault State
//!
//! The mutable half of a vault. Owned by the vault instance; changed only by
//! its entry points.

use serde::{Deserialize, Serialize};

use crate::config::VaultConfig;
use crate::vault::reentrancy::ReentrancyStatus;
use crate::types::Address;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultState {
    /// Target weights in bps, aligned with the allowed assets
    pub target_weights: Vec<u32>,

    /// Receives the dev share of deposit fees and the agent share of AUM fees
    pub dev_wallet: Address,

    pub auto_rebalance: bool,

    /// Time AUM fees were last accrued up to. Never moves backwards.
    pub last_fee_collection: u64,

    /// AUM fee value accrued but worth less than one share so far
    #[serde(default)]
    pub pending_aum_fee: u128,

    /// Sub-unit AUM fee remainder, see [`accrue_aum_fee`]
    ///
    /// [`accrue_aum_fee`]: crate::accounting::accrue_aum_fee
    #[serde(default)]
    pub aum_fee_remainder: u64,

    /// Bumped on every successful state change
    pub state_version: u64,

    #[serde(skip)]
    pub(crate) reentrancy: ReentrancyStatus,
}

impl VaultState {
    pub fn from_config(config: &VaultConfig, now: u64) -> Self {
        Self {
            target_weights: config.initial_weights.clone(),
            dev_wallet: config.sinks.dev_wallet,
            auto_rebalance: config.auto_rebalance,
            last_fee_collection: now,
            pending_aum_fee: 0,
            aum_fee_remainder: 0,
            state_version: 0,
            reentrancy: ReentrancyStatus::Unlocked,
        }
    }

    pub fn bump_version(&mut self) {
        self.state_version = self.state_version.wrapping_add(1);
    }

    /// Advance the fee clock, never backwards
    pub fn advance_fee_clock(&mut self, now: u64) {
        self.last_fee_collection = self.last_fee_collection.max(now);
    }
}
