//! Scenario files: a vault, the market it trades in and a list of steps.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use meridian_core::{Address, VaultConfig};
use serde::{Deserialize, Serialize};

/// A complete simulation loaded from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Scenario {
    /// Scenario name for logging
    pub name: String,

    /// Unix time of vault creation
    pub start_time: u64,

    /// Address the vault lives at
    pub vault_address: Address,

    /// Vault creation parameters
    pub vault: VaultConfig,

    pub market: MarketSpec,

    #[serde(default)]
    pub steps: Vec<Step>,
}

/// Router and pool listings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MarketSpec {
    pub router: Address,

    /// Fee tier every pool is listed under
    #[serde(default = "default_fee_tier")]
    pub fee_tier: u32,

    /// Router inventory of each asset
    #[serde(default = "default_reserve")]
    pub reserve: u64,

    pub assets: Vec<ListingSpec>,
}

/// One asset traded against the numeraire
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListingSpec {
    pub address: Address,

    /// Numeraire price of one unit is `1.0001^price_tick`
    pub price_tick: i32,

    pub liquidity: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Step {
    /// Seconds to advance the clock before the step runs
    #[serde(default)]
    pub advance_secs: u64,

    pub caller: Address,

    /// Whether the step is meant to fail. A mismatch aborts the run.
    #[serde(default)]
    pub expect_error: bool,

    pub action: Action,
}

/// What a step does
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Give the caller numeraire and approve the vault for it
    Fund { amount: u64 },
    Deposit { amount: u64, receiver: Option<Address> },
    Mint { shares: u64, receiver: Option<Address> },
    Redeem {
        shares: u64,
        receiver: Option<Address>,
        owner: Option<Address>,
    },
    RedeemSingle {
        shares: u64,
        asset_out: Address,
        #[serde(default)]
        min_amount_out: u64,
        #[serde(default)]
        swaps: Vec<SwapSpec>,
        receiver: Option<Address>,
    },
    SetWeights { weights: Vec<u32> },
    SetAutoRebalance { enabled: bool },
    SetDevWallet { dev_wallet: Address },
    Rebalance,
    CollectFees,
    /// Move an asset's pool and router price
    SetPrice { asset: Address, price_tick: i32 },
    /// Transfer assets into the vault without minting shares
    Donate { asset: Address, amount: u64 },
}

/// Swap leg of a single-asset redemption
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SwapSpec {
    pub token_in: Address,
    pub amount_in: u64,
    #[serde(default)]
    pub min_amount_out: u64,
}

fn default_fee_tier() -> u32 {
    3_000
}

fn default_reserve() -> u64 {
    1_000_000_000_000_000_000
}

impl Scenario {
    /// Load a scenario from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("invalid scenario {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let scenario: Scenario = toml::from_str(content)?;
        scenario.validate()?;
        Ok(scenario)
    }

    fn validate(&self) -> Result<()> {
        self.vault.validate()?;
        for listing in &self.market.assets {
            if listing.address == self.vault.numeraire {
                bail!("the numeraire cannot be listed against itself");
            }
            if !self.vault.is_allowed(&listing.address) {
                bail!("listed asset {} is not in the basket", listing.address);
            }
        }
        Ok(())
    }
}
