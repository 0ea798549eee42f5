//! # Net Asset Value
//!
//! NAV is the numeraire balance plus every other holding valued through the
//! oracle. Two modes exist on purpose:
//!
//! - [`ValuationMode::Strict`] feeds minting and burning. A missing price is
//!   an error, otherwise a donation or a dead pool could reprice shares.
//! - [`ValuationMode::Tolerant`] feeds snapshots and other display values. A
//!   missing price counts the holding as zero.
//!
//! Arithmetic failures are fatal in both modes.

use tracing::warn;

use crate::errors::{VaultError, VaultResult};
use crate::interfaces::PoolDirectory;
use crate::oracle::TwapOracle;
use crate::types::{Address, AssetAmount};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValuationMode {
    Strict,
    Tolerant,
}

/// One holding and its numeraire value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetValuation {
    pub asset: Address,
    pub balance: u128,
    pub value: u128,
    /// False when the holding was counted as zero for lack of a price
    pub priced: bool,
}

/// NAV with its per-asset breakdown, in basket order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavReport {
    pub total: u128,
    pub assets: Vec<AssetValuation>,
}

impl NavReport {
    pub fn value_of(&self, asset: &Address) -> Option<u128> {
        self.assets.iter().find(|a| a.asset == *asset).map(|a| a.value)
    }

    /// True when every holding was priced
    pub fn fully_priced(&self) -> bool {
        self.assets.iter().all(|a| a.priced)
    }
}

/// Value `holdings` in the oracle's numeraire
pub fn compute_nav<P: PoolDirectory>(
    oracle: &TwapOracle<P>,
    holdings: &[AssetAmount],
    mode: ValuationMode,
) -> VaultResult<NavReport> {
    let mut total: u128 = 0;
    let mut assets = Vec::with_capacity(holdings.len());

    for holding in holdings {
        let (value, priced) = match oracle.value_in_numeraire(&holding.asset, holding.amount) {
            Ok(value) => (value, true),
            Err(err) => match VaultError::valuation(holding.asset, err) {
                err @ VaultError::Valuation { .. } if mode == ValuationMode::Tolerant => {
                    warn!(asset = %holding.asset, error = %err, "unpriced holding counted as zero");
                    (0, false)
                }
                err => return Err(err),
            },
        };

        total = total.checked_add(value).ok_or_else(VaultError::overflow)?;
        assets.push(AssetValuation {
            asset: holding.asset,
            balance: holding.amount,
            value,
            priced,
        });
    }

    Ok(NavReport { total, assets })
}
