//! # Rebalance Plan
//!
//! Per-asset current value, target value and deviation, computed from a NAV
//! report and the target weights. Transient: built and discarded inside one
//! call.

use meridian_math::{mul_div_u128, BPS_DENOMINATOR};
use tracing::debug;

use crate::accounting::NavReport;
use crate::errors::{VaultError, VaultResult};
use crate::types::Address;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetTarget {
    pub asset: Address,
    /// Current numeraire value
    pub current: u128,
    /// `nav * weight / 10000`
    pub target: u128,
    /// `|current - target| * 10000 / target`, or over NAV when the target is zero
    pub deviation_bps: u128,
}

impl AssetTarget {
    pub fn excess(&self) -> u128 {
        self.current.saturating_sub(self.target)
    }

    pub fn deficit(&self) -> u128 {
        self.target.saturating_sub(self.current)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebalancePlan {
    pub nav: u128,
    pub numeraire: Address,
    pub band_bps: u32,
    /// In basket order
    pub entries: Vec<AssetTarget>,
}

impl RebalancePlan {
    pub fn new(
        report: &NavReport,
        weights: &[u32],
        numeraire: Address,
        band_bps: u32,
    ) -> VaultResult<Self> {
        if report.assets.len() != weights.len() {
            return Err(VaultError::LengthMismatch {
                assets: report.assets.len(),
                weights: weights.len(),
            });
        }

        let nav = report.total;
        let entries = report
            .assets
            .iter()
            .zip(weights)
            .map(|(valuation, weight)| -> VaultResult<AssetTarget> {
                let target = mul_div_u128(nav, u128::from(*weight), BPS_DENOMINATOR)?;
                let current = valuation.value;
                let deviation = current.abs_diff(target);
                let deviation_bps = match (target, nav) {
                    (0, 0) => 0,
                    (0, nav) => mul_div_u128(deviation, BPS_DENOMINATOR, nav)?,
                    (target, _) => mul_div_u128(deviation, BPS_DENOMINATOR, target)?,
                };
                Ok(AssetTarget {
                    asset: valuation.asset,
                    current,
                    target,
                    deviation_bps,
                })
            })
            .collect::<VaultResult<Vec<_>>>()?;

        debug!(nav, band_bps, ?entries, "rebalance plan");
        Ok(Self {
            nav,
            numeraire,
            band_bps,
            entries,
        })
    }

    /// Deviation strictly above the band; the numeraire never triggers
    pub fn exceeds_band(&self, entry: &AssetTarget) -> bool {
        entry.asset != self.numeraire && entry.deviation_bps > u128::from(self.band_bps)
    }

    pub fn needs_rebalance(&self) -> bool {
        self.nav > 0 && self.entries.iter().any(|entry| self.exceeds_band(entry))
    }

    /// Non-numeraire entry with the largest deviation. Ties keep basket order.
    pub fn most_deviated(&self) -> Option<&AssetTarget> {
        self.entries
            .iter()
            .filter(|entry| entry.asset != self.numeraire)
            .fold(None, |best: Option<&AssetTarget>, entry| match best {
                Some(current) if current.deviation_bps >= entry.deviation_bps => Some(current),
                _ => Some(entry),
            })
    }

    /// Phase 1 sells: above target and outside the band
    pub fn overweight(&self) -> impl Iterator<Item = &AssetTarget> + '_ {
        self.entries
            .iter()
            .filter(move |entry| entry.current > entry.target && self.exceeds_band(entry))
    }

    /// Phase 2 buys: every non-numeraire asset below target
    pub fn deficits(&self) -> impl Iterator<Item = &AssetTarget> + '_ {
        self.entries
            .iter()
            .filter(move |entry| entry.asset != self.numeraire && entry.current < entry.target)
    }

    pub fn total_deficit(&self) -> VaultResult<u128> {
        self.deficits().try_fold(0u128, |total, entry| {
            total.checked_add(entry.deficit()).ok_or_else(VaultError::overflow)
        })
    }

    pub fn numeraire_target(&self) -> u128 {
        self.entries
            .iter()
            .find(|entry| entry.asset == self.numeraire)
            .map_or(0, |entry| entry.target)
    }
}
