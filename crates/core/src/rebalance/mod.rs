//! # Rebalancing
//!
//! Deviation detection lives here as a pure plan over a NAV report. The
//! two-phase execution (sell overweight into the numeraire, then buy
//! underweight with the freed numeraire) runs inside the vault, which owns
//! the balances and the swap adapter.

mod plan;

pub use plan::{AssetTarget, RebalancePlan};

use serde::{Deserialize, Serialize};

use crate::events::NoopReason;

/// Outcome of one rebalance pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RebalanceReport {
    /// Phase 1 swap legs executed
    pub sells: u32,
    /// Phase 2 swap legs executed
    pub buys: u32,
    /// Set when the pass stopped early without an error
    pub noop: Option<NoopReason>,
}

impl RebalanceReport {
    pub fn noop(reason: NoopReason) -> Self {
        Self {
            noop: Some(reason),
            ..Self::default()
        }
    }
}
