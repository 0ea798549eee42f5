//! Event definitions

use serde::{Deserialize, Serialize};

use crate::types::{Address, AssetAmount};

/// Which fee a [`VaultEvent::FeesCollected`] record is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeKind {
    Deposit,
    Aum,
}

/// Why a rebalance did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoopReason {
    ZeroNav,
    WithinBand,
    NoNumeraire,
    NoDeficit,
}

/// State records for off-chain consumers, buffered by the vault
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VaultEvent {
    /// After every deposit, withdrawal, weight change and rebalance
    Snapshot {
        nav: u128,
        share_price: u128,
        total_supply: u128,
        weights: Vec<u32>,
        /// False when some holding was counted as zero for lack of a price
        fully_priced: bool,
        state_version: u64,
        timestamp: u64,
    },

    /// Deviation exceeds the band while auto-rebalance is off
    RebalanceNeeded {
        asset: Address,
        deviation_bps: u128,
        band_bps: u32,
        timestamp: u64,
    },

    SwapExecuted {
        token_in: Address,
        token_out: Address,
        amount_in: u128,
        amount_out: u128,
        min_amount_out: u128,
        timestamp: u64,
    },

    /// `amount` is in shares for gross-share deposit fees and AUM fees, in
    /// numeraire units for asset-basis deposit fees
    FeesCollected {
        kind: FeeKind,
        primary_sink: Address,
        primary_amount: u128,
        secondary_sink: Address,
        secondary_amount: u128,
        nav: u128,
        total_supply: u128,
        timestamp: u64,
    },

    Deposited {
        caller: Address,
        receiver: Address,
        assets: u128,
        shares: u128,
        timestamp: u64,
    },

    Withdrawn {
        caller: Address,
        receiver: Address,
        owner: Address,
        shares: u128,
        payouts: Vec<AssetAmount>,
        timestamp: u64,
    },

    Rebalanced {
        sells: u32,
        buys: u32,
        noop: Option<NoopReason>,
        timestamp: u64,
    },

    WeightsUpdated {
        weights: Vec<u32>,
        timestamp: u64,
    },

    DevWalletUpdated {
        dev_wallet: Address,
        timestamp: u64,
    },

    AutoRebalanceUpdated {
        enabled: bool,
        timestamp: u64,
    },
}

impl VaultEvent {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            VaultEvent::Snapshot { .. } => "snapshot",
            VaultEvent::RebalanceNeeded { .. } => "rebalance_needed",
            VaultEvent::SwapExecuted { .. } => "swap_executed",
            VaultEvent::FeesCollected { .. } => "fees_collected",
            VaultEvent::Deposited { .. } => "deposited",
            VaultEvent::Withdrawn { .. } => "withdrawn",
            VaultEvent::Rebalanced { .. } => "rebalanced",
            VaultEvent::WeightsUpdated { .. } => "weights_updated",
            VaultEvent::DevWalletUpdated { .. } => "dev_wallet_updated",
            VaultEvent::AutoRebalanceUpdated { .. } => "auto_rebalance_updated",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_shape() {
        let event = VaultEvent::Rebalanced {
            sells: 1,
            buys: 2,
            noop: None,
            timestamp: 9,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"rebalanced":{"sells":1,"buys":2,"noop":null,"timestamp":9}}"#);
        assert_eq!(serde_json::from_str::<VaultEvent>(&json).unwrap(), event);
        assert_eq!(event.name(), "rebalanced");
    }

    #[test]
    fn test_large_amounts_survive_json() {
        let event = VaultEvent::Deposited {
            caller: Address::repeat_byte(1),
            receiver: Address::repeat_byte(2),
            assets: u128::MAX,
            shares: 1,
            timestamp: 0,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(serde_json::from_str::<VaultEvent>(&json).unwrap(), event);
    }
}
