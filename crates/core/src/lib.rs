//! # Meridian Core - Fund Accounting and Rebalancing
//!
//! Host-agnostic core of an agent-managed multi-asset fund. It provides:
//!
//! - TWAP valuation of basket assets from AMM pool observations
//! - NAV, share conversion and fee accounting
//! - Deposit, mint and basket or single-asset redemption flows
//! - Deviation detection and two-phase rebalancing through a swap adapter
//!
//! Ledgers, pools and the swap venue are reached through the traits in
//! [`interfaces`]; the vault never assumes a particular chain.
//!
//! ## Feature Flags
//!
//! - `test-utils`: in-memory ledgers, pools and router ([`testing`])

pub mod accounting;
pub mod config;
pub mod errors;
pub mod events;
pub mod interfaces;
pub mod oracle;
pub mod rebalance;
pub mod types;
pub mod vault;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-export commonly used items
pub use accounting::{NavReport, ValuationMode};
pub use config::{VaultConfig, WithdrawalMode};
pub use errors::{
    ConfigError, ErrorKind, LedgerError, OracleError, SwapError, VaultError, VaultResult,
};
pub use events::VaultEvent;
pub use rebalance::{RebalancePlan, RebalanceReport};
pub use types::{Address, AssetAmount, CallContext};
pub use vault::{DepositQuote, SingleAssetRedeem, Vault};
