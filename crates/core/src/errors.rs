//! # Error Types
//!
//! Every failure surfaced by the vault core. Errors are grouped into six
//! categories ([`ErrorKind`]); any error aborts the whole in-flight call, the
//! core never retries.

use meridian_math::MathError;
use thiserror::Error;

use crate::types::Address;

/// Failure category of a [`VaultError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Invalid parameters at creation or on a weight update
    Configuration,
    /// Caller lacks the role the operation requires
    Authorization,
    /// A quote could not be obtained for an asset
    Valuation,
    /// Out-of-domain tick, overflow or division by zero
    ArithmeticRange,
    /// Realized swap output below the required minimum
    Liquidity,
    /// Amount, balance, allowance or call-state precondition failed
    Guard,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VaultError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    #[error("Target weights sum to {sum} bps, expected 10000")]
    InvalidWeightSum { sum: u64 },

    #[error("{assets} allowed assets but {weights} weights")]
    LengthMismatch { assets: usize, weights: usize },

    #[error("Allowed asset list must hold 1..={max} assets, got {count}")]
    AssetCount { count: usize, max: usize },

    #[error("{name} of {bps} bps exceeds the cap of {cap} bps")]
    FeeAboveCap { name: &'static str, bps: u32, cap: u32 },

    #[error("Zero address for {0}")]
    ZeroAddress(&'static str),

    #[error("Numeraire {0} is not in the allowed asset list")]
    NumeraireNotAllowed(Address),

    #[error("Asset {0} appears more than once")]
    DuplicateAsset(Address),

    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    // ========================================================================
    // Authorization Errors
    // ========================================================================
    #[error("Caller {caller} is not the vault manager")]
    Unauthorized { caller: Address },

    // ========================================================================
    // Valuation Errors
    // ========================================================================
    #[error("Could not value {asset}: {source}")]
    Valuation {
        asset: Address,
        #[source]
        source: OracleError,
    },

    // ========================================================================
    // Arithmetic Errors
    // ========================================================================
    #[error("Arithmetic error: {0}")]
    Arithmetic(#[from] MathError),

    // ========================================================================
    // Liquidity Errors
    // ========================================================================
    #[error("Swap into {asset} returned {received}, minimum {minimum}")]
    SlippageExceeded {
        asset: Address,
        received: u128,
        minimum: u128,
    },

    #[error("Swap adapter failed: {0}")]
    Swap(#[from] SwapError),

    // ========================================================================
    // Guard Errors
    // ========================================================================
    #[error("Amount must be greater than zero")]
    ZeroAmount,

    #[error("Deposit of {amount} below the minimum of {minimum}")]
    BelowMinimumDeposit { amount: u128, minimum: u128 },

    #[error("Deposit would mint zero shares")]
    ZeroShares,

    #[error("Holder has {available} shares, {requested} requested")]
    InsufficientShares { available: u128, requested: u128 },

    #[error("Allowance of {available} shares, {requested} requested")]
    InsufficientAllowance { available: u128, requested: u128 },

    #[error("Asset {0} is not in the allowed asset list")]
    AssetNotAllowed(Address),

    #[error("{0:?} withdrawals are disabled for this vault")]
    WithdrawalModeDisabled(crate::config::WithdrawalMode),

    #[error("Swap deadline {deadline} passed at {now}")]
    DeadlineExpired { deadline: u64, now: u64 },

    #[error("Invalid swap instruction: {0}")]
    InvalidInstruction(String),

    #[error("Swap spent {spent} of {asset}, only {allowed} available to the caller")]
    SwapOverspend {
        asset: Address,
        spent: u128,
        allowed: u128,
    },

    #[error("Expected {expected} of {asset} to arrive, balance moved by {actual}")]
    BalanceMismatch {
        asset: Address,
        expected: u128,
        actual: u128,
    },

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Reentrant call detected")]
    Reentrancy,
}

impl VaultError {
    /// Category this error belongs to
    pub fn kind(&self) -> ErrorKind {
        match self {
            VaultError::InvalidWeightSum { .. }
            | VaultError::LengthMismatch { .. }
            | VaultError::AssetCount { .. }
            | VaultError::FeeAboveCap { .. }
            | VaultError::ZeroAddress(_)
            | VaultError::NumeraireNotAllowed(_)
            | VaultError::DuplicateAsset(_)
            | VaultError::InvalidParameter { .. } => ErrorKind::Configuration,

            VaultError::Unauthorized { .. } => ErrorKind::Authorization,

            VaultError::Valuation { .. } => ErrorKind::Valuation,

            VaultError::Arithmetic(_) => ErrorKind::ArithmeticRange,

            VaultError::SlippageExceeded { .. } | VaultError::Swap(_) => ErrorKind::Liquidity,

            VaultError::ZeroAmount
            | VaultError::BelowMinimumDeposit { .. }
            | VaultError::ZeroShares
            | VaultError::InsufficientShares { .. }
            | VaultError::InsufficientAllowance { .. }
            | VaultError::AssetNotAllowed(_)
            | VaultError::WithdrawalModeDisabled(_)
            | VaultError::DeadlineExpired { .. }
            | VaultError::InvalidInstruction(_)
            | VaultError::SwapOverspend { .. }
            | VaultError::BalanceMismatch { .. }
            | VaultError::Ledger(_)
            | VaultError::Reentrancy => ErrorKind::Guard,
        }
    }

    /// Wrap an oracle failure for `asset`. Arithmetic failures stay
    /// arithmetic so they are never mistaken for a missing price.
    pub fn valuation(asset: Address, source: OracleError) -> Self {
        match source {
            OracleError::Math(err) => VaultError::Arithmetic(err),
            source => VaultError::Valuation { asset, source },
        }
    }

    pub fn overflow() -> Self {
        VaultError::Arithmetic(MathError::Overflow)
    }
}

pub type VaultResult<T> = Result<T, VaultError>;

// ============================================================================
// Collaborator Errors
// ============================================================================

/// Failures while deriving a price from pool observations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("No pool with liquidity for the pair")]
    NoLiquidPool,

    #[error("Pool keeps {have} observations, {need} required")]
    InsufficientObservations { have: u16, need: u16 },

    #[error("Observation window must be non-zero")]
    ZeroWindow,

    #[error("Pool read failed: {0}")]
    PoolRead(String),

    #[error("Quote resolved to zero")]
    ZeroQuote,

    #[error("Math error: {0}")]
    Math(#[from] MathError),
}

pub type OracleResult<T> = Result<T, OracleError>;

/// Failures reported by a swap adapter
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SwapError {
    #[error("Deadline {deadline} passed at {now}")]
    DeadlineExpired { deadline: u64, now: u64 },

    #[error("Output {amount_out} below minimum {min_amount_out}")]
    InsufficientOutput { amount_out: u128, min_amount_out: u128 },

    #[error("Swap rejected: {0}")]
    Rejected(String),

    #[error("Ledger error during swap: {0}")]
    Ledger(#[from] LedgerError),
}

/// Failures reported by asset and ownership ledgers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Balance {available} below {requested}")]
    InsufficientBalance { available: u128, requested: u128 },

    #[error("Allowance {available} below {requested}")]
    InsufficientAllowance { available: u128, requested: u128 },

    #[error("Allowance must be reset to zero before it is changed")]
    ApprovalNotReset,

    #[error("Balance overflow")]
    Overflow,
}

/// Failures loading a configuration file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {message}")]
    Io { path: String, message: String },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(#[from] VaultError),
}

#[cfg(test)]
mod tests {
    use super::*;

    static_assertions::assert_impl_all!(VaultError: std::error::Error, Send, Sync, Clone);
    static_assertions::assert_impl_all!(ConfigError: std::error::Error, Send, Sync);

    #[test]
    fn test_oracle_math_error_stays_arithmetic() {
        let err = VaultError::valuation(Address::ZERO, OracleError::Math(MathError::MulDivOverflow));
        assert_eq!(err, VaultError::Arithmetic(MathError::MulDivOverflow));
        assert_eq!(err.kind(), ErrorKind::ArithmeticRange);
    }

    #[test]
    fn test_missing_price_is_valuation() {
        let err = VaultError::valuation(Address::ZERO, OracleError::NoLiquidPool);
        assert_eq!(err.kind(), ErrorKind::Valuation);
        assert!(err.to_string().contains("No pool with liquidity"));
    }

    #[test]
    fn test_kinds() {
        assert_eq!(VaultError::InvalidWeightSum { sum: 9_999 }.kind(), ErrorKind::Configuration);
        assert_eq!(
            VaultError::Unauthorized { caller: Address::ZERO }.kind(),
            ErrorKind::Authorization
        );
        assert_eq!(
            VaultError::Swap(SwapError::Rejected("paused".into())).kind(),
            ErrorKind::Liquidity
        );
        assert_eq!(VaultError::Reentrancy.kind(), ErrorKind::Guard);
        assert_eq!(
            VaultError::from(LedgerError::ApprovalNotReset).kind(),
            ErrorKind::Guard
        );
    }
}
