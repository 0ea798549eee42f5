//! # Price Oracle
//!
//! TWAP reads over AMM pools and the valuation chain built on them.

pub mod twap;
pub mod valuation;

pub use twap::{
    consult, ensure_observations, mean_tick, quote_at_tick, select_most_liquid, select_pool,
    ConsultOutcome, FeeSelection,
};
pub use valuation::{TwapOracle, ValuationStrategy};
