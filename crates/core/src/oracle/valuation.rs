//! # Valuation Chain
//!
//! Values assets in the numeraire by trying an ordered list of strategies:
//! identity for the numeraire itself, then each configured fee tier. The first
//! nonzero quote wins. Arithmetic failures stop the chain immediately.

use tracing::debug;

use crate::config::OracleConfig;
use crate::errors::{OracleError, OracleResult};
use crate::interfaces::PoolDirectory;
use crate::oracle::twap::{consult, ensure_observations, quote_at_tick, select_pool, FeeSelection};
use crate::types::Address;

/// One way of pricing an asset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValuationStrategy {
    /// The numeraire is worth its balance
    Identity,
    /// TWAP of the pool at this fee tier
    FeeTier(u32),
}

/// TWAP oracle over a pool directory, denominated in one numeraire
#[derive(Debug, Clone)]
pub struct TwapOracle<P> {
    pools: P,
    numeraire: Address,
    config: OracleConfig,
}

impl<P: PoolDirectory> TwapOracle<P> {
    pub fn new(pools: P, numeraire: Address, config: OracleConfig) -> Self {
        Self {
            pools,
            numeraire,
            config,
        }
    }

    pub fn pools(&self) -> &P {
        &self.pools
    }

    pub fn pools_mut(&mut self) -> &mut P {
        &mut self.pools
    }

    pub fn numeraire(&self) -> Address {
        self.numeraire
    }

    pub fn config(&self) -> &OracleConfig {
        &self.config
    }

    /// Strategies tried, in order, to price `asset`
    pub fn strategies(&self, asset: &Address) -> Vec<ValuationStrategy> {
        if *asset == self.numeraire {
            return vec![ValuationStrategy::Identity];
        }
        self.config
            .fee_tiers
            .iter()
            .map(|tier| ValuationStrategy::FeeTier(*tier))
            .collect()
    }

    /// Quote `amount` of `base` in `quote` over `window` seconds
    pub fn quote(
        &self,
        base: &Address,
        quote: &Address,
        amount: u128,
        selection: FeeSelection,
        window: u32,
    ) -> OracleResult<u128> {
        if base == quote {
            return Ok(amount);
        }
        let (_, pool) = select_pool(&self.pools, base, quote, selection, &self.config.fee_tiers)?;
        ensure_observations(pool, self.config.min_cardinality)?;
        let outcome = consult(pool, window)?;
        quote_at_tick(outcome.arithmetic_mean_tick, amount, base, quote)
    }

    /// Numeraire value of `amount` of `asset`
    pub fn value_in_numeraire(&self, asset: &Address, amount: u128) -> OracleResult<u128> {
        let numeraire = self.numeraire;
        self.run_chain(asset, amount, |tier| {
            self.quote(asset, &numeraire, amount, FeeSelection::Tier(tier), self.config.window_secs)
        })
    }

    /// Amount of `asset` worth `value` numeraire units
    pub fn amount_for_value(&self, asset: &Address, value: u128) -> OracleResult<u128> {
        let numeraire = self.numeraire;
        self.run_chain(asset, value, |tier| {
            self.quote(&numeraire, asset, value, FeeSelection::Tier(tier), self.config.window_secs)
        })
    }

    fn run_chain(
        &self,
        asset: &Address,
        amount: u128,
        attempt: impl Fn(u32) -> OracleResult<u128>,
    ) -> OracleResult<u128> {
        if amount == 0 {
            return Ok(0);
        }

        let mut last_error = OracleError::NoLiquidPool;
        for strategy in self.strategies(asset) {
            let tier = match strategy {
                ValuationStrategy::Identity => return Ok(amount),
                ValuationStrategy::FeeTier(tier) => tier,
            };
            match attempt(tier) {
                Ok(0) => last_error = OracleError::ZeroQuote,
                Ok(quote) => return Ok(quote),
                Err(err @ OracleError::Math(_)) => return Err(err),
                Err(err) => {
                    debug!(%asset, tier, error = %err, "valuation attempt failed");
                    last_error = err;
                }
            }
        }
        Err(last_error)
    }
}
