//! # Accounting
//!
//! NAV, share conversion and fee math. Everything here is pure apart from
//! the oracle reads NAV needs.

pub mod fees;
pub mod nav;
pub mod shares;

pub use fees::{
    accrue_aum_fee, aum_fee_value, AumAccrual, bps_of, gross_up, split_fee, FeeSplit,
    SECONDS_PER_YEAR,
};
pub use nav::{compute_nav, AssetValuation, NavReport, ValuationMode};
pub use shares::{
    convert_to_assets, convert_to_shares, pro_rata, share_price, Rounding, PRICE_SCALE,
    VIRTUAL_ASSETS, VIRTUAL_SHARES,
};
