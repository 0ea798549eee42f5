//! # Meridian Simulator
//!
//! Loads a vault and market description from TOML and replays a list of
//! deposits, withdrawals, price moves and manager actions against the
//! in-memory host, collecting the state records each step emits.

pub mod runner;
pub mod scenario;

pub use runner::{Outcome, Runner, StepRecord};
pub use scenario::{Action, Scenario, Step};
