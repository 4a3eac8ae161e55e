//! Liquidator: scheduled liquidation sweeps for leverage-module ledgers.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod engine;
pub mod ledger;
pub mod shutdown;
pub mod stages;
pub mod types;
