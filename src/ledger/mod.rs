//! Ledger queries.
//!
//! Defines the `LedgerClient` trait used by the default discovery stage and
//! a REST implementation against a leverage-module gateway.

pub mod rest;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::{Address, Coins};

/// Borrowed and collateral positions of one account. Collateral is already
/// expressed in base-token value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountBalances {
    pub borrowed: Coins,
    pub collateral: Coins,
}

/// Read-only access to the ledger's leverage module.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Addresses currently over their borrow limit.
    async fn liquidation_targets(&self) -> Result<Vec<Address>>;

    /// Current borrowed and collateral amounts for `address`.
    async fn account_balances(&self, address: &Address) -> Result<AccountBalances>;
}
