//! Dry-run execution.
//!
//! Signing and broadcasting a liquidation needs a keyring-enabled ledger
//! client, which is installed with `Liquidator::customize`. The default
//! executor only logs what it would have submitted.

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use super::Execute;
use crate::config::RawConfig;
use crate::shutdown::ShutdownSignal;
use crate::types::{LiquidatorError, Order};

pub struct DryRunExecute;

#[async_trait]
impl Execute for DryRunExecute {
    /// Reports the intent itself as the outcome. Intents missing a repay
    /// or reward denom are refused.
    async fn execute(
        &self,
        _signal: &ShutdownSignal,
        _config: &RawConfig,
        intent: &Order,
    ) -> Result<Order> {
        if !intent.is_actionable() {
            return Err(LiquidatorError::ExecutionRefused(intent.to_string()).into());
        }
        info!(
            target_address = %intent.address,
            repay = %intent.repay,
            reward = %intent.reward,
            "[DRY RUN] Would liquidate"
        );
        Ok(intent.clone())
    }
}
