//! Default approval policy.

use anyhow::Result;
use async_trait::async_trait;

use super::Approve;
use crate::config::RawConfig;
use crate::shutdown::ShutdownSignal;
use crate::types::{LiquidatorError, Order};

/// Approves every well-formed estimate with a positive reward.
pub struct PositiveReward;

#[async_trait]
impl Approve for PositiveReward {
    async fn approve(
        &self,
        _signal: &ShutdownSignal,
        _config: &RawConfig,
        estimate: &Order,
    ) -> Result<bool> {
        if estimate.address.is_empty() {
            return Err(LiquidatorError::EmptyAddress.into());
        }
        estimate.repay.validate()?;
        estimate.reward.validate()?;
        Ok(estimate.reward.is_positive())
    }
}
