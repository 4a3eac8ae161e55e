//! Placeholder outcome estimation.
//!
//! Real estimation needs oracle exchange rates and the leverage module's
//! liquidation math, which live outside this crate. Until an estimator is
//! installed with `Liquidator::customize`, every estimate carries zero
//! amounts, so the default approval policy declines it.

use anyhow::Result;
use async_trait::async_trait;

use super::Estimate;
use crate::config::RawConfig;
use crate::shutdown::ShutdownSignal;
use crate::types::{Coin, Order};

pub struct EmptyEstimate;

#[async_trait]
impl Estimate for EmptyEstimate {
    async fn estimate(
        &self,
        _signal: &ShutdownSignal,
        _config: &RawConfig,
        intent: &Order,
    ) -> Result<Order> {
        Ok(Order {
            address: intent.address.clone(),
            repay: Coin::zero(&intent.repay.denom),
            reward: Coin::zero(&intent.reward.denom),
        })
    }
}
