//! Denomination selection by configured preference order.

use anyhow::Result;
use async_trait::async_trait;

use super::Select;
use crate::config::{ConfigError, RawConfig};
use crate::shutdown::ShutdownSignal;
use crate::types::{Coin, Order, Target};

pub const KEY_REPAY_DENOMS: &str = "liquidator.select.repay_denoms";
pub const KEY_REWARD_DENOMS: &str = "liquidator.select.reward_denoms";

/// Picks the first repay denom from `repay_denoms` that the target has
/// borrowed, and the first reward denom from `reward_denoms` that the target
/// holds as collateral.
///
/// The repay amount is the full borrowed amount, so execution never tries to
/// repay more than the debt. The reward amount is zero: no minimum
/// reward:repay ratio is enforced and the ledger's oracle prices are trusted.
pub struct PreferredDenoms;

#[async_trait]
impl Select for PreferredDenoms {
    async fn select(
        &self,
        _signal: &ShutdownSignal,
        config: &RawConfig,
        target: &Target,
    ) -> Result<Option<Order>> {
        let repay = config
            .strings(KEY_REPAY_DENOMS)
            .iter()
            .find_map(|denom| target.borrowed.find(denom).cloned());

        let reward = config
            .strings(KEY_REWARD_DENOMS)
            .iter()
            .find_map(|denom| target.collateral.find(denom).map(|c| Coin::zero(&c.denom)));

        match (repay, reward) {
            (Some(repay), Some(reward)) => Ok(Some(Order {
                address: target.address.clone(),
                repay,
                reward,
            })),
            _ => Ok(None),
        }
    }
}

/// Both preference lists must be present and non-empty.
pub fn validate_config(config: &RawConfig) -> Result<(), ConfigError> {
    for key in [KEY_REPAY_DENOMS, KEY_REWARD_DENOMS] {
        if config.strings(key).is_empty() {
            let value = config.get(key).map(|v| v.to_string()).unwrap_or_default();
            return Err(ConfigError::invalid(key, value));
        }
    }
    Ok(())
}
