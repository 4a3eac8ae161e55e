//! Target discovery from the ledger.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::Discover;
use crate::config::{ConfigError, RawConfig};
use crate::ledger::rest::{self, RestLedgerClient};
use crate::ledger::LedgerClient;
use crate::shutdown::ShutdownSignal;
use crate::types::Target;

pub const KEY_LEDGER_ENDPOINT: &str = "liquidator.ledger.endpoint";
pub const KEY_LEDGER_TIMEOUT: &str = "liquidator.ledger.timeout";

/// `[liquidator.ledger]` table. `timeout` takes the same forms as
/// `liquidator.wait` and defaults to [`rest::DEFAULT_TIMEOUT`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerSettings {
    pub endpoint: String,
    pub timeout: Duration,
}

impl LedgerSettings {
    pub fn from_config(config: &RawConfig) -> Result<Self, ConfigError> {
        let endpoint = match config.get(KEY_LEDGER_ENDPOINT) {
            None => return Err(ConfigError::Missing(KEY_LEDGER_ENDPOINT.to_string())),
            Some(value) => value
                .as_str()
                .ok_or_else(|| ConfigError::invalid(KEY_LEDGER_ENDPOINT, value))?,
        };
        let timeout = if config.contains(KEY_LEDGER_TIMEOUT) {
            config.duration(KEY_LEDGER_TIMEOUT)?
        } else {
            rest::DEFAULT_TIMEOUT
        };
        Ok(Self {
            endpoint: endpoint.to_string(),
            timeout,
        })
    }
}

enum Source {
    /// A client supplied by the caller, used as is.
    Fixed(Arc<dyn LedgerClient>),
    /// A REST client built from the live config, rebuilt when the settings
    /// change or after a failed query.
    Configured(Mutex<Option<(LedgerSettings, Arc<RestLedgerClient>)>>),
}

/// Lists liquidation targets, then fetches borrowed and collateral balances
/// for each. Any failed query fails the whole discovery.
pub struct LedgerDiscover {
    source: Source,
}

impl LedgerDiscover {
    /// Build the REST client from `[liquidator.ledger]` on first use.
    pub fn from_config() -> Self {
        Self {
            source: Source::Configured(Mutex::new(None)),
        }
    }

    pub fn with_client(client: Arc<dyn LedgerClient>) -> Self {
        Self {
            source: Source::Fixed(client),
        }
    }

    async fn configured_client(
        cache: &Mutex<Option<(LedgerSettings, Arc<RestLedgerClient>)>>,
        config: &RawConfig,
    ) -> Result<Arc<RestLedgerClient>> {
        let settings = LedgerSettings::from_config(config)?;
        let mut cached = cache.lock().await;

        if let Some((current, client)) = cached.as_ref() {
            if *current == settings {
                return Ok(Arc::clone(client));
            }
        }

        let client = Arc::new(
            RestLedgerClient::new(&settings.endpoint, settings.timeout)
                .context("Failed to connect ledger client")?,
        );
        info!(endpoint = %client.endpoint(), "Ledger client connected");
        *cached = Some((settings, Arc::clone(&client)));
        Ok(client)
    }
}

async fn query_targets(
    client: &dyn LedgerClient,
    signal: &ShutdownSignal,
) -> Result<Vec<Target>> {
    let addresses = client
        .liquidation_targets()
        .await
        .context("Failed to query liquidation targets")?;
    debug!(count = addresses.len(), "Liquidation targets found");

    let mut targets = Vec::with_capacity(addresses.len());
    for address in addresses {
        if signal.is_cancelled() {
            anyhow::bail!("discovery cancelled");
        }
        let balances = client
            .account_balances(&address)
            .await
            .with_context(|| format!("Failed to query balances of {address}"))?;
        targets.push(Target {
            address,
            borrowed: balances.borrowed,
            collateral: balances.collateral,
        });
    }
    Ok(targets)
}

#[async_trait]
impl Discover for LedgerDiscover {
    async fn discover(&self, signal: &ShutdownSignal, config: &RawConfig) -> Result<Vec<Target>> {
        match &self.source {
            Source::Fixed(client) => query_targets(client.as_ref(), signal).await,
            Source::Configured(cache) => {
                let client = Self::configured_client(cache, config).await?;
                let result = query_targets(client.as_ref(), signal).await;
                if result.is_err() {
                    // reconnect on the next sweep
                    warn!(endpoint = %client.endpoint(), "Dropping ledger client after failed query");
                    *cache.lock().await = None;
                }
                result
            }
        }
    }
}

/// `[liquidator.ledger]` must name an http(s) endpoint; `timeout`, if set,
/// must parse as a duration.
pub fn validate_config(config: &RawConfig) -> Result<(), ConfigError> {
    let settings = LedgerSettings::from_config(config)?;
    if rest::parse_endpoint(&settings.endpoint).is_err() {
        return Err(ConfigError::invalid(KEY_LEDGER_ENDPOINT, &settings.endpoint));
    }
    Ok(())
}
