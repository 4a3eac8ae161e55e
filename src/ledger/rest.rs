//! REST client for a leverage-module gateway.
//!
//! Endpoints used:
//! - `GET /umee/leverage/v1/liquidation_targets` → `{"targets": ["addr", ...]}`
//! - `GET /umee/leverage/v1/account_balances?address=..` →
//!   `{"borrowed": [{"denom", "amount"}], "collateral": [...]}`
//!
//! The gateway reports collateral already converted from uTokens to the
//! equivalent base-token amounts. Amounts are decimal strings.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{AccountBalances, LedgerClient};
use crate::types::{Address, Coin, Coins, LiquidatorError};

const TARGETS_PATH: &str = "umee/leverage/v1/liquidation_targets";
const BALANCES_PATH: &str = "umee/leverage/v1/account_balances";

/// Timeout used when the config does not set one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TargetsResponse {
    #[serde(default)]
    targets: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct BalancesResponse {
    #[serde(default)]
    borrowed: Vec<Coin>,
    #[serde(default)]
    collateral: Vec<Coin>,
}

impl BalancesResponse {
    fn into_balances(self) -> Result<AccountBalances, LiquidatorError> {
        Ok(AccountBalances {
            borrowed: Coins::new(self.borrowed)?,
            collateral: Coins::new(self.collateral)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct RestLedgerClient {
    http: Client,
    base: Url,
}

impl RestLedgerClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let base = parse_endpoint(endpoint)?;
        let http = Client::builder()
            .timeout(timeout)
            .user_agent("liquidator/0.1.0")
            .build()
            .context("Failed to build HTTP client for ledger gateway")?;

        Ok(Self { http, base })
    }

    pub fn endpoint(&self) -> &str {
        self.base.as_str()
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = self
            .base
            .join(path)
            .with_context(|| format!("Invalid ledger path {path}"))?;

        debug!(url = %url, "Querying ledger");

        let resp = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .context("Ledger request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(LiquidatorError::Ledger {
                endpoint: self.base.to_string(),
                message: format!("{status}: {body}"),
            }
            .into());
        }

        resp.json()
            .await
            .with_context(|| format!("Failed to parse ledger response from {path}"))
    }
}

/// Parse a gateway endpoint, normalising it to end with `/` so relative
/// paths join beneath it.
pub fn parse_endpoint(endpoint: &str) -> Result<Url> {
    let mut url =
        Url::parse(endpoint).with_context(|| format!("Invalid ledger endpoint {endpoint}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        anyhow::bail!("Unsupported ledger endpoint scheme: {}", url.scheme());
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[async_trait]
impl LedgerClient for RestLedgerClient {
    async fn liquidation_targets(&self) -> Result<Vec<Address>> {
        let resp: TargetsResponse = self.get_json(TARGETS_PATH, &[]).await?;
        Ok(resp.targets.into_iter().map(Address::new).collect())
    }

    async fn account_balances(&self, address: &Address) -> Result<AccountBalances> {
        let resp: BalancesResponse = self
            .get_json(BALANCES_PATH, &[("address", address.as_str())])
            .await?;
        resp.into_balances()
            .with_context(|| format!("Malformed balances for {address}"))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
