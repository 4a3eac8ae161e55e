//! Shared types for the liquidator.
//!
//! These types form the data model passed between the sweep engine and
//! every pipeline stage. They carry no behaviour beyond validation and
//! formatting, so stages can depend on them without reaching into the
//! engine.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// Opaque account identifier on the ledger (a bech32 string in practice).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// Coin
// ---------------------------------------------------------------------------

/// An amount of a single denomination.
///
/// The default value (empty denom, zero amount) is the "no coin" marker used
/// by orders that carry nothing actionable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
}

impl Coin {
    pub fn new(denom: impl Into<String>, amount: Decimal) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }

    /// A zero-amount coin of `denom`.
    pub fn zero(denom: impl Into<String>) -> Self {
        Self::new(denom, Decimal::ZERO)
    }

    /// True for the empty marker coin (no denom).
    pub fn is_empty(&self) -> bool {
        self.denom.is_empty()
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.amount > Decimal::ZERO
    }

    /// Check the denom is well formed and the amount is non-negative.
    pub fn validate(&self) -> Result<(), LiquidatorError> {
        validate_denom(&self.denom)?;
        if self.amount.is_sign_negative() && !self.amount.is_zero() {
            return Err(LiquidatorError::NegativeAmount(self.to_string()));
        }
        Ok(())
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount.normalize(), self.denom)
    }
}

/// Denoms start with a letter and continue with 2–127 characters from
/// `[a-zA-Z0-9/:._-]`.
fn validate_denom(denom: &str) -> Result<(), LiquidatorError> {
    let invalid = || LiquidatorError::InvalidDenom(denom.to_string());

    let mut chars = denom.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return Err(invalid()),
    }
    let rest = chars.as_str();
    if rest.len() < 2 || rest.len() > 127 {
        return Err(invalid());
    }
    if !rest
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | ':' | '.' | '_' | '-'))
    {
        return Err(invalid());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Coins
// ---------------------------------------------------------------------------

/// A set of coins with unique denoms, sorted by denom. Zero amounts are
/// dropped on construction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Coin>", into = "Vec<Coin>")]
pub struct Coins(Vec<Coin>);

impl Coins {
    pub fn new(coins: impl IntoIterator<Item = Coin>) -> Result<Self, LiquidatorError> {
        let mut list: Vec<Coin> = Vec::new();
        for coin in coins {
            coin.validate()?;
            if coin.is_zero() {
                continue;
            }
            if list.iter().any(|c| c.denom == coin.denom) {
                return Err(LiquidatorError::DuplicateDenom(coin.denom));
            }
            list.push(coin);
        }
        list.sort_by(|a, b| a.denom.cmp(&b.denom));
        Ok(Self(list))
    }

    /// Find the coin of `denom`, if held.
    pub fn find(&self, denom: &str) -> Option<&Coin> {
        self.0.iter().find(|c| c.denom == denom)
    }

    pub fn amount_of(&self, denom: &str) -> Decimal {
        self.find(denom).map(|c| c.amount).unwrap_or(Decimal::ZERO)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Coin> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<Vec<Coin>> for Coins {
    type Error = LiquidatorError;

    fn try_from(coins: Vec<Coin>) -> Result<Self, Self::Error> {
        Coins::new(coins)
    }
}

impl From<Coins> for Vec<Coin> {
    fn from(coins: Coins) -> Self {
        coins.0
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|c| c.to_string()).collect();
        f.write_str(&parts.join(","))
    }
}

// ---------------------------------------------------------------------------
// Target / Order
// ---------------------------------------------------------------------------

/// A borrower over their borrow limit, with their current borrowed amounts
/// and collateral in all denominations. Collateral is expressed as the
/// equivalent value in base tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub address: Address,
    pub borrowed: Coins,
    pub collateral: Coins,
}

/// The intent to perform, or the outcome of, a liquidation.
///
/// As an intent, `repay` is the maximum amount to repay and a zero `reward`
/// amount means no caller-enforced floor (trust the ledger's oracle).
/// Reward amounts are in base tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub address: Address,
    pub repay: Coin,
    pub reward: Coin,
}

impl Order {
    /// An order naming both a repay and a reward denom.
    pub fn is_actionable(&self) -> bool {
        !self.repay.is_empty() && !self.reward.is_empty()
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} repay={} reward={}",
            self.address, self.repay, self.reward
        )
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain errors raised by the built-in stages and the ledger client.
#[derive(Debug, thiserror::Error)]
pub enum LiquidatorError {
    #[error("invalid denom: {0}")]
    InvalidDenom(String),

    #[error("negative amount: {0}")]
    NegativeAmount(String),

    #[error("duplicate denom: {0}")]
    DuplicateDenom(String),

    #[error("empty address")]
    EmptyAddress,

    #[error("refusing to execute {0}")]
    ExecutionRefused(String),

    #[error("ledger error ({endpoint}): {message}")]
    Ledger { endpoint: String, message: String },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
