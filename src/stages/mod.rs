//! Pipeline stages.
//!
//! A sweep runs five stages in order: discover targets, select denoms for
//! each target, estimate the outcome, approve it, execute it. Each stage is a
//! trait so any one of them can be replaced (for testing, tuning, or a
//! different strategy) while the process keeps running.
//!
//! Built-in implementations:
//! - [`discover::LedgerDiscover`]: queries a ledger gateway
//! - [`select::PreferredDenoms`]: config-ordered denom preferences
//! - [`estimate::EmptyEstimate`]: zero-amount placeholder estimate
//! - [`approve::PositiveReward`]: approves any positive reward
//! - [`execute::DryRunExecute`]: logs instead of submitting

pub mod approve;
pub mod discover;
pub mod estimate;
pub mod execute;
pub mod select;

use anyhow::Result;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use crate::config::{self, RawConfig, ValidateFn};
use crate::shutdown::ShutdownSignal;
use crate::types::{Order, Target};

// ---------------------------------------------------------------------------
// Stage contracts
// ---------------------------------------------------------------------------

/// Lists every account currently eligible for liquidation.
#[async_trait]
pub trait Discover: Send + Sync {
    async fn discover(&self, signal: &ShutdownSignal, config: &RawConfig) -> Result<Vec<Target>>;
}

/// Turns a target into a liquidation intent by choosing repay and reward
/// denoms. `Ok(None)` means nothing on this target is worth pursuing.
///
/// The repay amount is the maximum to repay. The reward amount is a floor on
/// the reward; zero means no floor (trust the ledger's oracle).
#[async_trait]
pub trait Select: Send + Sync {
    async fn select(
        &self,
        signal: &ShutdownSignal,
        config: &RawConfig,
        target: &Target,
    ) -> Result<Option<Order>>;
}

/// Simulates the outcome of executing an intent.
#[async_trait]
pub trait Estimate: Send + Sync {
    async fn estimate(
        &self,
        signal: &ShutdownSignal,
        config: &RawConfig,
        intent: &Order,
    ) -> Result<Order>;
}

/// Policy gate on an estimated outcome.
#[async_trait]
pub trait Approve: Send + Sync {
    async fn approve(
        &self,
        signal: &ShutdownSignal,
        config: &RawConfig,
        estimate: &Order,
    ) -> Result<bool>;
}

/// Submits the intent (not the estimate) to the ledger and reports what was
/// actually repaid and rewarded.
#[async_trait]
pub trait Execute: Send + Sync {
    async fn execute(
        &self,
        signal: &ShutdownSignal,
        config: &RawConfig,
        intent: &Order,
    ) -> Result<Order>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Discover,
    Select,
    Estimate,
    Approve,
    Execute,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageKind::Discover => write!(f, "discover"),
            StageKind::Select => write!(f, "select"),
            StageKind::Estimate => write!(f, "estimate"),
            StageKind::Approve => write!(f, "approve"),
            StageKind::Execute => write!(f, "execute"),
        }
    }
}

// ---------------------------------------------------------------------------
// Stage set
// ---------------------------------------------------------------------------

/// The five stages plus the validators every config document must pass.
/// Always replaced as a whole.
#[derive(Clone)]
pub struct StageSet {
    pub discover: Arc<dyn Discover>,
    pub select: Arc<dyn Select>,
    pub estimate: Arc<dyn Estimate>,
    pub approve: Arc<dyn Approve>,
    pub execute: Arc<dyn Execute>,
    pub validators: Vec<ValidateFn>,
}

impl StageSet {
    /// Run every validator in order, stopping at the first rejection.
    pub fn validate(&self, config: &RawConfig) -> Result<(), config::ConfigError> {
        self.validators.iter().try_for_each(|v| v(config))
    }
}

impl fmt::Debug for StageSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageSet")
            .field("validators", &self.validators.len())
            .finish_non_exhaustive()
    }
}

/// A default stage and the validator for the config keys it reads.
pub struct DefaultStage<T: ?Sized> {
    pub stage: Arc<T>,
    pub validator: ValidateFn,
}

impl<T: ?Sized> Clone for DefaultStage<T> {
    fn clone(&self) -> Self {
        Self {
            stage: Arc::clone(&self.stage),
            validator: Arc::clone(&self.validator),
        }
    }
}

/// Stages installed for anything a [`Customization`] leaves out.
#[derive(Clone)]
pub struct Defaults {
    pub discover: DefaultStage<dyn Discover>,
    pub select: DefaultStage<dyn Select>,
    pub estimate: DefaultStage<dyn Estimate>,
    pub approve: DefaultStage<dyn Approve>,
    pub execute: DefaultStage<dyn Execute>,
}

impl Defaults {
    /// The built-in stages.
    pub fn standard() -> Self {
        Self {
            discover: DefaultStage {
                stage: Arc::new(discover::LedgerDiscover::from_config()),
                validator: config::validator(discover::validate_config),
            },
            select: DefaultStage {
                stage: Arc::new(select::PreferredDenoms),
                validator: config::validator(select::validate_config),
            },
            estimate: DefaultStage {
                stage: Arc::new(estimate::EmptyEstimate),
                validator: config::validator(|_| Ok(())),
            },
            approve: DefaultStage {
                stage: Arc::new(approve::PositiveReward),
                validator: config::validator(|_| Ok(())),
            },
            execute: DefaultStage {
                stage: Arc::new(execute::DryRunExecute),
                validator: config::validator(|_| Ok(())),
            },
        }
    }
}

impl Default for Defaults {
    fn default() -> Self {
        Self::standard()
    }
}

// ---------------------------------------------------------------------------
// Customization
// ---------------------------------------------------------------------------

/// A requested stage set. Stages left unset fall back to the defaults, and
/// bring the defaults' validators with them; stages that are set must come
/// with whatever validators they need via [`Customization::validator`].
#[derive(Default, Clone)]
pub struct Customization {
    discover: Option<Arc<dyn Discover>>,
    select: Option<Arc<dyn Select>>,
    estimate: Option<Arc<dyn Estimate>>,
    approve: Option<Arc<dyn Approve>>,
    execute: Option<Arc<dyn Execute>>,
    validators: Vec<ValidateFn>,
}

impl Customization {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn discover(mut self, stage: impl Discover + 'static) -> Self {
        self.discover = Some(Arc::new(stage));
        self
    }

    pub fn select(mut self, stage: impl Select + 'static) -> Self {
        self.select = Some(Arc::new(stage));
        self
    }

    pub fn estimate(mut self, stage: impl Estimate + 'static) -> Self {
        self.estimate = Some(Arc::new(stage));
        self
    }

    pub fn approve(mut self, stage: impl Approve + 'static) -> Self {
        self.approve = Some(Arc::new(stage));
        self
    }

    pub fn execute(mut self, stage: impl Execute + 'static) -> Self {
        self.execute = Some(Arc::new(stage));
        self
    }

    pub fn validator(mut self, validator: ValidateFn) -> Self {
        self.validators.push(validator);
        self
    }

    /// Fill the gaps from `defaults` and order validators: core first, then
    /// the caller's, then one per defaulted stage in pipeline order.
    pub fn resolve(self, defaults: &Defaults) -> StageSet {
        let mut validators: Vec<ValidateFn> = Vec::with_capacity(self.validators.len() + 6);
        validators.push(config::validator(config::validate_core));
        validators.extend(self.validators);

        fn pick<T: ?Sized>(
            custom: Option<Arc<T>>,
            default: &DefaultStage<T>,
            validators: &mut Vec<ValidateFn>,
        ) -> Arc<T> {
            match custom {
                Some(stage) => stage,
                None => {
                    validators.push(Arc::clone(&default.validator));
                    Arc::clone(&default.stage)
                }
            }
        }

        let discover = pick(self.discover, &defaults.discover, &mut validators);
        let select = pick(self.select, &defaults.select, &mut validators);
        let estimate = pick(self.estimate, &defaults.estimate, &mut validators);
        let approve = pick(self.approve, &defaults.approve, &mut validators);
        let execute = pick(self.execute, &defaults.execute, &mut validators);

        StageSet {
            discover,
            select,
            estimate,
            approve,
            execute,
            validators,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
