//! A single liquidation sweep.
//!
//! Discovers every target once, then walks them in discovery order through
//! select → estimate → approve → execute. A failure in any per-target stage
//! is logged with that target's context and the sweep moves on; only a
//! failed discovery ends the pass early.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error, info, info_span, Instrument};
use uuid::Uuid;

use crate::config::ConfigSnapshot;
use crate::shutdown::ShutdownSignal;
use crate::stages::{StageKind, StageSet};
use crate::types::{Address, Order};

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// A stage call that returned an error.
#[derive(Debug, Clone)]
pub struct StageFailure {
    pub stage: StageKind,
    /// `None` for discovery failures.
    pub address: Option<Address>,
    pub error: String,
}

/// What happened during one sweep.
#[derive(Debug, Clone)]
pub struct SweepReport {
    pub sweep_id: Uuid,
    pub started_at: DateTime<Utc>,
    /// Version of the snapshot the sweep ran with; `None` if unconfigured.
    pub config_version: Option<u64>,
    pub targets_found: usize,
    pub targets_processed: usize,
    pub selected: usize,
    pub approved: usize,
    /// Outcomes of successful executions, in discovery order.
    pub executed: Vec<Order>,
    pub failures: Vec<StageFailure>,
    /// The sweep stopped early because shutdown was requested.
    pub cancelled: bool,
}

impl SweepReport {
    fn new() -> Self {
        Self {
            sweep_id: Uuid::new_v4(),
            started_at: Utc::now(),
            config_version: None,
            targets_found: 0,
            targets_processed: 0,
            selected: 0,
            approved: 0,
            executed: Vec::new(),
            failures: Vec::new(),
            cancelled: false,
        }
    }

    /// True when the sweep did nothing because no configuration was live.
    pub fn skipped(&self) -> bool {
        self.config_version.is_none()
    }

    fn fail(&mut self, stage: StageKind, address: Option<&Address>, err: &anyhow::Error) {
        self.failures.push(StageFailure {
            stage,
            address: address.cloned(),
            error: format!("{err:#}"),
        });
    }
}

// ---------------------------------------------------------------------------
// Sweep
// ---------------------------------------------------------------------------

/// Run one pass with the given snapshot and stage set. The caller holds the
/// engine lock for the duration.
pub(crate) async fn run(
    signal: &ShutdownSignal,
    snapshot: Option<Arc<ConfigSnapshot>>,
    stages: Arc<StageSet>,
) -> SweepReport {
    let mut report = SweepReport::new();
    let span = info_span!("sweep", sweep_id = %report.sweep_id);

    async {
        let Some(snapshot) = snapshot else {
            info!("Empty configuration, skipping tick");
            return;
        };
        report.config_version = Some(snapshot.version);
        let config = snapshot.config();

        if signal.is_cancelled() {
            report.cancelled = true;
            return;
        }

        let targets = match stages.discover.discover(signal, config).await {
            Ok(targets) => targets,
            Err(e) => {
                if signal.is_cancelled() {
                    debug!(error = %e, "Discovery interrupted by shutdown");
                    report.cancelled = true;
                } else {
                    error!(error = %format!("{e:#}"), "Discover stage failed");
                    report.fail(StageKind::Discover, None, &e);
                }
                return;
            }
        };
        report.targets_found = targets.len();
        debug!(count = targets.len(), "Targets discovered");

        for target in &targets {
            if signal.is_cancelled() {
                info!(
                    remaining = targets.len() - report.targets_processed,
                    "Shutdown requested, ending sweep early"
                );
                report.cancelled = true;
                return;
            }
            report.targets_processed += 1;

            // choose one repay and one reward denom
            let intent = match stages.select.select(signal, config, target).await {
                Ok(Some(intent)) => intent,
                Ok(None) => continue,
                Err(e) => {
                    error!(
                        error = %format!("{e:#}"),
                        target_address = %target.address,
                        target_borrowed = %target.borrowed,
                        target_collateral = %target.collateral,
                        "Select stage failed"
                    );
                    report.fail(StageKind::Select, Some(&target.address), &e);
                    continue;
                }
            };
            report.selected += 1;

            let estimate = match stages.estimate.estimate(signal, config, &intent).await {
                Ok(estimate) => estimate,
                Err(e) => {
                    error!(
                        error = %format!("{e:#}"),
                        target_address = %intent.address,
                        intended_repay = %intent.repay,
                        intended_reward = %intent.reward,
                        "Estimate stage failed"
                    );
                    report.fail(StageKind::Estimate, Some(&intent.address), &e);
                    continue;
                }
            };

            match stages.approve.approve(signal, config, &estimate).await {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    error!(
                        error = %format!("{e:#}"),
                        target_address = %estimate.address,
                        estimated_repay = %estimate.repay,
                        estimated_reward = %estimate.reward,
                        "Approve stage failed"
                    );
                    report.fail(StageKind::Approve, Some(&estimate.address), &e);
                    continue;
                }
            }
            report.approved += 1;

            // execute the intent, not the (possibly smaller) estimate
            match stages.execute.execute(signal, config, &intent).await {
                Ok(outcome) => {
                    info!(
                        target_address = %outcome.address,
                        repaid = %outcome.repay,
                        reward = %outcome.reward,
                        "Liquidation success"
                    );
                    report.executed.push(outcome);
                }
                Err(e) => {
                    error!(
                        error = %format!("{e:#}"),
                        target_address = %intent.address,
                        intended_repay = %intent.repay,
                        intended_reward = %intent.reward,
                        "Execute stage failed"
                    );
                    report.fail(StageKind::Execute, Some(&intent.address), &e);
                }
            }
        }
    }
    .instrument(span.clone())
    .await;

    span.in_scope(|| {
        debug!(
            targets = report.targets_found,
            processed = report.targets_processed,
            selected = report.selected,
            approved = report.approved,
            executed = report.executed.len(),
            failed = report.failures.len(),
            cancelled = report.cancelled,
            "Sweep complete"
        );
    });
    report
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
