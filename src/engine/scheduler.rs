//! Periodic sweep scheduling.
//!
//! One task waits on "next tick, period change, or shutdown" and runs a
//! sweep per tick. Sweeps go through [`Liquidator::sweep`], which takes the
//! engine lock, so ticks that elapse during a long sweep never start a
//! second one; missed ticks are skipped rather than bursted.

use anyhow::{Context, Result};
use std::time::Duration;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::Liquidator;
use crate::shutdown::ShutdownSignal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Waiting for the next tick (also the state before `start`).
    Idle,
    /// A sweep is in progress.
    Running,
    /// Shutdown observed; no further sweeps will start.
    Stopped,
}

/// First tick one full period from now, like a freshly reset ticker.
fn ticker(period: Duration) -> Result<Interval> {
    let start = Instant::now()
        .checked_add(period)
        .with_context(|| format!("sweep period {period:?} is out of range"))?;
    let mut ticker = interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    Ok(ticker)
}

pub(super) async fn run(liq: &Liquidator, signal: ShutdownSignal) -> Result<()> {
    let result = tick_loop(liq, signal).await;
    liq.scheduler.send_replace(SchedulerState::Stopped);
    match &result {
        Ok(()) => info!("Scheduler stopped"),
        Err(e) => error!(error = %format!("{e:#}"), "Scheduler failed"),
    }
    result
}

async fn tick_loop(liq: &Liquidator, signal: ShutdownSignal) -> Result<()> {
    let mut period_rx = liq.period.subscribe();
    let mut period = *period_rx.borrow_and_update();
    let mut ticks = ticker(period)?;

    liq.scheduler.send_replace(SchedulerState::Idle);
    info!(period = ?period, "Scheduler started");

    loop {
        tokio::select! {
            biased;

            _ = signal.cancelled() => return Ok(()),

            changed = period_rx.changed() => {
                if changed.is_err() {
                    anyhow::bail!("sweep period channel closed");
                }
                // takes effect from the next tick
                period = *period_rx.borrow_and_update();
                ticks = ticker(period)?;
                debug!(period = ?period, "Scheduler period reset");
            }

            _ = ticks.tick() => {
                if signal.is_cancelled() {
                    return Ok(());
                }
                liq.scheduler.send_replace(SchedulerState::Running);
                let report = liq.sweep(&signal).await;
                liq.scheduler.send_replace(SchedulerState::Idle);

                if !report.failures.is_empty() {
                    warn!(
                        sweep_id = %report.sweep_id,
                        failed = report.failures.len(),
                        executed = report.executed.len(),
                        "Sweep finished with stage failures"
                    );
                }
            }
        }
    }
}
