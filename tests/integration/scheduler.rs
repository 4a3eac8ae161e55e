//! Scheduler behaviour under paused time.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use liquidator::engine::{Liquidator, SchedulerState};
use liquidator::shutdown::Shutdown;
use liquidator::stages::Customization;
use rust_decimal_macros::dec;

use crate::mock_stages::*;

fn blocking_pipeline(steps: &Steps, gate: Arc<Notify>) -> Customization {
    Customization::new()
        .discover(MockDiscover {
            steps: steps.clone(),
            label: "custom",
            targets: vec![target("addr1", &[(UMEE, dec!(10))], &[(ATOM, dec!(10))])],
        })
        .select(MockSelect {
            steps: steps.clone(),
            fail_for: Vec::new(),
        })
        .estimate(MockEstimate::new(steps.clone()))
        .approve(MockApprove::new(steps.clone()))
        .execute(MockExecute {
            gate: Some(gate),
            ..MockExecute::new(steps.clone())
        })
}

#[tokio::test(start_paused = true)]
async fn test_sweeps_never_overlap() {
    let steps = Steps::new();
    let gate = Arc::new(Notify::new());
    let liq = Arc::new(Liquidator::default());
    liq.customize(blocking_pipeline(&steps, Arc::clone(&gate))).await;
    liq.reconfigure(config("1s")).await.unwrap();

    let shutdown = Shutdown::new();
    let handle = tokio::spawn({
        let liq = Arc::clone(&liq);
        let signal = shutdown.signal();
        async move { liq.start(signal).await }
    });

    liq.wait_for_state(SchedulerState::Running).await;

    // Many periods pass while execute is blocked.
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(steps.count("custom query targets"), 1);
    assert_eq!(liq.scheduler_state(), SchedulerState::Running);

    // Reconfiguration waits for the running sweep.
    let reconfigure = tokio::spawn({
        let liq = Arc::clone(&liq);
        async move { liq.reconfigure(config("3s")).await }
    });
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(!reconfigure.is_finished());
    assert_eq!(liq.period(), Duration::from_secs(1));

    gate.notify_one();
    reconfigure.await.unwrap().unwrap();
    assert_eq!(liq.period(), Duration::from_secs(3));

    // a later sweep may already be parked in execute
    shutdown.trigger();
    gate.notify_one();
    handle.await.unwrap().unwrap();
    assert_eq!(liq.scheduler_state(), SchedulerState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_unconfigured_ticks_call_no_stages() {
    let steps = Steps::new();
    let liq = Arc::new(Liquidator::default());
    liq.customize(blocking_pipeline(&steps, Arc::new(Notify::new()))).await;

    let shutdown = Shutdown::new();
    let handle = tokio::spawn({
        let liq = Arc::clone(&liq);
        let signal = shutdown.signal();
        async move { liq.start(signal).await }
    });

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(steps.len(), 0);

    shutdown.trigger();
    handle.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_during_sweep_finishes_current_target() {
    let steps = Steps::new();
    let gate = Arc::new(Notify::new());
    let liq = Arc::new(Liquidator::default());
    liq.customize(blocking_pipeline(&steps, Arc::clone(&gate))).await;
    liq.reconfigure(config("1s")).await.unwrap();

    let shutdown = Shutdown::new();
    let handle = tokio::spawn({
        let liq = Arc::clone(&liq);
        let signal = shutdown.signal();
        async move { liq.start(signal).await }
    });

    liq.wait_for_state(SchedulerState::Running).await;
    shutdown.trigger();
    gate.notify_one();

    handle.await.unwrap().unwrap();
    assert_eq!(steps.count("liquidate addr1"), 1);
    assert_eq!(steps.count("custom query targets"), 1);
    assert_eq!(liq.scheduler_state(), SchedulerState::Stopped);
}
