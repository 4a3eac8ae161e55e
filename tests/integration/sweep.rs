//! End-to-end sweeps through `Liquidator::sweep` with recording stages.

use rust_decimal_macros::dec;
use std::sync::{Arc, Mutex};

use liquidator::engine::{Liquidator, SweepReport};
use liquidator::shutdown::ShutdownSignal;
use liquidator::stages::{Customization, StageKind};
use liquidator::types::{Address, Coin, Order, Target};

use crate::mock_stages::*;

type Intents = Arc<Mutex<Vec<Order>>>;

/// Every stage mocked; approve refuses addr4.
fn full_pipeline(steps: &Steps, targets: Vec<Target>) -> (Customization, Intents) {
    let execute = MockExecute::new(steps.clone());
    let intents = Arc::clone(&execute.intents);
    let customization = Customization::new()
        .discover(MockDiscover {
            steps: steps.clone(),
            label: "custom",
            targets,
        })
        .select(MockSelect {
            steps: steps.clone(),
            fail_for: Vec::new(),
        })
        .estimate(MockEstimate::new(steps.clone()))
        .approve(MockApprove {
            refuse: vec![Address::from("addr4")],
            ..MockApprove::new(steps.clone())
        })
        .execute(execute);
    (customization, intents)
}

#[tokio::test]
async fn test_sweep_runs_stages_in_order() {
    let steps = Steps::new();
    let liq = Liquidator::default();
    let (customization, intents) = full_pipeline(&steps, standard_targets());
    liq.customize(customization).await;
    liq.reconfigure(config("1s")).await.unwrap();

    let report = liq.sweep(&ShutdownSignal::never()).await;

    assert_eq!(
        steps.take(),
        vec![
            // queries for targets once, receives addrs 0-5
            "custom query targets".to_string(),
            // no borrow / collateral denoms
            "select from addr0".to_string(),
            // good borrow / collateral denoms
            "select from addr1".to_string(),
            format!("estimate addr1 {UMEE} {ATOM}"),
            "approve addr1".to_string(),
            "liquidate addr1".to_string(),
            // borrowed denoms are not in the repay list
            "select from addr2".to_string(),
            // several denoms on each side, preference order decides
            "select from addr3".to_string(),
            format!("estimate addr3 {UMEE} {UMEE}"),
            "approve addr3".to_string(),
            "liquidate addr3".to_string(),
            // approve refuses addr4
            "select from addr4".to_string(),
            format!("estimate addr4 {UMEE} {ATOM}"),
            "approve addr4".to_string(),
            "select from addr5".to_string(),
        ]
    );

    assert_eq!(report.targets_found, 6);
    assert_eq!(report.targets_processed, 6);
    assert_eq!(report.selected, 3);
    assert_eq!(report.approved, 2);
    assert_eq!(report.executed.len(), 2);
    assert!(report.failures.is_empty());
    assert!(!report.cancelled);

    // execute receives the intent, not the estimate
    let intents = intents.lock().unwrap().clone();
    assert_eq!(intents.len(), 2);
    assert_eq!(intents[0].repay, Coin::new(UMEE, dec!(10000)));
    assert_eq!(intents[0].reward, Coin::zero(ATOM));
    assert_eq!(intents[1].repay, Coin::new(UMEE, dec!(5)));
    assert_eq!(intents[1].reward, Coin::zero(UMEE));
}

#[tokio::test]
async fn test_single_target_is_liquidated() {
    let steps = Steps::new();
    let liq = Liquidator::default();
    let target = target("addr1", &[(UMEE, dec!(10000))], &[(ATOM, dec!(200))]);
    let (customization, intents) = full_pipeline(&steps, vec![target]);
    liq.customize(customization).await;
    liq.reconfigure(config("1s")).await.unwrap();

    let report = liq.sweep(&ShutdownSignal::never()).await;
    assert_eq!(steps.count("liquidate addr1"), 1);
    assert_eq!(report.executed.len(), 1);
    assert_eq!(report.executed[0].repay, Coin::new(UMEE, dec!(10000)));

    let intents = intents.lock().unwrap().clone();
    assert_eq!(intents[0].reward, Coin::zero(ATOM));
}

#[tokio::test]
async fn test_unmatched_repay_denom_stops_at_select() {
    let steps = Steps::new();
    let liq = Liquidator::default();
    let target = target("addr1", &[(ATOM, dec!(5))], &[(ATOM, dec!(5)), (UMEE, dec!(5))]);
    let (customization, _) = full_pipeline(&steps, vec![target]);
    liq.customize(customization).await;
    liq.reconfigure(config("1s")).await.unwrap();

    let report = liq.sweep(&ShutdownSignal::never()).await;
    assert_eq!(
        steps.take(),
        vec!["custom query targets".to_string(), "select from addr1".to_string()]
    );
    assert_eq!(report.selected, 0);
    assert!(report.failures.is_empty());
}

#[tokio::test]
async fn test_failing_target_does_not_stop_sweep() {
    let steps = Steps::new();
    let liq = Liquidator::default();

    let targets = vec![
        target("addr1", &[(UMEE, dec!(1))], &[(ATOM, dec!(1))]),
        target("addr2", &[(UMEE, dec!(2))], &[(ATOM, dec!(2))]),
        target("addr3", &[(UMEE, dec!(3))], &[(ATOM, dec!(3))]),
    ];
    let execute = MockExecute::new(steps.clone());
    let intents = execute.intents.clone();
    liq.customize(
        Customization::new()
            .discover(MockDiscover {
                steps: steps.clone(),
                label: "custom",
                targets,
            })
            .select(MockSelect {
                steps: steps.clone(),
                fail_for: vec![Address::from("addr2")],
            })
            .estimate(MockEstimate::new(steps.clone()))
            .approve(MockApprove::new(steps.clone()))
            .execute(execute),
    )
    .await;
    liq.reconfigure(config("1s")).await.unwrap();

    let report = liq.sweep(&ShutdownSignal::never()).await;

    assert_eq!(report.targets_processed, 3);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].stage, StageKind::Select);
    assert_eq!(report.failures[0].address, Some(Address::from("addr2")));

    let executed: Vec<Address> = intents.lock().unwrap().iter().map(|o| o.address.clone()).collect();
    assert_eq!(executed, vec![Address::from("addr1"), Address::from("addr3")]);
    assert_eq!(steps.count("select from addr3"), 1);
}

#[tokio::test]
async fn test_unconfigured_sweep_calls_no_stages() {
    let steps = Steps::new();
    let liq = Liquidator::default();

    let (customization, _) = full_pipeline(&steps, standard_targets());
    liq.customize(customization).await;

    let report = liq.sweep(&ShutdownSignal::never()).await;
    assert!(report.skipped());
    assert_eq!(steps.len(), 0);
}

/// Four targets, each fully liquidatable; the stage under test fails on addr2.
async fn sweep_with_failure_at(stage: StageKind) -> (SweepReport, Vec<Address>) {
    let steps = Steps::new();
    let liq = Liquidator::default();
    let failing = vec![Address::from("addr2")];

    let targets = (1..=4)
        .map(|i| target(&format!("addr{i}"), &[(UMEE, dec!(100))], &[(ATOM, dec!(100))]))
        .collect();

    let mut estimate = MockEstimate::new(steps.clone());
    let mut approve = MockApprove::new(steps.clone());
    let mut execute = MockExecute::new(steps.clone());
    match stage {
        StageKind::Estimate => estimate.fail_for = failing,
        StageKind::Approve => approve.fail_for = failing,
        StageKind::Execute => execute.fail_for = failing,
        other => panic!("no failure knob for {other}"),
    }
    let intents = Arc::clone(&execute.intents);

    liq.customize(
        Customization::new()
            .discover(MockDiscover {
                steps: steps.clone(),
                label: "custom",
                targets,
            })
            .select(MockSelect {
                steps: steps.clone(),
                fail_for: Vec::new(),
            })
            .estimate(estimate)
            .approve(approve)
            .execute(execute),
    )
    .await;
    liq.reconfigure(config("1s")).await.unwrap();

    let report = liq.sweep(&ShutdownSignal::never()).await;
    let executed = intents.lock().unwrap().iter().map(|o| o.address.clone()).collect();
    (report, executed)
}

#[tokio::test]
async fn test_late_stage_failures_are_isolated() {
    for stage in [StageKind::Estimate, StageKind::Approve, StageKind::Execute] {
        let (report, executed) = sweep_with_failure_at(stage).await;

        assert_eq!(report.targets_processed, 4, "{stage}");
        assert_eq!(report.failures.len(), 1, "{stage}");
        assert_eq!(report.failures[0].stage, stage);
        assert_eq!(report.failures[0].address, Some(Address::from("addr2")));
        assert!(report.failures[0].error.contains("addr2"), "{stage}");

        assert_eq!(
            executed,
            vec![Address::from("addr1"), Address::from("addr3"), Address::from("addr4")],
            "{stage}"
        );
        assert_eq!(report.executed.len(), 3, "{stage}");
    }
}
