//! Integration scenarios driving the Watcher tick-by-tick against a
//! `TestGateway`, covering concrete decision-table scenarios end to end
//! rather than rule-by-rule.

use std::sync::Arc;

use apf_master::aggregator::Aggregator;
use apf_master::executor::{Executor, ScriptPaths};
use apf_master::gateway::{KeywordGateway, TestGateway};
use apf_master::phase_store::PhaseStore;
use apf_master::scheduler::{NullScheduler, Scheduler};
use apf_master::watcher::{Watcher, WatcherOutcome};
use apf_types::{KeywordName, WindshieldPolicy};
use tokio_util::sync::CancellationToken;

/// A closed, calm, permission-granted baseline. Individual scenarios
/// override whichever keywords they need to drive a specific rule.
async fn calm_baseline(gateway: &TestGateway) {
    gateway.set(KeywordName::OpenPermission, true).await;
    gateway.set(KeywordName::MovePermission, true).await;
    gateway.set(KeywordName::AvgWindSpeed, 5.0).await;
    gateway.set(KeywordName::DewStatus, false).await;
    gateway.set(KeywordName::WhatsOpen, "").await;
    gateway.set(KeywordName::ScriptobsPid, 0i64).await;
    gateway.set(KeywordName::DeadmanSeconds, 300.0).await;
}

async fn wired_aggregator(gateway: Arc<TestGateway>) -> Arc<Aggregator> {
    let aggregator = Arc::new(Aggregator::new(gateway));
    aggregator.start().await;
    aggregator
}

fn phase_store() -> (tempfile::TempDir, Arc<PhaseStore>) {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(PhaseStore::new(dir.path().join("phase_store.json")));
    (dir, store)
}

/// `ScriptPaths` rooted in a scratch directory so `Executor::update_last_obs`
/// and friends never touch a real working-directory file during a test run.
fn scratch_script_paths(dir: &std::path::Path) -> ScriptPaths {
    let mut scripts = ScriptPaths::default();
    scripts.last_obs_file = dir.join("lastObs.txt");
    scripts.hit_list = dir.join("hit_list");
    scripts.apf_sched_file = dir.join("apf_sched.txt");
    scripts
}

fn watcher(
    gateway: Arc<TestGateway>,
    aggregator: Arc<Aggregator>,
    phase_store: Arc<PhaseStore>,
    fixed_list: Option<std::path::PathBuf>,
    scripts: ScriptPaths,
) -> Watcher {
    let executor = Arc::new(Executor::new(gateway.clone(), scripts, true));
    let scheduler: Arc<dyn Scheduler> = Arc::new(NullScheduler);
    let gateway: Arc<dyn KeywordGateway> = gateway;
    Watcher::new(
        gateway,
        aggregator,
        executor,
        phase_store,
        scheduler,
        WindshieldPolicy::Auto,
        fixed_list,
        CancellationToken::new(),
    )
    // Pin the wall clock off 09:00 so the deadline guard never preempts a
    // scenario by accident; each test below runs well inside a single tick.
    .with_wall_clock_hour_override(2)
}

#[tokio::test]
async fn s1_sunset_opens_dome_and_keeps_watching() {
    let gateway = Arc::new(TestGateway::new());
    calm_baseline(&gateway).await;
    gateway.set(KeywordName::SunElevation, -5.0).await; // inside the -8..-3.2 sunset window

    let aggregator = wired_aggregator(gateway.clone()).await;
    let (_dir, store) = phase_store();
    let scratch = tempfile::tempdir().unwrap();
    let mut w = watcher(gateway, aggregator, store, None, scratch_script_paths(scratch.path()));

    let outcome = w.tick().await;
    assert!(outcome.is_none(), "a successful sunset open should not hand off or abort");
}

#[tokio::test]
async fn s2_weather_closure_triggers_close_without_fatal_exit() {
    let gateway = Arc::new(TestGateway::new());
    calm_baseline(&gateway).await;
    gateway.set(KeywordName::SunElevation, -20.0).await;
    gateway.set(KeywordName::WhatsOpen, "DomeShutter").await; // already open
    gateway.set(KeywordName::AvgWindSpeed, 45.0).await; // forces open_ok false

    let aggregator = wired_aggregator(gateway.clone()).await;
    assert!(!aggregator.snapshot().open_ok);
    assert!(aggregator.snapshot().is_open());

    let (_dir, store) = phase_store();
    let scratch = tempfile::tempdir().unwrap();
    let mut w = watcher(gateway, aggregator, store, None, scratch_script_paths(scratch.path()));

    let outcome = w.tick().await;
    assert!(outcome.is_none(), "a weather close in test mode succeeds and does not abort the run");
}

#[tokio::test]
async fn s3_sunrise_hands_off_to_cal_post_once_rising_is_detected() {
    let gateway = Arc::new(TestGateway::new());
    calm_baseline(&gateway).await;
    gateway.set(KeywordName::WhatsOpen, "DomeShutter").await;
    gateway.set(KeywordName::SunElevation, -9.5).await; // still below threshold

    let aggregator = wired_aggregator(gateway.clone()).await;
    let (_dir, store) = phase_store();
    let scratch = tempfile::tempdir().unwrap();
    let mut w = watcher(gateway.clone(), aggregator, store, None, scratch_script_paths(scratch.path()));

    // First tick only establishes the baseline sun elevation; nothing fires.
    assert!(w.tick().await.is_none());

    // Sun climbs back above the rising threshold: sunrise detected.
    gateway.set(KeywordName::SunElevation, -8.0).await;
    let outcome = w.tick().await;
    assert_eq!(outcome, Some(WatcherOutcome::HandoffToCalPost("sunrise".to_string())));
}

#[tokio::test]
async fn s4_fixed_list_exhaustion_hands_off_to_cal_post() {
    let dir = tempfile::tempdir().unwrap();
    let fixed_list = dir.path().join("fixed.txt");
    std::fs::write(&fixed_list, "HD1\nHD2\n").unwrap();

    let gateway = Arc::new(TestGateway::new());
    calm_baseline(&gateway).await;
    gateway.set(KeywordName::WhatsOpen, "DomeShutter").await;
    gateway.set(KeywordName::SunElevation, -20.0).await; // well past the observe threshold

    let aggregator = wired_aggregator(gateway.clone()).await;
    let (_store_dir, store) = phase_store();
    store.set_lines_done(2).unwrap(); // both lines already observed

    let mut w = watcher(gateway, aggregator, store, Some(fixed_list), scratch_script_paths(dir.path()))
        .with_too_path(dir.path().join("TOO.txt")); // deliberately absent

    let outcome = w.tick().await;
    assert_eq!(outcome, Some(WatcherOutcome::HandoffToCalPost("fixed list is finished".to_string())));
}

#[tokio::test]
async fn s5_too_target_preempts_an_exhausted_fixed_list() {
    let dir = tempfile::tempdir().unwrap();
    let fixed_list = dir.path().join("fixed.txt");
    std::fs::write(&fixed_list, "HD1\n").unwrap();
    let too_path = dir.path().join("TOO.txt");
    std::fs::write(&too_path, "HD999 target-of-opportunity\n").unwrap();

    let gateway = Arc::new(TestGateway::new());
    calm_baseline(&gateway).await;
    gateway.set(KeywordName::WhatsOpen, "DomeShutter").await;
    gateway.set(KeywordName::SunElevation, -20.0).await;

    let aggregator = wired_aggregator(gateway.clone()).await;
    let (_store_dir, store) = phase_store();
    store.set_lines_done(1).unwrap(); // the fixed list alone would now be "finished"

    let mut w = watcher(gateway, aggregator, store, Some(fixed_list), scratch_script_paths(dir.path()))
        .with_too_path(too_path);

    // Without the TOO file this would be HandoffToCalPost("fixed list is finished").
    // Its presence makes the watcher dispatch the TOO target instead and keep watching.
    let outcome = w.tick().await;
    assert!(outcome.is_none(), "a pending TOO target takes priority over an exhausted fixed list");
}

#[tokio::test]
async fn s7_deadman_refresh_writes_robostate_while_open_and_observing() {
    let gateway = Arc::new(TestGateway::new());
    calm_baseline(&gateway).await;
    gateway.set(KeywordName::WhatsOpen, "DomeShutter").await;
    gateway.set(KeywordName::ScriptobsPid, 4242i64).await; // robot already running
    gateway.set(KeywordName::SunElevation, -20.0).await;
    gateway.set(KeywordName::DeadmanSeconds, 90.0).await; // under the 120s refresh threshold

    let aggregator = wired_aggregator(gateway.clone()).await;
    let (_dir, store) = phase_store();
    let scratch = tempfile::tempdir().unwrap();
    let mut w = watcher(gateway.clone(), aggregator, store, None, scratch_script_paths(scratch.path()));

    let outcome = w.tick().await;
    assert!(outcome.is_none());

    let robostate = gateway.get(KeywordName::Robostate).await;
    assert_eq!(robostate.and_then(|v| v.as_str().map(str::to_string)), Some("master operating".to_string()));
}
