//! apf-bus-sim — keyword-bus scenario driver
//!
//! Replays a scripted night's worth of telemetry onto a `TestGateway` and
//! drives a real `Watcher`/`Aggregator`/`Executor` stack against it (the
//! Executor runs in test mode, so no external scripts are invoked). Lets a
//! developer watch the decision table react to a scenario without any real
//! telescope hardware attached. One task advances scripted state on a timer;
//! the watcher consumes it and reacts.

mod scenario;

use std::sync::Arc;
use std::time::Duration;

use apf_master::aggregator::Aggregator;
use apf_master::executor::{Executor, ScriptPaths};
use apf_master::gateway::TestGateway;
use apf_master::phase_store::PhaseStore;
use apf_master::scheduler::NullScheduler;
use apf_master::watcher::Watcher;
use apf_types::WindshieldPolicy;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "apf-bus-sim", about = "Replays a scripted night of telemetry against the watcher loop")]
struct Args {
    /// Scenario to run: clear-night, weather-closure, sunrise.
    #[arg(long, default_value = "clear-night")]
    scenario: String,

    /// Playback speed multiplier: 10.0 replays a scenario's offsets ten
    /// times faster than the seconds they're authored in.
    #[arg(long, default_value = "10.0")]
    speed: f64,

    /// List the available scenarios and exit.
    #[arg(long)]
    list: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "apf_bus_sim=info".into()),
        )
        .init();

    let args = Args::parse();

    if args.list {
        for s in scenario::presets() {
            println!("{:<16} {}", s.name, s.description);
        }
        return;
    }

    let Some(scenario) = scenario::by_name(&args.scenario) else {
        eprintln!("unknown scenario '{}' — pass --list to see the available ones", args.scenario);
        std::process::exit(1);
    };
    info!("running scenario '{}': {}", scenario.name, scenario.description);

    let gateway = Arc::new(TestGateway::new());
    let aggregator = Arc::new(Aggregator::new(gateway.clone()));
    aggregator.start().await;

    let scratch = tempfile::tempdir().expect("failed to create scratch dir");
    let mut scripts = ScriptPaths::default();
    scripts.last_obs_file = scratch.path().join("lastObs.txt");
    scripts.hit_list = scratch.path().join("hit_list");
    scripts.apf_sched_file = scratch.path().join("apf_sched.txt");
    let executor = Arc::new(Executor::new(gateway.clone(), scripts, true));

    let phase_store = Arc::new(PhaseStore::new(scratch.path().join("phase_store.json")));
    let scheduler = Arc::new(NullScheduler);
    let cancel = CancellationToken::new();

    let mut watcher = Watcher::new(
        gateway.clone(),
        aggregator,
        executor,
        phase_store,
        scheduler,
        WindshieldPolicy::Auto,
        None,
        cancel.clone(),
    )
    .with_too_path(scratch.path().join("TOO.txt"));

    let replay_gateway = gateway.clone();
    let events = scenario.events.clone();
    let speed = args.speed.max(0.01);
    let replay = tokio::spawn(async move {
        let mut last_offset = 0.0_f64;
        for event in events {
            let wait_secs = (event.offset_secs - last_offset).max(0.0) / speed;
            if wait_secs > 0.0 {
                tokio::time::sleep(Duration::from_secs_f64(wait_secs)).await;
            }
            last_offset = event.offset_secs;
            info!("t+{:.0}s: {} = {:?}", event.offset_secs, event.key, event.value);
            replay_gateway.set(event.key, event.value.clone()).await;
        }
    });

    tokio::select! {
        outcome = watcher.run() => {
            info!("watcher reached a terminal outcome: {outcome:?}");
        }
        _ = replay => {
            info!("scenario timeline exhausted; giving the watcher a few more ticks to react");
            tokio::time::sleep(Duration::from_secs(3)).await;
            cancel.cancel();
        }
    }
}
