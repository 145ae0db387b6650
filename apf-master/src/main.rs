use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

use apf_master::aggregator::Aggregator;
use apf_master::cli::Cli;
use apf_master::executor::{Executor, ScriptPaths};
use apf_master::gateway::{self, LocalBusGateway};
use apf_master::phase_store::PhaseStore;
use apf_master::scheduler::{self, NullScheduler, ScriptScheduler};
use apf_master::sequencer::{ObsInfoPaths, Sequencer};
use apf_master::shutdown::ShutdownGuard;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "apf_master=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let phase_override = cli.phase_override();
    let test_mode = cli.test;
    let session = cli.into_session();

    info!("apf-master starting (observer={}, test={test_mode})", session.observer_name);

    let gateway: Arc<dyn gateway::KeywordGateway> = Arc::new(LocalBusGateway::new());
    let aggregator = Arc::new(Aggregator::new(Arc::clone(&gateway)));
    let executor = Arc::new(Executor::new(Arc::clone(&gateway), ScriptPaths::default(), test_mode));
    let phase_store = Arc::new(PhaseStore::new("phase_store.json"));
    let scheduler: Arc<dyn scheduler::Scheduler> = if test_mode {
        Arc::new(NullScheduler)
    } else {
        Arc::new(ScriptScheduler::new("/usr/local/bin/apf_scheduler"))
    };
    let shutdown = ShutdownGuard::new(Arc::clone(&gateway));

    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("operator interrupt received, stopping after the current tick");
            ctrl_c_cancel.cancel();
        }
    });

    let obs_paths = ObsInfoPaths {
        butler_dir: PathBuf::from("/data/apf/butler"),
        last_obs_file: PathBuf::from("lastObs.txt"),
        outdir: "/data/apf/tonight".to_string(),
    };

    let mut sequencer = Sequencer::new(
        executor,
        aggregator,
        phase_store,
        scheduler,
        cancel,
        session,
        obs_paths,
        shutdown,
    );

    let exit_code = sequencer.run(phase_override).await;
    std::process::exit(exit_code);
}
