//! ── Phase Sequencer ────────────────────────────────────────────────────────
//!
//! Drives the nightly DAG `ObsInfo -> Focus -> Cal-Pre -> Watching ->
//! Cal-Post -> Finished`, persisting each transition as it occurs so a
//! crash resumes on the right step. A five-step linear DAG with two
//! explicit failure exits.

use std::io::{BufRead, IsTerminal};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use apf_types::{Phase, Session, TeqMode};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::aggregator::Aggregator;
use crate::error::SequencerError;
use crate::executor::{CalibrationTime, Executor};
use crate::obsnum;
use crate::phase_store::PhaseStore;
use crate::scheduler::Scheduler;
use crate::shutdown::ShutdownGuard;
use crate::watcher::{Watcher, WatcherOutcome};

const OPERATOR_OVERRIDE_WINDOW: Duration = Duration::from_secs(15);

/// Filesystem locations the observation-number rule and ObsInfo need.
pub struct ObsInfoPaths {
    pub butler_dir: PathBuf,
    pub last_obs_file: PathBuf,
    pub outdir: String,
}

pub struct Sequencer {
    executor: Arc<Executor>,
    aggregator: Arc<Aggregator>,
    phase_store: Arc<PhaseStore>,
    scheduler: Arc<dyn Scheduler>,
    gateway_cancel: CancellationToken,
    session: Session,
    obs_paths: ObsInfoPaths,
    shutdown: ShutdownGuard,
    /// The obsnum ObsInfo resolved (default-computed or operator-overridden),
    /// carried forward so Cal-Post can republish it after the morning
    /// calibration shots bump the underlying counter.
    resolved_obsnum: Option<i64>,
}

impl Sequencer {
    pub fn new(
        executor: Arc<Executor>,
        aggregator: Arc<Aggregator>,
        phase_store: Arc<PhaseStore>,
        scheduler: Arc<dyn Scheduler>,
        gateway_cancel: CancellationToken,
        session: Session,
        obs_paths: ObsInfoPaths,
        shutdown: ShutdownGuard,
    ) -> Self {
        Self { executor, aggregator, phase_store, scheduler, gateway_cancel, session, obs_paths, shutdown, resolved_obsnum: None }
    }

    /// Applies the `--restart` and `--fixed`-changed lines-done reset rules
    /// from `Heimdallr.py`'s `__main__` block, then drives the DAG starting
    /// from `phase_override` (an explicit `--phase` flag) or the persisted
    /// cursor. Returns the process exit code.
    pub async fn run(&mut self, phase_override: Option<Phase>) -> i32 {
        if self.session.restart {
            info!("--restart: resetting SCRIPTOBS_LINES_DONE to 0");
            let _ = self.phase_store.set_lines_done(0);
        }

        if let Some(fixed) = self.session.fixed_list.clone() {
            if self.phase_store.get_fixed_list_var().as_deref() != Some(fixed.as_str()) {
                info!("--fixed changed from the persisted value: resetting lines-done");
                let _ = self.phase_store.set_lines_done(0);
                let _ = self.phase_store.set_fixed_list_var(Some(fixed));
            }
        }

        let mut phase = match phase_override {
            Some(p) => {
                // An explicit CLI override is the one case allowed to write
                // a phase that isn't a DAG successor of the current one.
                let _ = self.phase_store.set_phase(p);
                p
            }
            None => self.phase_store.get_phase(),
        };

        loop {
            phase = match phase {
                Phase::ObsInfo => {
                    self.run_obs_info().await;
                    self.advance(Phase::ObsInfo, Phase::Focus)
                }
                Phase::Focus => match self.run_focus().await {
                    Ok(()) => self.advance(Phase::Focus, Phase::CalPre),
                    Err(e) => return self.abort(Phase::Focus, e).await,
                },
                Phase::CalPre => match self.run_cal_pre().await {
                    Ok(()) => self.advance(Phase::CalPre, Phase::Watching),
                    Err(e) => return self.abort(Phase::CalPre, e).await,
                },
                Phase::Watching => match self.run_watching().await {
                    WatcherOutcome::HandoffToCalPost(reason) => {
                        info!("watcher handed control back to the sequencer: {reason}");
                        self.advance(Phase::Watching, Phase::CalPost)
                    }
                    WatcherOutcome::FatalExit { code, reason } => {
                        warn!("watcher aborted: {reason}");
                        self.shutdown.publish(Phase::Watching).await;
                        return code;
                    }
                },
                Phase::CalPost => {
                    self.run_cal_post().await;
                    self.advance(Phase::CalPost, Phase::Finished)
                }
                Phase::Finished => {
                    self.shutdown.publish(Phase::Finished).await;
                    return 0;
                }
            };
        }
    }

    fn advance(&self, from: Phase, to: Phase) -> Phase {
        debug_assert!(from.valid_successor(to), "sequencer tried to write a non-successor phase");
        if let Err(e) = self.phase_store.set_phase(to) {
            warn!("failed to persist phase transition {from} -> {to}: {e}");
        }
        to
    }

    async fn abort(&self, phase: Phase, err: SequencerError) -> i32 {
        warn!("{phase} failed: {err}");
        self.shutdown.publish(phase).await;
        err.exit_code()
    }

    /// Computes the default observation number, optionally overridden by
    /// the operator within a 15s window, then writes the camera
    /// OBSERVER/OBSNUM/OUTDIR/OUTFILE keywords.
    async fn run_obs_info(&mut self) {
        let default_obsnum = self
            .session
            .starting_obsnum
            .or_else(|| obsnum::find_obs_num(&self.obs_paths.butler_dir, &self.obs_paths.last_obs_file).ok())
            .unwrap_or(100);

        let obsnum = if self.session.test_mode {
            default_obsnum
        } else {
            self.prompt_operator_override(default_obsnum).await
        };

        let outfile = format!("{}_{obsnum}", self.session.observer_name);
        self.executor
            .set_observer_info(&self.session.observer_name, obsnum, &self.obs_paths.outdir, &outfile)
            .await;
        self.resolved_obsnum = Some(obsnum);

        self.aggregator.start().await;
    }

    /// Reads one line from stdin with a 15s timeout, falling back to
    /// `default` on timeout, EOF, or a non-interactive terminal. Mirrors
    /// `select([sys.stdin], …, 15)` in `Heimdallr.py`.
    async fn prompt_operator_override(&self, default: i64) -> i64 {
        if !std::io::stdin().is_terminal() {
            return default;
        }
        println!("Starting observation number [{default}]: ");
        let read = tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line).ok()?;
            Some(line)
        });

        match tokio::time::timeout(OPERATOR_OVERRIDE_WINDOW, read).await {
            Ok(Ok(Some(line))) => line.trim().parse::<i64>().unwrap_or(default),
            _ => default,
        }
    }

    async fn run_focus(&self) -> Result<(), SequencerError> {
        let outcome = self.executor.focus(&self.session.observer_name).await;
        if outcome.is_success() {
            Ok(())
        } else {
            let apf_types::ExecutionOutcome::Failure { exit_code } = outcome else { unreachable!() };
            Err(SequencerError::FocusFailed(crate::error::ExecutorError::ScriptFailed(exit_code)))
        }
    }

    async fn run_cal_pre(&self) -> Result<(), SequencerError> {
        let outcome = self.executor.calibrate(&self.session.calibrate_script, CalibrationTime::Pre).await;
        if outcome.is_success() {
            Ok(())
        } else {
            let apf_types::ExecutionOutcome::Failure { exit_code } = outcome else { unreachable!() };
            Err(SequencerError::CalibrationFailed(crate::error::ExecutorError::ScriptFailed(exit_code)))
        }
    }

    async fn run_watching(&self) -> WatcherOutcome {
        let mut watcher = Watcher::new(
            self.executor_gateway(),
            Arc::clone(&self.aggregator),
            Arc::clone(&self.executor),
            Arc::clone(&self.phase_store),
            Arc::clone(&self.scheduler),
            self.session.windshield,
            self.session.fixed_list.as_ref().map(|s| PathBuf::from(s.as_str())),
            self.gateway_cancel.clone(),
        );
        watcher.run().await
    }

    fn executor_gateway(&self) -> Arc<dyn crate::gateway::KeywordGateway> {
        self.aggregator.gateway()
    }

    /// Morning wrap-up: set TEQ to Morning, let the scheduler clean up its
    /// own scratch files, take the post-night calibration shots, leave TEQ
    /// in Day mode for the telescope to thermalize, then republish the
    /// resolved obsnum to account for the morning calibration shots.
    async fn run_cal_post(&self) {
        let _ = self.executor.set_teq_mode(TeqMode::Morning).await;
        self.scheduler.cleanup().await;
        let outcome = self.executor.calibrate(&self.session.calibrate_script, CalibrationTime::Post).await;
        if !outcome.is_success() {
            warn!("Cal-Post calibration failed");
        }
        let _ = self.executor.set_teq_mode(TeqMode::Day).await;
        if let Some(obsnum) = self.resolved_obsnum {
            let _ = self.executor.update_last_obs(obsnum).await;
        }
    }
}
