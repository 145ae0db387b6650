//! ── Action Executor ────────────────────────────────────────────────────────
//!
//! Wraps each external script as a boolean-returning operation with a
//! bounded retry policy, exit-code logging, and per-action preconditions.
//! Every constant here (the 600s/300s permission waits, the 10s open retry
//! pause, the 1800s closeup budget, the 60s teq-mode/autofoc waits, the
//! 1200s readout wait) is lifted verbatim from `APFControl.py`.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use apf_types::{ExecutionOutcome, KeywordName, KeywordValue, TeqMode};
use tokio::process::Command;
use tracing::{error, info, warn};

use crate::error::ExecutorError;
use crate::gateway::{KeywordGateway, WaitPredicate};
use std::sync::Arc;

const OPEN_MOVE_PERM_TIMEOUT: Duration = Duration::from_secs(600);
const OPEN_RETRY_PAUSE: Duration = Duration::from_secs(10);
const OPEN_MIN_SUN_ELEVATION_DEG: f64 = -3.2;

const CLOSE_MOVE_PERM_TIMEOUT: Duration = Duration::from_secs(300);
const CLOSE_BUDGET: Duration = Duration::from_secs(1800);
const CLOSE_RETRY_PAUSE: Duration = Duration::from_secs(30);
const CLOSE_CONSECUTIVE_FAILURE_LOG_THRESHOLD: u32 = 3;

const TEQ_MODE_TIMEOUT: Duration = Duration::from_secs(60);
const AUTOFOC_ACK_TIMEOUT: Duration = Duration::from_secs(60);
const READOUT_BEGIN_TIMEOUT: Duration = Duration::from_secs(1200);

const TEST_MODE_SYNTHETIC_DELAY: Duration = Duration::from_millis(50);

/// Which open script to invoke — the sunset and post-sunset openers differ
/// only in which external binary runs, not in precondition or retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Sunset,
    Night,
}

/// Which calibration pass is running — used only to pick the script
/// argument, the Executor treats both identically otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationTime {
    Pre,
    Post,
}

/// Filesystem/script locations the Executor shells out to. Kept as plain
/// paths rather than a config crate, since the only consumer is this
/// module and the CLI surface that builds it.
#[derive(Debug, Clone)]
pub struct ScriptPaths {
    pub openatsunset: PathBuf,
    pub openatnight: PathBuf,
    pub closeup: PathBuf,
    pub calibrate: PathBuf,
    pub focuscube: PathBuf,
    pub scriptobs: PathBuf,
    pub last_obs_file: PathBuf,
    pub hit_list: PathBuf,
    pub apf_sched_file: PathBuf,
}

impl Default for ScriptPaths {
    fn default() -> Self {
        Self {
            openatsunset: PathBuf::from("/usr/local/bin/openatsunset"),
            openatnight: PathBuf::from("/usr/local/bin/openatnight"),
            closeup: PathBuf::from("/usr/local/bin/closeup"),
            calibrate: PathBuf::from("/usr/local/bin/calibrate"),
            focuscube: PathBuf::from("/usr/local/bin/focuscube"),
            scriptobs: PathBuf::from("/usr/local/bin/scriptobs"),
            last_obs_file: PathBuf::from("lastObs.txt"),
            hit_list: PathBuf::from("hit_list"),
            apf_sched_file: PathBuf::from("apf_sched.txt"),
        }
    }
}

pub struct Executor {
    gateway: Arc<dyn KeywordGateway>,
    scripts: ScriptPaths,
    test_mode: bool,
}

impl Executor {
    pub fn new(gateway: Arc<dyn KeywordGateway>, scripts: ScriptPaths, test_mode: bool) -> Self {
        Self { gateway, scripts, test_mode }
    }

    async fn run_script(&self, path: &Path, args: &[&str]) -> ExecutionOutcome {
        if self.test_mode {
            tokio::time::sleep(TEST_MODE_SYNTHETIC_DELAY).await;
            return ExecutionOutcome::Success;
        }
        match Command::new(path).args(args).status().await {
            Ok(status) => {
                let code = status.code().unwrap_or(-1);
                if status.success() {
                    ExecutionOutcome::Success
                } else {
                    warn!("{} exited with code {code}", path.display());
                    ExecutionOutcome::Failure { exit_code: code }
                }
            }
            Err(e) => {
                error!("failed to launch {}: {e}", path.display());
                ExecutionOutcome::Failure { exit_code: -1 }
            }
        }
    }

    /// `open(mode)`: preconditions `open_ok`, sun below -3.2deg, move_perm
    /// (waited up to 600s); two attempts separated by a 10s pause.
    pub async fn open(&self, mode: OpenMode, open_ok: bool, sun_elevation_deg: f64) -> Result<ExecutionOutcome, ExecutorError> {
        if self.test_mode {
            tokio::time::sleep(TEST_MODE_SYNTHETIC_DELAY).await;
            return Ok(ExecutionOutcome::Success);
        }

        if !open_ok || sun_elevation_deg >= OPEN_MIN_SUN_ELEVATION_DEG {
            return Ok(ExecutionOutcome::Failure { exit_code: -1 });
        }

        let granted = self
            .gateway
            .wait(WaitPredicate::bool_true(KeywordName::MovePermission), OPEN_MOVE_PERM_TIMEOUT)
            .await;
        if !granted {
            return Err(ExecutorError::MovePermTimeout(OPEN_MOVE_PERM_TIMEOUT));
        }

        let script = match mode {
            OpenMode::Sunset => &self.scripts.openatsunset,
            OpenMode::Night => &self.scripts.openatnight,
        };

        let first = self.run_script(script, &[]).await;
        if first.is_success() {
            return Ok(first);
        }

        tokio::time::sleep(OPEN_RETRY_PAUSE).await;
        Ok(self.run_script(script, &[]).await)
    }

    /// `close()`: wait up to 300s for move_perm then proceed regardless;
    /// retries within an 1800s budget, 30s between attempts; logs an error
    /// after 3 consecutive failures without giving up; the process
    /// terminates when the budget is exhausted.
    pub async fn close(&self) -> Result<(), ExecutorError> {
        if self.test_mode {
            tokio::time::sleep(TEST_MODE_SYNTHETIC_DELAY).await;
            return Ok(());
        }

        let _ = self
            .gateway
            .wait(WaitPredicate::bool_true(KeywordName::MovePermission), CLOSE_MOVE_PERM_TIMEOUT)
            .await;

        let deadline = tokio::time::Instant::now() + CLOSE_BUDGET;
        let mut consecutive_failures: u32 = 0;

        loop {
            let outcome = self.run_script(&self.scripts.closeup, &[]).await;
            if outcome.is_success() {
                return Ok(());
            }

            consecutive_failures += 1;
            if consecutive_failures >= CLOSE_CONSECUTIVE_FAILURE_LOG_THRESHOLD {
                error!("closeup has failed {consecutive_failures} consecutive times");
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(ExecutorError::CloseupBudgetExhausted(CLOSE_BUDGET));
            }

            tokio::time::sleep(CLOSE_RETRY_PAUSE.min(deadline - tokio::time::Instant::now())).await;
        }
    }

    /// `calibrate(script, time)`: single attempt.
    pub async fn calibrate(&self, script: &str, time: CalibrationTime) -> ExecutionOutcome {
        let arg = match time {
            CalibrationTime::Pre => "pre",
            CalibrationTime::Post => "post",
        };
        self.run_script(&self.scripts.calibrate, &[script, arg]).await
    }

    /// `focus(user)`: single attempt.
    pub async fn focus(&self, user: &str) -> ExecutionOutcome {
        self.run_script(&self.scripts.focuscube, &[user]).await
    }

    /// Detached `observe(starlist, skip)`: does not wait for the subprocess
    /// to exit. Writes `SCRIPTOBS_AUTOFOC`, waits up to 60s for
    /// acknowledgement, and ensures `teq_mode = Night` before launching.
    pub async fn observe(&self, starlist: &Path, skip: u32, autofocus_enable: bool) -> Result<(), ExecutorError> {
        if self.test_mode {
            tokio::time::sleep(TEST_MODE_SYNTHETIC_DELAY).await;
            return Ok(());
        }

        self.gateway
            .write(KeywordName::ScriptobsAutofoc, KeywordValue::Bool(autofocus_enable))
            .await
            .ok();
        self.gateway
            .wait(WaitPredicate::new(KeywordName::ScriptobsAutofoc, move |v| v.as_bool() == Some(autofocus_enable)), AUTOFOC_ACK_TIMEOUT)
            .await;

        self.set_teq_mode(TeqMode::Night).await?;

        let stdin_file = std::fs::File::open(starlist).map_err(|_| ExecutorError::ScriptFailed(-1))?;
        let mut cmd = Command::new(&self.scripts.scriptobs);
        cmd.arg("-skip").arg(skip.to_string()).arg(starlist);
        cmd.stdin(Stdio::from(stdin_file));
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::null());

        match cmd.spawn() {
            Ok(_child) => {
                info!("launched observation on {} (skip={skip})", starlist.display());
                Ok(())
            }
            Err(e) => {
                error!("failed to launch scriptobs: {e}");
                Err(ExecutorError::ScriptFailed(-1))
            }
        }
    }

    /// Writes the target `teq_mode` and waits up to 60s for it to take
    /// effect; a state violation this can't resolve is fatal to the
    /// calling phase.
    pub async fn set_teq_mode(&self, mode: TeqMode) -> Result<(), ExecutorError> {
        if self.test_mode {
            return Ok(());
        }
        self.gateway
            .write(KeywordName::TeqMode, KeywordValue::Text(mode.to_string()))
            .await
            .map_err(|_| ExecutorError::TeqModeUnsettable(mode.to_string()))?;

        let target = mode.to_string();
        let ok = self
            .gateway
            .wait(
                WaitPredicate::new(KeywordName::TeqMode, move |v| v.as_str() == Some(target.as_str())),
                TEQ_MODE_TIMEOUT,
            )
            .await;
        if ok {
            Ok(())
        } else {
            Err(ExecutorError::TeqModeUnsettable(mode.to_string()))
        }
    }

    /// `kill_robot(now)`: if not urgent and the camera isn't already
    /// `ControllerReady`, wait up to 1200s for `ReadoutBegin`; then, only if
    /// the robot is actually running, write the abort command.
    pub async fn kill_robot(&self, now: bool, robot_pid: i64) -> ExecutionOutcome {
        if self.test_mode {
            tokio::time::sleep(TEST_MODE_SYNTHETIC_DELAY).await;
            return ExecutionOutcome::Success;
        }

        if !now {
            let already_ready = self
                .gateway
                .read(KeywordName::CameraEventString)
                .await
                .ok()
                .and_then(|v| v.as_str().map(|s| s == "ControllerReady"))
                .unwrap_or(false);
            if !already_ready {
                self.gateway
                    .wait(
                        WaitPredicate::new(KeywordName::CameraEventString, |v| v.as_str() == Some("ReadoutBegin")),
                        READOUT_BEGIN_TIMEOUT,
                    )
                    .await;
            }
        }

        if robot_pid <= 0 {
            return ExecutionOutcome::Success;
        }

        match self.gateway.write(KeywordName::ScriptobsControl, KeywordValue::Text("abort".to_string())).await {
            Ok(()) => ExecutionOutcome::Success,
            Err(_) => ExecutionOutcome::Failure { exit_code: -1 },
        }
    }

    /// Writes the science-camera OBSERVER/OBSNUM/OUTDIR/OUTFILE keywords
    /// for the ObsInfo phase.
    pub async fn set_observer_info(&self, observer: &str, obsnum: i64, outdir: &str, outfile: &str) {
        let _ = self.gateway.write(KeywordName::CameraObserver, KeywordValue::Text(observer.to_string())).await;
        let _ = self.gateway.write(KeywordName::CameraObsnum, KeywordValue::Int(obsnum)).await;
        let _ = self.gateway.write(KeywordName::CameraOutdir, KeywordValue::Text(outdir.to_string())).await;
        let _ = self.gateway.write(KeywordName::CameraOutfile, KeywordValue::Text(outfile.to_string())).await;
    }

    /// Persists the last completed observation number and, when
    /// `apf_sched.txt` exists, appends a completion record to `hit_list`.
    pub async fn update_last_obs(&self, obsnum: i64) -> std::io::Result<()> {
        tokio::fs::write(&self.scripts.last_obs_file, format!("{obsnum}\n")).await?;
        if self.scripts.apf_sched_file.exists() {
            use tokio::io::AsyncWriteExt;
            let mut f = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.scripts.hit_list)
                .await?;
            f.write_all(format!("{obsnum}\n").as_bytes()).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::TestGateway;

    fn executor(test_mode: bool) -> (Executor, Arc<TestGateway>) {
        let gateway = Arc::new(TestGateway::new());
        let executor = Executor::new(gateway.clone(), ScriptPaths::default(), test_mode);
        (executor, gateway)
    }

    #[tokio::test]
    async fn open_in_test_mode_succeeds_without_launching_anything() {
        let (executor, _gw) = executor(true);
        let outcome = executor.open(OpenMode::Sunset, true, -5.0).await.unwrap();
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn open_fails_fast_when_sun_too_high() {
        let (executor, _gw) = executor(false);
        let outcome = executor.open(OpenMode::Sunset, true, 2.0).await.unwrap();
        assert!(!outcome.is_success());
    }

    #[tokio::test]
    async fn kill_robot_is_noop_when_not_running() {
        let (executor, _gw) = executor(false);
        let outcome = executor.kill_robot(true, -1).await;
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn update_last_obs_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut scripts = ScriptPaths::default();
        scripts.last_obs_file = dir.path().join("lastObs.txt");
        scripts.apf_sched_file = dir.path().join("apf_sched.txt");
        scripts.hit_list = dir.path().join("hit_list");

        let gateway = Arc::new(TestGateway::new());
        let executor = Executor::new(gateway, scripts.clone(), false);
        executor.update_last_obs(12400).await.unwrap();

        let contents = tokio::fs::read_to_string(&scripts.last_obs_file).await.unwrap();
        assert_eq!(contents.trim(), "12400");
    }
}
