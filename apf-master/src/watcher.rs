//! ── Watcher Loop ───────────────────────────────────────────────────────────
//!
//! A cooperative ~1 Hz scheduler that reads the Aggregator's snapshot and
//! applies the decision table below in strict priority order — first match
//! wins, then sleep until the next tick.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use apf_types::{KeywordName, KeywordValue, TelemetrySnapshot, WindshieldPolicy};
use chrono::Timelike;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::aggregator::Aggregator;
use crate::executor::{Executor, OpenMode};
use crate::gateway::KeywordGateway;
use crate::phase_store::PhaseStore;
use crate::scheduler::{count_starlist_lines, Scheduler};

const TICK_PERIOD: Duration = Duration::from_secs(1);
const COOLDOWN: Duration = Duration::from_secs(1800);
const RISING_THRESHOLD_SUN_ELEVATION_DEG: f64 = -8.9;
const SUNSET_WINDOW_LOW_DEG: f64 = -8.0;
const SUNSET_WINDOW_HIGH_DEG: f64 = -3.2;
const NIGHT_OPEN_THRESHOLD_DEG: f64 = -8.9;
const OBSERVE_SUN_THRESHOLD_DEG: f64 = -8.9;
const DEADMAN_REFRESH_THRESHOLD_SECS: f64 = 120.0;
const POST_DISPATCH_SLEEP: Duration = Duration::from_secs(5);
const WALL_CLOCK_DEADLINE_HOUR: u32 = 9;
const WINDSHIELD_THRESHOLD_MPH: f64 = 10.0;

/// Why the Watcher handed control back to the Sequencer, or aborted the
/// whole run outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatcherOutcome {
    /// A terminal condition reached — advance to Cal-Post.
    HandoffToCalPost(String),
    /// Irrecoverable: the process should exit with this code.
    FatalExit { code: i32, reason: String },
}

pub struct Watcher {
    gateway: Arc<dyn KeywordGateway>,
    aggregator: Arc<Aggregator>,
    executor: Arc<Executor>,
    phase_store: Arc<PhaseStore>,
    scheduler: Arc<dyn Scheduler>,
    windshield_policy: WindshieldPolicy,
    fixed_list: Option<PathBuf>,
    too_path: PathBuf,
    cancel: CancellationToken,

    last_sun_elevation: Option<f64>,
    not_open_ok_since: Option<Instant>,
    windshield_enabled: Option<bool>,
    /// Test-only seam for the wall-clock guard: real runs always read the
    /// system clock, but a fixed hour lets scenario tests exercise every
    /// other rule without racing the real 09:00 deadline.
    wall_clock_hour_override: Option<u32>,
}

impl Watcher {
    pub fn new(
        gateway: Arc<dyn KeywordGateway>,
        aggregator: Arc<Aggregator>,
        executor: Arc<Executor>,
        phase_store: Arc<PhaseStore>,
        scheduler: Arc<dyn Scheduler>,
        windshield_policy: WindshieldPolicy,
        fixed_list: Option<PathBuf>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            gateway,
            aggregator,
            executor,
            phase_store,
            scheduler,
            windshield_policy,
            fixed_list,
            too_path: PathBuf::from("TOO.txt"),
            cancel,
            last_sun_elevation: None,
            not_open_ok_since: None,
            windshield_enabled: None,
            wall_clock_hour_override: None,
        }
    }

    /// Exposes a clone of the cancellation token so `main` can wire
    /// `Ctrl-C` to `stop()` without holding a `&mut Watcher`.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    #[doc(hidden)]
    pub fn with_wall_clock_hour_override(mut self, hour: u32) -> Self {
        self.wall_clock_hour_override = Some(hour);
        self
    }

    /// Overrides the TOO.txt path this Watcher checks for rule 5a. Defaults
    /// to `TOO.txt` in the process's working directory; tests point this at
    /// a scratch directory so they don't race each other over a shared
    /// relative path.
    pub fn with_too_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.too_path = path.into();
        self
    }

    pub async fn run(&mut self) -> WatcherOutcome {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    return WatcherOutcome::HandoffToCalPost("operator interrupt".to_string());
                }
                _ = tokio::time::sleep(TICK_PERIOD) => {}
            }

            if let Some(outcome) = self.tick().await {
                return outcome;
            }
        }
    }

    /// True while a reopen attempt should be embargoed: `not_open_ok_since`
    /// is set and less than `COOLDOWN` has elapsed since it was last reset.
    fn cooldown_active(not_open_ok_since: Option<Instant>, now: Instant) -> bool {
        match not_open_ok_since {
            Some(t) => now.duration_since(t) < COOLDOWN,
            None => false,
        }
    }

    /// Evaluates one tick of the §4.6 decision table against the current
    /// Aggregator snapshot. Public so scenario tests can drive the Watcher
    /// tick-by-tick without waiting on the real 1s interval in `run`.
    pub async fn tick(&mut self) -> Option<WatcherOutcome> {
        let snap = self.aggregator.snapshot();
        let now = Instant::now();

        let wall_clock_hour = self.wall_clock_hour_override.unwrap_or_else(|| chrono::Local::now().hour());
        if wall_clock_hour == WALL_CLOCK_DEADLINE_HOUR {
            return Some(WatcherOutcome::HandoffToCalPost("09:00 wall-clock deadline reached".to_string()));
        }

        let rising = match self.last_sun_elevation {
            Some(prev) => snap.sun_elevation_deg > prev,
            None => false,
        };
        self.last_sun_elevation = Some(snap.sun_elevation_deg);

        if !snap.open_ok {
            self.not_open_ok_since = Some(now);
        }

        // Rule 1: weather/permission close.
        if snap.is_open() && !snap.open_ok {
            warn!("open_ok false while open — aborting and closing");
            self.executor.kill_robot(true, snap.robot_pid).await;
            if let Err(e) = self.executor.close().await {
                return Some(WatcherOutcome::FatalExit { code: 1, reason: e.to_string() });
            }
            let _ = self.executor.update_last_obs(self.phase_store.get_lines_done() as i64);
            return None;
        }

        // Rule 2: sunrise.
        if snap.sun_elevation_deg > RISING_THRESHOLD_SUN_ELEVATION_DEG && !snap.robot_running() && rising {
            info!("sunrise reached (open={})", snap.is_open());
            if snap.is_open() {
                if let Err(e) = self.executor.close().await {
                    warn!("close on sunrise handoff failed: {e}");
                }
            }
            return Some(WatcherOutcome::HandoffToCalPost("sunrise".to_string()));
        }

        let cooldown_active = Self::cooldown_active(self.not_open_ok_since, now);

        // Rule 3: sunset open.
        if !snap.is_open()
            && snap.sun_elevation_deg > SUNSET_WINDOW_LOW_DEG
            && snap.sun_elevation_deg < SUNSET_WINDOW_HIGH_DEG
            && snap.open_ok
            && !rising
            && !cooldown_active
        {
            return self.attempt_open(OpenMode::Sunset, &snap).await;
        }

        // Rule 4: post-sunset open.
        if !snap.is_open() && snap.sun_elevation_deg < NIGHT_OPEN_THRESHOLD_DEG && snap.open_ok && !cooldown_active {
            return self.attempt_open(OpenMode::Night, &snap).await;
        }

        // Rule 5: observation dispatch.
        if snap.is_open() && !snap.robot_running() && snap.sun_elevation_deg <= OBSERVE_SUN_THRESHOLD_DEG {
            if let Some(outcome) = self.dispatch_observation(&snap).await {
                return Some(outcome);
            }
            return None;
        }

        // Rule 6: deadman refresh.
        if snap.is_open() && snap.deadman_seconds <= DEADMAN_REFRESH_THRESHOLD_SECS {
            let _ = self
                .gateway
                .write(KeywordName::Robostate, KeywordValue::Text("master operating".to_string()))
                .await;
        }

        None
    }

    async fn attempt_open(&self, mode: OpenMode, snap: &TelemetrySnapshot) -> Option<WatcherOutcome> {
        match self.executor.open(mode, snap.open_ok, snap.sun_elevation_deg).await {
            Ok(outcome) if outcome.is_success() => None,
            _ => {
                warn!("open({mode:?}) failed twice — closing and aborting");
                let _ = self.executor.close().await;
                Some(WatcherOutcome::FatalExit { code: 1, reason: format!("open({mode:?}) failed") })
            }
        }
    }

    async fn dispatch_observation(&mut self, snap: &TelemetrySnapshot) -> Option<WatcherOutcome> {
        if self.too_path.exists() {
            info!("TOO target found — observing ahead of the fixed list/scheduler");
            if self.executor.observe(&self.too_path, 0, true).await.is_ok() {
                self.after_dispatch(snap).await;
            }
            return None;
        }

        if let Some(fixed_list) = self.fixed_list.clone() {
            let total = match std::fs::read_to_string(&fixed_list) {
                Ok(contents) => count_starlist_lines(&contents),
                Err(e) => {
                    warn!("could not read fixed list {}: {e}", fixed_list.display());
                    0
                }
            };
            let lines_done = self.phase_store.get_lines_done();

            if lines_done < total {
                if self.executor.observe(&fixed_list, lines_done, true).await.is_ok() {
                    self.after_dispatch(snap).await;
                }
                return None;
            }

            info!("fixed list finished ({lines_done}/{total} lines)");
            let _ = self.executor.close().await;
            return Some(WatcherOutcome::HandoffToCalPost("fixed list is finished".to_string()));
        }

        if let Some(starlist) = self.scheduler.next_starlist().await {
            let qualifies = std::fs::read_to_string(&starlist)
                .map(|c| count_starlist_lines(&c) >= 1)
                .unwrap_or(false);
            if qualifies && self.executor.observe(&starlist, 0, true).await.is_ok() {
                self.after_dispatch(snap).await;
            }
        }

        None
    }

    async fn after_dispatch(&mut self, snap: &TelemetrySnapshot) {
        self.update_windshield(snap.wind_speed_mph).await;
        tokio::time::sleep(POST_DISPATCH_SLEEP).await;
    }

    /// §4.6.1: on/off force the keyword to the matching state; auto
    /// transitions on the single 10 mph threshold, writing only when the
    /// desired state actually changes so repeated ticks above/below the
    /// threshold produce exactly one write per crossing.
    async fn update_windshield(&mut self, wind_speed_mph: f64) {
        let desired_enable = match self.windshield_policy {
            WindshieldPolicy::On => true,
            WindshieldPolicy::Off => false,
            WindshieldPolicy::Auto => wind_speed_mph > WINDSHIELD_THRESHOLD_MPH,
        };

        if self.windshield_enabled == Some(desired_enable) {
            return;
        }

        let value = if desired_enable { "Enable" } else { "Disable" };
        let _ = self.gateway.write(KeywordName::ScriptobsWindshield, KeywordValue::Text(value.to_string())).await;
        self.windshield_enabled = Some(desired_enable);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cooldown_active_until_1800_seconds_elapsed() {
        let t0 = Instant::now();
        assert!(Watcher::cooldown_active(Some(t0), t0 + Duration::from_secs(1000)));
        assert!(!Watcher::cooldown_active(Some(t0), t0 + Duration::from_secs(1900)));
    }

    #[test]
    fn no_cooldown_when_never_triggered() {
        assert!(!Watcher::cooldown_active(None, Instant::now()));
    }
}
