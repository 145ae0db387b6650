//! ── Telemetry Snapshot ─────────────────────────────────────────────────────

use std::collections::HashSet;

use crate::shutter::ShutterComponent;
use crate::teq::TeqMode;

/// Transparency classification derived from `slowdown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conditions {
    Good,
    Bad,
}

impl Conditions {
    pub fn from_slowdown(slowdown: f64) -> Self {
        if slowdown < 1.3 {
            Conditions::Good
        } else {
            Conditions::Bad
        }
    }
}

/// Immutable snapshot of aggregated telescope telemetry, regenerated by the
/// Aggregator whenever any contributing stream updates.
#[derive(Debug, Clone)]
pub struct TelemetrySnapshot {
    pub sun_elevation_deg: f64,
    pub wind_speed_mph: f64,
    pub wind_dir_deg: f64,
    pub seeing_arcsec: f64,
    pub slowdown: f64,
    pub conditions: Conditions,
    pub deadman_seconds: f64,
    pub open_ok: bool,
    pub move_perm: bool,
    pub check_close: bool,
    pub teq_mode: TeqMode,
    pub shutter_state: HashSet<ShutterComponent>,
    pub robot_pid: i64,
    pub lines_done: u32,
    /// Dew was detected on the most recent weather read. Latched but not
    /// acted on beyond forcing `open_ok = false` — kept around for whatever
    /// future policy wants to consume it.
    pub needs_close: bool,
}

impl TelemetrySnapshot {
    /// True iff any shutter component is open.
    pub fn is_open(&self) -> bool {
        !self.shutter_state.is_empty()
    }

    /// True iff the observation subprocess is running: PID <= 0 means "not
    /// running".
    pub fn robot_running(&self) -> bool {
        self.robot_pid > 0
    }
}

impl Default for TelemetrySnapshot {
    fn default() -> Self {
        Self {
            sun_elevation_deg: 90.0,
            wind_speed_mph: 0.0,
            wind_dir_deg: 0.0,
            seeing_arcsec: 0.0,
            slowdown: 2.0,
            conditions: Conditions::Bad,
            deadman_seconds: f64::MAX,
            open_ok: false,
            move_perm: false,
            check_close: false,
            teq_mode: TeqMode::Day,
            shutter_state: HashSet::new(),
            robot_pid: -1,
            lines_done: 0,
            needs_close: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn robot_running_iff_pid_positive() {
        let mut snap = TelemetrySnapshot::default();
        assert!(!snap.robot_running());
        snap.robot_pid = 1234;
        assert!(snap.robot_running());
        snap.robot_pid = 0;
        assert!(!snap.robot_running());
    }

    #[test]
    fn is_open_iff_any_shutter_component() {
        let mut snap = TelemetrySnapshot::default();
        assert!(!snap.is_open());
        snap.shutter_state.insert(ShutterComponent::Vents);
        assert!(snap.is_open());
    }

    #[test]
    fn conditions_threshold_matches_slowdown_cutoff() {
        assert_eq!(Conditions::from_slowdown(1.29), Conditions::Good);
        assert_eq!(Conditions::from_slowdown(1.3), Conditions::Bad);
        assert_eq!(Conditions::from_slowdown(1.31), Conditions::Bad);
    }
}
