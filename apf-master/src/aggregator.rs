//! # aggregator
//!
//! Converts raw keyword-update events into a single smoothed
//! `TelemetrySnapshot`. Every derivation lives in its own callback and
//! touches exactly one field (plus whatever raw inputs `open_ok` depends
//! on); no callback may block on the gateway, and none may panic — a
//! read that can't be parsed substitutes the documented neutral default
//! instead of propagating.

use std::sync::{Arc, Mutex, RwLock};

use apf_types::{Conditions, KeywordName, KeywordValue, MovingWindow, ShutterComponent, TeqMode, TelemetrySnapshot};
use tracing::warn;

use crate::error::TelemetryReadError;
use crate::gateway::KeywordGateway;

const M1: f64 = 22.8;
const WIND_LIMIT_MPH: f64 = 40.0;
const PLATE_SCALE_ARCSEC_PER_PIXEL: f64 = 0.109;
const FALLBACK_EXPECTED_RATE: f64 = 5.0;
const TRANSPARENCY_SEED_SAMPLES: usize = 99;
const TRANSPARENCY_SEED_VALUE: f64 = 1.0;

fn decker_scale(letter: char) -> Option<f64> {
    match letter.to_ascii_uppercase() {
        'M' => Some(1.0),
        'W' => Some(1.0),
        'N' => Some(3.0),
        'B' => Some(0.5),
        'S' => Some(2.0),
        'P' => Some(1.0),
        _ => None,
    }
}

fn expected_count_rate(vmag: f64, decker: char) -> f64 {
    match decker_scale(decker) {
        Some(scale) => 10f64.powf((M1 - vmag) / 2.5) / scale,
        None => FALLBACK_EXPECTED_RATE,
    }
}

/// Raw permission/dew inputs that jointly determine `open_ok`. Kept
/// separate from `TelemetrySnapshot` because any one of the three can
/// update independently and `open_ok` must be recomputed from all three
/// each time, not pushed incrementally.
#[derive(Debug, Clone, Copy, Default)]
struct RawPermissions {
    open_permission: bool,
    move_perm: bool,
    dew_detected: bool,
}

struct TransparencyState {
    vmag: f64,
    decker: char,
}

impl Default for TransparencyState {
    fn default() -> Self {
        Self { vmag: 10.0, decker: 'W' }
    }
}

pub struct Aggregator {
    gateway: Arc<dyn KeywordGateway>,
    snapshot: Arc<RwLock<TelemetrySnapshot>>,
    wind_speed: Arc<Mutex<MovingWindow>>,
    wind_dir_rad: Arc<Mutex<MovingWindow>>,
    seeing: Arc<Mutex<MovingWindow>>,
    transparency_speed: Arc<Mutex<MovingWindow>>,
    raw_permissions: Arc<Mutex<RawPermissions>>,
    transparency_state: Arc<Mutex<TransparencyState>>,
}

impl Aggregator {
    pub fn new(gateway: Arc<dyn KeywordGateway>) -> Self {
        let mut transparency_speed = MovingWindow::new(100);
        transparency_speed.seed(TRANSPARENCY_SEED_VALUE, TRANSPARENCY_SEED_SAMPLES);

        Self {
            gateway,
            snapshot: Arc::new(RwLock::new(TelemetrySnapshot::default())),
            wind_speed: Arc::new(Mutex::new(MovingWindow::new(20))),
            wind_dir_rad: Arc::new(Mutex::new(MovingWindow::new(20))),
            seeing: Arc::new(Mutex::new(MovingWindow::new(15))),
            transparency_speed: Arc::new(Mutex::new(transparency_speed)),
            raw_permissions: Arc::new(Mutex::new(RawPermissions::default())),
            transparency_state: Arc::new(Mutex::new(TransparencyState::default())),
        }
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.snapshot.read().expect("snapshot lock poisoned").clone()
    }

    pub fn gateway(&self) -> Arc<dyn KeywordGateway> {
        Arc::clone(&self.gateway)
    }

    /// Registers callbacks on the keys the derivations need, begins
    /// monitoring the keys that pass straight through to the snapshot, then
    /// polls everything once to seed initial state.
    pub async fn start(self: &Arc<Self>) {
        self.subscribe_wind();
        self.subscribe_seeing();
        self.subscribe_transparency_inputs();
        self.subscribe_permissions();
        self.subscribe_passthrough();

        for key in [
            KeywordName::SunElevation,
            KeywordName::AvgWindSpeed,
            KeywordName::AvgWindDirection,
            KeywordName::FwhmPixels,
            KeywordName::OpenPermission,
            KeywordName::MovePermission,
            KeywordName::CheckClose,
            KeywordName::DeadmanSeconds,
            KeywordName::WhatsOpen,
            KeywordName::TeqMode,
            KeywordName::ScriptobsPid,
            KeywordName::ScriptobsLinesDone,
            KeywordName::DewStatus,
            KeywordName::ScriptobsVmag,
            KeywordName::DeckerName,
        ] {
            self.gateway.monitor(key);
            if let Ok(value) = self.gateway.poll(key).await {
                self.apply_seed(key, value);
            }
        }
    }

    fn subscribe_wind(self: &Arc<Self>) {
        let this = Arc::clone(self);
        self.gateway.subscribe(
            KeywordName::AvgWindSpeed,
            Box::new(move |value| {
                let Some(mph) = value.as_f64() else {
                    warn!("unparseable wind speed sample, ignoring");
                    return;
                };
                if !mph.is_finite() {
                    warn!("non-finite wind speed sample, ignoring");
                    return;
                }
                let mut window = this.wind_speed.lock().expect("wind speed window poisoned");
                window.push(mph);
                let median = window.median().unwrap_or(mph);
                drop(window);
                let mut snap = this.snapshot.write().expect("snapshot lock poisoned");
                snap.wind_speed_mph = median;
                drop(snap);
                this.recompute_open_ok();
            }),
        );

        let this = Arc::clone(self);
        self.gateway.subscribe(
            KeywordName::AvgWindDirection,
            Box::new(move |value| {
                let Some(deg) = value.as_f64() else {
                    warn!("unparseable wind direction sample, ignoring");
                    return;
                };
                if !deg.is_finite() {
                    warn!("non-finite wind direction sample, ignoring");
                    return;
                }
                let mut window = this.wind_dir_rad.lock().expect("wind dir window poisoned");
                window.push(deg.to_radians());
                let median = window.circular_median_deg().unwrap_or(deg.rem_euclid(360.0));
                let mut snap = this.snapshot.write().expect("snapshot lock poisoned");
                snap.wind_dir_deg = median;
            }),
        );
    }

    fn subscribe_seeing(self: &Arc<Self>) {
        let this = Arc::clone(self);
        self.gateway.subscribe(
            KeywordName::FwhmPixels,
            Box::new(move |value| {
                let Some(pixels) = value.as_f64() else {
                    warn!("unparseable FWHM sample, ignoring");
                    return;
                };
                if !pixels.is_finite() {
                    warn!("non-finite FWHM sample, ignoring");
                    return;
                }
                let mut window = this.seeing.lock().expect("seeing window poisoned");
                window.push(pixels);
                let median_pixels = window.median().unwrap_or(pixels);
                let mut snap = this.snapshot.write().expect("snapshot lock poisoned");
                snap.seeing_arcsec = median_pixels * PLATE_SCALE_ARCSEC_PER_PIXEL;
            }),
        );
    }

    fn subscribe_transparency_inputs(self: &Arc<Self>) {
        let this = Arc::clone(self);
        self.gateway.subscribe(
            KeywordName::ScriptobsVmag,
            Box::new(move |value| {
                if let Some(vmag) = value.as_f64() {
                    if vmag.is_finite() {
                        this.transparency_state.lock().expect("transparency state poisoned").vmag = vmag;
                    } else {
                        warn!("non-finite guide-star vmag sample, ignoring");
                    }
                }
            }),
        );

        let this = Arc::clone(self);
        self.gateway.subscribe(
            KeywordName::DeckerName,
            Box::new(move |value| {
                if let Some(name) = value.as_str() {
                    if let Some(letter) = name.chars().next() {
                        this.transparency_state.lock().expect("transparency state poisoned").decker = letter;
                    }
                }
            }),
        );

        let this = Arc::clone(self);
        self.gateway.subscribe(
            KeywordName::GuideCountRate,
            Box::new(move |value| {
                let Some(measured_rate) = value.as_f64() else {
                    warn!("unparseable guide count rate, treating slowdown window as unchanged");
                    return;
                };
                if !measured_rate.is_finite() {
                    warn!("non-finite guide count rate, treating slowdown window as unchanged");
                    return;
                }
                let (vmag, decker) = {
                    let state = this.transparency_state.lock().expect("transparency state poisoned");
                    (state.vmag, state.decker)
                };
                let expected = expected_count_rate(vmag, decker);
                let speed = if expected > 0.0 { measured_rate / expected } else { FALLBACK_EXPECTED_RATE };

                let mut window = this.transparency_speed.lock().expect("transparency window poisoned");
                window.push(speed);
                let median = window.median().unwrap_or(1.0);
                drop(window);

                let slowdown = if median > 0.0 { 1.0 / median } else { f64::MAX };
                let mut snap = this.snapshot.write().expect("snapshot lock poisoned");
                snap.slowdown = slowdown;
                snap.conditions = Conditions::from_slowdown(slowdown);
            }),
        );
    }

    fn subscribe_permissions(self: &Arc<Self>) {
        let this = Arc::clone(self);
        self.gateway.subscribe(
            KeywordName::OpenPermission,
            Box::new(move |value| {
                this.raw_permissions.lock().expect("raw permissions poisoned").open_permission = value.as_bool().unwrap_or(false);
                this.recompute_open_ok();
            }),
        );

        let this = Arc::clone(self);
        self.gateway.subscribe(
            KeywordName::MovePermission,
            Box::new(move |value| {
                let move_perm = value.as_bool().unwrap_or(false);
                this.raw_permissions.lock().expect("raw permissions poisoned").move_perm = move_perm;
                this.snapshot.write().expect("snapshot lock poisoned").move_perm = move_perm;
                this.recompute_open_ok();
            }),
        );

        let this = Arc::clone(self);
        self.gateway.subscribe(
            KeywordName::DewStatus,
            Box::new(move |value| {
                let dew_detected = value.as_bool().unwrap_or(false);
                this.raw_permissions.lock().expect("raw permissions poisoned").dew_detected = dew_detected;
                if dew_detected {
                    this.snapshot.write().expect("snapshot lock poisoned").needs_close = true;
                }
                this.recompute_open_ok();
            }),
        );
    }

    /// Keys whose bus value maps straight onto a snapshot field with no
    /// derivation beyond parsing.
    fn subscribe_passthrough(self: &Arc<Self>) {
        let this = Arc::clone(self);
        self.gateway.subscribe(
            KeywordName::SunElevation,
            Box::new(move |value| {
                if let Some(deg) = value.as_f64() {
                    this.snapshot.write().expect("snapshot lock poisoned").sun_elevation_deg = deg;
                }
            }),
        );

        let this = Arc::clone(self);
        self.gateway.subscribe(
            KeywordName::DeadmanSeconds,
            Box::new(move |value| {
                if let Some(secs) = value.as_f64() {
                    this.snapshot.write().expect("snapshot lock poisoned").deadman_seconds = secs;
                }
            }),
        );

        let this = Arc::clone(self);
        self.gateway.subscribe(
            KeywordName::CheckClose,
            Box::new(move |value| {
                if let Some(check) = value.as_bool() {
                    this.snapshot.write().expect("snapshot lock poisoned").check_close = check;
                }
            }),
        );

        let this = Arc::clone(self);
        self.gateway.subscribe(
            KeywordName::TeqMode,
            Box::new(move |value| {
                if let Some(raw) = value.as_str() {
                    this.snapshot.write().expect("snapshot lock poisoned").teq_mode = TeqMode::parse(raw);
                }
            }),
        );

        let this = Arc::clone(self);
        self.gateway.subscribe(
            KeywordName::WhatsOpen,
            Box::new(move |value| {
                if let Some(raw) = value.as_str() {
                    this.snapshot.write().expect("snapshot lock poisoned").shutter_state = ShutterComponent::parse_set(raw);
                }
            }),
        );

        let this = Arc::clone(self);
        self.gateway.subscribe(
            KeywordName::ScriptobsPid,
            Box::new(move |value| {
                if let Some(pid) = value.as_i64() {
                    this.snapshot.write().expect("snapshot lock poisoned").robot_pid = pid;
                }
            }),
        );

        let this = Arc::clone(self);
        self.gateway.subscribe(
            KeywordName::ScriptobsLinesDone,
            Box::new(move |value| {
                if let Some(n) = value.as_i64() {
                    this.snapshot.write().expect("snapshot lock poisoned").lines_done = n.max(0) as u32;
                }
            }),
        );
    }

    fn recompute_open_ok(&self) {
        let raw = *self.raw_permissions.lock().expect("raw permissions poisoned");
        let wind_speed = self.snapshot.read().expect("snapshot lock poisoned").wind_speed_mph;
        let open_ok = raw.open_permission && raw.move_perm && wind_speed <= WIND_LIMIT_MPH && !raw.dew_detected;
        self.snapshot.write().expect("snapshot lock poisoned").open_ok = open_ok;
    }

    /// Applies one seed poll's result the same way the matching subscriber
    /// would, without requiring a round trip through the gateway's
    /// subscriber list.
    fn apply_seed(&self, key: KeywordName, value: KeywordValue) {
        match key {
            KeywordName::SunElevation => {
                if let Some(deg) = value.as_f64() {
                    self.snapshot.write().expect("snapshot lock poisoned").sun_elevation_deg = deg;
                }
            }
            KeywordName::AvgWindSpeed => {
                if let Some(mph) = value.as_f64() {
                    if mph.is_finite() {
                        let mut window = self.wind_speed.lock().expect("wind speed window poisoned");
                        window.push(mph);
                        let median = window.median().unwrap_or(mph);
                        self.snapshot.write().expect("snapshot lock poisoned").wind_speed_mph = median;
                    } else {
                        warn!("non-finite wind speed seed sample, ignoring");
                    }
                }
                self.recompute_open_ok();
            }
            KeywordName::AvgWindDirection => {
                if let Some(deg) = value.as_f64() {
                    if deg.is_finite() {
                        let mut window = self.wind_dir_rad.lock().expect("wind dir window poisoned");
                        window.push(deg.to_radians());
                        let median = window.circular_median_deg().unwrap_or(deg.rem_euclid(360.0));
                        self.snapshot.write().expect("snapshot lock poisoned").wind_dir_deg = median;
                    } else {
                        warn!("non-finite wind direction seed sample, ignoring");
                    }
                }
            }
            KeywordName::FwhmPixels => {
                if let Some(pixels) = value.as_f64() {
                    if pixels.is_finite() {
                        let mut window = self.seeing.lock().expect("seeing window poisoned");
                        window.push(pixels);
                        let median_pixels = window.median().unwrap_or(pixels);
                        self.snapshot.write().expect("snapshot lock poisoned").seeing_arcsec =
                            median_pixels * PLATE_SCALE_ARCSEC_PER_PIXEL;
                    } else {
                        warn!("non-finite FWHM seed sample, ignoring");
                    }
                }
            }
            KeywordName::OpenPermission => {
                self.raw_permissions.lock().expect("raw permissions poisoned").open_permission =
                    value.as_bool().unwrap_or(false);
                self.recompute_open_ok();
            }
            KeywordName::MovePermission => {
                let move_perm = value.as_bool().unwrap_or(false);
                self.raw_permissions.lock().expect("raw permissions poisoned").move_perm = move_perm;
                self.snapshot.write().expect("snapshot lock poisoned").move_perm = move_perm;
                self.recompute_open_ok();
            }
            KeywordName::DewStatus => {
                let dew_detected = value.as_bool().unwrap_or(false);
                self.raw_permissions.lock().expect("raw permissions poisoned").dew_detected = dew_detected;
                if dew_detected {
                    self.snapshot.write().expect("snapshot lock poisoned").needs_close = true;
                }
                self.recompute_open_ok();
            }
            KeywordName::CheckClose => {
                if let Some(check) = value.as_bool() {
                    self.snapshot.write().expect("snapshot lock poisoned").check_close = check;
                }
            }
            KeywordName::DeadmanSeconds => {
                if let Some(secs) = value.as_f64() {
                    self.snapshot.write().expect("snapshot lock poisoned").deadman_seconds = secs;
                }
            }
            KeywordName::WhatsOpen => {
                if let Some(raw) = value.as_str() {
                    self.snapshot.write().expect("snapshot lock poisoned").shutter_state = ShutterComponent::parse_set(raw);
                }
            }
            KeywordName::TeqMode => {
                if let Some(raw) = value.as_str() {
                    self.snapshot.write().expect("snapshot lock poisoned").teq_mode = TeqMode::parse(raw);
                }
            }
            KeywordName::ScriptobsPid => {
                if let Some(pid) = value.as_i64() {
                    self.snapshot.write().expect("snapshot lock poisoned").robot_pid = pid;
                }
            }
            KeywordName::ScriptobsLinesDone => {
                if let Some(n) = value.as_i64() {
                    self.snapshot.write().expect("snapshot lock poisoned").lines_done = n.max(0) as u32;
                }
            }
            KeywordName::ScriptobsVmag => {
                if let Some(vmag) = value.as_f64() {
                    if vmag.is_finite() {
                        self.transparency_state.lock().expect("transparency state poisoned").vmag = vmag;
                    } else {
                        warn!("non-finite guide-star vmag seed sample, ignoring");
                    }
                }
            }
            KeywordName::DeckerName => {
                if let Some(name) = value.as_str() {
                    if let Some(letter) = name.chars().next() {
                        self.transparency_state.lock().expect("transparency state poisoned").decker = letter;
                    }
                }
            }
            _ => {}
        }
    }
}

/// Narrows a gateway read failure into the substitution the caller should
/// apply, per the "telemetry unavailable" entry in the error taxonomy.
pub fn substitute_on_read_failure<T>(_err: TelemetryReadError, neutral: T) -> T {
    neutral
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expected_rate_falls_back_on_unknown_decker() {
        assert_eq!(expected_count_rate(9.0, 'Z'), FALLBACK_EXPECTED_RATE);
    }

    #[test]
    fn expected_rate_uses_decker_scale_table() {
        let rate_m = expected_count_rate(12.8, 'M');
        let rate_n = expected_count_rate(12.8, 'N');
        // N scales by 3.0 in the denominator, so its expected rate is a third of M's.
        assert!((rate_n - rate_m / 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn wind_over_limit_forces_open_ok_false() {
        let gateway = Arc::new(crate::gateway::TestGateway::new());
        let aggregator = Arc::new(Aggregator::new(gateway.clone()));
        aggregator.start().await;

        gateway.set(KeywordName::OpenPermission, true).await;
        gateway.set(KeywordName::MovePermission, true).await;
        gateway.set(KeywordName::AvgWindSpeed, 45.0).await;

        assert!(!aggregator.snapshot().open_ok);
    }

    #[tokio::test]
    async fn dew_detection_latches_needs_close_and_forces_open_ok_false() {
        let gateway = Arc::new(crate::gateway::TestGateway::new());
        let aggregator = Arc::new(Aggregator::new(gateway.clone()));
        aggregator.start().await;

        gateway.set(KeywordName::OpenPermission, true).await;
        gateway.set(KeywordName::MovePermission, true).await;
        gateway.set(KeywordName::DewStatus, true).await;

        let snap = aggregator.snapshot();
        assert!(!snap.open_ok);
        assert!(snap.needs_close);
    }

    #[tokio::test]
    async fn wind_direction_uses_circular_median() {
        let gateway = Arc::new(crate::gateway::TestGateway::new());
        let aggregator = Arc::new(Aggregator::new(gateway.clone()));
        aggregator.start().await;

        for deg in [350.0, 10.0, 0.0] {
            gateway.set(KeywordName::AvgWindDirection, deg).await;
        }

        let snap = aggregator.snapshot();
        // Medians near the 0/360 wrap should stay close to 0, not jump to 180.
        assert!(snap.wind_dir_deg < 20.0 || snap.wind_dir_deg > 340.0);
    }
}
