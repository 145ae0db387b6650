//! ── Session ────────────────────────────────────────────────────────────────

use crate::windshield::WindshieldPolicy;

/// In-memory record of the current night. Created at startup from CLI flags
/// (and the persisted phase-store record), destroyed at process exit —
/// nothing here is itself durable.
#[derive(Debug, Clone)]
pub struct Session {
    pub observer_name: String,
    pub starting_obsnum: Option<i64>,
    pub fixed_list: Option<String>,
    pub windshield: WindshieldPolicy,
    pub test_mode: bool,
    pub calibrate_script: String,
    pub restart: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            observer_name: "ucsc".to_string(),
            starting_obsnum: None,
            fixed_list: None,
            windshield: WindshieldPolicy::Auto,
            test_mode: false,
            calibrate_script: "ucsc".to_string(),
            restart: false,
        }
    }
}
