//! ── CLI Surface ────────────────────────────────────────────────────────────
//!
//! The one command (the master). Parsing itself is the ambient concern
//! `clap`'s `derive` feature covers, the same crate/feature set
//! `apf-bus-sim` depends on for its own flags.

use std::path::PathBuf;
use std::str::FromStr;

use apf_types::{Phase, Session, WindshieldPolicy};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "apf-master", about = "Autonomous nightly observatory supervisor")]
pub struct Cli {
    /// Observer name, written to the science camera OBSERVER keyword.
    #[arg(long, default_value = "ucsc")]
    pub name: String,

    /// Starting observation number. If unset, computed via the butler-file
    /// rule (§6).
    #[arg(long)]
    pub obsnum: Option<i64>,

    /// Phase to start from. Defaults to resuming from the persisted cursor.
    #[arg(long)]
    pub phase: Option<String>,

    /// Path to a fixed starlist to observe instead of calling the
    /// scheduler.
    #[arg(long)]
    pub fixed: Option<PathBuf>,

    /// Run with no mutating side effects — every Executor action is a no-op
    /// synthetic success.
    #[arg(long)]
    pub test: bool,

    /// Reset SCRIPTOBS_LINES_DONE to 0 before entering Watching.
    #[arg(long)]
    pub restart: bool,

    /// Windshielding policy: on, off, or auto.
    #[arg(long, default_value = "auto")]
    pub windshield: String,

    /// Calibration script identifier.
    #[arg(long, default_value = "ucsc")]
    pub calibrate: String,
}

impl Cli {
    pub fn phase_override(&self) -> Option<Phase> {
        self.phase.as_deref().map(|s| s.parse().unwrap_or(Phase::ObsInfo))
    }

    pub fn into_session(self) -> Session {
        Session {
            observer_name: self.name,
            starting_obsnum: self.obsnum,
            fixed_list: self.fixed.map(|p| p.display().to_string()),
            windshield: WindshieldPolicy::from_str(&self.windshield).unwrap_or_default(),
            test_mode: self.test,
            calibrate_script: self.calibrate,
            restart: self.restart,
        }
    }
}
