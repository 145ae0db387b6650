//! ── Phase ──────────────────────────────────────────────────────────────────

use std::fmt;
use std::str::FromStr;

/// Position in the nightly pipeline, persisted out-of-process so a crash
/// resumes on the right step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    ObsInfo,
    Focus,
    CalPre,
    Watching,
    CalPost,
    Finished,
}

impl Phase {
    /// The successor(s) this phase may validly advance to. Used by the
    /// Sequencer to assert it never writes a phase that isn't a DAG
    /// successor of the current one, except on an explicit `--phase`
    /// override at startup.
    pub fn valid_successor(self, next: Phase) -> bool {
        matches!(
            (self, next),
            (Phase::ObsInfo, Phase::Focus)
                | (Phase::Focus, Phase::CalPre)
                | (Phase::CalPre, Phase::Watching)
                | (Phase::Watching, Phase::CalPost)
                | (Phase::CalPost, Phase::Finished)
        )
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::ObsInfo => "ObsInfo",
            Phase::Focus => "Focus",
            Phase::CalPre => "Cal-Pre",
            Phase::Watching => "Watching",
            Phase::CalPost => "Cal-Post",
            Phase::Finished => "Finished",
        };
        f.write_str(s)
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ObsInfo" => Ok(Phase::ObsInfo),
            "Focus" => Ok(Phase::Focus),
            "Cal-Pre" => Ok(Phase::CalPre),
            "Watching" => Ok(Phase::Watching),
            "Cal-Post" => Ok(Phase::CalPost),
            "Finished" => Ok(Phase::Finished),
            other => Err(format!("unrecognized phase: {other}")),
        }
    }
}

impl Phase {
    /// Parse a phase read back from the durable store, coercing anything
    /// unrecognized to `ObsInfo` rather than failing.
    pub fn from_stored(raw: &str) -> Phase {
        raw.parse().unwrap_or(Phase::ObsInfo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_stored_value_coerces_to_obsinfo() {
        assert_eq!(Phase::from_stored("garbage"), Phase::ObsInfo);
        assert_eq!(Phase::from_stored(""), Phase::ObsInfo);
    }

    #[test]
    fn dag_successors_are_exactly_one_step() {
        assert!(Phase::ObsInfo.valid_successor(Phase::Focus));
        assert!(!Phase::ObsInfo.valid_successor(Phase::Watching));
        assert!(!Phase::Finished.valid_successor(Phase::ObsInfo));
    }

    #[test]
    fn display_round_trips_through_from_str() {
        for p in [
            Phase::ObsInfo,
            Phase::Focus,
            Phase::CalPre,
            Phase::Watching,
            Phase::CalPost,
            Phase::Finished,
        ] {
            assert_eq!(p.to_string().parse::<Phase>().unwrap(), p);
        }
    }
}
