//! ── Windshielding Policy ───────────────────────────────────────────────────

use std::str::FromStr;

/// Windshield policy as set by `--windshield` / session config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindshieldPolicy {
    On,
    Off,
    #[default]
    Auto,
}

impl FromStr for WindshieldPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on" => Ok(WindshieldPolicy::On),
            "off" => Ok(WindshieldPolicy::Off),
            "auto" => Ok(WindshieldPolicy::Auto),
            other => Err(format!("unrecognized windshield policy: {other}")),
        }
    }
}
