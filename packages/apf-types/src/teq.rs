//! ── TEQ Mode ────────────────────────────────────────────────────────────────

use std::fmt;

/// Thermal-equilibrium / operating-mode of the telescope.
///
/// The bus keyword is free text; `Unknown` preserves whatever string showed
/// up instead of coercing it, so a mode this crate doesn't yet recognize
/// doesn't get silently misreported as one it does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TeqMode {
    Night,
    Morning,
    Day,
    Sunrise,
    Unknown(String),
}

impl TeqMode {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "Night" => TeqMode::Night,
            "Morning" => TeqMode::Morning,
            "Day" => TeqMode::Day,
            "Sunrise" => TeqMode::Sunrise,
            other => TeqMode::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for TeqMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TeqMode::Night => f.write_str("Night"),
            TeqMode::Morning => f.write_str("Morning"),
            TeqMode::Day => f.write_str("Day"),
            TeqMode::Sunrise => f.write_str("Sunrise"),
            TeqMode::Unknown(s) => f.write_str(s),
        }
    }
}
