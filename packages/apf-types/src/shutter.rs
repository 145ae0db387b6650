//! ── Shutter State ──────────────────────────────────────────────────────────

use std::collections::HashSet;
use std::fmt;

/// One of the three physical components `WHATSOPN` can report as open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShutterComponent {
    DomeShutter,
    MirrorCover,
    Vents,
}

impl ShutterComponent {
    fn from_token(tok: &str) -> Option<Self> {
        match tok {
            "DomeShutter" => Some(ShutterComponent::DomeShutter),
            "MirrorCover" => Some(ShutterComponent::MirrorCover),
            "Vents" => Some(ShutterComponent::Vents),
            _ => None,
        }
    }

    /// Parse the whitespace/comma-separated `WHATSOPN` keyword value into
    /// the set of open components. Unrecognized tokens are ignored rather
    /// than rejecting the whole keyword (the bus may report components this
    /// crate doesn't model).
    pub fn parse_set(raw: &str) -> HashSet<ShutterComponent> {
        raw.split(|c: char| c.is_whitespace() || c == ',')
            .filter(|tok| !tok.is_empty())
            .filter_map(ShutterComponent::from_token)
            .collect()
    }
}

impl fmt::Display for ShutterComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ShutterComponent::DomeShutter => "DomeShutter",
            ShutterComponent::MirrorCover => "MirrorCover",
            ShutterComponent::Vents => "Vents",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_whitespace_and_comma_lists() {
        let set = ShutterComponent::parse_set("DomeShutter, Vents");
        assert_eq!(set.len(), 2);
        assert!(set.contains(&ShutterComponent::DomeShutter));
        assert!(set.contains(&ShutterComponent::Vents));
        assert!(!set.contains(&ShutterComponent::MirrorCover));
    }

    #[test]
    fn empty_string_is_closed() {
        assert!(ShutterComponent::parse_set("").is_empty());
    }
}
