//! ── Observation Number Rule ────────────────────────────────────────────────
//!
//! Computes the starting observation number for a night per §6: the larger
//! of the butler starlist directory's last value and `lastObs.txt`, rounded
//! up to the next multiple of 100, then bumped to the next multiple of
//! 10000 if the remainder modulo 10000 exceeds 9700. Grounded directly on
//! `Heimdallr.py::findObsNum`.

use std::path::Path;

use crate::error::ObsNumError;

/// Round `n` up to the next multiple of 100, then bump to the next multiple
/// of 10000 if the modulo-10000 remainder exceeds 9700.
pub fn round_obsnum(n: i64) -> i64 {
    let rounded = ((n + 99) / 100) * 100;
    if rounded % 10000 > 9700 {
        ((rounded / 10000) + 1) * 10000
    } else {
        rounded
    }
}

/// Parses the first whitespace token of the last non-empty line of `text`.
fn last_line_first_token(text: &str) -> Option<i64> {
    text.lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .and_then(|line| line.split_whitespace().next())
        .and_then(|tok| tok.parse::<i64>().ok())
}

/// Scans `butler_dir` for the lexicographically-last filename and parses
/// the first whitespace token of its last non-empty line.
fn read_butler_last_value(butler_dir: &Path) -> Result<i64, ObsNumError> {
    let mut entries: Vec<_> = std::fs::read_dir(butler_dir)
        .map_err(|e| ObsNumError::ButlerDirUnreadable(butler_dir.display().to_string(), e))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    entries.sort();

    let last = entries
        .last()
        .ok_or_else(|| ObsNumError::ButlerFileEmpty(butler_dir.display().to_string()))?;

    let contents = std::fs::read_to_string(last)
        .map_err(|e| ObsNumError::LastObsUnreadable(last.display().to_string(), e))?;

    last_line_first_token(&contents)
        .ok_or_else(|| ObsNumError::ButlerFileEmpty(last.display().to_string()))
}

fn read_last_obs_file(path: &Path) -> Result<i64, ObsNumError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| ObsNumError::LastObsUnreadable(path.display().to_string(), e))?;
    contents
        .trim()
        .parse::<i64>()
        .map_err(|_| ObsNumError::ButlerFileEmpty(path.display().to_string()))
}

/// The §6 observation-number rule: `max(butler_last, last_obs)`, rounded per
/// `round_obsnum`. Unlike a telemetry callback this runs once per sequencer
/// pass and its read failures are surfaced, not defaulted.
pub fn find_obs_num(butler_dir: &Path, last_obs_path: &Path) -> Result<i64, ObsNumError> {
    let butler = read_butler_last_value(butler_dir)?;
    let last_obs = read_last_obs_file(last_obs_path)?;
    Ok(round_obsnum(butler.max(last_obs)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn rounds_up_to_next_hundred() {
        assert_eq!(round_obsnum(12350), 12400);
        assert_eq!(round_obsnum(12400), 12400);
        assert_eq!(round_obsnum(12301), 12400);
    }

    #[test]
    fn bumps_to_next_ten_thousand_past_9700_remainder() {
        // 19780 -> next 100 is 19800; 19800 mod 10000 = 9800 > 9700 -> 20000.
        assert_eq!(round_obsnum(19780), 20000);
    }

    #[test]
    fn does_not_bump_below_threshold() {
        // 19650 -> next 100 is 19700; 19700 mod 10000 = 9700, not > 9700.
        assert_eq!(round_obsnum(19650), 19700);
    }

    #[test]
    fn rounding_is_idempotent() {
        for n in [0, 99, 100, 9651, 9700, 9701, 19780, 100000] {
            let once = round_obsnum(n);
            assert_eq!(round_obsnum(once), once);
        }
    }

    #[test]
    fn takes_the_larger_of_butler_and_last_obs() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("2026jul28.txt"), "12345 some star\n").unwrap();
        let last_obs = dir.path().join("lastObs.txt");
        fs::write(&last_obs, "12290\n").unwrap();

        let result = find_obs_num(dir.path(), &last_obs).unwrap();
        assert_eq!(result, 12400);
    }

    #[test]
    fn picks_lexicographically_last_butler_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("2026jul27.txt"), "100 a\n").unwrap();
        fs::write(dir.path().join("2026jul28.txt"), "19780 b\n").unwrap();
        let last_obs = dir.path().join("lastObs.txt");
        fs::write(&last_obs, "1\n").unwrap();

        let result = find_obs_num(dir.path(), &last_obs).unwrap();
        assert_eq!(result, 20000);
    }
}
