//! ── Target Scheduler (external collaborator) ──────────────────────────────
//!
//! The target-selection scheduler is explicitly out of scope (§1): this
//! crate only depends on a single "give me the next starlist file" call.
//! `ScriptScheduler` shells out to the external scheduler binary and reads
//! back the path it printed; `NullScheduler` is the test/no-op double.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::warn;

#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Produce the next starlist path, or `None` if the scheduler has
    /// nothing to offer this tick.
    async fn next_starlist(&self) -> Option<PathBuf>;

    /// Cal-Post's end-of-night hook: let the scheduler rename/remove its own
    /// scratch files so the next night starts clean. A failure here is
    /// logged, not fatal — the original's `sh.cleanup()` call is itself
    /// wrapped in a bare `try/except` that only logs. Default no-op for
    /// schedulers (and the test double) that keep no night-to-night state.
    async fn cleanup(&self) {}
}

/// Invokes an external "next target" script and treats its trimmed stdout
/// as a starlist path. A missing, failing, or empty-output script is
/// "nothing to offer," not an error — the Watcher's rule 5c already treats
/// a null scheduler result as pass-through.
pub struct ScriptScheduler {
    binary: PathBuf,
}

impl ScriptScheduler {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self { binary: binary.into() }
    }
}

#[async_trait]
impl Scheduler for ScriptScheduler {
    async fn next_starlist(&self) -> Option<PathBuf> {
        match Command::new(&self.binary).output().await {
            Ok(output) if output.status.success() => {
                let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if text.is_empty() {
                    None
                } else {
                    Some(PathBuf::from(text))
                }
            }
            Ok(output) => {
                warn!("scheduler exited with {:?}", output.status.code());
                None
            }
            Err(e) => {
                warn!("failed to invoke scheduler: {e}");
                None
            }
        }
    }

    async fn cleanup(&self) {
        if let Err(e) = Command::new(&self.binary).arg("--cleanup").status().await {
            warn!("scheduler cleanup failed: {e}");
        }
    }
}

/// Always reports "nothing to offer" — used in tests and by `--test` runs.
#[derive(Default)]
pub struct NullScheduler;

#[async_trait]
impl Scheduler for NullScheduler {
    async fn next_starlist(&self) -> Option<PathBuf> {
        None
    }
}

/// Counts lines that "count" per the fixed-starlist format: non-empty after
/// trimming and not starting with `#`.
pub fn count_starlist_lines(contents: &str) -> u32 {
    contents
        .lines()
        .filter(|line| {
            let trimmed = line.trim();
            !trimmed.is_empty() && !trimmed.starts_with('#')
        })
        .count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_only_non_blank_non_comment_lines() {
        let contents = "# header\nHD12345 star one\n\n# another comment\nHD67890 star two\n";
        assert_eq!(count_starlist_lines(contents), 2);
    }

    #[tokio::test]
    async fn null_scheduler_always_returns_none() {
        let scheduler = NullScheduler;
        assert!(scheduler.next_starlist().await.is_none());
    }
}
