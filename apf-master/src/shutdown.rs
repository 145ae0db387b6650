//! ── Shutdown Hook ──────────────────────────────────────────────────────────
//!
//! Terminal status publication on any exit path, registered unconditionally
//! at startup. Idiomatic Rust's answer to `atexit.register`: every terminal
//! path through the Sequencer (`Finished`, an abort, or a fatal Watcher
//! handoff) calls `publish` explicitly, guarded by an "already fired" flag
//! so a second call — e.g. a caller that also wants to publish on a
//! `Ctrl-C` path — is a safe no-op rather than a double write.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use apf_types::{KeywordName, KeywordValue, Phase};
use tracing::info;

use crate::gateway::KeywordGateway;

/// Shared flag so `publish` can be called explicitly and still be a no-op
/// when `Drop` later runs on the same guard.
struct Inner {
    gateway: Arc<dyn KeywordGateway>,
    fired: AtomicBool,
}

#[derive(Clone)]
pub struct ShutdownGuard {
    inner: Arc<Inner>,
}

impl ShutdownGuard {
    pub fn new(gateway: Arc<dyn KeywordGateway>) -> Self {
        Self {
            inner: Arc::new(Inner { gateway, fired: AtomicBool::new(false) }),
        }
    }

    /// Publishes `Exited/Success` iff `reached_phase == Finished`, else
    /// `Exited/Failure`. Safe to call more than once; only the first call
    /// writes.
    pub async fn publish(&self, reached_phase: Phase) {
        if self.inner.fired.swap(true, Ordering::SeqCst) {
            return;
        }
        let status = if reached_phase == Phase::Finished { "Exited/Success" } else { "Exited/Failure" };
        info!("publishing terminal status: {status}");
        let _ = self.inner.gateway.write(KeywordName::Status, KeywordValue::Text(status.to_string())).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::TestGateway;

    #[tokio::test]
    async fn publishes_success_iff_finished() {
        let gateway = Arc::new(TestGateway::new());
        let guard = ShutdownGuard::new(gateway.clone());
        guard.publish(Phase::Finished).await;
        let value = gateway.get(KeywordName::Status).await.unwrap();
        assert_eq!(value.as_str(), Some("Exited/Success"));
    }

    #[tokio::test]
    async fn publishes_failure_for_any_non_finished_phase() {
        let gateway = Arc::new(TestGateway::new());
        let guard = ShutdownGuard::new(gateway.clone());
        guard.publish(Phase::CalPre).await;
        let value = gateway.get(KeywordName::Status).await.unwrap();
        assert_eq!(value.as_str(), Some("Exited/Failure"));
    }

    #[tokio::test]
    async fn second_publish_call_is_a_noop() {
        let gateway = Arc::new(TestGateway::new());
        let guard = ShutdownGuard::new(gateway.clone());
        guard.publish(Phase::Finished).await;
        guard.publish(Phase::ObsInfo).await;
        let value = gateway.get(KeywordName::Status).await.unwrap();
        // Still Success from the first call — the second must not overwrite.
        assert_eq!(value.as_str(), Some("Exited/Success"));
    }
}
