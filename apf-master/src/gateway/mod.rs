//! # gateway
//!
//! The capability surface over the distributed control-system bus. The real
//! wire protocol is out of scope; this module only specifies what the rest
//! of the supervisor is allowed to assume about it: read, write, monitor,
//! subscribe, wait-for-predicate, poll.
//!
//! Two implementations ship. `local_bus` is the production shape — a
//! background task owns the channel and republishes parsed values.
//! `test_gateway` is an in-memory double driven entirely by explicit `set`
//! calls, used by every test in this repo and by the `apf-bus-sim` binary.

mod local_bus;
mod test_gateway;

pub use local_bus::LocalBusGateway;
pub use test_gateway::TestGateway;

use std::time::Duration;

use apf_types::{KeywordName, KeywordValue};
use async_trait::async_trait;

use crate::error::GatewayError;

/// A predicate the Gateway evaluates against its own last-value cache while
/// `wait` polls. Kept as a closure over a single keyword rather than a
/// richer expression language — every real wait in this supervisor checks
/// exactly one keyword against one condition.
pub struct WaitPredicate {
    pub key: KeywordName,
    pub check: Box<dyn Fn(&KeywordValue) -> bool + Send + Sync>,
}

impl WaitPredicate {
    pub fn new(key: KeywordName, check: impl Fn(&KeywordValue) -> bool + Send + Sync + 'static) -> Self {
        Self { key, check: Box::new(check) }
    }

    /// Convenience constructor for the common "became true" boolean wait.
    pub fn bool_true(key: KeywordName) -> Self {
        Self::new(key, |v| v.as_bool().unwrap_or(false))
    }
}

/// The capability surface the Aggregator, Executor and Sequencer depend on.
/// Subscription handlers must be total and must never call back into the
/// gateway to block on a `wait` — they only do arithmetic (§5 of the
/// concurrency model).
#[async_trait]
pub trait KeywordGateway: Send + Sync {
    async fn read(&self, key: KeywordName) -> Result<KeywordValue, GatewayError>;
    async fn write(&self, key: KeywordName, value: KeywordValue) -> Result<(), GatewayError>;
    fn monitor(&self, key: KeywordName);
    fn subscribe(&self, key: KeywordName, handler: Box<dyn Fn(KeywordValue) + Send + Sync>);
    async fn wait(&self, predicate: WaitPredicate, timeout: Duration) -> bool;
    async fn poll(&self, key: KeywordName) -> Result<KeywordValue, GatewayError>;
}
