//! ── Test Gateway ───────────────────────────────────────────────────────────
//!
//! In-memory `KeywordGateway` double. Values are injected with `set`, which
//! synchronously updates the cache and fires any registered subscriber —
//! no channel hop, no background task — so scenario tests can assert on
//! exactly the next tick's behavior without racing a dispatcher.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use apf_types::{KeywordName, KeywordValue};
use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use super::{KeywordGateway, WaitPredicate};
use crate::error::GatewayError;

type Subscribers = HashMap<KeywordName, Vec<Box<dyn Fn(KeywordValue) + Send + Sync>>>;

#[derive(Clone)]
pub struct TestGateway {
    cache: Arc<RwLock<HashMap<KeywordName, KeywordValue>>>,
    subscribers: Arc<Mutex<Subscribers>>,
}

impl TestGateway {
    pub fn new() -> Self {
        Self {
            cache: Arc::new(RwLock::new(HashMap::new())),
            subscribers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Inject a value as if it had arrived over the bus: updates the cache
    /// and fires every subscriber registered for this key, in order.
    pub async fn set(&self, key: KeywordName, value: impl Into<KeywordValue>) {
        let value = value.into();
        self.cache.write().await.insert(key, value.clone());
        let subs = self.subscribers.lock().await;
        if let Some(handlers) = subs.get(&key) {
            for handler in handlers {
                handler(value.clone());
            }
        }
    }

    pub async fn get(&self, key: KeywordName) -> Option<KeywordValue> {
        self.cache.read().await.get(&key).cloned()
    }
}

impl Default for TestGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeywordGateway for TestGateway {
    async fn read(&self, key: KeywordName) -> Result<KeywordValue, GatewayError> {
        self.cache
            .read()
            .await
            .get(&key)
            .cloned()
            .ok_or(GatewayError::NotYetPublished(key.bus_name()))
    }

    async fn write(&self, key: KeywordName, value: KeywordValue) -> Result<(), GatewayError> {
        self.set(key, value).await;
        Ok(())
    }

    fn monitor(&self, _key: KeywordName) {}

    fn subscribe(&self, key: KeywordName, handler: Box<dyn Fn(KeywordValue) + Send + Sync>) {
        let subscribers = Arc::clone(&self.subscribers);
        // Tests call this during synchronous setup before any await point
        // that would race a `set`, so a blocking_lock here would also work;
        // try_lock keeps this path allocation-free and non-panicking.
        if let Ok(mut subs) = subscribers.try_lock() {
            subs.entry(key).or_default().push(handler);
        }
    }

    async fn wait(&self, predicate: WaitPredicate, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(value) = self.cache.read().await.get(&predicate.key) {
                if (predicate.check)(value) {
                    return true;
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    async fn poll(&self, key: KeywordName) -> Result<KeywordValue, GatewayError> {
        self.read(key).await
    }
}
