//! ── Local Bus Gateway ──────────────────────────────────────────────────────
//!
//! Production-shaped `KeywordGateway`. A background task owns a broadcast
//! channel and republishes every write to registered subscribers. The
//! "socket" here is an in-process channel rather than a network one, since
//! the real bus wire protocol is out of scope. This is the seam where a
//! real bus driver would later be substituted.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use apf_types::{KeywordName, KeywordValue};
use async_trait::async_trait;
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::debug;

use super::{KeywordGateway, WaitPredicate};
use crate::error::GatewayError;

type Subscribers = HashMap<KeywordName, Vec<Box<dyn Fn(KeywordValue) + Send + Sync>>>;

pub struct LocalBusGateway {
    cache: Arc<RwLock<HashMap<KeywordName, KeywordValue>>>,
    subscribers: Arc<Mutex<Subscribers>>,
    tx: broadcast::Sender<(KeywordName, KeywordValue)>,
}

impl LocalBusGateway {
    pub fn new() -> Self {
        let (tx, rx) = broadcast::channel(256);
        let cache: Arc<RwLock<HashMap<KeywordName, KeywordValue>>> = Arc::new(RwLock::new(HashMap::new()));
        let subscribers: Arc<Mutex<Subscribers>> = Arc::new(Mutex::new(HashMap::new()));

        spawn_dispatch_loop(rx, Arc::clone(&cache), Arc::clone(&subscribers));

        Self { cache, subscribers, tx }
    }
}

impl Default for LocalBusGateway {
    fn default() -> Self {
        Self::new()
    }
}

fn spawn_dispatch_loop(
    mut rx: broadcast::Receiver<(KeywordName, KeywordValue)>,
    cache: Arc<RwLock<HashMap<KeywordName, KeywordValue>>>,
    subscribers: Arc<Mutex<Subscribers>>,
) {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok((key, value)) => {
                    cache.write().await.insert(key, value.clone());
                    let subs = subscribers.lock().await;
                    if let Some(handlers) = subs.get(&key) {
                        for handler in handlers {
                            handler(value.clone());
                        }
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!("local bus gateway dropped {n} updates under backpressure");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

#[async_trait]
impl KeywordGateway for LocalBusGateway {
    async fn read(&self, key: KeywordName) -> Result<KeywordValue, GatewayError> {
        self.cache
            .read()
            .await
            .get(&key)
            .cloned()
            .ok_or(GatewayError::NotYetPublished(key.bus_name()))
    }

    async fn write(&self, key: KeywordName, value: KeywordValue) -> Result<(), GatewayError> {
        self.cache.write().await.insert(key, value.clone());
        self.tx
            .send((key, value))
            .map(|_| ())
            .map_err(|_| GatewayError::ChannelClosed)
    }

    fn monitor(&self, key: KeywordName) {
        // Every write already republishes to all subscribers; monitor()
        // exists so callers can declare intent even with no handler yet.
        debug!("monitoring keyword {key}");
    }

    fn subscribe(&self, key: KeywordName, handler: Box<dyn Fn(KeywordValue) + Send + Sync>) {
        let subscribers = Arc::clone(&self.subscribers);
        tokio::spawn(async move {
            subscribers.lock().await.entry(key).or_default().push(handler);
        });
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
            tokio::time::sleep(Duration::from_millis(200).min(deadline - tokio::time::Instant::now())).await;
        }
    }

    async fn poll(&self, key: KeywordName) -> Result<KeywordValue, GatewayError> {
        self.read(key).await
    }
}
