//! # apf-master
//!
//! The nightly observatory supervisor binary's library crate: the keyword
//! gateway trait and its two implementations, the telemetry aggregator, the
//! action executor, the phase store, the phase sequencer, the watcher loop,
//! the shutdown hook, the observation-number rule, and the CLI surface.
//! Split out as a library so integration tests can drive the Sequencer and
//! Watcher against a `TestGateway` the same way `apf-bus-sim` drives them
//! against a `LocalBusGateway`.

pub mod aggregator;
pub mod cli;
pub mod error;
pub mod executor;
pub mod gateway;
pub mod obsnum;
pub mod phase_store;
pub mod scheduler;
pub mod sequencer;
pub mod shutdown;
pub mod watcher;
