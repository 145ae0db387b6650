//! # apf-types
//!
//! Shared data model for the nightly observatory supervisor.
//!
//! These types are used by:
//! - `apf-master`: the gateway, aggregator, executor, phase store, sequencer
//!   and watcher loop that make up the supervisor binary
//! - `apf-bus-sim`: a keyword-bus test double that drives the supervisor
//!   through a night's worth of telemetry without real hardware
//!
//! None of these types perform I/O; they are the vocabulary both sides of
//! the keyword bus agree on.

mod keys;
mod outcome;
mod phase;
mod session;
mod shutter;
mod snapshot;
mod teq;
mod value;
mod window;
mod windshield;

pub use keys::KeywordName;
pub use outcome::ExecutionOutcome;
pub use phase::Phase;
pub use session::Session;
pub use shutter::ShutterComponent;
pub use snapshot::{Conditions, TelemetrySnapshot};
pub use teq::TeqMode;
pub use value::KeywordValue;
pub use window::MovingWindow;
pub use windshield::WindshieldPolicy;
