//! Per-stream lifecycle: state machine, stop signal and counters

pub mod counters;
pub mod error;
pub mod signal;
pub mod state;

pub use counters::{StreamCounters, StreamStats};
pub use error::{StateError, StateResult};
pub use signal::{FaultKind, StopSignal};
pub use state::{StreamState, StreamStateManager};
