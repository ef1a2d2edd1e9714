use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::Serialize;
use tracing::{info, warn};

use super::error::{StateError, StateResult};

/// Lifecycle of one audio stream
///
/// `Uninitialized → Negotiated → Opened → Started → Streaming → {Stopped | Faulted}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum StreamState {
    /// Nothing chosen yet
    Uninitialized,

    /// A stream configuration was selected for the device
    Negotiated,

    /// The device stream exists but is not running
    Opened,

    /// The device stream was started
    Started,

    /// The transport bridge is moving data
    Streaming,

    /// Shut down on request
    Stopped,

    /// Terminated by an unrecoverable error
    Faulted(String),
}

impl StreamState {
    pub fn faulted(reason: impl Into<String>) -> Self {
        Self::Faulted(reason.into())
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self, Self::Streaming)
    }

    pub fn is_faulted(&self) -> bool {
        matches!(self, Self::Faulted(_))
    }

    /// Stopped and Faulted accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Faulted(_))
    }

    pub fn fault_reason(&self) -> Option<&str> {
        match self {
            Self::Faulted(reason) => Some(reason),
            _ => None,
        }
    }

    /// State name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Self::Uninitialized => "Uninitialized",
            Self::Negotiated => "Negotiated",
            Self::Opened => "Opened",
            Self::Started => "Started",
            Self::Streaming => "Streaming",
            Self::Stopped => "Stopped",
            Self::Faulted(_) => "Faulted",
        }
    }
}

impl Default for StreamState {
    fn default() -> Self {
        Self::Uninitialized
    }
}

/// Owns a stream's current state and validates every change to it
pub struct StreamStateManager {
    /// Current state, readable without locking
    state: ArcSwap<StreamState>,

    /// Stream label used in log lines
    label: &'static str,
}

impl StreamStateManager {
    /// Create a manager in the `Uninitialized` state
    ///
    /// ```
    /// use roomcast_lib::stream::{StreamState, StreamStateManager};
    ///
    /// let manager = StreamStateManager::new("capture");
    /// assert_eq!(*manager.current(), StreamState::Uninitialized);
    ///
    /// assert!(manager.transition(StreamState::Negotiated).is_ok());
    /// assert!(manager.transition(StreamState::Streaming).is_err());
    /// ```
    pub fn new(label: &'static str) -> Self {
        Self {
            state: ArcSwap::new(Arc::new(StreamState::Uninitialized)),
            label,
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Lock-free snapshot of the current state
    pub fn current(&self) -> Arc<StreamState> {
        self.state.load_full()
    }

    /// Move to `new_state` if the lifecycle allows it
    ///
    /// The check and the swap are one atomic step: a concurrent change
    /// between them makes this call re-validate against the newer state.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::InvalidTransition`] for any edge not in the
    /// lifecycle graph.
    pub fn transition(&self, new_state: StreamState) -> StateResult<()> {
        let next = Arc::new(new_state);
        let mut current = self.current();

        loop {
            if !Self::is_valid_transition(&current, &next) {
                return Err(StateError::InvalidTransition {
                    from: (*current).clone(),
                    to: (*next).clone(),
                });
            }

            let previous = self.state.compare_and_swap(&current, Arc::clone(&next));
            if Arc::ptr_eq(&previous, &current) {
                break;
            }
            current = Arc::clone(&previous);
        }

        info!(stream = self.label, "{} -> {}", current.name(), next.name());
        Ok(())
    }

    /// Enter `Faulted` unless the stream already reached a terminal state
    ///
    /// Returns `true` if the fault was recorded.
    pub fn fault(&self, reason: impl Into<String>) -> bool {
        let reason = reason.into();
        match self.transition(StreamState::Faulted(reason.clone())) {
            Ok(()) => true,
            Err(_) => {
                warn!(stream = self.label, "Ignoring fault after shutdown: {}", reason);
                false
            }
        }
    }

    /// Enter `Stopped` unless the stream already reached a terminal state
    pub fn stop(&self) -> bool {
        self.transition(StreamState::Stopped).is_ok()
    }

    fn is_valid_transition(from: &StreamState, to: &StreamState) -> bool {
        use StreamState::*;

        match (from, to) {
            (Uninitialized, Negotiated) => true,
            (Negotiated, Opened) => true,
            (Opened, Started) => true,
            (Started, Streaming) => true,

            // Terminal states are final
            (Stopped | Faulted(_), _) => false,

            (_, Stopped) => true,
            (_, Faulted(_)) => true,

            _ => false,
        }
    }
}

impl Default for StreamStateManager {
    fn default() -> Self {
        Self::new("stream")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn advance_to_streaming(manager: &StreamStateManager) {
        manager.transition(StreamState::Negotiated).unwrap();
        manager.transition(StreamState::Opened).unwrap();
        manager.transition(StreamState::Started).unwrap();
        manager.transition(StreamState::Streaming).unwrap();
    }

    #[test]
    fn test_full_lifecycle() {
        let manager = StreamStateManager::new("test");
        advance_to_streaming(&manager);
        assert!(manager.current().is_streaming());

        assert!(manager.stop());
        assert_eq!(*manager.current(), StreamState::Stopped);
    }

    #[test]
    fn test_cannot_skip_states() {
        let manager = StreamStateManager::new("test");

        let err = manager.transition(StreamState::Opened).unwrap_err();
        assert_eq!(
            err,
            StateError::InvalidTransition {
                from: StreamState::Uninitialized,
                to: StreamState::Opened,
            }
        );
        assert_eq!(*manager.current(), StreamState::Uninitialized);
    }

    #[test]
    fn test_fault_from_any_live_state() {
        for steps in 0..4 {
            let manager = StreamStateManager::new("test");
            let path = [
                StreamState::Negotiated,
                StreamState::Opened,
                StreamState::Started,
                StreamState::Streaming,
            ];
            for state in path.into_iter().take(steps) {
                manager.transition(state).unwrap();
            }

            assert!(manager.fault("device open failed"));
            assert_eq!(manager.current().fault_reason(), Some("device open failed"));
        }
    }

    #[test]
    fn test_terminal_states_are_final() {
        let manager = StreamStateManager::new("test");
        advance_to_streaming(&manager);
        assert!(manager.fault("ring overflow"));

        assert!(!manager.stop());
        assert!(!manager.fault("second fault"));
        assert_eq!(manager.current().fault_reason(), Some("ring overflow"));
    }

    #[test]
    fn test_racing_terminal_transitions_admit_one() {
        for _ in 0..200 {
            let manager = StreamStateManager::new("test");
            advance_to_streaming(&manager);
            let barrier = std::sync::Barrier::new(2);

            let (stopped, faulted) = std::thread::scope(|scope| {
                let stopper = scope.spawn(|| {
                    barrier.wait();
                    manager.stop()
                });
                let faulter = scope.spawn(|| {
                    barrier.wait();
                    manager.fault("device lost")
                });
                (stopper.join().unwrap(), faulter.join().unwrap())
            });

            assert!(stopped ^ faulted);
            if stopped {
                assert_eq!(*manager.current(), StreamState::Stopped);
            } else {
                assert_eq!(manager.current().fault_reason(), Some("device lost"));
            }
        }
    }
}
