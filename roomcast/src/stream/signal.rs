//! Cooperative stop signal shared by the callback and application domains
//!
//! The real-time side may only touch atomics, so raising a fault never
//! wakes anyone; application loops notice it within one poll interval.
//! Explicit stops from the application side also wake waiters directly.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

/// How often `stopped()` re-checks for faults raised from a callback
const FAULT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Why a stream stopped on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FaultKind {
    /// The capture ring could not absorb the frames the driver delivered
    RingOverflow = 1,
    /// The audio device went away or rejected a transaction
    Device = 2,
    /// The room transport failed
    Transport = 3,
}

impl FaultKind {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::RingOverflow),
            2 => Some(Self::Device),
            3 => Some(Self::Transport),
            _ => None,
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::RingOverflow => "ring buffer overflow",
            Self::Device => "audio device failure",
            Self::Transport => "transport failure",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Default)]
struct Inner {
    stopped: AtomicBool,
    fault: AtomicU8,
    notify: Notify,
}

/// Cloneable stop flag checked at callback entry and at every poll iteration
///
/// ```
/// use roomcast_lib::stream::{FaultKind, StopSignal};
///
/// let signal = StopSignal::new();
/// let callback_side = signal.clone();
///
/// callback_side.raise_fault(FaultKind::RingOverflow);
/// assert!(signal.is_stopped());
/// assert_eq!(signal.fault(), Some(FaultKind::RingOverflow));
/// ```
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    inner: Arc<Inner>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request an orderly stop and wake every waiter
    pub fn stop(&self) {
        self.inner.stopped.store(true, Ordering::Release);
        self.inner.notify.notify_waiters();
    }

    /// Record a fault and stop; safe to call from a real-time callback
    ///
    /// Only the first fault is kept.
    pub fn raise_fault(&self, kind: FaultKind) {
        let _ = self.inner.fault.compare_exchange(
            0,
            kind as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        self.inner.stopped.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::Acquire)
    }

    /// The first fault raised, if the stop was not an orderly one
    pub fn fault(&self) -> Option<FaultKind> {
        FaultKind::from_u8(self.inner.fault.load(Ordering::Acquire))
    }

    /// Resolve once the signal is set, by either `stop` or `raise_fault`
    pub async fn stopped(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_stopped() {
                return;
            }
            tokio::select! {
                _ = notified => {}
                _ = tokio::time::sleep(FAULT_POLL_INTERVAL) => {}
            }
        }
    }
}
