use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Event counters owned by one stream
///
/// Written from the real-time callback with relaxed atomics; read from
/// anywhere through [`snapshot`](Self::snapshot).
#[derive(Debug, Default)]
pub struct StreamCounters {
    device_overflows: AtomicU64,
    ring_underflows: AtomicU64,
    underflow_recoveries: AtomicU64,
    frames_transferred: AtomicU64,
}

/// Point-in-time copy of a stream's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StreamStats {
    pub device_overflows: u64,
    pub ring_underflows: u64,
    pub underflow_recoveries: u64,
    pub frames_transferred: u64,
}

impl StreamCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Driver reported an overflow at the device level; returns the new total
    pub fn record_device_overflow(&self) -> u64 {
        self.device_overflows.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Playback callback ran short of buffered frames
    pub fn record_ring_underflow(&self) -> u64 {
        self.ring_underflows.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Device-level discontinuity triggered a ring reset
    pub fn record_underflow_recovery(&self) -> u64 {
        self.underflow_recoveries.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn add_frames(&self, frames: usize) {
        self.frames_transferred
            .fetch_add(frames as u64, Ordering::Relaxed);
    }

    pub fn device_overflows(&self) -> u64 {
        self.device_overflows.load(Ordering::Relaxed)
    }

    pub fn ring_underflows(&self) -> u64 {
        self.ring_underflows.load(Ordering::Relaxed)
    }

    pub fn underflow_recoveries(&self) -> u64 {
        self.underflow_recoveries.load(Ordering::Relaxed)
    }

    pub fn frames_transferred(&self) -> u64 {
        self.frames_transferred.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StreamStats {
        StreamStats {
            device_overflows: self.device_overflows(),
            ring_underflows: self.ring_underflows(),
            underflow_recoveries: self.underflow_recoveries(),
            frames_transferred: self.frames_transferred(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let counters = StreamCounters::new();

        assert_eq!(counters.record_device_overflow(), 1);
        assert_eq!(counters.record_device_overflow(), 2);
        counters.record_ring_underflow();
        counters.add_frames(480);
        counters.add_frames(480);

        assert_eq!(
            counters.snapshot(),
            StreamStats {
                device_overflows: 2,
                ring_underflows: 1,
                underflow_recoveries: 0,
                frames_transferred: 960,
            }
        );
    }
}
