use std::time::Duration;

/// Timer-based wait for bridge loops with nothing to do
///
/// Each consecutive idle wait doubles, up to `max`; doing work resets it.
///
/// ```
/// use std::time::Duration;
/// use roomcast_lib::pipeline::IdleBackoff;
///
/// # #[tokio::main]
/// # async fn main() {
/// let mut backoff = IdleBackoff::from_millis(1, 4);
/// backoff.wait().await;
/// backoff.wait().await;
/// assert_eq!(backoff.current(), Duration::from_millis(4));
/// backoff.reset();
/// assert_eq!(backoff.current(), Duration::from_millis(1));
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct IdleBackoff {
    min: Duration,
    max: Duration,
    current: Duration,
}

impl IdleBackoff {
    pub fn new(min: Duration, max: Duration) -> Self {
        let max = max.max(min);
        Self {
            min,
            max,
            current: min,
        }
    }

    pub fn from_millis(min_ms: u64, max_ms: u64) -> Self {
        Self::new(Duration::from_millis(min_ms), Duration::from_millis(max_ms))
    }

    /// The next wait
    pub fn current(&self) -> Duration {
        self.current
    }

    pub async fn wait(&mut self) {
        tokio::time::sleep(self.current).await;
        self.current = (self.current * 2).min(self.max);
    }

    pub fn reset(&mut self) {
        self.current = self.min;
    }
}

impl Default for IdleBackoff {
    fn default() -> Self {
        Self::from_millis(1, 20)
    }
}
