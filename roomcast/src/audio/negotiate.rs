//! Stream configuration negotiation
//!
//! Picks a sample rate and a sample format for a device from two
//! independent priority lists, falling back to what the device itself
//! advertises first.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::audio::error::{AudioError, AudioResult};
use crate::audio::format::{SampleFormat, StreamConfig, DEFAULT_FORMAT_PRIORITY};

/// Sample rates tried in order before falling back to the device maximum
pub const DEFAULT_RATE_PRIORITY: &[u32] = &[48000, 44100, 96000, 24000];

/// Inclusive range of sample rates a device accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleRateRange {
    pub min: u32,
    pub max: u32,
}

impl SampleRateRange {
    pub fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    /// A range accepting exactly one rate
    pub fn exact(rate: u32) -> Self {
        Self::new(rate, rate)
    }

    pub fn contains(&self, rate: u32) -> bool {
        rate >= self.min && rate <= self.max
    }
}

/// What a device reported when probed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceCapabilities {
    /// Device identifier
    pub id: String,
    /// Human-readable device name
    pub name: String,
    /// Whether this is an unprocessed hardware path
    pub is_raw: bool,
    /// Advertised sample formats, in the device's own order
    pub formats: Vec<SampleFormat>,
    /// Advertised sample rate ranges, in the device's own order
    pub sample_rates: Vec<SampleRateRange>,
    /// Channel count of the device's preferred layout
    pub channel_count: u16,
    /// Set when probing the device failed
    pub probe_error: Option<String>,
}

impl DeviceCapabilities {
    pub fn supports_format(&self, format: SampleFormat) -> bool {
        self.formats.contains(&format)
    }

    pub fn supports_sample_rate(&self, rate: u32) -> bool {
        self.sample_rates.iter().any(|range| range.contains(rate))
    }
}

/// Chooses a [`StreamConfig`] from device capabilities
///
/// # Example
/// ```
/// use roomcast_lib::audio::{DeviceCapabilities, DeviceNegotiator, SampleFormat, SampleRateRange};
///
/// let caps = DeviceCapabilities {
///     id: "hw:0".into(),
///     name: "Test".into(),
///     is_raw: false,
///     formats: vec![SampleFormat::S16Le],
///     sample_rates: vec![SampleRateRange::exact(44100), SampleRateRange::exact(96000)],
///     channel_count: 2,
///     probe_error: None,
/// };
///
/// let config = DeviceNegotiator::default().negotiate(&caps).unwrap();
/// assert_eq!(config.sample_rate(), 44100);
/// assert_eq!(config.sample_format(), SampleFormat::S16Le);
/// ```
#[derive(Debug, Clone)]
pub struct DeviceNegotiator {
    rate_priority: Vec<u32>,
    format_priority: Vec<SampleFormat>,
}

impl DeviceNegotiator {
    /// Create a negotiator with explicit priority lists
    pub fn new(rate_priority: Vec<u32>, format_priority: Vec<SampleFormat>) -> Self {
        Self {
            rate_priority,
            format_priority,
        }
    }

    pub fn rate_priority(&self) -> &[u32] {
        &self.rate_priority
    }

    pub fn format_priority(&self) -> &[SampleFormat] {
        &self.format_priority
    }

    /// Negotiate a stream configuration
    ///
    /// # Errors
    /// - `AudioError::ProbeFailed` if the device reported a probe error
    /// - `AudioError::NoSupportedFormats` / `NoSupportedSampleRates` if the
    ///   device advertises nothing to fall back to
    pub fn negotiate(&self, caps: &DeviceCapabilities) -> AudioResult<StreamConfig> {
        if let Some(err) = &caps.probe_error {
            return Err(AudioError::ProbeFailed(err.clone()));
        }

        let sample_rate = self.select_sample_rate(caps)?;
        let sample_format = self.select_format(caps)?;
        let config = StreamConfig::new(sample_format, sample_rate, caps.channel_count);

        info!(device = %caps.name, "Negotiated stream: {}", config);
        Ok(config)
    }

    /// First prioritised rate the device supports, else its first range's maximum
    pub fn select_sample_rate(&self, caps: &DeviceCapabilities) -> AudioResult<u32> {
        let fallback = caps
            .sample_rates
            .first()
            .ok_or(AudioError::NoSupportedSampleRates)?;

        match self
            .rate_priority
            .iter()
            .copied()
            .find(|&rate| caps.supports_sample_rate(rate))
        {
            Some(rate) => Ok(rate),
            None => {
                debug!(rate = fallback.max, "No prioritised rate supported, using device maximum");
                Ok(fallback.max)
            }
        }
    }

    /// First prioritised format the device supports, else its first format
    pub fn select_format(&self, caps: &DeviceCapabilities) -> AudioResult<SampleFormat> {
        let fallback = *caps.formats.first().ok_or(AudioError::NoSupportedFormats)?;

        match self
            .format_priority
            .iter()
            .copied()
            .find(|&format| caps.supports_format(format))
        {
            Some(format) => Ok(format),
            None => {
                debug!(%fallback, "No prioritised format supported, using device default");
                Ok(fallback)
            }
        }
    }
}

impl Default for DeviceNegotiator {
    fn default() -> Self {
        Self::new(DEFAULT_RATE_PRIORITY.to_vec(), DEFAULT_FORMAT_PRIORITY.to_vec())
    }
}
