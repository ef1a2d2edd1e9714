use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Device, Host};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::audio::error::{AudioError, AudioResult};
use crate::audio::format::{SampleFormat, StreamConfig};
use crate::audio::negotiate::{DeviceCapabilities, SampleRateRange};

/// Stream direction of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Input,
    Output,
}

/// Information about an audio device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioDevice {
    /// Device identifier (unique name)
    pub id: String,
    /// Human-readable device name
    pub name: String,
    /// Whether this is the host's default device for its direction
    pub is_default: bool,
    pub direction: Direction,
}

/// Names of the audio backends compiled in for this platform
pub fn available_backends() -> Vec<&'static str> {
    cpal::available_hosts()
        .into_iter()
        .map(|id| id.name())
        .collect()
}

/// Open the audio host named `backend`, or the platform default
///
/// Names match case-insensitively (`alsa`, `jack`, `wasapi`, `asio`,
/// `coreaudio`...).
///
/// # Errors
/// Returns `AudioError::BackendNotAvailable` if no compiled-in host has that
/// name or the host cannot be initialised.
///
/// # Example
/// ```no_run
/// use roomcast_lib::audio::device::host_for_backend;
///
/// let host = host_for_backend(Some("alsa")).unwrap();
/// ```
pub fn host_for_backend(backend: Option<&str>) -> AudioResult<Host> {
    let Some(name) = backend else {
        return Ok(cpal::default_host());
    };

    let id = cpal::available_hosts()
        .into_iter()
        .find(|id| id.name().eq_ignore_ascii_case(name))
        .ok_or_else(|| AudioError::BackendNotAvailable(name.to_string()))?;

    let host = cpal::host_from_id(id)
        .map_err(|e| AudioError::BackendNotAvailable(format!("{}: {}", name, e)))?;
    info!("Using audio backend: {}", id.name());
    Ok(host)
}

/// List all input devices of `host`
///
/// # Errors
/// Returns `AudioError::DeviceNotFound` if the host has no input devices.
pub fn list_input_devices(host: &Host) -> AudioResult<Vec<AudioDevice>> {
    let default_name = host.default_input_device().and_then(|d| d.name().ok());
    describe_devices(host.input_devices()?, default_name, Direction::Input)
}

/// List all output devices of `host`
///
/// # Errors
/// Returns `AudioError::DeviceNotFound` if the host has no output devices.
pub fn list_output_devices(host: &Host) -> AudioResult<Vec<AudioDevice>> {
    let default_name = host.default_output_device().and_then(|d| d.name().ok());
    describe_devices(host.output_devices()?, default_name, Direction::Output)
}

fn describe_devices(
    devices: impl Iterator<Item = Device>,
    default_name: Option<String>,
    direction: Direction,
) -> AudioResult<Vec<AudioDevice>> {
    let mut audio_devices = Vec::new();

    for device in devices {
        let name = device.name().map_err(|_| AudioError::InvalidDeviceName)?;
        let is_default = default_name.as_deref() == Some(name.as_str());

        audio_devices.push(AudioDevice {
            id: name.clone(),
            name,
            is_default,
            direction,
        });
    }

    if audio_devices.is_empty() {
        return Err(AudioError::DeviceNotFound);
    }
    Ok(audio_devices)
}

/// Pick the device to stream with
///
/// With a `device_id`, the device whose id matches and whose raw flag equals
/// `raw`; otherwise the host default for `direction`. cpal exposes no raw
/// device paths, so asking for one by id never matches.
///
/// # Errors
/// Returns `AudioError::DeviceNotFound` if nothing matches.
pub fn select_device(
    host: &Host,
    direction: Direction,
    device_id: Option<&str>,
    raw: bool,
) -> AudioResult<Device> {
    let device = match device_id {
        Some(id) => {
            if raw {
                warn!("Raw device paths are not exposed by this backend");
                return Err(AudioError::DeviceNotFound);
            }
            find_device_by_id(host, direction, id)?
        }
        None => match direction {
            Direction::Input => host.default_input_device(),
            Direction::Output => host.default_output_device(),
        }
        .ok_or(AudioError::DeviceNotFound)?,
    };

    let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    info!("Using audio {:?} device: {}", direction, name);
    Ok(device)
}

/// Find a device by its ID (name)
pub(crate) fn find_device_by_id(
    host: &Host,
    direction: Direction,
    device_id: &str,
) -> AudioResult<Device> {
    let mut devices: Box<dyn Iterator<Item = Device>> = match direction {
        Direction::Input => Box::new(host.input_devices()?),
        Direction::Output => Box::new(host.output_devices()?),
    };

    devices
        .find(|device| device.name().is_ok_and(|name| name == device_id))
        .ok_or(AudioError::DeviceNotFound)
}

/// Query what `device` supports
///
/// Probe failures do not error here; they are recorded in
/// [`DeviceCapabilities::probe_error`] and rejected by negotiation.
pub fn probe(device: &Device, direction: Direction) -> DeviceCapabilities {
    let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    let mut caps = DeviceCapabilities {
        id: name.clone(),
        name,
        is_raw: false,
        formats: Vec::new(),
        sample_rates: Vec::new(),
        channel_count: 0,
        probe_error: None,
    };

    let (ranges, default_config) = match direction {
        Direction::Input => (
            device
                .supported_input_configs()
                .map(|configs| configs.collect::<Vec<_>>())
                .map_err(AudioError::from),
            device.default_input_config().map_err(AudioError::from),
        ),
        Direction::Output => (
            device
                .supported_output_configs()
                .map(|configs| configs.collect::<Vec<_>>())
                .map_err(AudioError::from),
            device.default_output_config().map_err(AudioError::from),
        ),
    };

    let (ranges, default_config) = match (ranges, default_config) {
        (Ok(ranges), Ok(default_config)) => (ranges, default_config),
        (Err(err), _) | (_, Err(err)) => {
            caps.probe_error = Some(err.to_string());
            return caps;
        }
    };

    caps.channel_count = default_config.channels();

    // The default format leads the list so it is the negotiation fallback
    let default_format = SampleFormat::from_cpal(default_config.sample_format());
    caps.formats.extend(default_format);

    for range in ranges.iter().filter(|r| r.channels() == caps.channel_count) {
        let rates = SampleRateRange::new(range.min_sample_rate().0, range.max_sample_rate().0);
        if !caps.sample_rates.contains(&rates) {
            caps.sample_rates.push(rates);
        }
        match SampleFormat::from_cpal(range.sample_format()) {
            Some(format) if !caps.formats.contains(&format) => caps.formats.push(format),
            Some(_) => {}
            None => debug!("Skipping unsupported format {:?}", range.sample_format()),
        }
    }

    if caps.sample_rates.is_empty() {
        caps.sample_rates
            .push(SampleRateRange::exact(default_config.sample_rate().0));
    }

    debug!(
        device = %caps.name,
        formats = caps.formats.len(),
        rates = caps.sample_rates.len(),
        channels = caps.channel_count,
        "Probed device"
    );
    caps
}

/// The cpal stream configuration for a negotiated [`StreamConfig`]
pub fn to_cpal_config(config: &StreamConfig) -> cpal::StreamConfig {
    cpal::StreamConfig {
        channels: config.channel_count(),
        sample_rate: cpal::SampleRate(config.sample_rate()),
        buffer_size: cpal::BufferSize::Default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_devices() {
        let host = cpal::default_host();
        match list_input_devices(&host) {
            Ok(devices) => {
                for device in &devices {
                    assert!(!device.id.is_empty(), "Device ID should not be empty");
                    assert_eq!(device.direction, Direction::Input);
                }
                println!("Found {} input devices", devices.len());
            }
            Err(e) => {
                // No devices in CI
                eprintln!("Warning: Could not list devices: {}", e);
            }
        }
    }

    #[test]
    fn test_probe_default_output() {
        let host = cpal::default_host();
        let Ok(device) = select_device(&host, Direction::Output, None, false) else {
            eprintln!("Warning: No default output device");
            return;
        };

        let caps = probe(&device, Direction::Output);
        if let Some(err) = &caps.probe_error {
            eprintln!("Warning: Probe failed: {}", err);
            return;
        }
        assert!(caps.channel_count > 0);
        assert!(!caps.sample_rates.is_empty());
        println!("Probed {}: {:?}", caps.name, caps.formats);
    }

    #[test]
    fn test_unknown_backend() {
        let result = host_for_backend(Some("no-such-backend"));
        assert!(matches!(result, Err(AudioError::BackendNotAvailable(_))));
    }

    #[test]
    fn test_default_backend_is_listed() {
        let backends = available_backends();
        assert!(!backends.is_empty());
        assert!(backends.contains(&cpal::default_host().id().name()));
    }

    #[test]
    fn test_device_not_found() {
        let host = cpal::default_host();
        let result = select_device(&host, Direction::Input, Some("NonExistentDevice123456789"), false);
        assert!(result.is_err());
    }

    #[test]
    fn test_raw_device_never_matches() {
        let host = cpal::default_host();
        let result = select_device(&host, Direction::Input, Some("default"), true);
        assert!(matches!(result, Err(AudioError::DeviceNotFound)));
    }

    #[test]
    fn test_to_cpal_config() {
        let config = StreamConfig::new(SampleFormat::S16Le, 44100, 2);
        let cpal_config = to_cpal_config(&config);
        assert_eq!(cpal_config.channels, 2);
        assert_eq!(cpal_config.sample_rate.0, 44100);
    }
}
