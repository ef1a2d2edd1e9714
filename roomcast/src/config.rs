//! Application configuration
//!
//! Loaded from a JSON file; every section and field falls back to its
//! default when absent, so an empty object is a valid configuration.
//! Command-line flags override individual fields after loading.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use roomcast_lib::config::ConfigManager;
//!
//! let mut config = ConfigManager::load(Path::new("roomcast.json")).unwrap();
//! config.room.room_name = "studio".to_string();
//! ConfigManager::save(Path::new("roomcast.json"), &config).unwrap();
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audio::format::DEFAULT_FORMAT_PRIORITY;
use crate::audio::negotiate::{DeviceNegotiator, DEFAULT_RATE_PRIORITY};
use crate::audio::SampleFormat;
use crate::network::{ClientOptions, ConnectInfo, RetryPolicy, RoomKey, DEFAULT_MAX_PAYLOAD};

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Key is not 32 bytes of base64
    #[error("Invalid {name} key: {reason}")]
    InvalidKey { name: &'static str, reason: String },

    /// Value out of range
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub room: RoomConfig,
    pub audio: AudioConfig,
    pub bridge: BridgeConfig,
}

impl AppConfig {
    /// Check ranges that serde cannot express
    ///
    /// # Errors
    /// `ConfigError::Invalid` or `ConfigError::InvalidKey` for the first
    /// offending field.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.room.max_payload == 0 {
            return Err(ConfigError::Invalid("room.max_payload must be non-zero".into()));
        }
        self.room.transmit_key()?;
        self.room.receive_key()?;

        let audio = &self.audio;
        for (name, secs) in [
            ("audio.capture_buffer_secs", audio.capture_buffer_secs),
            ("audio.playback_buffer_secs", audio.playback_buffer_secs),
        ] {
            if !(secs.is_finite() && secs > 0.0) {
                return Err(ConfigError::Invalid(format!("{} must be positive", name)));
            }
        }
        if audio.playback_prefill_secs < 0.0 || audio.playback_prefill_secs > audio.playback_buffer_secs {
            return Err(ConfigError::Invalid(
                "audio.playback_prefill_secs must fit in the playback buffer".into(),
            ));
        }
        if audio.playback_high_water_secs <= 0.0
            || audio.playback_high_water_secs > audio.playback_buffer_secs
        {
            return Err(ConfigError::Invalid(
                "audio.playback_high_water_secs must fit in the playback buffer".into(),
            ));
        }

        if self.bridge.idle_backoff_min_ms == 0
            || self.bridge.idle_backoff_min_ms > self.bridge.idle_backoff_max_ms
        {
            return Err(ConfigError::Invalid(
                "bridge idle backoff must satisfy 0 < min <= max".into(),
            ));
        }
        Ok(())
    }
}

/// Room server connection and keys
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    /// Room server URL
    pub host: String,
    pub api_key: String,
    pub api_secret: String,
    pub room_name: String,
    /// Own identity; each binary supplies its own default
    pub identity: Option<String>,
    /// Identity whose data the subscriber accepts
    pub peer_identity: String,
    /// Largest payload chunk per packet
    pub max_payload: usize,
    /// Base64 transmit key
    pub transmit_key: String,
    /// Base64 receive key for `peer_identity`
    pub receive_key: String,
    pub connect_timeout_ms: u64,
}

impl Default for RoomConfig {
    fn default() -> Self {
        let zero = RoomKey::zero().to_base64();
        Self {
            host: "ws://localhost:7880".to_string(),
            api_key: "devkey".to_string(),
            api_secret: "secret".to_string(),
            room_name: "test".to_string(),
            identity: None,
            peer_identity: "publisher".to_string(),
            max_payload: DEFAULT_MAX_PAYLOAD,
            transmit_key: zero.clone(),
            receive_key: zero,
            connect_timeout_ms: 10000,
        }
    }
}

impl RoomConfig {
    pub fn transmit_key(&self) -> ConfigResult<RoomKey> {
        RoomKey::from_base64(&self.transmit_key).map_err(|e| ConfigError::InvalidKey {
            name: "transmit",
            reason: e.to_string(),
        })
    }

    pub fn receive_key(&self) -> ConfigResult<RoomKey> {
        RoomKey::from_base64(&self.receive_key).map_err(|e| ConfigError::InvalidKey {
            name: "receive",
            reason: e.to_string(),
        })
    }

    /// Connection parameters, using `default_identity` when none is configured
    pub fn connect_info(&self, default_identity: &str) -> ConnectInfo {
        ConnectInfo::new(
            &self.host,
            &self.api_key,
            &self.api_secret,
            &self.room_name,
            self.identity.as_deref().unwrap_or(default_identity),
        )
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions::default()
            .with_timeout(self.connect_timeout_ms)
            .with_max_payload(self.max_payload)
    }
}

/// Device selection, negotiation preferences and buffer sizing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Audio host API name; platform default when unset
    pub backend: Option<String>,
    /// Device id; host default device when unset
    pub device_id: Option<String>,
    /// Ask for an unprocessed device path
    pub raw: bool,
    pub capture_buffer_secs: f64,
    pub playback_buffer_secs: f64,
    /// Silence written to the playback ring before the stream starts
    pub playback_prefill_secs: f64,
    /// Playback bridge stops pulling packets at this much buffered audio
    pub playback_high_water_secs: f64,
    pub sample_rate_priority: Vec<u32>,
    pub format_priority: Vec<SampleFormat>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            backend: None,
            device_id: None,
            raw: false,
            capture_buffer_secs: 2.0,
            playback_buffer_secs: 5.0,
            playback_prefill_secs: 1.0,
            playback_high_water_secs: 1.0,
            sample_rate_priority: DEFAULT_RATE_PRIORITY.to_vec(),
            format_priority: DEFAULT_FORMAT_PRIORITY.to_vec(),
        }
    }
}

impl AudioConfig {
    pub fn negotiator(&self) -> DeviceNegotiator {
        DeviceNegotiator::new(self.sample_rate_priority.clone(), self.format_priority.clone())
    }

    pub fn capture_buffer(&self) -> Duration {
        Duration::from_secs_f64(self.capture_buffer_secs)
    }

    pub fn playback_buffer(&self) -> Duration {
        Duration::from_secs_f64(self.playback_buffer_secs)
    }

    pub fn playback_prefill(&self) -> Duration {
        Duration::from_secs_f64(self.playback_prefill_secs)
    }

    pub fn playback_high_water(&self) -> Duration {
        Duration::from_secs_f64(self.playback_high_water_secs)
    }
}

/// Transport bridge pacing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// First wait when the bridge has nothing to do
    pub idle_backoff_min_ms: u64,
    /// Longest wait when the bridge has nothing to do
    pub idle_backoff_max_ms: u64,
    /// Retry policy for connect, send and receive
    pub retry: RetryPolicy,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            idle_backoff_min_ms: 1,
            idle_backoff_max_ms: 20,
            retry: RetryPolicy::default(),
        }
    }
}

/// Loads and saves [`AppConfig`] files
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration from `path`
    ///
    /// A missing file yields the defaults.
    pub fn load(path: &Path) -> ConfigResult<AppConfig> {
        tracing::debug!(path = %path.display(), "Loading config");

        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: AppConfig = serde_json::from_str(&content)?;
            config.validate()?;
            tracing::info!(path = %path.display(), "Config loaded successfully");
            Ok(config)
        } else {
            tracing::info!(path = %path.display(), "Config file not found, using defaults");
            Ok(AppConfig::default())
        }
    }

    /// Save configuration to `path`, creating parent directories
    pub fn save(path: &Path, config: &AppConfig) -> ConfigResult<()> {
        tracing::debug!(path = %path.display(), "Saving config");

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let content = serde_json::to_string_pretty(config)?;
        std::fs::write(path, content)?;

        tracing::info!(path = %path.display(), "Config saved successfully");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.room.host, "ws://localhost:7880");
        assert_eq!(config.room.room_name, "test");
        assert_eq!(config.room.max_payload, 512);
        assert_eq!(config.audio.capture_buffer_secs, 2.0);
        assert_eq!(config.audio.playback_buffer_secs, 5.0);
        assert_eq!(config.audio.sample_rate_priority, vec![48000, 44100, 96000, 24000]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_object_is_default() {
        let config: AppConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_partial_section() {
        let config: AppConfig =
            serde_json::from_str(r#"{"room": {"room_name": "studio"}, "audio": {"raw": true}}"#)
                .unwrap();
        assert_eq!(config.room.room_name, "studio");
        assert_eq!(config.room.api_key, "devkey");
        assert!(config.audio.raw);
    }

    #[test]
    fn test_identity_fallback() {
        let mut room = RoomConfig::default();
        assert_eq!(room.connect_info("subscriber").identity, "subscriber");

        room.identity = Some("mic-1".to_string());
        assert_eq!(room.connect_info("publisher").identity, "mic-1");
    }

    #[test]
    fn test_invalid_key_rejected() {
        let mut config = AppConfig::default();
        config.room.transmit_key = "c2hvcnQ=".to_string();

        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidKey { name: "transmit", .. }));
    }

    #[test]
    fn test_prefill_must_fit() {
        let mut config = AppConfig::default();
        config.audio.playback_prefill_secs = 6.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_format_priority_serialization() {
        let json = serde_json::to_string(&AudioConfig::default()).unwrap();
        assert!(json.contains("\"float32_le\""));
    }
}
