//! Command-line surface shared by `roomcast-publisher` and
//! `roomcast-subscriber`
//!
//! Flags override the configuration file field by field. Parse errors exit
//! with status 1; `--help` and `--version` exit with 0.

use std::path::PathBuf;

use clap::error::ErrorKind;
use clap::{Args, Parser};
use tracing::{error, info};

use crate::config::{AppConfig, ConfigManager, ConfigResult};
use crate::pipeline::SessionHandle;
use crate::utils::error::AppError;

/// Flags common to both binaries
#[derive(Debug, Clone, Args)]
pub struct CommonArgs {
    /// Room to join; overrides `room.room_name`
    pub room: Option<String>,

    /// Configuration file
    #[arg(long, env = "ROOMCAST_CONFIG", default_value = "roomcast.json")]
    pub config: PathBuf,

    /// Audio host API, e.g. alsa, jack, pulseaudio, coreaudio, wasapi
    #[arg(long)]
    pub backend: Option<String>,

    /// Device id; the backend's default device when omitted
    #[arg(long)]
    pub device: Option<String>,

    /// Request an unprocessed device path
    #[arg(long)]
    pub raw: bool,

    /// Room server URL
    #[arg(long)]
    pub host: Option<String>,

    /// Identity to join as
    #[arg(long)]
    pub identity: Option<String>,
}

impl CommonArgs {
    /// Load the configuration file and apply flag overrides
    ///
    /// # Errors
    /// Any `ConfigError` from loading, or from validating the merged result
    pub fn load_config(&self) -> ConfigResult<AppConfig> {
        let mut config = ConfigManager::load(&self.config)?;
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(room) = &self.room {
            config.room.room_name = room.clone();
        }
        if let Some(host) = &self.host {
            config.room.host = host.clone();
        }
        if let Some(identity) = &self.identity {
            config.room.identity = Some(identity.clone());
        }
        if let Some(backend) = &self.backend {
            config.audio.backend = Some(backend.clone());
        }
        if let Some(device) = &self.device {
            config.audio.device_id = Some(device.clone());
        }
        if self.raw {
            config.audio.raw = true;
        }
    }
}

/// Parse the process arguments, exiting on failure
pub fn parse_or_exit<P: Parser>() -> P {
    match P::try_parse() {
        Ok(args) => args,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => e.exit(),
            _ => {
                let _ = e.print();
                std::process::exit(1);
            }
        },
    }
}

/// Exit status for an error reaching `main`
pub fn exit_status(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<AppError>()
        .map(|e| e.exit_code() as u8)
        .unwrap_or(1)
}

/// Log an error that reached `main` and return its exit status
///
/// Application errors also log their stable code and, when one exists, a
/// hint for fixing the cause.
pub fn report_failure(err: &anyhow::Error) -> u8 {
    error!("{:#}", err);
    if let Some(app) = err.downcast_ref::<AppError>() {
        let ctx = app.context();
        error!(code = ?ctx.code, recoverable = ctx.recoverable, "{}", ctx.message);
        if let Some(hint) = &ctx.recovery_hint {
            info!("Hint: {}", hint);
        }
    }
    exit_status(err)
}

/// Stop the session on Ctrl+C
pub fn stop_on_ctrl_c(handle: SessionHandle) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted");
            handle.stop();
        }
    });
}
