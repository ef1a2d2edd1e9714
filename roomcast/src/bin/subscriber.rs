//! Receive audio from a room and play it on an audio output device

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use roomcast_lib::cli::{self, CommonArgs};
use roomcast_lib::network::RoomTransport;
use roomcast_lib::pipeline::{connect_room, install_receive_key, Subscriber};
use roomcast_lib::stream::StreamStats;
use roomcast_lib::utils::error::AppError;
use roomcast_lib::utils::logging::init_logging;

#[derive(Debug, Parser)]
#[command(name = "roomcast-subscriber", version, about = "Play audio published to a room")]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    /// Identity whose audio to play; overrides `room.peer_identity`
    #[arg(long)]
    peer: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args: Args = cli::parse_or_exit();
    init_logging();

    match run(args).await {
        Ok(stats) => {
            info!(
                "Played {} frames, {} underflows",
                stats.frames_transferred, stats.ring_underflows
            );
            ExitCode::SUCCESS
        }
        Err(err) => ExitCode::from(cli::report_failure(&err)),
    }
}

async fn run(args: Args) -> anyhow::Result<StreamStats> {
    let mut config = args
        .common
        .load_config()
        .map_err(AppError::from)
        .with_context(|| format!("loading {}", args.common.config.display()))?;
    if let Some(peer) = args.peer {
        config.room.peer_identity = peer;
    }

    let info = config.room.connect_info("subscriber");
    let mut room = connect_room(&info, &config.room.client_options(), &config.bridge.retry)
        .await
        .map_err(AppError::from)
        .with_context(|| format!("joining room {}", info.room_name))?;

    if let Err(err) = install_receive_key(&mut room, &config.room) {
        let _ = room.disconnect().await;
        return Err(AppError::from(err)).context("installing receive key");
    }

    let subscriber = Subscriber::new(config.audio, config.bridge);
    cli::stop_on_ctrl_c(subscriber.handle());

    let stats = subscriber.run(room).await.map_err(AppError::from)?;
    Ok(stats)
}
