//! Capture from an audio input device and publish it to a room

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use roomcast_lib::cli::{self, CommonArgs};
use roomcast_lib::network::RoomTransport;
use roomcast_lib::pipeline::{connect_room, install_transmit_key, Publisher};
use roomcast_lib::stream::StreamStats;
use roomcast_lib::utils::error::AppError;
use roomcast_lib::utils::logging::init_logging;

#[derive(Debug, Parser)]
#[command(name = "roomcast-publisher", version, about = "Publish an audio input device to a room")]
struct Args {
    #[command(flatten)]
    common: CommonArgs,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args: Args = cli::parse_or_exit();
    init_logging();

    match run(args).await {
        Ok(stats) => {
            info!("Published {} frames", stats.frames_transferred);
            ExitCode::SUCCESS
        }
        Err(err) => ExitCode::from(cli::report_failure(&err)),
    }
}

async fn run(args: Args) -> anyhow::Result<StreamStats> {
    let config = args
        .common
        .load_config()
        .map_err(AppError::from)
        .with_context(|| format!("loading {}", args.common.config.display()))?;

    let info = config.room.connect_info("publisher");
    let mut room = connect_room(&info, &config.room.client_options(), &config.bridge.retry)
        .await
        .map_err(AppError::from)
        .with_context(|| format!("joining room {}", info.room_name))?;

    if let Err(err) = install_transmit_key(&mut room, &config.room) {
        let _ = room.disconnect().await;
        return Err(AppError::from(err)).context("installing transmit key");
    }

    let publisher = Publisher::new(config.audio, config.bridge);
    cli::stop_on_ctrl_c(publisher.handle());

    let stats = publisher.run(room).await.map_err(AppError::from)?;
    Ok(stats)
}
