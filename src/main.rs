// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use args::Args;
use clap::Parser;
use edgefirst_evs::{
    config::{Config, DisplayConfig},
    sim::{DemoVehicle, SimDisplay, SimEnumerator},
    state::{Command, StateController},
};
use std::{error::Error, process, sync::Arc, time::Duration};
use tracing::{error, info};
use tracing_subscriber::{filter::LevelFilter, layer::SubscriberExt, Layer, Registry};

mod args;

fn init_tracing(args: &Args) -> Result<(), Box<dyn Error>> {
    let level = if args.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    let stdout = tracing_subscriber::fmt::layer().with_filter(level);

    let journald = if args.journald {
        match tracing_journald::layer() {
            Ok(layer) => Some(layer.with_filter(level)),
            Err(e) => {
                eprintln!("journald logging unavailable: {e}");
                None
            }
        }
    } else {
        None
    };

    let console = if args.tokio_console {
        Some(console_subscriber::spawn())
    } else {
        None
    };

    let tracy = if args.tracy {
        tracy_client::Client::start();
        Some(tracing_tracy::TracyLayer::default())
    } else {
        None
    };

    let subscriber = Registry::default()
        .with(stdout)
        .with(journald)
        .with(console)
        .with(tracy);
    tracing::subscriber::set_global_default(subscriber)?;
    tracing_log::LogTracer::init()?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_tracing(&args)?;

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::surround(),
    };
    if let Some((width, height)) = args.display_size() {
        config.display = DisplayConfig { width, height };
        config.validate()?;
    }
    info!(
        cameras = config.cameras.len(),
        width = config.display.width,
        height = config.display.height,
        gpu = !args.no_gpu,
        "EdgeFirst Exterior View System"
    );

    let enumerator = Arc::new(SimEnumerator::new(
        config.cameras.iter().map(|c| c.camera_id.clone()),
        args.camera_fps,
    ));
    let screen = Arc::new(SimDisplay::new(config.display.width, config.display.height));
    let vehicle = Arc::new(DemoVehicle::new(Duration::from_secs(
        args.demo_reverse_secs,
    )));

    let gpu = !args.no_gpu;
    let controller =
        StateController::new(vehicle, enumerator, screen.clone(), move || gpu, &config)?;
    let commands = controller.command_sender();

    let mut control = tokio::task::spawn_blocking(move || {
        let mut controller = controller;
        controller.run()
    });
    let mut ticker = tokio::time::interval(Duration::from_millis(args.poll_interval.max(1)));

    loop {
        tokio::select! {
            result = &mut control => {
                let frames = screen.frames_shown();
                info!(frames, "display frames shown");
                if let Err(e) = result? {
                    // A supervisor is expected to restart the whole pipeline.
                    error!("shutting down after control loop failure: {e}");
                    process::exit(1);
                }
                return Ok(());
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, stopping control loop");
                commands.post_command(Command::Exit);
            }
            _ = ticker.tick() => {
                commands.post_command(Command::CheckVehicleState);
            }
        }
    }
}
