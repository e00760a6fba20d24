// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for the EdgeFirst Exterior View System.
///
/// Arguments can be specified via command line or environment variables.
///
/// # Example
///
/// ```bash
/// # Via command line
/// edgefirst-evs --config /etc/evs/config.json --display-size 1920 1080
///
/// # Via environment variables
/// export EVS_CONFIG=/etc/evs/config.json
/// export NO_GPU=true
/// edgefirst-evs
/// ```
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Camera layout configuration (JSON). The built-in four camera surround
    /// layout is used when omitted.
    #[arg(short, long, env = "EVS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Display resolution in pixels (width height), overrides the
    /// configuration file
    #[arg(long, env = "DISPLAY_SIZE", value_delimiter = ' ', num_args = 2)]
    pub display_size: Option<Vec<u32>>,

    /// Treat the GPU render path as unavailable (CPU pixel copy only)
    #[arg(long, env = "NO_GPU")]
    pub no_gpu: bool,

    /// Simulated camera frame rate
    #[arg(long, env = "CAMERA_FPS", default_value = "30")]
    pub camera_fps: u32,

    /// Interval between vehicle state checks in milliseconds
    #[arg(long, env = "POLL_INTERVAL", default_value = "100")]
    pub poll_interval: u64,

    /// Seconds the demo vehicle stays in reverse before shifting to drive
    #[arg(long, env = "DEMO_REVERSE_SECS", default_value = "20")]
    pub demo_reverse_secs: u64,

    /// Enable verbose debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Send logs to the systemd journal
    #[arg(long, env = "JOURNALD")]
    pub journald: bool,

    /// Enable Tokio async runtime console for debugging
    #[arg(long, env = "TOKIO_CONSOLE")]
    pub tokio_console: bool,

    /// Enable Tracy profiler for performance analysis
    #[arg(long, env = "TRACY")]
    pub tracy: bool,
}

impl Args {
    /// Display size from the command line, if both values were given.
    pub fn display_size(&self) -> Option<(u32, u32)> {
        match self.display_size.as_deref() {
            Some([width, height]) => Some((*width, *height)),
            _ => None,
        }
    }
}
