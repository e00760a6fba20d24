// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! # EdgeFirst Exterior View System
//!
//! This library selects, activates and renders the surround and rear-view
//! camera views of a vehicle. It reacts to the gear selection and turn
//! signal, opens the cameras assigned to the resulting view and streams their
//! frames into display buffers without blocking the camera driver or growing
//! memory.
//!
//! ## Components
//!
//! - **[`stream::StreamHandler`]**: double-buffered hand-off between a camera's
//!   delivery thread and the render loop.
//! - **[`state::StateController`]**: the control loop. Maps vehicle signals to
//!   a [`state::ViewState`] and swaps renderers when the view changes.
//! - **[`render`]**: the renderers, a full screen direct view, a CPU pixel
//!   copy used before graphics are up, and a composited top view.
//! - **[`sim`]**: simulated camera, display and vehicle services.
//!
//! The camera, display and vehicle services are reached through the traits
//! in [`camera`], [`display`] and [`vehicle`].
//!
//! ## Example
//!
//! ```no_run
//! use edgefirst_evs::{
//!     config::Config,
//!     sim::{ScriptedVehicle, SimDisplay, SimEnumerator},
//!     state::{Command, StateController},
//!     vehicle::{Gear, TurnSignal},
//! };
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let vehicle = Arc::new(ScriptedVehicle::new(Gear::Reverse, TurnSignal::None));
//! let cameras = Arc::new(SimEnumerator::new(["rear", "left", "right", "front"], 30));
//! let display = Arc::new(SimDisplay::new(1280, 720));
//!
//! let controller =
//!     StateController::new(vehicle, cameras, display, || true, &Config::surround())?;
//! let commands = controller.command_sender();
//! let handle = controller.start_update_loop()?;
//!
//! commands.post_command(Command::Exit);
//! handle.join().expect("control loop panicked")?;
//! # Ok(())
//! # }
//! ```

pub mod camera;
pub mod config;
pub mod display;
pub mod error;
pub mod image;
pub mod render;
pub mod sim;
pub mod state;
pub mod stream;
pub mod vehicle;

pub use error::{Error, Result};
