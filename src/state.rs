// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! View selection and the render control loop.
//!
//! [`StateController`] owns the active [`Renderer`]. Every tick it reads the
//! gear and turn signal, works out which view the driver should see and, if
//! that differs from what is on screen, tears the old renderer down before
//! building the new one. While a renderer is active the loop draws one frame
//! per tick; while the display is off it sleeps until a [`Command`] arrives.

use crate::{
    camera::CameraEnumerator,
    config::{CameraEntry, Config, ViewMap},
    display::{Display, DisplayState},
    error::{Error, Result},
    render::{DirectView, PixelCopy, Renderer, RendererKind, TopView},
    vehicle::{Gear, TurnSignal, VehicleProperty, VehicleSignals, VehicleSnapshot},
};
use std::{
    sync::Arc,
    thread::{self, JoinHandle},
};
use tracing::{debug, error, info, instrument, warn};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ViewState {
    Off,
    Reverse,
    Left,
    Right,
    Parking,
}

impl ViewState {
    /// Chooses the view for a vehicle snapshot.
    ///
    /// Reverse gear wins over the turn signals, right over left, and parking
    /// is only shown when nothing else applies.
    pub fn from_vehicle(snapshot: VehicleSnapshot) -> Self {
        if snapshot.gear == Gear::Reverse {
            ViewState::Reverse
        } else if snapshot.turn_signal == TurnSignal::Right {
            ViewState::Right
        } else if snapshot.turn_signal == TurnSignal::Left {
            ViewState::Left
        } else if snapshot.gear == Gear::Park {
            ViewState::Parking
        } else {
            ViewState::Off
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Exit,
    CheckVehicleState,
    TouchEvent { x: i32, y: i32 },
}

/// Handle for posting commands to a running control loop.
#[derive(Clone)]
pub struct CommandSender {
    tx: kanal::Sender<Command>,
}

impl CommandSender {
    /// Queues `cmd` and wakes the loop if it is idle. Never blocks.
    ///
    /// Returns false once the control loop has gone away.
    pub fn post_command(&self, cmd: Command) -> bool {
        match self.tx.send(cmd) {
            Ok(()) => true,
            Err(e) => {
                debug!(?cmd, "control loop is gone: {e}");
                false
            }
        }
    }
}

/// Reports whether the GPU render path can be used yet.
pub trait GraphicsProbe: Send {
    fn is_ready(&self) -> bool;
}

impl<F> GraphicsProbe for F
where
    F: Fn() -> bool + Send,
{
    fn is_ready(&self) -> bool {
        self()
    }
}

pub struct StateController {
    vehicle: Arc<dyn VehicleSignals>,
    enumerator: Arc<dyn CameraEnumerator>,
    display: Arc<dyn Display>,
    graphics: Box<dyn GraphicsProbe>,
    gpu_ready: bool,
    views: ViewMap,
    turn_signal_supported: bool,
    restarted: bool,
    current_state: ViewState,
    current_renderer: Option<Box<dyn Renderer>>,
    commands: kanal::Receiver<Command>,
    sender: kanal::Sender<Command>,
}

impl StateController {
    /// Builds the view map from the cameras the camera service reports.
    pub fn new(
        vehicle: Arc<dyn VehicleSignals>,
        enumerator: Arc<dyn CameraEnumerator>,
        display: Arc<dyn Display>,
        graphics: impl GraphicsProbe + 'static,
        config: &Config,
    ) -> Result<Self> {
        debug!("requesting camera list");
        let cameras = enumerator.camera_list()?;
        info!(cameras = cameras.len(), "camera list received");
        let views = ViewMap::build(config, &cameras);
        Ok(Self::with_views(
            vehicle, enumerator, display, graphics, views,
        ))
    }

    pub fn with_views(
        vehicle: Arc<dyn VehicleSignals>,
        enumerator: Arc<dyn CameraEnumerator>,
        display: Arc<dyn Display>,
        graphics: impl GraphicsProbe + 'static,
        views: ViewMap,
    ) -> Self {
        let (sender, commands) = kanal::unbounded();
        Self {
            vehicle,
            enumerator,
            display,
            graphics: Box::new(graphics),
            gpu_ready: false,
            views,
            turn_signal_supported: true,
            restarted: false,
            current_state: ViewState::Off,
            current_renderer: None,
            commands,
            sender,
        }
    }

    pub fn command_sender(&self) -> CommandSender {
        CommandSender {
            tx: self.sender.clone(),
        }
    }

    pub fn post_command(&self, cmd: Command) -> bool {
        self.command_sender().post_command(cmd)
    }

    pub fn current_state(&self) -> ViewState {
        self.current_state
    }

    pub fn current_renderer_kind(&self) -> Option<RendererKind> {
        self.current_renderer.as_ref().map(|r| r.kind())
    }

    pub fn views(&self) -> &ViewMap {
        &self.views
    }

    /// Runs the control loop on a dedicated thread.
    pub fn start_update_loop(mut self) -> Result<JoinHandle<Result<()>>> {
        let handle = thread::Builder::new()
            .name("evs-state".into())
            .spawn(move || self.run())?;
        Ok(handle)
    }

    /// Runs the control loop on the calling thread until [`Command::Exit`] or
    /// a fatal error.
    pub fn run(&mut self) -> Result<()> {
        info!("starting state control loop");
        let result = self.update_loop();
        if let Some(mut renderer) = self.current_renderer.take() {
            renderer.deactivate();
        }
        match &result {
            Ok(()) => info!("state control loop ending"),
            Err(e) => error!("state control loop failed: {e}"),
        }
        result
    }

    fn update_loop(&mut self) -> Result<()> {
        loop {
            while let Ok(Some(cmd)) = self.commands.try_recv() {
                if !self.handle_command(cmd) {
                    return Ok(());
                }
            }

            self.select_state_for_current_conditions()?;

            if self.current_renderer.is_some() {
                self.render_frame()?;
            } else {
                // Nothing to draw, so sleep until somebody posts a command.
                match self.commands.recv() {
                    Ok(cmd) => {
                        if !self.handle_command(cmd) {
                            return Ok(());
                        }
                    }
                    Err(e) => {
                        warn!("command queue closed: {e}");
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Returns false when the loop should stop.
    fn handle_command(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::Exit => {
                debug!("exit requested");
                false
            }
            // The vehicle state is read on every tick anyway.
            Command::CheckVehicleState => true,
            Command::TouchEvent { x, y } => {
                debug!(x, y, "touch event ignored");
                true
            }
        }
    }

    /// Reads the gear and turn signal.
    ///
    /// # Errors
    ///
    /// A failed gear read is fatal. A failed turn signal read is treated as
    /// no signal and the property is not queried again.
    pub fn read_vehicle_state(&mut self) -> Result<VehicleSnapshot> {
        let gear = self
            .vehicle
            .get(VehicleProperty::GearSelection)
            .map_err(|status| {
                error!(?status, "gear selection not available from vehicle");
                Error::Vehicle {
                    property: VehicleProperty::GearSelection,
                    status,
                }
            })?;

        let turn_signal = if self.turn_signal_supported {
            match self.vehicle.get(VehicleProperty::TurnSignalState) {
                Ok(value) => TurnSignal::from(value),
                Err(status) => {
                    info!(?status, "turn signal not available, assuming none");
                    self.turn_signal_supported = false;
                    TurnSignal::None
                }
            }
        } else {
            TurnSignal::None
        };

        Ok(VehicleSnapshot::new(Gear::from(gear), turn_signal))
    }

    /// Reads the vehicle and applies the resulting view.
    ///
    /// Only vehicle failures are returned; a view that fails to activate is
    /// logged and leaves the display off.
    pub fn select_state_for_current_conditions(&mut self) -> Result<ViewState> {
        let snapshot = self.read_vehicle_state()?;
        let desired = ViewState::from_vehicle(snapshot);
        if let Err(e) = self.configure_view(desired) {
            warn!(?desired, "view not available: {e}");
        }
        Ok(desired)
    }

    /// Switches the pipeline to `desired`. Does nothing if already there.
    ///
    /// # Errors
    ///
    /// Returns the activation error of the new renderer. The view is still
    /// recorded as current, with no renderer and the display turned off.
    pub fn configure_view(&mut self, desired: ViewState) -> Result<()> {
        if desired == self.current_state {
            return Ok(());
        }
        self.restarted = false;
        self.apply_view(desired)
    }

    #[instrument(skip(self), fields(current = ?self.current_state))]
    fn apply_view(&mut self, desired: ViewState) -> Result<()> {
        let cameras = self.views.cameras(desired).to_vec();
        debug!(cameras = cameras.len(), "switching view");

        let next = self.build_renderer(desired, cameras);

        // The next renderer may need the same cameras.
        if let Some(mut current) = self.current_renderer.take() {
            current.deactivate();
        }
        self.current_state = desired;

        let Some(mut renderer) = next else {
            debug!("turning off the display");
            self.set_display_state(DisplayState::NotVisible);
            return Ok(());
        };

        if let Err(e) = renderer.activate() {
            error!(kind = ?renderer.kind(), "new renderer failed to activate: {e}");
            drop(renderer);
            self.set_display_state(DisplayState::NotVisible);
            return Err(e);
        }

        self.set_display_state(DisplayState::VisibleOnNextFrame);
        info!(kind = ?renderer.kind(), "activated view");
        self.current_renderer = Some(renderer);
        Ok(())
    }

    fn build_renderer(
        &mut self,
        desired: ViewState,
        mut cameras: Vec<CameraEntry>,
    ) -> Option<Box<dyn Renderer>> {
        if desired == ViewState::Off || cameras.is_empty() {
            return None;
        }
        let enumerator = self.enumerator.clone();
        if cameras.len() > 1 || desired == ViewState::Parking {
            return Some(Box::new(TopView::new(enumerator, cameras)));
        }
        let camera = cameras.remove(0);
        if self.gpu_available() {
            let guide_lines = desired == ViewState::Reverse;
            Some(Box::new(DirectView::new(enumerator, camera, guide_lines)))
        } else {
            debug!("graphics not ready, using pixel copy");
            Some(Box::new(PixelCopy::new(enumerator, camera)))
        }
    }

    /// Once the GPU path has been seen ready it is assumed to stay ready.
    fn gpu_available(&mut self) -> bool {
        if !self.gpu_ready && self.graphics.is_ready() {
            debug!("graphics ready");
            self.gpu_ready = true;
        }
        self.gpu_ready
    }

    fn set_display_state(&self, state: DisplayState) {
        if let Err(e) = self.display.set_display_state(state) {
            warn!(?state, "display refused state change: {e}");
        }
    }

    fn render_frame(&mut self) -> Result<()> {
        let Some(renderer) = self.current_renderer.as_mut() else {
            return Ok(());
        };

        let Some(mut buffer) = self.display.get_target_buffer() else {
            warn!("no output buffer available, skipping frame");
            return Ok(());
        };
        if !buffer.is_valid() {
            warn!(buffer = buffer.buffer_id, "invalid output buffer, skipping frame");
            // Hand it back undrawn so the display can lend it again.
            if let Err(e) = self.display.return_target_buffer_for_display(buffer) {
                warn!("display rejected invalid buffer: {e}");
            }
            return Ok(());
        }
        let Some(target) = buffer.image.as_mut() else {
            return Ok(());
        };

        let drawn = renderer.draw_frame(target);
        let kind = renderer.kind();
        let streaming = renderer.is_streaming();
        if let Err(e) = self.display.return_target_buffer_for_display(buffer) {
            warn!("display rejected frame: {e}");
        }
        drawn.map_err(|e| Error::Render(format!("{kind:?} failed to draw: {e}")))?;

        if streaming {
            return Ok(());
        }

        // The camera went away underneath an unchanged view. It is rebuilt
        // once per view; a second loss leaves the view dark until it changes.
        let state = self.current_state;
        if self.restarted {
            error!(?kind, ?state, "stream stopped again after restart, releasing view");
            if let Some(mut renderer) = self.current_renderer.take() {
                renderer.deactivate();
            }
            self.set_display_state(DisplayState::NotVisible);
        } else {
            warn!(?kind, ?state, "stream stopped unexpectedly, restarting view");
            self.restarted = true;
            if let Err(e) = self.apply_view(state) {
                warn!("could not restart view: {e}");
            }
        }
        Ok(())
    }
}

impl Drop for StateController {
    fn drop(&mut self) {
        if let Some(mut renderer) = self.current_renderer.take() {
            renderer.deactivate();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(gear: Gear, turn_signal: TurnSignal) -> ViewState {
        ViewState::from_vehicle(VehicleSnapshot::new(gear, turn_signal))
    }

    #[test]
    fn precedence() {
        assert_eq!(view(Gear::Reverse, TurnSignal::Left), ViewState::Reverse);
        assert_eq!(view(Gear::Park, TurnSignal::Right), ViewState::Right);
        assert_eq!(view(Gear::Drive, TurnSignal::Left), ViewState::Left);
        assert_eq!(view(Gear::Park, TurnSignal::None), ViewState::Parking);
        assert_eq!(view(Gear::Neutral, TurnSignal::None), ViewState::Off);
        assert_eq!(view(Gear::Other(0x10), TurnSignal::None), ViewState::Off);
    }
}
