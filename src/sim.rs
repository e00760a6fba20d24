// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Simulated camera, display and vehicle services.
//!
//! These stand in for the real services on development hosts and in tests.
//! The simulated camera produces a moving test pattern on its own delivery
//! thread and, like a real driver, skips frames when the client holds too
//! many buffers.

use crate::{
    camera::{
        BufferDesc, Camera, CameraDesc, CameraEnumerator, CameraMetadata, FrameSink,
        StreamConfig, DIRECTION_OUTPUT,
    },
    display::{Display, DisplayState, TargetBuffer},
    error::{Error, Result},
    image::{FourCC, Image, RGB3, RGBA, RGBX, YUYV},
    vehicle::{Gear, StatusCode, TurnSignal, VehicleProperty, VehicleSignals},
};
use parking_lot::Mutex;
use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};
use tracing::{debug, info, trace, warn};

/// Largest number of buffers a simulated camera will lend out at once.
pub const MAX_BUFFERS_IN_FLIGHT: u32 = 8;

/// Streams a simulated camera advertises in its metadata.
pub fn sim_stream_configs() -> Vec<StreamConfig> {
    [(640, 480, 30), (1280, 720, 30), (1920, 1080, 10)]
        .into_iter()
        .enumerate()
        .map(|(id, (width, height, frame_rate))| StreamConfig {
            id: id as i32,
            width,
            height,
            format: RGB3,
            direction: DIRECTION_OUTPUT,
            frame_rate,
        })
        .collect()
}

/// Renders a vertical bar that moves a few pixels per frame.
pub fn test_pattern(width: u32, height: u32, format: FourCC, sequence: u64) -> Result<Image> {
    let mut image = Image::new(width, height, format)?;
    let bar = ((sequence * 8) % width.max(1) as u64) as u32;
    let data = image.as_slice_mut();
    for y in 0..height as usize {
        for x in 0..width as usize {
            let lit = (x as u32).abs_diff(bar) < 16;
            let level = if lit { 0xeb } else { (y * 0xff / height as usize) as u8 };
            match format {
                YUYV => {
                    let i = (y * width as usize + x) * 2;
                    data[i] = level;
                    data[i + 1] = 0x80;
                }
                RGB3 => {
                    let i = (y * width as usize + x) * 3;
                    data[i..i + 3].copy_from_slice(&[level, level, if lit { 0 } else { level }]);
                }
                RGBA | RGBX => {
                    let i = (y * width as usize + x) * 4;
                    data[i..i + 4].copy_from_slice(&[level, level, level, 0xff]);
                }
                other => return Err(Error::UnsupportedFormat(other)),
            }
        }
    }
    Ok(image)
}

struct CameraShared {
    frames_allowed: u32,
    in_flight: HashSet<u32>,
}

/// Simulated camera delivering a test pattern.
pub struct SimCamera {
    id: String,
    width: u32,
    height: u32,
    format: FourCC,
    frame_interval: Duration,
    shared: Arc<Mutex<CameraShared>>,
    streaming: Arc<AtomicBool>,
}

impl SimCamera {
    pub fn new(id: impl Into<String>, width: u32, height: u32, format: FourCC, fps: u32) -> Self {
        Self {
            id: id.into(),
            width,
            height,
            format,
            frame_interval: Duration::from_secs(1) / fps.max(1),
            shared: Arc::new(Mutex::new(CameraShared {
                frames_allowed: 1,
                in_flight: HashSet::new(),
            })),
            streaming: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn frames_in_flight(&self) -> usize {
        self.shared.lock().in_flight.len()
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::Acquire)
    }

    /// Drops the stream as if the device disappeared.
    pub fn disconnect(&self) {
        warn!(camera = %self.id, "simulating camera disconnect");
        self.streaming.store(false, Ordering::Release);
    }
}

impl Camera for SimCamera {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_max_frames_in_flight(&self, count: u32) -> Result<()> {
        if count == 0 {
            return Err(Error::Camera("at least one buffer is required".into()));
        }
        if count > MAX_BUFFERS_IN_FLIGHT {
            return Err(Error::Camera(format!(
                "{count} buffers requested, at most {MAX_BUFFERS_IN_FLIGHT} available"
            )));
        }
        self.shared.lock().frames_allowed = count;
        Ok(())
    }

    fn start_video_stream(&self, sink: Arc<dyn FrameSink>) -> Result<()> {
        if self.streaming.swap(true, Ordering::AcqRel) {
            return Err(Error::Camera(format!("{} is already streaming", self.id)));
        }
        let shared = self.shared.clone();
        let streaming = self.streaming.clone();
        let (id, width, height, format, interval) = (
            self.id.clone(),
            self.width,
            self.height,
            self.format,
            self.frame_interval,
        );

        let spawned = thread::Builder::new()
            .name(format!("sim-{id}"))
            .spawn(move || {
                let mut sequence = 0u64;
                while streaming.load(Ordering::Acquire) {
                    thread::sleep(interval);
                    let buffer_id = {
                        let mut shared = shared.lock();
                        let free = (0..shared.frames_allowed)
                            .find(|i| !shared.in_flight.contains(i));
                        if let Some(i) = free {
                            shared.in_flight.insert(i);
                        }
                        free
                    };
                    let Some(buffer_id) = buffer_id else {
                        trace!(camera = %id, "skipped a frame, too many in flight");
                        continue;
                    };
                    match test_pattern(width, height, format, sequence) {
                        Ok(image) => {
                            sink.deliver_frame(Some(BufferDesc::new(buffer_id, Arc::new(image))))
                        }
                        Err(e) => {
                            warn!(camera = %id, "cannot render test pattern: {e}");
                            shared.lock().in_flight.remove(&buffer_id);
                            break;
                        }
                    }
                    sequence += 1;
                }
                streaming.store(false, Ordering::Release);
                sink.deliver_frame(None);
                debug!(camera = %id, frames = sequence, "delivery thread finished");
            });

        if let Err(e) = spawned {
            self.streaming.store(false, Ordering::Release);
            return Err(e.into());
        }
        Ok(())
    }

    fn stop_video_stream(&self) {
        self.streaming.store(false, Ordering::Release);
    }

    fn done_with_frame(&self, frame: BufferDesc) {
        if !self.shared.lock().in_flight.remove(&frame.buffer_id) {
            warn!(camera = %self.id, buffer = frame.buffer_id, "returned buffer was not in flight");
        }
    }
}

/// Camera service backed by [`SimCamera`]s.
///
/// Each camera can be open by one client at a time.
pub struct SimEnumerator {
    cameras: Vec<CameraDesc>,
    fps: u32,
    resolution: Option<(u32, u32)>,
    open: Mutex<Vec<Arc<SimCamera>>>,
    opened: AtomicUsize,
}

impl SimEnumerator {
    pub fn new<I, S>(ids: I, fps: u32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let metadata = CameraMetadata::from_configs(&sim_stream_configs());
        Self {
            cameras: ids
                .into_iter()
                .map(|id| CameraDesc::new(id, metadata.clone()))
                .collect(),
            fps,
            resolution: None,
            open: Mutex::new(Vec::new()),
            opened: AtomicUsize::new(0),
        }
    }

    /// Makes every camera deliver `width` x `height` frames whatever stream
    /// size is requested, like a sensor with a single mode.
    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.resolution = Some((width, height));
        self
    }

    /// Cameras currently open.
    pub fn open_cameras(&self) -> Vec<Arc<SimCamera>> {
        self.open.lock().clone()
    }

    /// Total number of successful opens.
    pub fn open_count(&self) -> usize {
        self.opened.load(Ordering::Relaxed)
    }
}

impl CameraEnumerator for SimEnumerator {
    fn camera_list(&self) -> Result<Vec<CameraDesc>> {
        Ok(self.cameras.clone())
    }

    fn open_camera(
        &self,
        camera_id: &str,
        config: Option<&StreamConfig>,
    ) -> Result<Arc<dyn Camera>> {
        if !self.cameras.iter().any(|c| c.id == camera_id) {
            return Err(Error::Camera(format!("no camera named {camera_id}")));
        }
        let mut open = self.open.lock();
        if open.iter().any(|c| c.id() == camera_id) {
            return Err(Error::Camera(format!("{camera_id} is already open")));
        }
        let (width, height, format) = match config {
            Some(cfg) => (cfg.width as u32, cfg.height as u32, cfg.format),
            None => (640, 480, YUYV),
        };
        let (width, height) = self.resolution.unwrap_or((width, height));
        let camera = Arc::new(SimCamera::new(camera_id, width, height, format, self.fps));
        open.push(camera.clone());
        self.opened.fetch_add(1, Ordering::Relaxed);
        info!(camera = camera_id, width, height, %format, "camera opened");
        Ok(camera)
    }

    fn close_camera(&self, camera: Arc<dyn Camera>) {
        camera.stop_video_stream();
        self.open.lock().retain(|c| c.id() != camera.id());
        info!(camera = camera.id(), "camera closed");
    }
}

struct DisplayInner {
    state: DisplayState,
    next_buffer: u32,
    lent: Option<u32>,
    frames_shown: u64,
    last_frame: Option<Image>,
    last_vsync: Option<Instant>,
}

/// Refresh period of the simulated panel.
pub const DISPLAY_REFRESH: Duration = Duration::from_micros(16_667);

/// Display with a single target buffer that keeps the last frame shown.
///
/// Returning a buffer blocks until the next refresh, like a swap with vsync.
pub struct SimDisplay {
    width: u32,
    height: u32,
    inner: Mutex<DisplayInner>,
}

impl SimDisplay {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            inner: Mutex::new(DisplayInner {
                state: DisplayState::NotVisible,
                next_buffer: 0,
                lent: None,
                frames_shown: 0,
                last_frame: None,
                last_vsync: None,
            }),
        }
    }

    pub fn state(&self) -> DisplayState {
        self.inner.lock().state
    }

    pub fn frames_shown(&self) -> u64 {
        self.inner.lock().frames_shown
    }

    pub fn last_frame(&self) -> Option<Image> {
        self.inner.lock().last_frame.clone()
    }
}

impl Display for SimDisplay {
    fn get_target_buffer(&self) -> Option<TargetBuffer> {
        let mut inner = self.inner.lock();
        if inner.lent.is_some() {
            warn!("target buffer requested while the only buffer is lent out");
            return None;
        }
        let image = Image::new(self.width, self.height, RGBA).ok()?;
        let id = inner.next_buffer;
        inner.next_buffer = inner.next_buffer.wrapping_add(1);
        inner.lent = Some(id);
        Some(TargetBuffer::new(id, image))
    }

    fn return_target_buffer_for_display(&self, buffer: TargetBuffer) -> Result<()> {
        let wait = {
            let mut inner = self.inner.lock();
            if inner.lent != Some(buffer.buffer_id) {
                return Err(Error::Display(format!(
                    "buffer {} was not lent out",
                    buffer.buffer_id
                )));
            }
            inner.lent = None;
            if !buffer.is_valid() {
                debug!(buffer = buffer.buffer_id, "invalid buffer returned undrawn");
                return Ok(());
            }
            match inner.state {
                DisplayState::Dead => return Err(Error::Display("display ownership lost".into())),
                DisplayState::VisibleOnNextFrame => inner.state = DisplayState::Visible,
                DisplayState::Visible => {}
                _ => debug!("frame returned while not visible"),
            }
            inner.frames_shown += 1;
            inner.last_frame = buffer.image;

            let now = Instant::now();
            let next = inner
                .last_vsync
                .map_or(now, |last| (last + DISPLAY_REFRESH).max(now));
            inner.last_vsync = Some(next);
            next - now
        };
        if !wait.is_zero() {
            thread::sleep(wait);
        }
        Ok(())
    }

    fn set_display_state(&self, state: DisplayState) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.state == DisplayState::Dead {
            return Err(Error::Display("display ownership lost".into()));
        }
        debug!(?state, "display state");
        inner.state = state;
        Ok(())
    }
}

/// Vehicle whose signals are set directly.
pub struct ScriptedVehicle {
    gear: Mutex<Result<i32, StatusCode>>,
    turn_signal: Mutex<Result<i32, StatusCode>>,
    turn_signal_reads: AtomicUsize,
}

impl ScriptedVehicle {
    pub fn new(gear: Gear, turn_signal: TurnSignal) -> Self {
        Self {
            gear: Mutex::new(Ok(gear.value())),
            turn_signal: Mutex::new(Ok(turn_signal.value())),
            turn_signal_reads: AtomicUsize::new(0),
        }
    }

    pub fn set(&self, gear: Gear, turn_signal: TurnSignal) {
        *self.gear.lock() = Ok(gear.value());
        *self.turn_signal.lock() = Ok(turn_signal.value());
    }

    pub fn fail_gear(&self, status: StatusCode) {
        *self.gear.lock() = Err(status);
    }

    pub fn fail_turn_signal(&self, status: StatusCode) {
        *self.turn_signal.lock() = Err(status);
    }

    pub fn turn_signal_reads(&self) -> usize {
        self.turn_signal_reads.load(Ordering::Relaxed)
    }
}

impl VehicleSignals for ScriptedVehicle {
    fn get(&self, property: VehicleProperty) -> Result<i32, StatusCode> {
        match property {
            VehicleProperty::GearSelection => *self.gear.lock(),
            VehicleProperty::TurnSignalState => {
                self.turn_signal_reads.fetch_add(1, Ordering::Relaxed);
                *self.turn_signal.lock()
            }
        }
    }
}

/// Stand-in for a missing vehicle bus: reverse gear for a while after
/// start, then drive.
pub struct DemoVehicle {
    start: Instant,
    reverse_for: Duration,
}

impl DemoVehicle {
    pub fn new(reverse_for: Duration) -> Self {
        Self {
            start: Instant::now(),
            reverse_for,
        }
    }
}

impl VehicleSignals for DemoVehicle {
    fn get(&self, property: VehicleProperty) -> Result<i32, StatusCode> {
        match property {
            VehicleProperty::GearSelection if self.start.elapsed() < self.reverse_for => {
                Ok(Gear::Reverse.value())
            }
            VehicleProperty::GearSelection => Ok(Gear::Drive.value()),
            VehicleProperty::TurnSignalState => Ok(TurnSignal::None.value()),
        }
    }
}
