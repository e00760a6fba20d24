// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Double-buffered hand-off between a camera's delivery thread and the
//! render loop.
//!
//! The camera pushes frames whenever it likes; the renderer pulls the newest
//! one when it is ready to draw. At most two camera buffers are kept: one
//! *ready* (delivered, not yet pulled) and one *held* (pulled, not yet
//! returned). A frame arriving while another is still ready replaces it and
//! the stale buffer goes straight back to the camera, so delivery never waits
//! on the consumer.

use crate::{
    camera::{BufferDesc, Camera, FrameSink, StreamEvent},
    error::{Error, Result},
};
use parking_lot::{Condvar, Mutex};
use std::{
    sync::{Arc, Weak},
    time::Duration,
};
use tracing::{debug, error, info, trace, warn};

/// Frames requested from the camera: one held, one ready and one being
/// captured.
const FRAMES_IN_FLIGHT: u32 = 3;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StreamState {
    Stopped,
    Running,
    Stopping,
}

/// Snapshot of the slot bookkeeping.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SlotState {
    pub ready: Option<usize>,
    pub held: Option<usize>,
}

struct Slots {
    state: StreamState,
    ready: Option<usize>,
    held: Option<usize>,
    buffers: [Option<BufferDesc>; 2],
}

pub struct StreamHandler {
    camera: Mutex<Option<Arc<dyn Camera>>>,
    slots: Mutex<Slots>,
    signal: Condvar,
    this: Weak<StreamHandler>,
}

impl StreamHandler {
    /// Wraps an opened camera. The stream is not started.
    pub fn new(camera: Arc<dyn Camera>) -> Arc<Self> {
        if let Err(e) = camera.set_max_frames_in_flight(FRAMES_IN_FLIGHT) {
            warn!(camera = camera.id(), "could not reserve frames in flight: {e}");
        }
        Arc::new_cyclic(|this| Self {
            camera: Mutex::new(Some(camera)),
            slots: Mutex::new(Slots {
                state: StreamState::Stopped,
                ready: None,
                held: None,
                buffers: [None, None],
            }),
            signal: Condvar::new(),
            this: this.clone(),
        })
    }

    fn camera(&self) -> Option<Arc<dyn Camera>> {
        self.camera.lock().clone()
    }

    /// Asks the camera to start delivering frames to this handler.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Stream`] when the stream is not stopped, the camera has
    /// been released, or the camera rejects the request.
    pub fn start_stream(&self) -> Result<()> {
        let camera = self
            .camera()
            .ok_or_else(|| Error::Stream("camera has been released".into()))?;
        let sink: Arc<dyn FrameSink> = self
            .this
            .upgrade()
            .ok_or_else(|| Error::Stream("stream handler is being dropped".into()))?;

        {
            let mut slots = self.slots.lock();
            if slots.state != StreamState::Stopped {
                return Err(Error::Stream(format!(
                    "cannot start stream on {} while {:?}",
                    camera.id(),
                    slots.state
                )));
            }
            slots.state = StreamState::Running;
        }

        // The camera may deliver from inside this call, so the slot lock is
        // not held across it.
        if let Err(e) = camera.start_video_stream(sink) {
            self.slots.lock().state = StreamState::Stopped;
            self.signal.notify_all();
            return Err(Error::Stream(format!(
                "{} rejected stream start: {e}",
                camera.id()
            )));
        }
        debug!(camera = camera.id(), "stream started");
        Ok(())
    }

    /// Requests the camera to stop without waiting for the terminal frame.
    pub fn async_stop_stream(&self) {
        {
            let mut slots = self.slots.lock();
            if slots.state == StreamState::Running {
                slots.state = StreamState::Stopping;
            }
        }
        if let Some(camera) = self.camera() {
            camera.stop_video_stream();
        }
    }

    /// Requests the camera to stop and waits until the terminal frame arrives.
    pub fn blocking_stop_stream(&self) {
        self.async_stop_stream();
        let mut slots = self.slots.lock();
        self.signal
            .wait_while(&mut slots, |s| s.state != StreamState::Stopped);
    }

    /// Stops the stream, hands any frames back and releases the camera.
    pub fn shutdown(&self) {
        self.blocking_stop_stream();

        let leftovers: Vec<BufferDesc> = {
            let mut slots = self.slots.lock();
            slots.ready = None;
            slots.held = None;
            slots.buffers.iter_mut().filter_map(Option::take).collect()
        };
        let camera = self.camera.lock().take();
        if let Some(camera) = camera {
            for frame in leftovers {
                camera.done_with_frame(frame);
            }
            debug!(camera = camera.id(), "stream handler released camera");
        }
    }

    pub fn state(&self) -> StreamState {
        self.slots.lock().state
    }

    pub fn is_running(&self) -> bool {
        self.state() == StreamState::Running
    }

    pub fn slot_state(&self) -> SlotState {
        let slots = self.slots.lock();
        SlotState {
            ready: slots.ready,
            held: slots.held,
        }
    }

    /// Returns true when a delivered frame is waiting to be pulled.
    pub fn new_frame_available(&self) -> bool {
        self.slots.lock().ready.is_some()
    }

    /// Waits up to `timeout` for a frame to become ready.
    ///
    /// Returns early with `false` once the stream has stopped.
    pub fn wait_for_frame(&self, timeout: Duration) -> bool {
        let mut slots = self.slots.lock();
        self.signal.wait_while_for(
            &mut slots,
            |s| s.ready.is_none() && s.state != StreamState::Stopped,
            timeout,
        );
        slots.ready.is_some()
    }

    /// Moves the ready frame into the held slot and returns it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProtocolViolation`] when a frame is already held or no
    /// frame is ready.
    pub fn get_new_frame(&self) -> Result<BufferDesc> {
        let mut slots = self.slots.lock();
        if let Some(held) = slots.held {
            error!(slot = held, "new frame requested while still holding the old one");
            return Err(Error::ProtocolViolation(
                "new frame requested while still holding the previous one".into(),
            ));
        }
        let Some(ready) = slots.ready.take() else {
            error!("new frame requested but none is ready");
            return Err(Error::ProtocolViolation(
                "new frame requested but none is ready".into(),
            ));
        };
        slots.held = Some(ready);
        match &slots.buffers[ready] {
            Some(frame) => Ok(frame.clone()),
            None => Err(Error::Stream(format!("ready slot {ready} is empty"))),
        }
    }

    /// Returns the held frame to the camera.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProtocolViolation`] when `frame` is not the held frame;
    /// the held slot is left untouched.
    pub fn done_with_frame(&self, frame: &BufferDesc) -> Result<()> {
        let returned = {
            let mut slots = self.slots.lock();
            let held = slots
                .held
                .filter(|&i| {
                    slots.buffers[i]
                        .as_ref()
                        .is_some_and(|b| b.buffer_id == frame.buffer_id)
                })
                .ok_or_else(|| {
                    error!(buffer = frame.buffer_id, "returned frame is not the held frame");
                    Error::ProtocolViolation(format!(
                        "buffer {} is not the held frame",
                        frame.buffer_id
                    ))
                })?;
            slots.held = None;
            slots.buffers[held].take()
        };

        if let (Some(frame), Some(camera)) = (returned, self.camera()) {
            camera.done_with_frame(frame);
        }
        Ok(())
    }
}

impl FrameSink for StreamHandler {
    fn deliver_frame(&self, frame: Option<BufferDesc>) {
        let stale = {
            let mut slots = self.slots.lock();
            match frame {
                None => {
                    slots.state = StreamState::Stopped;
                    debug!("end of stream received");
                    None
                }
                Some(frame) => {
                    trace!(buffer = frame.buffer_id, "frame delivered");
                    let (slot, stale) = match (slots.ready, slots.held) {
                        // Reuse the ready slot; its frame was never displayed.
                        (Some(ready), _) => (ready, slots.buffers[ready].take()),
                        (None, Some(held)) => (1 - held, None),
                        (None, None) => (0, None),
                    };
                    slots.buffers[slot] = Some(frame);
                    slots.ready = Some(slot);
                    stale
                }
            }
        };
        self.signal.notify_all();

        if let Some(stale) = stale {
            trace!(buffer = stale.buffer_id, "dropping undisplayed frame");
            if let Some(camera) = self.camera() {
                camera.done_with_frame(stale);
            }
        }
    }

    fn notify(&self, event: StreamEvent) {
        match event {
            StreamEvent::StreamStopped => {
                self.slots.lock().state = StreamState::Stopped;
                self.signal.notify_all();
                info!("received stream stopped event");
            }
            other => debug!(?other, "ignoring stream event"),
        }
    }
}
