// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

#![allow(dead_code)]

use edgefirst_evs::{
    camera::{BufferDesc, Camera, FrameSink},
    error::{Error, Result},
    image::{self, Image},
};
use parking_lot::Mutex;
use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

/// Camera driven by the test: frames are pushed synchronously from the
/// calling thread and returned buffers are recorded.
pub struct ManualCamera {
    sink: Mutex<Option<Arc<dyn FrameSink>>>,
    returned: Mutex<Vec<u32>>,
    delivered: AtomicUsize,
    reject_start: AtomicBool,
    /// When set, stopping delivers the terminal frame straight away.
    terminate_on_stop: AtomicBool,
    stop_requests: AtomicUsize,
    image: Arc<Image>,
}

impl ManualCamera {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sink: Mutex::new(None),
            returned: Mutex::new(Vec::new()),
            delivered: AtomicUsize::new(0),
            reject_start: AtomicBool::new(false),
            terminate_on_stop: AtomicBool::new(true),
            stop_requests: AtomicUsize::new(0),
            image: Arc::new(Image::new(4, 4, image::RGB3).unwrap()),
        })
    }

    pub fn reject_start(&self) {
        self.reject_start.store(true, Ordering::SeqCst);
    }

    pub fn defer_terminal_frame(&self) {
        self.terminate_on_stop.store(false, Ordering::SeqCst);
    }

    /// Delivers buffer `id` through the registered sink.
    pub fn push(&self, id: u32) {
        let sink = self.sink.lock().clone();
        if let Some(sink) = sink {
            self.delivered.fetch_add(1, Ordering::SeqCst);
            sink.deliver_frame(Some(BufferDesc::new(id, self.image.clone())));
        }
    }

    /// Delivers the terminal frame and forgets the sink.
    pub fn end_stream(&self) {
        let sink = self.sink.lock().take();
        if let Some(sink) = sink {
            sink.deliver_frame(None);
        }
    }

    pub fn returned(&self) -> Vec<u32> {
        self.returned.lock().clone()
    }

    pub fn delivered(&self) -> usize {
        self.delivered.load(Ordering::SeqCst)
    }

    /// Buffers delivered and not yet handed back.
    pub fn outstanding(&self) -> usize {
        self.delivered() - self.returned.lock().len()
    }

    pub fn stop_requests(&self) -> usize {
        self.stop_requests.load(Ordering::SeqCst)
    }
}

impl Camera for ManualCamera {
    fn id(&self) -> &str {
        "manual"
    }

    fn set_max_frames_in_flight(&self, _count: u32) -> Result<()> {
        Ok(())
    }

    fn start_video_stream(&self, sink: Arc<dyn FrameSink>) -> Result<()> {
        if self.reject_start.load(Ordering::SeqCst) {
            return Err(Error::Camera("start rejected".into()));
        }
        *self.sink.lock() = Some(sink);
        Ok(())
    }

    fn stop_video_stream(&self) {
        self.stop_requests.fetch_add(1, Ordering::SeqCst);
        if self.terminate_on_stop.load(Ordering::SeqCst) {
            self.end_stream();
        }
    }

    fn done_with_frame(&self, frame: BufferDesc) {
        self.returned.lock().push(frame.buffer_id);
    }
}

/// Polls `cond` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}
