// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Camera service contracts and stream configuration selection.
//!
//! The camera driver itself lives outside this crate. It is reached through
//! [`CameraEnumerator`] (listing and opening cameras) and [`Camera`]
//! (streaming control). Frames flow back through a [`FrameSink`], which the
//! driver invokes on its own delivery thread.

use crate::{
    error::Result,
    image::{FourCC, Image, RGB3},
};
use std::{fmt, sync::Arc};
use tracing::{debug, warn};

/// Pixel format the renderers ask cameras for.
pub const TARGET_FORMAT: FourCC = RGB3;

/// Slowest stream the direct view will accept.
pub const MIN_FRAME_RATE: i32 = 15;

/// Stream configuration direction tag for streams the camera produces.
pub const DIRECTION_OUTPUT: i32 = 0;

/// Stream configuration direction tag for streams the camera consumes.
pub const DIRECTION_INPUT: i32 = 1;

/// Number of `i32` words in one encoded stream configuration record.
const STREAM_CONFIG_WORDS: usize = 6;

/// Descriptor for one frame buffer owned by a camera.
///
/// The `buffer_id` is the identity the camera uses to recycle the buffer; the
/// pixel data is shared so descriptors are cheap to clone.
#[derive(Clone)]
pub struct BufferDesc {
    pub buffer_id: u32,
    pub image: Arc<Image>,
}

impl BufferDesc {
    pub fn new(buffer_id: u32, image: Arc<Image>) -> Self {
        Self { buffer_id, image }
    }
}

impl fmt::Debug for BufferDesc {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "BufferDesc({} {})", self.buffer_id, self.image)
    }
}

/// Out-of-band stream notifications from a camera.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StreamEvent {
    StreamStarted,
    StreamStopped,
    FrameDropped,
    Timeout,
    ParameterChanged,
}

/// Receiver of frames pushed by a camera's delivery thread.
pub trait FrameSink: Send + Sync {
    /// Hands over a filled buffer. `None` marks the end of the stream.
    fn deliver_frame(&self, frame: Option<BufferDesc>);

    fn notify(&self, event: StreamEvent);
}

/// An opened camera.
pub trait Camera: Send + Sync {
    fn id(&self) -> &str;

    fn set_max_frames_in_flight(&self, count: u32) -> Result<()>;

    /// Starts delivering frames to `sink` from the camera's own thread.
    fn start_video_stream(&self, sink: Arc<dyn FrameSink>) -> Result<()>;

    /// Requests the stream to stop. Completion is signalled by a terminal
    /// frame delivered to the sink.
    fn stop_video_stream(&self);

    /// Returns a delivered buffer to the camera for reuse.
    fn done_with_frame(&self, frame: BufferDesc);
}

/// Camera service used to list and open cameras.
pub trait CameraEnumerator: Send + Sync {
    fn camera_list(&self) -> Result<Vec<CameraDesc>>;

    /// Opens a camera, optionally asking for a specific stream configuration.
    fn open_camera(&self, camera_id: &str, config: Option<&StreamConfig>)
        -> Result<Arc<dyn Camera>>;

    fn close_camera(&self, camera: Arc<dyn Camera>);
}

/// One entry of a camera's available stream configurations.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StreamConfig {
    pub id: i32,
    pub width: i32,
    pub height: i32,
    pub format: FourCC,
    pub direction: i32,
    pub frame_rate: i32,
}

impl StreamConfig {
    pub fn area(&self) -> i64 {
        self.width as i64 * self.height as i64
    }

    fn encode(&self, out: &mut Vec<i32>) {
        out.extend_from_slice(&[
            self.id,
            self.width,
            self.height,
            self.format.as_u32() as i32,
            self.direction,
            self.frame_rate,
        ]);
    }
}

/// Static metadata reported by the camera service.
///
/// The blob is a flat array of `i32` words holding consecutive stream
/// configuration records of `(id, width, height, format, direction,
/// frame_rate)`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CameraMetadata {
    raw: Vec<i32>,
}

impl CameraMetadata {
    pub fn from_raw(raw: Vec<i32>) -> Self {
        Self { raw }
    }

    pub fn from_configs(configs: &[StreamConfig]) -> Self {
        let mut raw = Vec::with_capacity(configs.len() * STREAM_CONFIG_WORDS);
        for cfg in configs {
            cfg.encode(&mut raw);
        }
        Self { raw }
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Decodes the stream configuration records, ignoring a truncated tail.
    pub fn stream_configurations(&self) -> Vec<StreamConfig> {
        let chunks = self.raw.chunks_exact(STREAM_CONFIG_WORDS);
        if !chunks.remainder().is_empty() {
            warn!(
                words = chunks.remainder().len(),
                "ignoring truncated stream configuration record"
            );
        }
        chunks
            .map(|c| StreamConfig {
                id: c[0],
                width: c[1],
                height: c[2],
                format: FourCC::from(c[3] as u32),
                direction: c[4],
                frame_rate: c[5],
            })
            .collect()
    }
}

/// A camera as reported by the camera service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CameraDesc {
    pub id: String,
    pub metadata: CameraMetadata,
}

impl CameraDesc {
    pub fn new(id: impl Into<String>, metadata: CameraMetadata) -> Self {
        Self {
            id: id.into(),
            metadata,
        }
    }
}

/// Picks the largest output stream in `format` running at `min_frame_rate`
/// or faster.
///
/// Entries are scanned in order and only a strictly larger area replaces the
/// current pick, so the first of several equally sized entries wins.
pub fn select_stream_config(
    entries: &[StreamConfig],
    format: FourCC,
    min_frame_rate: i32,
) -> Option<StreamConfig> {
    let mut best: Option<StreamConfig> = None;
    for entry in entries {
        if entry.direction != DIRECTION_OUTPUT || entry.format != format {
            continue;
        }
        if entry.frame_rate < min_frame_rate {
            continue;
        }
        if best.is_none_or(|b| entry.area() > b.area()) {
            best = Some(*entry);
        }
    }
    match &best {
        Some(cfg) => debug!(
            id = cfg.id,
            width = cfg.width,
            height = cfg.height,
            "selected stream configuration"
        ),
        None => debug!(%format, min_frame_rate, "no matching stream configuration"),
    }
    best
}
