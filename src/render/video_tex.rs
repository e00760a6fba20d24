// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::{
    camera::{BufferDesc, Camera, CameraEnumerator, StreamConfig},
    error::Result,
    image::Image,
    stream::StreamHandler,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// A streaming camera and the frame currently shown from it.
///
/// The camera is opened by [`create_video_texture`] and closed when the
/// texture is dropped, after the stream has fully stopped.
pub struct VideoTex {
    enumerator: Arc<dyn CameraEnumerator>,
    camera: Option<Arc<dyn Camera>>,
    handler: Arc<StreamHandler>,
    frame: Option<BufferDesc>,
}

/// Opens `camera_id` and starts streaming from it.
pub fn create_video_texture(
    enumerator: &Arc<dyn CameraEnumerator>,
    camera_id: &str,
    config: Option<&StreamConfig>,
) -> Result<VideoTex> {
    let camera = enumerator.open_camera(camera_id, config)?;
    let tex = VideoTex {
        enumerator: enumerator.clone(),
        handler: StreamHandler::new(camera.clone()),
        camera: Some(camera),
        frame: None,
    };
    // Dropping tex on failure closes the camera again.
    tex.handler.start_stream()?;
    debug!(camera = camera_id, "video texture streaming");
    Ok(tex)
}

impl VideoTex {
    /// Swaps in the newest frame if one arrived. Returns true when the image
    /// changed.
    pub fn refresh(&mut self) -> Result<bool> {
        if !self.handler.new_frame_available() {
            return Ok(false);
        }
        if let Some(old) = self.frame.take() {
            self.handler.done_with_frame(&old)?;
        }
        self.frame = Some(self.handler.get_new_frame()?);
        Ok(true)
    }

    /// Runs `f` on a newly arrived frame and hands the frame straight back.
    ///
    /// Returns false without calling `f` when nothing new arrived.
    pub fn with_new_frame<F>(&mut self, f: F) -> Result<bool>
    where
        F: FnOnce(&Image) -> Result<()>,
    {
        if !self.handler.new_frame_available() {
            return Ok(false);
        }
        let frame = self.handler.get_new_frame()?;
        let painted = f(&frame.image);
        self.handler.done_with_frame(&frame)?;
        painted.map(|_| true)
    }

    pub fn image(&self) -> Option<&Image> {
        self.frame.as_ref().map(|f| f.image.as_ref())
    }

    pub fn is_streaming(&self) -> bool {
        self.handler.is_running()
    }
}

impl Drop for VideoTex {
    fn drop(&mut self) {
        if let Some(frame) = self.frame.take() {
            if let Err(e) = self.handler.done_with_frame(&frame) {
                warn!("could not return displayed frame: {e}");
            }
        }
        self.handler.shutdown();
        if let Some(camera) = self.camera.take() {
            debug!(camera = camera.id(), "closing camera");
            self.enumerator.close_camera(camera);
        }
    }
}
