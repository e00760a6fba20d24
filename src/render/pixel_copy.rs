// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use super::{create_video_texture, Renderer, RendererKind, VideoTex, CHECKER_CELL};
use crate::{
    camera::CameraEnumerator,
    config::CameraEntry,
    error::{Error, Result},
    image::{Image, ImageManager},
};
use std::sync::Arc;
use tracing::info;

/// Copies one camera into the display buffer on the CPU.
///
/// Used before the GPU path is up. Frames are returned to the camera as soon
/// as they are copied, so nothing is held between draws.
pub struct PixelCopy {
    enumerator: Arc<dyn CameraEnumerator>,
    camera: CameraEntry,
    imgmgr: ImageManager,
    tex: Option<VideoTex>,
}

impl PixelCopy {
    pub fn new(enumerator: Arc<dyn CameraEnumerator>, camera: CameraEntry) -> Self {
        Self {
            enumerator,
            camera,
            imgmgr: ImageManager::new(),
            tex: None,
        }
    }
}

impl Renderer for PixelCopy {
    fn kind(&self) -> RendererKind {
        RendererKind::PixelCopy
    }

    fn activate(&mut self) -> Result<()> {
        if self.tex.is_none() {
            self.tex = Some(create_video_texture(
                &self.enumerator,
                &self.camera.desc.id,
                None,
            )?);
            info!(camera = %self.camera.desc.id, "pixel copy active");
        }
        Ok(())
    }

    fn deactivate(&mut self) {
        self.tex = None;
    }

    fn draw_frame(&mut self, target: &mut Image) -> Result<()> {
        let tex = self
            .tex
            .as_mut()
            .ok_or_else(|| Error::Render("pixel copy is not active".into()))?;
        let imgmgr = self.imgmgr;
        let copied = tex.with_new_frame(|image| imgmgr.copy(image, target))?;
        if !copied {
            target.fill_checkerboard(CHECKER_CELL)?;
        }
        Ok(())
    }

    fn is_streaming(&self) -> bool {
        self.tex.as_ref().is_some_and(VideoTex::is_streaming)
    }
}
