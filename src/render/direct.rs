// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use super::{create_video_texture, Renderer, RendererKind, VideoTex, CHECKER_CELL};
use crate::{
    camera::{
        select_stream_config, CameraEnumerator, StreamConfig, MIN_FRAME_RATE, TARGET_FORMAT,
    },
    config::CameraEntry,
    error::{Error, Result},
    image::{Image, ImageManager, Mirror},
};
use std::sync::Arc;
use tracing::{info, warn};

/// Shows one camera full screen.
pub struct DirectView {
    enumerator: Arc<dyn CameraEnumerator>,
    camera: CameraEntry,
    stream_config: Option<StreamConfig>,
    guide_lines: bool,
    mirror: Mirror,
    imgmgr: ImageManager,
    tex: Option<VideoTex>,
}

impl DirectView {
    /// Prepares a direct view of `camera`, choosing the largest RGB stream it
    /// offers at a usable frame rate. Cameras without a suitable stream are
    /// opened with their default configuration.
    pub fn new(
        enumerator: Arc<dyn CameraEnumerator>,
        camera: CameraEntry,
        guide_lines: bool,
    ) -> Self {
        let entries = camera.desc.metadata.stream_configurations();
        let stream_config = select_stream_config(&entries, TARGET_FORMAT, MIN_FRAME_RATE);
        if stream_config.is_none() {
            warn!(
                camera = %camera.desc.id,
                "no {TARGET_FORMAT} stream at {MIN_FRAME_RATE} fps or faster, using camera default"
            );
        }
        let mirror = Mirror::from_flags(camera.info.hflip, camera.info.vflip);
        Self {
            enumerator,
            camera,
            stream_config,
            guide_lines,
            mirror,
            imgmgr: ImageManager::new(),
            tex: None,
        }
    }

    pub fn stream_config(&self) -> Option<&StreamConfig> {
        self.stream_config.as_ref()
    }
}

impl Renderer for DirectView {
    fn kind(&self) -> RendererKind {
        RendererKind::DirectView
    }

    fn activate(&mut self) -> Result<()> {
        if self.tex.is_none() {
            let tex = create_video_texture(
                &self.enumerator,
                &self.camera.desc.id,
                self.stream_config.as_ref(),
            )?;
            info!(
                camera = %self.camera.desc.id,
                function = %self.camera.info.function,
                "direct view active"
            );
            self.tex = Some(tex);
        }
        Ok(())
    }

    fn deactivate(&mut self) {
        // Another renderer may need this camera next, so it is not kept open.
        self.tex = None;
    }

    fn draw_frame(&mut self, target: &mut Image) -> Result<()> {
        let tex = self
            .tex
            .as_mut()
            .ok_or_else(|| Error::Render("direct view is not active".into()))?;
        tex.refresh()?;
        match tex.image() {
            Some(image) => self.imgmgr.convert(image, target, None, self.mirror)?,
            None => target.fill_checkerboard(CHECKER_CELL)?,
        }
        if self.guide_lines {
            self.imgmgr.draw_guide_lines(target);
        }
        Ok(())
    }

    fn is_streaming(&self) -> bool {
        self.tex.as_ref().is_some_and(VideoTex::is_streaming)
    }
}
