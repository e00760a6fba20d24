// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use super::{create_video_texture, Renderer, RendererKind, VideoTex, CHECKER_CELL};
use crate::{
    camera::{CameraEnumerator, StreamConfig, DIRECTION_OUTPUT, TARGET_FORMAT},
    config::CameraEntry,
    error::{Error, Result},
    image::{Image, ImageManager, Mirror, Rect},
};
use std::sync::Arc;
use tracing::{info, warn};

/// Stream width requested from every top view camera. Camera metadata does
/// not describe how the cameras overlap, so the size is fixed.
pub const TOP_VIEW_WIDTH: u32 = 1280;

/// Stream height requested from every top view camera.
pub const TOP_VIEW_HEIGHT: u32 = 720;

/// Splits a `width` x `height` canvas into `count` equal tiles laid out row
/// by row on the smallest square-ish grid that fits them.
pub fn tile_layout(count: usize, width: u32, height: u32) -> Vec<Rect> {
    if count == 0 {
        return Vec::new();
    }
    let cols = (count as f64).sqrt().ceil() as u32;
    let rows = (count as u32).div_ceil(cols);
    let (tile_w, tile_h) = (width / cols, height / rows);
    (0..count as u32)
        .map(|i| Rect::new((i % cols) * tile_w, (i / cols) * tile_h, tile_w, tile_h))
        .collect()
}

/// Composites every camera mapped to a view into one image.
pub struct TopView {
    enumerator: Arc<dyn CameraEnumerator>,
    cameras: Vec<CameraEntry>,
    stream_config: StreamConfig,
    imgmgr: ImageManager,
    textures: Vec<(VideoTex, Mirror)>,
}

impl TopView {
    pub fn new(enumerator: Arc<dyn CameraEnumerator>, cameras: Vec<CameraEntry>) -> Self {
        let stream_config = StreamConfig {
            id: 0,
            width: TOP_VIEW_WIDTH as i32,
            height: TOP_VIEW_HEIGHT as i32,
            format: TARGET_FORMAT,
            direction: DIRECTION_OUTPUT,
            frame_rate: 0,
        };
        Self {
            enumerator,
            cameras,
            stream_config,
            imgmgr: ImageManager::new(),
            textures: Vec::new(),
        }
    }

    pub fn camera_count(&self) -> usize {
        self.cameras.len()
    }
}

impl Renderer for TopView {
    fn kind(&self) -> RendererKind {
        RendererKind::TopView
    }

    fn activate(&mut self) -> Result<()> {
        if !self.textures.is_empty() {
            return Ok(());
        }
        for camera in &self.cameras {
            let config = Some(&self.stream_config);
            match create_video_texture(&self.enumerator, &camera.desc.id, config) {
                Ok(tex) => {
                    let mirror = Mirror::from_flags(camera.info.hflip, camera.info.vflip);
                    self.textures.push((tex, mirror));
                }
                Err(e) => {
                    warn!(camera = %camera.desc.id, "top view camera failed to start: {e}");
                    // Release the cameras that did start.
                    self.textures.clear();
                    return Err(e);
                }
            }
        }
        info!(cameras = self.textures.len(), "top view active");
        Ok(())
    }

    fn deactivate(&mut self) {
        self.textures.clear();
    }

    fn draw_frame(&mut self, target: &mut Image) -> Result<()> {
        if self.textures.is_empty() {
            return Err(Error::Render("top view is not active".into()));
        }
        target.fill_checkerboard(CHECKER_CELL)?;
        let tiles = tile_layout(self.textures.len(), target.width(), target.height());
        for ((tex, mirror), tile) in self.textures.iter_mut().zip(tiles) {
            tex.refresh()?;
            if let Some(image) = tex.image() {
                self.imgmgr.blit(image, target, None, tile, *mirror)?;
            }
        }
        Ok(())
    }

    fn is_streaming(&self) -> bool {
        !self.textures.is_empty() && self.textures.iter().all(|(tex, _)| tex.is_streaming())
    }
}
