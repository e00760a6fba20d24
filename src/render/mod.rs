// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Renderers paint camera imagery into display buffers.
//!
//! Each renderer owns the cameras it opened in [`Renderer::activate`] and
//! must release them in [`Renderer::deactivate`]. Dropping a renderer
//! releases them as well, so a renderer that fails half way through
//! activation never leaks a camera.

mod direct;
mod pixel_copy;
mod top_view;
mod video_tex;

pub use direct::DirectView;
pub use pixel_copy::PixelCopy;
pub use top_view::{tile_layout, TopView, TOP_VIEW_HEIGHT, TOP_VIEW_WIDTH};
pub use video_tex::{create_video_texture, VideoTex};

use crate::{error::Result, image::Image};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RendererKind {
    /// Single camera shown full screen.
    DirectView,
    /// Single camera copied by the CPU while the GPU path is unavailable.
    PixelCopy,
    /// Several cameras composited into one bird's-eye image.
    TopView,
}

pub trait Renderer: Send {
    fn kind(&self) -> RendererKind;

    /// Opens the camera(s) and starts streaming.
    fn activate(&mut self) -> Result<()>;

    /// Stops streaming and closes the camera(s).
    fn deactivate(&mut self);

    /// Paints the newest imagery into `target`.
    fn draw_frame(&mut self, target: &mut Image) -> Result<()>;

    /// True while every owned stream is still running.
    fn is_streaming(&self) -> bool;
}

/// Cell size of the checkerboard shown while no camera image is available.
const CHECKER_CELL: u32 = 32;
