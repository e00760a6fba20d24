// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Display service contract.

use crate::{error::Result, image::Image};

/// Visibility requested from the display.
///
/// A display starts [`NotVisible`](DisplayState::NotVisible). Clients ask for
/// [`VisibleOnNextFrame`](DisplayState::VisibleOnNextFrame) before rendering
/// and the display becomes [`Visible`](DisplayState::Visible) once the next
/// frame is returned.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DisplayState {
    NotOpen,
    NotVisible,
    VisibleOnNextFrame,
    Visible,
    Dead,
}

/// A buffer lent by the display to draw the next frame into.
///
/// A buffer without an image is an invalid handle and is skipped.
#[derive(Debug)]
pub struct TargetBuffer {
    pub buffer_id: u32,
    pub image: Option<Image>,
}

impl TargetBuffer {
    pub fn new(buffer_id: u32, image: Image) -> Self {
        Self {
            buffer_id,
            image: Some(image),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.image.is_some()
    }
}

pub trait Display: Send + Sync {
    /// Borrows the next buffer to draw into, or `None` if none is available.
    fn get_target_buffer(&self) -> Option<TargetBuffer>;

    fn return_target_buffer_for_display(&self, buffer: TargetBuffer) -> Result<()>;

    fn set_display_state(&self, state: DisplayState) -> Result<()>;
}
