// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::error::{Error, Result};
use core::fmt;
use tracing::trace;

/// Four character code identifying a pixel layout.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    /// Packs the code little-endian, the way camera metadata stores formats.
    pub const fn as_u32(self) -> u32 {
        u32::from_le_bytes(self.0)
    }
}

impl From<u32> for FourCC {
    fn from(value: u32) -> Self {
        FourCC(value.to_le_bytes())
    }
}

impl From<FourCC> for u32 {
    fn from(value: FourCC) -> Self {
        value.as_u32()
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for b in self.0 {
            let c = if b.is_ascii_graphic() { b as char } else { '?' };
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "FourCC({self})")
    }
}

/// RGB 24-bit pixel format (8 bits per channel, no alpha)
pub const RGB3: FourCC = FourCC(*b"RGB3");

/// RGBX 32-bit pixel format (8 bits per channel, unused alpha)
pub const RGBX: FourCC = FourCC(*b"RGBX");

/// RGBA 32-bit pixel format (8 bits per channel, with alpha)
pub const RGBA: FourCC = FourCC(*b"RGBA");

/// YUYV 4:2:2 YUV packed format (common camera output format)
pub const YUYV: FourCC = FourCC(*b"YUYV");

/// NV12 4:2:0 YUV semi-planar format
pub const NV12: FourCC = FourCC(*b"NV12");

/// Rectangle within an image, used for crops and destination tiles.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Rect {
    /// X coordinate of top-left corner
    pub x: u32,
    /// Y coordinate of top-left corner
    pub y: u32,
    /// Width of the rectangle in pixels
    pub width: u32,
    /// Height of the rectangle in pixels
    pub height: u32,
}

impl Rect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    fn clamp_to(self, width: u32, height: u32) -> Rect {
        let x = self.x.min(width);
        let y = self.y.min(height);
        Rect {
            x,
            y,
            width: self.width.min(width - x),
            height: self.height.min(height - y),
        }
    }
}

/// Image mirroring applied while scaling a source into a destination.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Mirror {
    /// No mirroring
    #[default]
    None,
    /// Flip horizontally (left-right)
    Horizontal,
    /// Flip vertically (top-bottom)
    Vertical,
    /// Flip both horizontally and vertically (180-degree rotation)
    Both,
}

impl Mirror {
    pub fn from_flags(hflip: bool, vflip: bool) -> Self {
        match (hflip, vflip) {
            (false, false) => Mirror::None,
            (true, false) => Mirror::Horizontal,
            (false, true) => Mirror::Vertical,
            (true, true) => Mirror::Both,
        }
    }

    fn flips(self) -> (bool, bool) {
        match self {
            Mirror::None => (false, false),
            Mirror::Horizontal => (true, false),
            Mirror::Vertical => (false, true),
            Mirror::Both => (true, true),
        }
    }
}

const fn format_row_stride(format: FourCC, width: u32) -> Option<usize> {
    match format {
        RGB3 => Some(3 * width as usize),
        RGBX => Some(4 * width as usize),
        RGBA => Some(4 * width as usize),
        YUYV => Some(2 * width as usize),
        NV12 => Some(width as usize / 2 + width as usize),
        _ => None,
    }
}

/// Size in bytes of a tightly packed image. Chroma subsampled formats need
/// even dimensions so every pixel has a full chroma sample.
const fn image_size(width: u32, height: u32, format: FourCC) -> Option<usize> {
    match format {
        YUYV if width % 2 != 0 => return None,
        NV12 if width % 2 != 0 || height % 2 != 0 => return None,
        _ => {}
    }
    match format_row_stride(format, width) {
        Some(stride) => Some(stride * height as usize),
        None => None,
    }
}

/// CPU image buffer used for camera frames and display targets.
///
/// Rows are tightly packed. NV12 stores the full luma plane followed by the
/// interleaved chroma plane.
#[derive(Clone, PartialEq, Eq)]
pub struct Image {
    data: Vec<u8>,
    width: u32,
    height: u32,
    format: FourCC,
}

impl Image {
    /// Allocates a zeroed image.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedFormat`] for formats without a known layout
    /// and for YUYV or NV12 sizes that split a chroma sample.
    pub fn new(width: u32, height: u32, format: FourCC) -> Result<Self> {
        let size = image_size(width, height, format).ok_or(Error::UnsupportedFormat(format))?;
        Ok(Self {
            data: vec![0; size],
            width,
            height,
            format,
        })
    }

    /// Wraps existing pixel data, which must be exactly the expected size.
    pub fn from_pixels(width: u32, height: u32, format: FourCC, data: Vec<u8>) -> Result<Self> {
        let size = image_size(width, height, format).ok_or(Error::UnsupportedFormat(format))?;
        if data.len() != size {
            return Err(Error::Render(format!(
                "{width}x{height} {format} needs {size} bytes but {} were provided",
                data.len()
            )));
        }
        Ok(Self {
            data,
            width,
            height,
            format,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> FourCC {
        self.format
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_slice_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Samples one pixel as RGBA, converting from YUV when needed.
    ///
    /// Coordinates must be inside the image.
    pub fn rgba_at(&self, x: u32, y: u32) -> [u8; 4] {
        let (x, y, w) = (x as usize, y as usize, self.width as usize);
        match self.format {
            RGBA | RGBX => {
                let i = (y * w + x) * 4;
                let alpha = if self.format == RGBA {
                    self.data[i + 3]
                } else {
                    0xff
                };
                [self.data[i], self.data[i + 1], self.data[i + 2], alpha]
            }
            RGB3 => {
                let i = (y * w + x) * 3;
                [self.data[i], self.data[i + 1], self.data[i + 2], 0xff]
            }
            YUYV => {
                let base = y * w * 2 + (x / 2) * 4;
                let luma = self.data[base + (x % 2) * 2];
                yuv_to_rgba(luma, self.data[base + 1], self.data[base + 3])
            }
            NV12 => {
                let luma = self.data[y * w + x];
                let uv = w * self.height as usize + (y / 2) * w + (x / 2) * 2;
                yuv_to_rgba(luma, self.data[uv], self.data[uv + 1])
            }
            // Image::new rejects every other format.
            _ => [0, 0, 0, 0xff],
        }
    }

    fn put_rgba(&mut self, x: u32, y: u32, px: [u8; 4]) {
        let (x, y, w) = (x as usize, y as usize, self.width as usize);
        match self.format {
            RGBA | RGBX => {
                let i = (y * w + x) * 4;
                self.data[i..i + 4].copy_from_slice(&px);
            }
            RGB3 => {
                let i = (y * w + x) * 3;
                self.data[i..i + 3].copy_from_slice(&px[..3]);
            }
            _ => {}
        }
    }

    fn is_rgb(&self) -> bool {
        matches!(self.format, RGBA | RGBX | RGB3)
    }

    /// Fills the whole image with one colour. Only RGB formats are writable.
    pub fn fill(&mut self, px: [u8; 4]) -> Result<()> {
        if !self.is_rgb() {
            return Err(Error::UnsupportedFormat(self.format));
        }
        for y in 0..self.height {
            for x in 0..self.width {
                self.put_rgba(x, y, px);
            }
        }
        Ok(())
    }

    /// Paints the grey checkerboard shown when no camera image is available.
    pub fn fill_checkerboard(&mut self, cell: u32) -> Result<()> {
        if !self.is_rgb() {
            return Err(Error::UnsupportedFormat(self.format));
        }
        let cell = cell.max(1);
        for y in 0..self.height {
            for x in 0..self.width {
                let v = if ((x / cell) + (y / cell)) % 2 == 0 {
                    0x40
                } else {
                    0x80
                };
                self.put_rgba(x, y, [v, v, v, 0xff]);
            }
        }
        Ok(())
    }

    /// Draws a line between two points in normalized device coordinates
    /// (`-1.0..=1.0`, y pointing up).
    pub fn draw_line(&mut self, from: (f32, f32), to: (f32, f32), px: [u8; 4], thickness: u32) {
        if !self.is_rgb() || self.width == 0 || self.height == 0 {
            return;
        }
        let to_pixel = |(nx, ny): (f32, f32)| {
            let x = (nx + 1.0) * 0.5 * (self.width - 1) as f32;
            let y = (1.0 - ny) * 0.5 * (self.height - 1) as f32;
            (x.round() as i64, y.round() as i64)
        };
        let (mut x0, mut y0) = to_pixel(from);
        let (x1, y1) = to_pixel(to);
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        let half = (thickness / 2) as i64;
        loop {
            for oy in -half..=half {
                for ox in -half..=half {
                    let (px_x, px_y) = (x0 + ox, y0 + oy);
                    if px_x >= 0
                        && px_y >= 0
                        && px_x < self.width as i64
                        && px_y < self.height as i64
                    {
                        self.put_rgba(px_x as u32, px_y as u32, px);
                    }
                }
            }
            if x0 == x1 && y0 == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x0 += sx;
            }
            if e2 <= dx {
                err += dx;
                y0 += sy;
            }
        }
    }
}

impl fmt::Display for Image {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}x{} {} {}B",
            self.width,
            self.height,
            self.format,
            self.data.len()
        )
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Image({self})")
    }
}

fn yuv_to_rgba(y: u8, u: u8, v: u8) -> [u8; 4] {
    let c = y as i32 - 16;
    let d = u as i32 - 128;
    let e = v as i32 - 128;
    let clamp = |val: i32| val.clamp(0, 255) as u8;
    [
        clamp((298 * c + 409 * e + 128) >> 8),
        clamp((298 * c - 100 * d - 208 * e + 128) >> 8),
        clamp((298 * c + 516 * d + 128) >> 8),
        0xff,
    ]
}

/// Green, yellow and red segments of the reverse parking guide, in
/// normalized device coordinates.
const GUIDE_LINES: [((f32, f32), (f32, f32), [u8; 4]); 12] = [
    ((0.58, -0.66), (0.41, -0.66), [0xff, 0x00, 0x00, 0xff]),
    ((0.75, 0.00), (0.58, 0.00), [0xff, 0xff, 0x00, 0xff]),
    ((0.91, 0.66), (0.75, 0.66), [0x00, 0xff, 0x00, 0xff]),
    ((-0.58, -0.66), (-0.41, -0.66), [0xff, 0x00, 0x00, 0xff]),
    ((-0.75, 0.00), (-0.58, 0.00), [0xff, 0xff, 0x00, 0xff]),
    ((-0.91, 0.66), (-0.75, 0.66), [0x00, 0xff, 0x00, 0xff]),
    ((0.50, -1.00), (0.66, -0.33), [0xff, 0x00, 0x00, 0xff]),
    ((0.66, -0.33), (0.83, 0.33), [0xff, 0xff, 0x00, 0xff]),
    ((0.83, 0.33), (1.00, 1.00), [0x00, 0xff, 0x00, 0xff]),
    ((-0.50, -1.00), (-0.66, -0.33), [0xff, 0x00, 0x00, 0xff]),
    ((-0.66, -0.33), (-0.83, 0.33), [0xff, 0xff, 0x00, 0xff]),
    ((-0.83, 0.33), (-1.00, 1.00), [0x00, 0xff, 0x00, 0xff]),
];

/// Software image converter used by the renderers.
///
/// Handles format conversion into RGB targets, nearest-neighbour scaling,
/// cropping and mirroring. All operations are synchronous on the caller's
/// thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageManager;

impl ImageManager {
    pub fn new() -> Self {
        Self
    }

    /// Scales `from` (optionally cropped) into the whole of `to`.
    pub fn convert(
        &self,
        from: &Image,
        to: &mut Image,
        crop: Option<Rect>,
        mirror: Mirror,
    ) -> Result<()> {
        let region = Rect::new(0, 0, to.width(), to.height());
        self.blit(from, to, crop, region, mirror)
    }

    /// Scales `from` (optionally cropped) into `region` of `to`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedFormat`] when the destination is not an
    /// RGB format.
    pub fn blit(
        &self,
        from: &Image,
        to: &mut Image,
        crop: Option<Rect>,
        region: Rect,
        mirror: Mirror,
    ) -> Result<()> {
        if !to.is_rgb() {
            return Err(Error::UnsupportedFormat(to.format()));
        }
        let src = crop
            .unwrap_or(Rect::new(0, 0, from.width(), from.height()))
            .clamp_to(from.width(), from.height());
        let dst = region.clamp_to(to.width(), to.height());
        if src.width == 0 || src.height == 0 || dst.width == 0 || dst.height == 0 {
            return Ok(());
        }

        let (hflip, vflip) = mirror.flips();
        for dy in 0..dst.height {
            let ry = if vflip { dst.height - 1 - dy } else { dy };
            let sy = src.y + (ry as u64 * src.height as u64 / dst.height as u64) as u32;
            for dx in 0..dst.width {
                let rx = if hflip { dst.width - 1 - dx } else { dx };
                let sx = src.x + (rx as u64 * src.width as u64 / dst.width as u64) as u32;
                to.put_rgba(dst.x + dx, dst.y + dy, from.rgba_at(sx, sy));
            }
        }
        trace!(%from, %to, ?region, ?mirror, "blit");
        Ok(())
    }

    /// Copies pixels one to one from the top-left corner, clipping to the
    /// smaller of the two images and converting the format.
    pub fn copy(&self, from: &Image, to: &mut Image) -> Result<()> {
        if !to.is_rgb() {
            return Err(Error::UnsupportedFormat(to.format()));
        }
        if from.format() == to.format() && from.width() == to.width() {
            let len = from.size().min(to.size());
            to.as_slice_mut()[..len].copy_from_slice(&from.as_slice()[..len]);
            return Ok(());
        }
        let width = from.width().min(to.width());
        let height = from.height().min(to.height());
        for y in 0..height {
            for x in 0..width {
                to.put_rgba(x, y, from.rgba_at(x, y));
            }
        }
        Ok(())
    }

    /// Overlays the reverse parking guide lines.
    pub fn draw_guide_lines(&self, to: &mut Image) {
        let thickness = (to.height() / 90).max(1);
        for (from, end, colour) in GUIDE_LINES {
            to.draw_line(from, end, colour, thickness);
        }
    }
}
