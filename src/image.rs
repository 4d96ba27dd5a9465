// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::error::EisError;
use core::fmt;

/// Pixel layouts accepted by the stabilization engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    /// NV12 4:2:0 YUV semi-planar: a luma plane followed by an interleaved
    /// UV plane at half vertical resolution.
    Nv12 = 0,
    /// Packed 4:2:2 YUV, byte order U Y0 V Y1 for every pixel pair.
    Yuv422 = 1,
}

impl ImageFormat {
    /// Converts a raw input format value.
    pub fn from_raw_input(raw: u32) -> Result<Self, EisError> {
        Self::from_raw(raw).ok_or(EisError::InvalidInputFormat)
    }

    /// Converts a raw output format value.
    pub fn from_raw_output(raw: u32) -> Result<Self, EisError> {
        Self::from_raw(raw).ok_or(EisError::InvalidOutputFormat)
    }

    fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(ImageFormat::Nv12),
            1 => Some(ImageFormat::Yuv422),
            _ => None,
        }
    }

    pub fn fourcc(self) -> &'static str {
        match self {
            ImageFormat::Nv12 => "NV12",
            ImageFormat::Yuv422 => "UYVY",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.fourcc())
    }
}

/// Bytes covered by one row of the first plane.
pub const fn format_row_stride(format: ImageFormat, width: usize) -> usize {
    match format {
        ImageFormat::Nv12 => width,
        ImageFormat::Yuv422 => 2 * width,
    }
}

/// Size in bytes of a tightly packed image.
pub const fn image_size(width: usize, height: usize, format: ImageFormat) -> usize {
    match format {
        ImageFormat::Nv12 => width * height + width * (height / 2),
        ImageFormat::Yuv422 => 2 * width * height,
    }
}

/// Format and geometry of an image, without pixel storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageDef {
    pub format: ImageFormat,
    /// Number of luma samples per row.
    pub width: usize,
    /// Number of luma rows.
    pub height: usize,
}

impl ImageDef {
    pub const fn new(format: ImageFormat, width: usize, height: usize) -> Self {
        Self {
            format,
            width,
            height,
        }
    }

    pub const fn size(&self) -> usize {
        image_size(self.width, self.height, self.format)
    }
}

impl fmt::Display for ImageDef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}x{} {}", self.width, self.height, self.format)
    }
}

/// Rectangle specification for crop operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    /// X coordinate of top-left corner
    pub x: usize,
    /// Y coordinate of top-left corner
    pub y: usize,
    /// Width of the rectangle in pixels
    pub width: usize,
    /// Height of the rectangle in pixels
    pub height: usize,
}

impl Rect {
    /// Centered crop of `out` within `input`. Offsets are rounded down to
    /// even values so chroma samples stay aligned.
    pub fn centered(input: &ImageDef, out: &ImageDef) -> Self {
        let x = (input.width.saturating_sub(out.width) / 2) & !1;
        let y = (input.height.saturating_sub(out.height) / 2) & !1;
        Rect {
            x,
            y,
            width: out.width,
            height: out.height,
        }
    }
}

/// Required length of a plane holding `rows` rows of `row_bytes` bytes
/// spaced `stride` bytes apart.
fn plane_len(rows: usize, row_bytes: usize, stride: usize) -> usize {
    match rows {
        0 => 0,
        rows => stride * (rows - 1) + row_bytes,
    }
}

fn check_plane(len: usize, rows: usize, row_bytes: usize, stride: usize) -> Result<(), EisError> {
    if stride < row_bytes || len < plane_len(rows, row_bytes, stride) {
        return Err(EisError::InvalidRowStride);
    }
    Ok(())
}

/// Plane layout of a read-only image descriptor. Strides are in bytes.
#[derive(Debug, Clone, Copy)]
pub enum Planes<'a> {
    Yuv422 {
        pix: &'a [u8],
        row_stride: usize,
    },
    Nv12 {
        y: &'a [u8],
        row_stride_y: usize,
        uv: &'a [u8],
        row_stride_uv: usize,
    },
}

/// Caller-owned input image: a definition plus borrowed planes.
///
/// The engine only reads through the descriptor and never retains it past
/// the call it was passed to.
#[derive(Debug, Clone, Copy)]
pub struct ImageDesc<'a> {
    def: ImageDef,
    planes: Planes<'a>,
}

impl<'a> ImageDesc<'a> {
    pub fn nv12(
        width: usize,
        height: usize,
        y: &'a [u8],
        row_stride_y: usize,
        uv: &'a [u8],
        row_stride_uv: usize,
    ) -> Self {
        Self {
            def: ImageDef::new(ImageFormat::Nv12, width, height),
            planes: Planes::Nv12 {
                y,
                row_stride_y,
                uv,
                row_stride_uv,
            },
        }
    }

    pub fn yuv422(width: usize, height: usize, pix: &'a [u8], row_stride: usize) -> Self {
        Self {
            def: ImageDef::new(ImageFormat::Yuv422, width, height),
            planes: Planes::Yuv422 { pix, row_stride },
        }
    }

    pub fn def(&self) -> &ImageDef {
        &self.def
    }

    pub fn planes(&self) -> &Planes<'a> {
        &self.planes
    }

    /// Checks every stride against the row width and every plane against
    /// the rows it must hold.
    pub fn validate(&self) -> Result<(), EisError> {
        let ImageDef { width, height, .. } = self.def;
        match self.planes {
            Planes::Yuv422 { pix, row_stride } => {
                check_plane(pix.len(), height, 2 * width, row_stride)
            }
            Planes::Nv12 {
                y,
                row_stride_y,
                uv,
                row_stride_uv,
            } => {
                check_plane(y.len(), height, width, row_stride_y)?;
                check_plane(uv.len(), height / 2, width, row_stride_uv)
            }
        }
    }
}

/// Read-only view of one sample channel inside a possibly interleaved
/// plane. Sample `(x, y)` lives at byte `y * stride + x * step + offset`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PlaneView<'a> {
    data: &'a [u8],
    stride: usize,
    step: usize,
    offset: usize,
    pub width: usize,
    pub height: usize,
}

impl<'a> PlaneView<'a> {
    /// Luma channel of a validated descriptor.
    pub fn luma(desc: &ImageDesc<'a>) -> Self {
        let ImageDef { width, height, .. } = desc.def;
        match desc.planes {
            Planes::Nv12 { y, row_stride_y, .. } => PlaneView {
                data: y,
                stride: row_stride_y,
                step: 1,
                offset: 0,
                width,
                height,
            },
            Planes::Yuv422 { pix, row_stride } => PlaneView {
                data: pix,
                stride: row_stride,
                step: 2,
                offset: 1,
                width,
                height,
            },
        }
    }

    /// U and V channels of a validated descriptor, at chroma resolution.
    pub fn chroma(desc: &ImageDesc<'a>) -> (Self, Self) {
        let ImageDef { width, height, .. } = desc.def;
        let (data, stride, step, v_offset, height) = match desc.planes {
            Planes::Nv12 {
                uv, row_stride_uv, ..
            } => (uv, row_stride_uv, 2, 1, height / 2),
            Planes::Yuv422 { pix, row_stride } => (pix, row_stride, 4, 2, height),
        };
        let u = PlaneView {
            data,
            stride,
            step,
            offset: 0,
            width: width / 2,
            height,
        };
        (
            u,
            PlaneView {
                offset: v_offset,
                ..u
            },
        )
    }

    #[inline]
    pub fn at(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.stride + x * self.step + self.offset]
    }

    /// Bilinear sample at fractional coordinates, clamped to the plane.
    #[inline]
    pub fn sample(&self, x: f32, y: f32) -> u8 {
        let max_x = self.width.saturating_sub(1);
        let max_y = self.height.saturating_sub(1);
        let x = x.clamp(0.0, max_x as f32);
        let y = y.clamp(0.0, max_y as f32);
        let x0 = x as usize;
        let y0 = y as usize;
        let x1 = (x0 + 1).min(max_x);
        let y1 = (y0 + 1).min(max_y);
        let fx = x - x0 as f32;
        let fy = y - y0 as f32;

        let p00 = self.at(x0, y0) as f32;
        let p10 = self.at(x1, y0) as f32;
        let p01 = self.at(x0, y1) as f32;
        let p11 = self.at(x1, y1) as f32;
        let top = p00 + (p10 - p00) * fx;
        let bottom = p01 + (p11 - p01) * fx;
        (top + (bottom - top) * fy + 0.5) as u8
    }
}

/// Plane layout of a writable image descriptor. Strides are in bytes.
#[derive(Debug)]
pub enum PlanesMut<'a> {
    Yuv422 {
        pix: &'a mut [u8],
        row_stride: usize,
    },
    Nv12 {
        y: &'a mut [u8],
        row_stride_y: usize,
        uv: &'a mut [u8],
        row_stride_uv: usize,
    },
}

/// Caller-owned output image the engine writes into. Bytes between the row
/// width and the stride are never touched.
#[derive(Debug)]
pub struct ImageDescMut<'a> {
    def: ImageDef,
    planes: PlanesMut<'a>,
}

impl<'a> ImageDescMut<'a> {
    pub fn nv12(
        width: usize,
        height: usize,
        y: &'a mut [u8],
        row_stride_y: usize,
        uv: &'a mut [u8],
        row_stride_uv: usize,
    ) -> Self {
        Self {
            def: ImageDef::new(ImageFormat::Nv12, width, height),
            planes: PlanesMut::Nv12 {
                y,
                row_stride_y,
                uv,
                row_stride_uv,
            },
        }
    }

    pub fn yuv422(width: usize, height: usize, pix: &'a mut [u8], row_stride: usize) -> Self {
        Self {
            def: ImageDef::new(ImageFormat::Yuv422, width, height),
            planes: PlanesMut::Yuv422 { pix, row_stride },
        }
    }

    pub fn def(&self) -> &ImageDef {
        &self.def
    }

    pub fn planes_mut(&mut self) -> &mut PlanesMut<'a> {
        &mut self.planes
    }

    pub fn validate(&self) -> Result<(), EisError> {
        let ImageDef { width, height, .. } = self.def;
        match &self.planes {
            PlanesMut::Yuv422 { pix, row_stride } => {
                check_plane(pix.len(), height, 2 * width, *row_stride)
            }
            PlanesMut::Nv12 {
                y,
                row_stride_y,
                uv,
                row_stride_uv,
            } => {
                check_plane(y.len(), height, width, *row_stride_y)?;
                check_plane(uv.len(), height / 2, width, *row_stride_uv)
            }
        }
    }
}

/// Heap-backed, tightly packed image buffer.
///
/// # Example
///
/// ```
/// use edgefirst_eis::image::{Image, ImageFormat};
///
/// let img = Image::new(1920, 1080, ImageFormat::Nv12);
/// assert_eq!(img.width(), 1920);
/// assert_eq!(img.height(), 1080);
/// assert_eq!(img.size(), 3110400);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    def: ImageDef,
    data: Vec<u8>,
}

impl Image {
    /// Allocates a zeroed image.
    pub fn new(width: usize, height: usize, format: ImageFormat) -> Self {
        let def = ImageDef::new(format, width, height);
        Self {
            def,
            data: vec![0; def.size()],
        }
    }

    /// Wraps existing pixel data, which must be exactly
    /// [`ImageDef::size`] bytes.
    pub fn from_vec(def: ImageDef, data: Vec<u8>) -> Result<Self, EisError> {
        if data.len() != def.size() {
            return Err(EisError::InvalidRowStride);
        }
        Ok(Self { def, data })
    }

    pub fn def(&self) -> &ImageDef {
        &self.def
    }

    pub fn width(&self) -> usize {
        self.def.width
    }

    pub fn height(&self) -> usize {
        self.def.height
    }

    pub fn format(&self) -> ImageFormat {
        self.def.format
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

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    /// Borrows the image as an engine input descriptor.
    pub fn desc(&self) -> ImageDesc<'_> {
        let ImageDef {
            format,
            width,
            height,
        } = self.def;
        match format {
            ImageFormat::Nv12 => {
                let (y, uv) = self.data.split_at(width * height);
                ImageDesc::nv12(width, height, y, width, uv, width)
            }
            ImageFormat::Yuv422 => {
                ImageDesc::yuv422(width, height, &self.data, format_row_stride(format, width))
            }
        }
    }

    /// Borrows the image as an engine output descriptor.
    pub fn desc_mut(&mut self) -> ImageDescMut<'_> {
        let ImageDef {
            format,
            width,
            height,
        } = self.def;
        match format {
            ImageFormat::Nv12 => {
                let (y, uv) = self.data.split_at_mut(width * height);
                ImageDescMut::nv12(width, height, y, width, uv, width)
            }
            ImageFormat::Yuv422 => {
                let stride = format_row_stride(format, width);
                ImageDescMut::yuv422(width, height, &mut self.data, stride)
            }
        }
    }
}

impl fmt::Display for Image {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {} bytes", self.def, self.data.len())
    }
}
