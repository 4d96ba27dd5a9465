// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Output-to-input transform construction and frame rendering.
//!
//! The transform is a 2x3 affine matrix `[a, b, c, d, e, f]` mapping an
//! output pixel `(x, y)` to the input position `(a*x + b*y + c,
//! d*x + e*y + f)`. Rolling shutter compensation is folded into the `b`
//! and `e` terms as a vertical shear.

use crate::{
    config::Mode,
    error::EisError,
    image::{ImageDef, ImageDesc, ImageDescMut, PlaneView, Planes, PlanesMut, Rect},
    motion::Motion,
    pool::{split_rows, WorkerPool},
};
use parking_lot::Mutex;
use std::ops::Range;

/// Tolerance, in input pixels, when checking that the corners stay inside
/// the input image.
const EDGE_EPSILON: f32 = 1e-2;
/// Rotation is halved at most this many times before being dropped.
const MAX_ROTATION_HALVINGS: usize = 8;
/// Row bands handed to the pool per thread.
const BANDS_PER_THREAD: usize = 2;

/// Transform applied to one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// Output-to-input affine matrix, row major.
    pub matrix: [f32; 6],
    /// Correction actually applied after clamping to the border.
    pub correction: Motion,
    pub mode: Mode,
}

impl Transform {
    /// Maps an output pixel to its input sampling position.
    #[inline]
    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        let m = &self.matrix;
        (m[0] * x + m[1] * y + m[2], m[3] * x + m[4] * y + m[5])
    }

    /// Offset of the crop when the transform is a chroma aligned integer
    /// translation, which renders as a plain copy.
    pub fn crop_offset(&self) -> Option<(usize, usize)> {
        let [a, b, c, d, e, f] = self.matrix;
        let aligned = |v: f32| v >= 0.0 && v.fract() == 0.0 && (v as usize) % 2 == 0;
        (a == 1.0 && b == 0.0 && d == 0.0 && e == 1.0 && aligned(c) && aligned(f))
            .then_some((c as usize, f as usize))
    }
}

/// Centre of a `width` x `height` pixel grid.
fn centre(width: usize, height: usize) -> (f32, f32) {
    ((width - 1) as f32 * 0.5, (height - 1) as f32 * 0.5)
}

/// Builds the transform for `mode` from the smoothed `correction`, the
/// per-frame `velocity` and the rolling shutter `readout` fraction.
///
/// Rotation is reduced until the rotated output fits inside the input,
/// then translation is clamped to the margin left over. The applied
/// correction is returned in the transform.
pub fn build(
    in_def: &ImageDef,
    out_def: &ImageDef,
    border: f32,
    mode: Mode,
    correction: Motion,
    velocity: Motion,
    readout: f32,
) -> Result<Transform, EisError> {
    let transform = match mode {
        Mode::Off => {
            let crop = Rect::centered(in_def, out_def);
            Transform {
                matrix: [1.0, 0.0, crop.x as f32, 0.0, 1.0, crop.y as f32],
                correction: Motion::ZERO,
                mode,
            }
        }
        Mode::PassThrough => Transform {
            matrix: compose(in_def, out_def, scale(in_def, out_def, border), 0.0, Motion::ZERO),
            correction: Motion::ZERO,
            mode,
        },
        Mode::On => stabilized(in_def, out_def, border, correction, velocity, readout),
    };
    check_matrix(&transform.matrix, in_def, out_def)?;
    Ok(transform)
}

/// Scale from output pixels to the border-cropped input region.
fn scale(in_def: &ImageDef, out_def: &ImageDef, border: f32) -> [f32; 4] {
    let keep = 1.0 - 2.0 * border;
    let sx = in_def.width as f32 * keep / out_def.width as f32;
    let sy = in_def.height as f32 * keep / out_def.height as f32;
    [sx, 0.0, 0.0, sy]
}

/// Rotates the linear part `l` by `theta`.
fn rotate(l: [f32; 4], theta: f32) -> [f32; 4] {
    let (sin, cos) = theta.sin_cos();
    [
        cos * l[0] - sin * l[2],
        cos * l[1] - sin * l[3],
        sin * l[0] + cos * l[2],
        sin * l[1] + cos * l[3],
    ]
}

/// Largest input offset from the centre reached by any output corner.
fn extents(l: &[f32; 4], out_def: &ImageDef) -> (f32, f32) {
    let (hx, hy) = centre(out_def.width, out_def.height);
    (
        l[0].abs() * hx + l[1].abs() * hy,
        l[2].abs() * hx + l[3].abs() * hy,
    )
}

fn compose(
    in_def: &ImageDef,
    out_def: &ImageDef,
    linear: [f32; 4],
    theta: f32,
    shift: Motion,
) -> [f32; 6] {
    let l = rotate(linear, theta);
    let (cx_in, cy_in) = centre(in_def.width, in_def.height);
    let (cx_out, cy_out) = centre(out_def.width, out_def.height);
    [
        l[0],
        l[1],
        cx_in + shift.dx - (l[0] * cx_out + l[1] * cy_out),
        l[2],
        l[3],
        cy_in + shift.dy - (l[2] * cx_out + l[3] * cy_out),
    ]
}

fn stabilized(
    in_def: &ImageDef,
    out_def: &ImageDef,
    border: f32,
    correction: Motion,
    velocity: Motion,
    readout: f32,
) -> Transform {
    let (half_in_x, half_in_y) = centre(in_def.width, in_def.height);
    let (_, half_out_y) = centre(out_def.width, out_def.height);
    let mut linear = scale(in_def, out_def, border);

    // Rolling shutter: rows further down were exposed later, shear each row
    // by the motion accumulated during readout.
    let (base_x, base_y) = extents(&linear, out_def);
    let reach = half_out_y / out_def.height as f32;
    let room_x = (half_in_x - base_x).max(0.0) / reach;
    let room_y = (half_in_y - base_y).max(0.0) / reach;
    let shear_x = (velocity.dx * readout).clamp(-room_x, room_x);
    let shear_y = (velocity.dy * readout).clamp(-room_y, room_y);
    linear[1] += shear_x / out_def.height as f32;
    linear[3] += shear_y / out_def.height as f32;

    let fits = |theta: f32| {
        let (ex, ey) = extents(&rotate(linear, theta), out_def);
        ex <= half_in_x && ey <= half_in_y
    };
    let mut theta = correction.dtheta;
    let mut halvings = 0;
    while !fits(theta) {
        if halvings == MAX_ROTATION_HALVINGS || !theta.is_finite() {
            theta = 0.0;
            break;
        }
        theta *= 0.5;
        halvings += 1;
    }

    let (ex, ey) = extents(&rotate(linear, theta), out_def);
    let slack_x = (half_in_x - ex).max(0.0);
    let slack_y = (half_in_y - ey).max(0.0);
    let shift = Motion::new(
        correction.dx.clamp(-slack_x, slack_x),
        correction.dy.clamp(-slack_y, slack_y),
        theta,
    );

    Transform {
        matrix: compose(in_def, out_def, linear, theta, shift),
        correction: shift,
        mode: Mode::On,
    }
}

/// Fails with [`EisError::InvalidMatrix`] unless every output corner maps
/// inside the input image.
pub fn check_matrix(
    matrix: &[f32; 6],
    in_def: &ImageDef,
    out_def: &ImageDef,
) -> Result<(), EisError> {
    let max_x = (in_def.width - 1) as f32 + EDGE_EPSILON;
    let max_y = (in_def.height - 1) as f32 + EDGE_EPSILON;
    let right = (out_def.width - 1) as f32;
    let bottom = (out_def.height - 1) as f32;
    let t = Transform {
        matrix: *matrix,
        correction: Motion::ZERO,
        mode: Mode::On,
    };
    for (x, y) in [(0.0, 0.0), (right, 0.0), (0.0, bottom), (right, bottom)] {
        let (u, v) = t.apply(x, y);
        let inside = u >= -EDGE_EPSILON && u <= max_x && v >= -EDGE_EPSILON && v <= max_y;
        if !inside {
            return Err(EisError::InvalidMatrix);
        }
    }
    Ok(())
}

struct Sources<'a> {
    luma: PlaneView<'a>,
    u: PlaneView<'a>,
    v: PlaneView<'a>,
}

/// Renders `input` through `transform` into `output` and returns the
/// number of row bands processed. Both descriptors must already be
/// validated against the definitions the transform was built for.
pub(crate) fn render(
    transform: &Transform,
    input: &ImageDesc<'_>,
    output: &mut ImageDescMut<'_>,
    pool: &WorkerPool,
) -> usize {
    let out_def = *output.def();
    let bands = split_rows(out_def.height, pool.threads() * BANDS_PER_THREAD, 2);
    let Some(band_rows) = bands.first().map(|b| b.len()) else {
        return 0;
    };
    let (u, v) = PlaneView::chroma(input);
    let src = Sources {
        luma: PlaneView::luma(input),
        u,
        v,
    };
    let crop = transform.crop_offset();
    let width = out_def.width;

    match output.planes_mut() {
        PlanesMut::Nv12 {
            y,
            row_stride_y,
            uv,
            row_stride_uv,
        } => {
            let (stride_y, stride_uv) = (*row_stride_y, *row_stride_uv);
            let chunks: Vec<Mutex<(&mut [u8], &mut [u8])>> = y
                .chunks_mut(band_rows * stride_y)
                .zip(uv.chunks_mut(band_rows / 2 * stride_uv))
                .take(bands.len())
                .map(Mutex::new)
                .collect();
            pool.run(chunks.len(), |band| {
                let mut guard = chunks[band].lock();
                let (y_out, uv_out) = &mut *guard;
                let rows = bands[band].clone();
                match crop {
                    Some(offset) => {
                        copy_nv12(input, offset, rows, y_out, stride_y, uv_out, stride_uv, width)
                    }
                    None => {
                        warp_nv12(transform, &src, rows, y_out, stride_y, uv_out, stride_uv, width)
                    }
                }
            });
            chunks.len()
        }
        PlanesMut::Yuv422 { pix, row_stride } => {
            let stride = *row_stride;
            let chunks: Vec<Mutex<&mut [u8]>> = pix
                .chunks_mut(band_rows * stride)
                .take(bands.len())
                .map(Mutex::new)
                .collect();
            pool.run(chunks.len(), |band| {
                let mut out = chunks[band].lock();
                let rows = bands[band].clone();
                match crop {
                    Some(offset) => copy_yuv422(input, offset, rows, &mut out, stride, width),
                    None => warp_yuv422(transform, &src, rows, &mut out, stride, width),
                }
            });
            chunks.len()
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn copy_nv12(
    input: &ImageDesc<'_>,
    (ox, oy): (usize, usize),
    rows: Range<usize>,
    y_out: &mut [u8],
    stride_y: usize,
    uv_out: &mut [u8],
    stride_uv: usize,
    width: usize,
) {
    let Planes::Nv12 {
        y,
        row_stride_y,
        uv,
        row_stride_uv,
    } = *input.planes()
    else {
        return;
    };
    for (local, row) in rows.clone().enumerate() {
        let src = (row + oy) * row_stride_y + ox;
        y_out[local * stride_y..][..width].copy_from_slice(&y[src..src + width]);
    }
    for (local, row) in (rows.start / 2..rows.end / 2).enumerate() {
        let src = (row + oy / 2) * row_stride_uv + ox;
        uv_out[local * stride_uv..][..width].copy_from_slice(&uv[src..src + width]);
    }
}

fn copy_yuv422(
    input: &ImageDesc<'_>,
    (ox, oy): (usize, usize),
    rows: Range<usize>,
    out: &mut [u8],
    stride: usize,
    width: usize,
) {
    let Planes::Yuv422 { pix, row_stride } = *input.planes() else {
        return;
    };
    for (local, row) in rows.enumerate() {
        let src = (row + oy) * row_stride + 2 * ox;
        out[local * stride..][..2 * width].copy_from_slice(&pix[src..src + 2 * width]);
    }
}

/// Input chroma coordinates for the chroma sample sitting at luma
/// position `(x, y)` of the output, given horizontal and vertical
/// subsampling factors.
#[inline]
fn chroma_position(t: &Transform, x: f32, y: f32, sub_y: f32) -> (f32, f32) {
    let (u, v) = t.apply(x, y);
    let cy = if sub_y > 1.0 { (v - 0.5) * 0.5 } else { v };
    ((u - 0.5) * 0.5, cy)
}

#[allow(clippy::too_many_arguments)]
fn warp_nv12(
    t: &Transform,
    src: &Sources<'_>,
    rows: Range<usize>,
    y_out: &mut [u8],
    stride_y: usize,
    uv_out: &mut [u8],
    stride_uv: usize,
    width: usize,
) {
    for (local, row) in rows.clone().enumerate() {
        let out = &mut y_out[local * stride_y..][..width];
        let (mut u, mut v) = t.apply(0.0, row as f32);
        for px in out.iter_mut() {
            *px = src.luma.sample(u, v);
            u += t.matrix[0];
            v += t.matrix[3];
        }
    }
    for (local, row) in (rows.start / 2..rows.end / 2).enumerate() {
        let out = &mut uv_out[local * stride_uv..][..width];
        let y = 2.0 * row as f32 + 0.5;
        for (pair, px) in out.chunks_exact_mut(2).enumerate() {
            let (cu, cv) = chroma_position(t, 2.0 * pair as f32 + 0.5, y, 2.0);
            px[0] = src.u.sample(cu, cv);
            px[1] = src.v.sample(cu, cv);
        }
    }
}

fn warp_yuv422(
    t: &Transform,
    src: &Sources<'_>,
    rows: Range<usize>,
    out: &mut [u8],
    stride: usize,
    width: usize,
) {
    for (local, row) in rows.enumerate() {
        let line = &mut out[local * stride..][..2 * width];
        let y = row as f32;
        for (pair, px) in line.chunks_exact_mut(4).enumerate() {
            let x = 2.0 * pair as f32;
            let (u0, v0) = t.apply(x, y);
            let (u1, v1) = t.apply(x + 1.0, y);
            let (cu, cv) = chroma_position(t, x + 0.5, y, 1.0);
            px[0] = src.u.sample(cu, cv);
            px[1] = src.luma.sample(u0, v0);
            px[2] = src.v.sample(cu, cv);
            px[3] = src.luma.sample(u1, v1);
        }
    }
}
