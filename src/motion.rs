// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Camera motion measurement and path smoothing.
//!
//! Motion between consecutive process calls comes either from an attached
//! [`Gyroscope`] or, when the gyroscope is disabled, from luma projection
//! profiles of consecutive frames. The measured motion feeds a first order
//! smoother per axis whose residual is the correction the warp applies.

use crate::{
    config::{Mode, Settings},
    image::{ImageDesc, PlaneView, Rect},
    pool::{split_rows, WorkerPool},
};
use parking_lot::Mutex;
use std::{
    io,
    ops::{Add, Mul, Sub},
    time::Duration,
};

/// Largest shift searched by the profile matcher, in pixels.
pub const MAX_SEARCH_RADIUS: usize = 64;
const MIN_SEARCH_RADIUS: usize = 4;

/// One angular rate reading, in radians per second, covering `dt` seconds.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GyroSample {
    pub dt: f32,
    /// Rate about the sensor's horizontal axis (pitch).
    pub x: f32,
    /// Rate about the sensor's vertical axis (yaw).
    pub y: f32,
    /// Rate about the optical axis (roll).
    pub z: f32,
}

/// Angular rate sensor consulted by the engine while the gyroscope is
/// enabled.
///
/// The engine enables the sensor during init, runs it at its minimum
/// delay, drains buffered samples on every process call and disables it
/// at finalize.
pub trait Gyroscope: Send {
    fn enable(&mut self) -> io::Result<()>;

    /// Shortest supported period between two samples.
    fn min_delay(&mut self) -> io::Result<Duration>;

    fn set_event_rate(&mut self, period: Duration) -> io::Result<()>;

    fn disable(&mut self) -> io::Result<()>;

    /// Samples buffered since the previous drain, oldest first.
    fn drain(&mut self) -> Vec<GyroSample>;
}

/// Rigid image motion: translation in pixels and rotation in radians.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Motion {
    pub dx: f32,
    pub dy: f32,
    pub dtheta: f32,
}

impl Motion {
    pub const ZERO: Motion = Motion {
        dx: 0.0,
        dy: 0.0,
        dtheta: 0.0,
    };

    pub fn new(dx: f32, dy: f32, dtheta: f32) -> Self {
        Self { dx, dy, dtheta }
    }
}

impl Add for Motion {
    type Output = Motion;

    fn add(self, rhs: Motion) -> Motion {
        Motion::new(self.dx + rhs.dx, self.dy + rhs.dy, self.dtheta + rhs.dtheta)
    }
}

impl Sub for Motion {
    type Output = Motion;

    fn sub(self, rhs: Motion) -> Motion {
        Motion::new(self.dx - rhs.dx, self.dy - rhs.dy, self.dtheta - rhs.dtheta)
    }
}

impl Mul<f32> for Motion {
    type Output = Motion;

    fn mul(self, rhs: f32) -> Motion {
        Motion::new(self.dx * rhs, self.dy * rhs, self.dtheta * rhs)
    }
}

/// Converts angular rates into image motion for a lens of `focal` pixels.
/// Non-finite samples are skipped.
pub fn integrate_gyro(samples: &[GyroSample], focal: f32) -> Motion {
    samples
        .iter()
        .filter(|s| s.dt.is_finite() && s.x.is_finite() && s.y.is_finite() && s.z.is_finite())
        .fold(Motion::ZERO, |acc, s| {
            acc + Motion::new(focal * s.y * s.dt, focal * s.x * s.dt, s.z * s.dt)
        })
}

/// Smoothing history carried from one process call to the next.
///
/// Only the residual between the raw camera path and its smoothed version
/// is stored; the smoother is shift invariant so the absolute path is not
/// needed.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotionState {
    /// Raw path minus smoothed path, the correction the next frame starts
    /// from.
    pub correction: Motion,
    /// Motion per frame interval measured by the last call.
    pub velocity: Motion,
    /// Frame intervals observed, dropped frames included.
    pub frames: u64,
}

impl MotionState {
    /// Folds `measured`, the motion since the previous call, into the
    /// history. When frames were dropped the motion is spread evenly over
    /// every elapsed interval and the smoother steps once per interval.
    pub fn advance(&self, measured: Motion, settings: &Settings) -> MotionState {
        let intervals = u32::from(settings.dropped_frames) + 1;
        let velocity = measured * (1.0 / intervals as f32);

        let mut correction = self.correction;
        if settings.mode == Mode::Off {
            correction = Motion::ZERO;
        } else {
            for _ in 0..intervals {
                let raw = correction + velocity;
                correction = Motion::new(
                    settings.trans_smooth * raw.dx,
                    settings.trans_smooth * raw.dy,
                    settings.rot_smooth * raw.dtheta,
                );
            }
        }

        MotionState {
            correction,
            velocity,
            frames: self.frames + u64::from(intervals),
        }
    }

    /// Replaces the correction with the one actually applied after the
    /// warp limited it to the available border, so clamping does not
    /// accumulate.
    pub fn settle(&mut self, applied: Motion) {
        self.correction = applied;
    }
}

/// Mean-removed luma projections of the analysis window: one sum per
/// column and one per row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Profiles {
    cols: Vec<i32>,
    rows: Vec<i32>,
}

impl Profiles {
    /// Projects the luma of `desc` inside `window`. Columns are summed over
    /// every other row and rows over every other column. Row bands are
    /// spread over the pool.
    pub(crate) fn compute(desc: &ImageDesc<'_>, window: Rect, pool: &WorkerPool) -> Self {
        let luma = PlaneView::luma(desc);
        let bands = split_rows(window.height, pool.threads(), 2);
        let partials: Vec<Mutex<(Vec<u32>, Vec<u32>)>> =
            bands.iter().map(|_| Mutex::new(Default::default())).collect();

        pool.run(bands.len(), |band| {
            let range = bands[band].clone();
            let mut cols = vec![0u32; window.width];
            let mut rows = Vec::with_capacity(range.len());
            for y in range {
                let sample_y = window.y + y;
                let mut row_sum = 0u32;
                for x in 0..window.width {
                    let v = u32::from(luma.at(window.x + x, sample_y));
                    if y % 2 == 0 {
                        cols[x] += v;
                    }
                    if x % 2 == 0 {
                        row_sum += v;
                    }
                }
                rows.push(row_sum);
            }
            *partials[band].lock() = (cols, rows);
        });

        let mut cols = vec![0u32; window.width];
        let mut rows = Vec::with_capacity(window.height);
        for partial in partials {
            let (band_cols, band_rows) = partial.into_inner();
            cols.iter_mut()
                .zip(band_cols)
                .for_each(|(acc, v)| *acc += v);
            rows.extend(band_rows);
        }

        Profiles {
            cols: remove_mean(&cols),
            rows: remove_mean(&rows),
        }
    }

    /// Translation of `self` relative to `previous`, searching up to
    /// `radius` pixels on each axis.
    pub fn shift_from(&self, previous: &Profiles, radius: (usize, usize)) -> Motion {
        let dx = best_shift(&previous.cols, &self.cols, radius.0);
        let dy = best_shift(&previous.rows, &self.rows, radius.1);
        Motion::new(dx as f32, dy as f32, 0.0)
    }
}

fn remove_mean(sums: &[u32]) -> Vec<i32> {
    if sums.is_empty() {
        return Vec::new();
    }
    let mean = sums.iter().map(|&v| i64::from(v)).sum::<i64>() / sums.len() as i64;
    sums.iter().map(|&v| (i64::from(v) - mean) as i32).collect()
}

/// Search radius for a window inset by `slack` pixels on each side.
pub fn search_radius(slack: usize) -> usize {
    slack.clamp(MIN_SEARCH_RADIUS, MAX_SEARCH_RADIUS)
}

/// Shift `d` minimising the mean absolute difference between
/// `current[i + d]` and `previous[i]`. Ties go to the smaller magnitude.
fn best_shift(previous: &[i32], current: &[i32], radius: usize) -> i32 {
    let n = previous.len().min(current.len());
    let radius = radius.min(n / 4) as i32;

    let mut best = 0;
    let mut best_cost = f64::INFINITY;
    for magnitude in 0..=radius {
        for d in [-magnitude, magnitude] {
            let cost = mean_abs_diff(previous, current, n, d);
            if cost < best_cost {
                best = d;
                best_cost = cost;
            }
            if magnitude == 0 {
                break;
            }
        }
    }
    best
}

fn mean_abs_diff(previous: &[i32], current: &[i32], n: usize, d: i32) -> f64 {
    let d = d as isize;
    let start = (-d).max(0) as usize;
    let end = (n as isize - d.max(0)) as usize;
    if start >= end {
        return f64::INFINITY;
    }
    let total: u64 = (start..end)
        .map(|i| u64::from(previous[i].abs_diff(current[(i as isize + d) as usize])))
        .sum();
    total as f64 / (end - start) as f64
}
