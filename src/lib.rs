// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! # EdgeFirst Electronic Image Stabilization
//!
//! This library stabilizes video frames by cropping each frame inside a
//! configurable border and warping the crop against the measured camera
//! motion. It also provides safe owners for the Visidon still-image
//! engines used alongside stabilization in camera pipelines.
//!
//! ## Features
//!
//! - **Engine Lifecycle**: An owned [`EisState`] validated at init, driven
//!   frame by frame through the [`Stabilizer`] trait and torn down at
//!   finalize or drop.
//! - **Motion Sources**: Gyroscope rates through the [`Gyroscope`] trait, or
//!   luma projection matching when no gyroscope is available.
//! - **Rolling Shutter Compensation**: Per-row shear derived from the
//!   sensor readout ratio.
//! - **Worker Pool**: Engine-owned native threads exposed as `pthread_t`
//!   handles so callers can pin or prioritise them.
//! - **Visidon Engines**: Multi-frame HDR, low-light, super-photo, beauty
//!   and single-shot HDR engines loaded at runtime.
//!
//! ## Example
//!
//! ```no_run
//! use edgefirst_eis::{
//!     EisConfig, EisState, Image, ImageDef, ImageFormat, Mode, Scratch, Settings, Stabilizer,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let in_def = ImageDef::new(ImageFormat::Nv12, 1920, 1080);
//! let out_def = ImageDef::new(ImageFormat::Nv12, 1600, 900);
//!
//! let mut eis = EisState::new();
//! eis.init(&EisConfig::default(), &in_def, &out_def)?;
//!
//! let settings = Settings {
//!     mode: Mode::On,
//!     ..Default::default()
//! };
//! let input = Image::new(1920, 1080, ImageFormat::Nv12);
//! let mut output = Image::new(1600, 900, ImageFormat::Nv12);
//! let mut scratch = Scratch::new();
//! eis.process(&input.desc(), &mut output.desc_mut(), &settings, &mut scratch)?;
//!
//! eis.finalize()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Platform Requirements
//!
//! - **Linux**: native thread handles are POSIX `pthread_t`.
//! - **Visidon Engines**: the vendor shared libraries must be installed on
//!   the library search path; stabilization does not need them.
//!
//! ## Safety
//!
//! This library uses `unsafe` code for FFI calls into the Visidon engines
//! and to lend per-frame closures to the worker threads. All unsafe
//! operations are isolated to the [`burst`] module and the worker pool and
//! wrapped with safe APIs.

pub mod burst;
pub mod config;
pub mod eis;
pub mod error;
pub mod image;
pub mod motion;
mod pool;
pub mod warp;

pub use config::{
    EisConfig, Mode, Settings, MAX_BORDER, MAX_HEIGHT, MAX_THREAD, MAX_WIDTH, MIN_HEIGHT,
    MIN_WIDTH,
};
pub use eis::{version, EisState, Scratch, Stabilizer, State, Version, TMP_SIZE};
pub use error::{EisError, ErrorKind};
pub use image::{Image, ImageDef, ImageDesc, ImageDescMut, ImageFormat};
pub use motion::{GyroSample, Gyroscope, Motion, MotionState};
pub use warp::Transform;
