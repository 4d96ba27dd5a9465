// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Stabilization engine lifecycle.
//!
//! An [`EisState`] moves from uninitialized to ready on a successful
//! [`Stabilizer::init`], processes any number of frames, and ends finalized
//! after [`Stabilizer::finalize`]. A finalized state may be initialized
//! again. A failing call leaves the lifecycle, the motion history and the
//! output image as it found them, with the exception of finalize which
//! always tears the engine down.

use crate::{
    config::{validate_config, validate_settings, EisConfig, Mode, Settings},
    error::EisError,
    image::{ImageDef, ImageDesc, ImageDescMut, Rect},
    motion::{integrate_gyro, search_radius, Gyroscope, MotionState, Profiles},
    pool::WorkerPool,
    warp::{self, Transform},
};
use std::fmt;
use tracing::{debug, info_span, trace, warn};

/// Bytes of caller-provided working memory per process call.
pub const TMP_SIZE: usize = 4;

/// Engine release, reported by [`version`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u16,
    pub minor: u16,
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Returns the engine version. Callable in any lifecycle state.
pub fn version() -> Version {
    Version {
        major: env!("CARGO_PKG_VERSION_MAJOR").parse().unwrap_or(0),
        minor: env!("CARGO_PKG_VERSION_MINOR").parse().unwrap_or(0),
    }
}

/// Caller-owned working memory lent to a single process call.
///
/// The engine keeps nothing in it between calls. After a successful call
/// it holds the number of row bands the frame was rendered in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scratch([u32; TMP_SIZE / 4]);

impl Scratch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Row bands used by the last successful process call.
    pub fn bands(&self) -> u32 {
        self.0[0]
    }
}

/// Externally visible lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Uninitialized,
    Ready,
    Finalized,
}

/// Stabilization engine operations.
pub trait Stabilizer {
    /// Validates `config` and the image definitions, starts the worker
    /// threads and, unless disabled, the gyroscope.
    fn init(&mut self, config: &EisConfig, in_def: &ImageDef, out_def: &ImageDef)
        -> Result<(), EisError>;

    /// Stabilizes one frame from `input` into `output` and returns the
    /// transform that was applied.
    fn process(
        &mut self,
        input: &ImageDesc<'_>,
        output: &mut ImageDescMut<'_>,
        settings: &Settings,
        scratch: &mut Scratch,
    ) -> Result<Transform, EisError>;

    /// Stops the worker threads and the gyroscope.
    fn finalize(&mut self) -> Result<(), EisError>;

    /// Native handles of every engine thread. The first entry is the
    /// coordinating thread: the one that last called process, or the one
    /// that called init before any frame.
    fn thread_list(&self) -> Result<Vec<libc::pthread_t>, EisError>;

    /// Engine release. Available in every state.
    fn version(&self) -> Version;
}

struct Engine {
    config: EisConfig,
    in_def: ImageDef,
    out_def: ImageDef,
    window: Rect,
    radius: (usize, usize),
    pool: WorkerPool,
    coordinator: libc::pthread_t,
    gyro_active: bool,
    reference: Option<Profiles>,
    motion: MotionState,
}

enum Lifecycle {
    Uninitialized,
    Ready(Box<Engine>),
    Finalized,
}

/// Stabilization engine state.
///
/// ```no_run
/// use edgefirst_eis::{
///     EisConfig, EisState, Image, ImageDef, ImageFormat, Scratch, Settings, Stabilizer,
/// };
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let in_def = ImageDef::new(ImageFormat::Nv12, 1920, 1080);
/// let out_def = ImageDef::new(ImageFormat::Nv12, 1600, 900);
/// let mut eis = EisState::new();
/// eis.init(&EisConfig::default(), &in_def, &out_def)?;
///
/// let input = Image::new(1920, 1080, ImageFormat::Nv12);
/// let mut output = Image::new(1600, 900, ImageFormat::Nv12);
/// let mut scratch = Scratch::new();
/// let transform =
///     eis.process(&input.desc(), &mut output.desc_mut(), &Settings::default(), &mut scratch)?;
/// println!("matrix {:?}", transform.matrix);
///
/// eis.finalize()?;
/// # Ok(())
/// # }
/// ```
pub struct EisState {
    lifecycle: Lifecycle,
    gyroscope: Option<Box<dyn Gyroscope>>,
}

impl Default for EisState {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EisState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("EisState")
            .field("state", &self.state())
            .field("gyroscope", &self.gyroscope.is_some())
            .finish()
    }
}

fn start_gyroscope(gyro: &mut dyn Gyroscope) -> Result<(), EisError> {
    gyro.enable().map_err(|err| {
        warn!("gyroscope enable failed: {err}");
        EisError::GyroEnableFail
    })?;

    let configured = gyro
        .min_delay()
        .map_err(|err| {
            warn!("gyroscope min delay query failed: {err}");
            EisError::GyroGetMinDelayFail
        })
        .and_then(|period| {
            debug!("gyroscope event period {period:?}");
            gyro.set_event_rate(period).map_err(|err| {
                warn!("gyroscope event rate failed: {err}");
                EisError::GyroSetEventRateFail
            })
        });

    if configured.is_err() {
        stop_gyroscope(gyro).ok();
    }
    configured
}

fn stop_gyroscope(gyro: &mut dyn Gyroscope) -> Result<(), EisError> {
    gyro.disable().map_err(|err| {
        warn!("gyroscope disable failed: {err}");
        EisError::GyroDisableFail
    })
}

impl EisState {
    /// Creates an uninitialized state without a gyroscope.
    pub fn new() -> Self {
        Self {
            lifecycle: Lifecycle::Uninitialized,
            gyroscope: None,
        }
    }

    /// Creates an uninitialized state reading motion from `gyro` whenever
    /// the configuration enables it.
    pub fn with_gyroscope(gyro: impl Gyroscope + 'static) -> Self {
        Self {
            lifecycle: Lifecycle::Uninitialized,
            gyroscope: Some(Box::new(gyro)),
        }
    }

    /// Replaces the gyroscope. Only allowed while not ready.
    pub fn attach_gyroscope(&mut self, gyro: Box<dyn Gyroscope>) -> Result<(), EisError> {
        if let Lifecycle::Ready(_) = self.lifecycle {
            return Err(EisError::InvalidConfiguration);
        }
        self.gyroscope = Some(gyro);
        Ok(())
    }

    pub fn state(&self) -> State {
        match self.lifecycle {
            Lifecycle::Uninitialized => State::Uninitialized,
            Lifecycle::Ready(_) => State::Ready,
            Lifecycle::Finalized => State::Finalized,
        }
    }

    /// Smoothing history of a ready engine.
    pub fn motion(&self) -> Option<MotionState> {
        match &self.lifecycle {
            Lifecycle::Ready(engine) => Some(engine.motion),
            _ => None,
        }
    }

    /// Configuration accepted by the last successful init.
    pub fn config(&self) -> Option<&EisConfig> {
        match &self.lifecycle {
            Lifecycle::Ready(engine) => Some(&engine.config),
            _ => None,
        }
    }
}

impl Stabilizer for EisState {
    fn init(
        &mut self,
        config: &EisConfig,
        in_def: &ImageDef,
        out_def: &ImageDef,
    ) -> Result<(), EisError> {
        if let Lifecycle::Ready(engine) = &self.lifecycle {
            if engine.in_def != *in_def || engine.out_def != *out_def {
                return Err(EisError::InvalidImgDefinitionChange);
            }
            return Err(EisError::InvalidConfiguration);
        }

        validate_config(config, in_def, out_def)?;

        let gyro_active = !config.gyro_disabled;
        if gyro_active {
            let gyro = self
                .gyroscope
                .as_deref_mut()
                .ok_or(EisError::GyroEnableFail)?;
            start_gyroscope(gyro)?;
        }

        let pool = match WorkerPool::new(config.n_thread) {
            Ok(pool) => pool,
            Err(err) => {
                if let (true, Some(gyro)) = (gyro_active, self.gyroscope.as_deref_mut()) {
                    stop_gyroscope(gyro).ok();
                }
                return Err(err);
            }
        };

        let inset_x = ((in_def.width as f32 * config.border) as usize) & !1;
        let inset_y = ((in_def.height as f32 * config.border) as usize) & !1;
        let window = Rect {
            x: inset_x,
            y: inset_y,
            width: in_def.width - 2 * inset_x,
            height: in_def.height - 2 * inset_y,
        };

        // SAFETY: pthread_self has no preconditions.
        let coordinator = unsafe { libc::pthread_self() };

        debug!(
            "eis ready: {in_def} -> {out_def}, border {}, {} threads, gyro {}",
            config.border,
            pool.threads(),
            if gyro_active { "on" } else { "off" }
        );

        self.lifecycle = Lifecycle::Ready(Box::new(Engine {
            config: *config,
            in_def: *in_def,
            out_def: *out_def,
            window,
            radius: (search_radius(inset_x), search_radius(inset_y)),
            pool,
            coordinator,
            gyro_active,
            reference: None,
            motion: MotionState::default(),
        }));
        Ok(())
    }

    fn process(
        &mut self,
        input: &ImageDesc<'_>,
        output: &mut ImageDescMut<'_>,
        settings: &Settings,
        scratch: &mut Scratch,
    ) -> Result<Transform, EisError> {
        let Lifecycle::Ready(engine) = &mut self.lifecycle else {
            return Err(EisError::InvalidConfiguration);
        };
        engine.process(self.gyroscope.as_deref_mut(), input, output, settings, scratch)
    }

    fn finalize(&mut self) -> Result<(), EisError> {
        let engine = match std::mem::replace(&mut self.lifecycle, Lifecycle::Finalized) {
            Lifecycle::Ready(engine) => engine,
            other => {
                self.lifecycle = other;
                return Err(EisError::InvalidConfiguration);
            }
        };
        let mut engine = *engine;

        let threads = engine.pool.shutdown();
        let gyro = match (engine.gyro_active, self.gyroscope.as_deref_mut()) {
            (true, Some(gyro)) => stop_gyroscope(gyro),
            _ => Ok(()),
        };
        debug!("eis finalized after {} frames", engine.motion.frames);
        threads.and(gyro)
    }

    fn thread_list(&self) -> Result<Vec<libc::pthread_t>, EisError> {
        let Lifecycle::Ready(engine) = &self.lifecycle else {
            return Err(EisError::InvalidConfiguration);
        };
        let mut threads = Vec::with_capacity(engine.pool.threads());
        threads.push(engine.coordinator);
        threads.extend(engine.pool.handles());
        Ok(threads)
    }

    fn version(&self) -> Version {
        version()
    }
}

impl Drop for EisState {
    fn drop(&mut self) {
        if let Lifecycle::Ready(_) = self.lifecycle {
            if let Err(err) = self.finalize() {
                warn!("eis teardown failed: {err}");
            }
        }
    }
}

impl Engine {
    fn process(
        &mut self,
        gyro: Option<&mut (dyn Gyroscope + 'static)>,
        input: &ImageDesc<'_>,
        output: &mut ImageDescMut<'_>,
        settings: &Settings,
        scratch: &mut Scratch,
    ) -> Result<Transform, EisError> {
        let _span = info_span!("eis_process", frame = self.motion.frames).entered();

        // SAFETY: pthread_self has no preconditions.
        self.coordinator = unsafe { libc::pthread_self() };

        if *input.def() != self.in_def || *output.def() != self.out_def {
            return Err(EisError::ImageDefinitionMismatch);
        }
        input.validate()?;
        output.validate()?;
        validate_settings(settings, &self.out_def)?;

        let (measured, profiles) = if self.gyro_active {
            let samples = gyro.map(|gyro| gyro.drain()).unwrap_or_default();
            let measured = integrate_gyro(&samples, self.config.lens_focal_in_pixel);
            (measured, None)
        } else {
            let profiles = {
                let _span = info_span!("profiles").entered();
                Profiles::compute(input, self.window, &self.pool)
            };
            let measured = self
                .reference
                .as_ref()
                .map_or(Default::default(), |previous| {
                    profiles.shift_from(previous, self.radius)
                });
            (measured, Some(profiles))
        };

        let mut motion = self.motion.advance(measured, settings);
        let readout = settings.vb_ratio(self.out_def.height);
        let transform = warp::build(
            &self.in_def,
            &self.out_def,
            self.config.border,
            settings.mode,
            motion.correction,
            motion.velocity,
            readout,
        )
        .map_err(|err| {
            debug!(?measured, "frame rejected, measured motion dropped: {err}");
            err
        })?;
        if settings.mode == Mode::On {
            motion.settle(transform.correction);
        }
        trace!(?measured, ?transform, "frame motion");

        let bands = {
            let _span = info_span!("render").entered();
            warp::render(&transform, input, output, &self.pool)
        };

        self.motion = motion;
        if profiles.is_some() {
            self.reference = profiles;
        }
        scratch.0[0] = bands as u32;
        Ok(transform)
    }
}
