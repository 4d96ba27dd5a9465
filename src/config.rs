// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Static engine configuration, per-frame settings and their validation.
//!
//! Validation is pure: it never touches engine state, so a rejected call
//! leaves the engine exactly as it was.

use crate::{error::EisError, image::ImageDef};

/// Maximum accepted image width in pixels.
pub const MAX_WIDTH: usize = 1920;
/// Maximum accepted image height in pixels.
pub const MAX_HEIGHT: usize = 1080;
/// Minimum accepted image width in pixels.
pub const MIN_WIDTH: usize = 640;
/// Minimum accepted image height in pixels.
pub const MIN_HEIGHT: usize = 480;
/// Maximum number of threads, coordinating thread included.
pub const MAX_THREAD: u32 = 8;
/// Maximum stabilization margin on each side, as a fraction of the input
/// size.
pub const MAX_BORDER: f32 = 0.25;

/// Engine configuration, fixed for the lifetime of an initialized state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EisConfig {
    /// Stabilization margin on each side, as a fraction of the input size.
    pub border: f32,
    /// Number of threads used per frame, including the calling thread.
    pub n_thread: u32,
    /// Ignore the gyroscope and estimate motion from the images.
    pub gyro_disabled: bool,
    /// Lens focal length in pixels, used to convert gyroscope rates into
    /// image motion.
    pub lens_focal_in_pixel: f32,
}

impl Default for EisConfig {
    fn default() -> Self {
        Self {
            border: 0.1,
            n_thread: 4,
            gyro_disabled: true,
            lens_focal_in_pixel: 1500.0,
        }
    }
}

/// Stabilization mode, selected per frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Identity matrix, centered crop, no correction.
    Off = 0x0,
    /// Motion is tracked but the matrix only compensates the border crop.
    PassThrough = 0x1,
    /// Full rigid motion stabilization with rolling shutter compensation.
    On = 0x4,
}

impl TryFrom<u32> for Mode {
    type Error = EisError;

    fn try_from(raw: u32) -> Result<Self, Self::Error> {
        match raw {
            0x0 => Ok(Mode::Off),
            0x1 => Ok(Mode::PassThrough),
            0x4 => Ok(Mode::On),
            _ => Err(EisError::InvalidMode),
        }
    }
}

/// Per-frame settings, re-validated on every process call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settings {
    /// Translation smoothing: 0.0 tracks the scene exactly, 1.0 holds the
    /// framing as rigid as the border allows.
    pub trans_smooth: f32,
    /// Rotation smoothing, same scale as `trans_smooth`.
    pub rot_smooth: f32,
    /// Product of all digital scaling factors applied by the sensor
    /// pipeline.
    pub digital_scaling_product: f32,
    /// Total sensor lines per frame, vertical blanking included.
    pub sensor_frame_length: usize,
    /// Frames dropped since the previous process call.
    pub dropped_frames: u16,
    pub mode: Mode,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            trans_smooth: 0.9,
            rot_smooth: 0.9,
            digital_scaling_product: 1.0,
            sensor_frame_length: 1125,
            dropped_frames: 0,
            mode: Mode::On,
        }
    }
}

impl Settings {
    /// Fraction of the frame period spent reading out the active output
    /// rows.
    pub fn vb_ratio(&self, out_height: usize) -> f32 {
        if self.sensor_frame_length == 0 {
            return f32::INFINITY;
        }
        (out_height as f32 * self.digital_scaling_product) / self.sensor_frame_length as f32
    }
}

fn check_dimensions(def: &ImageDef) -> Result<(), EisError> {
    if def.width > MAX_WIDTH {
        return Err(EisError::WidthTooLarge);
    }
    if def.height > MAX_HEIGHT {
        return Err(EisError::HeightTooLarge);
    }
    if def.width < MIN_WIDTH {
        return Err(EisError::WidthTooSmall);
    }
    if def.height < MIN_HEIGHT {
        return Err(EisError::HeightTooSmall);
    }
    Ok(())
}

/// Validates the static configuration and image definitions. The first
/// violated constraint is reported.
pub fn validate_config(
    config: &EisConfig,
    in_def: &ImageDef,
    out_def: &ImageDef,
) -> Result<(), EisError> {
    check_dimensions(in_def)?;
    check_dimensions(out_def)?;

    // Written so that NaN fails the lower bound.
    if !(config.border >= 0.0) {
        return Err(EisError::BorderTooSmall);
    }
    if config.border > MAX_BORDER {
        return Err(EisError::BorderTooLarge);
    }

    if config.n_thread < 1 {
        return Err(EisError::NumberOfThreadTooSmall);
    }
    if config.n_thread > MAX_THREAD {
        return Err(EisError::NumberOfThreadTooLarge);
    }

    if in_def.format != out_def.format {
        return Err(EisError::ImageDefinitionMismatch);
    }
    // 4:2:x chroma needs pixel pairs, 4:2:0 also needs row pairs.
    for def in [in_def, out_def] {
        if def.width % 2 != 0 || def.height % 2 != 0 {
            return Err(EisError::InvalidConfiguration);
        }
    }

    if out_def.width > in_def.width {
        return Err(EisError::WidthOutImageTooLarge);
    }
    if out_def.height > in_def.height {
        return Err(EisError::HeightOutImageTooLarge);
    }

    if !config.gyro_disabled
        && !(config.lens_focal_in_pixel.is_finite() && config.lens_focal_in_pixel > 0.0)
    {
        return Err(EisError::InvalidConfiguration);
    }

    Ok(())
}

/// Validates per-frame settings against the output definition fixed at
/// init.
pub fn validate_settings(settings: &Settings, out_def: &ImageDef) -> Result<(), EisError> {
    if settings.trans_smooth > 1.0 {
        return Err(EisError::TransSmoothTooLarge);
    }
    if !(settings.trans_smooth >= 0.0) {
        return Err(EisError::TransSmoothTooSmall);
    }
    if settings.rot_smooth > 1.0 {
        return Err(EisError::RotSmoothTooLarge);
    }
    if !(settings.rot_smooth >= 0.0) {
        return Err(EisError::RotSmoothTooSmall);
    }
    if !(settings.digital_scaling_product >= 0.0) {
        return Err(EisError::DigitalScalingProductTooSmall);
    }
    if !(settings.vb_ratio(out_def.height) <= 1.0) {
        return Err(EisError::VbRatioTooLarge);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::ImageFormat;

    const IN: ImageDef = ImageDef::new(ImageFormat::Nv12, 1920, 1080);
    const OUT: ImageDef = ImageDef::new(ImageFormat::Nv12, 1600, 900);

    #[test]
    fn first_violation_wins() {
        let config = EisConfig {
            border: -1.0,
            n_thread: 0,
            ..Default::default()
        };
        let too_wide = ImageDef::new(ImageFormat::Nv12, 4096, 100);
        assert_eq!(
            validate_config(&config, &too_wide, &OUT),
            Err(EisError::WidthTooLarge)
        );
        assert_eq!(
            validate_config(&config, &IN, &OUT),
            Err(EisError::BorderTooSmall)
        );
        let config = EisConfig {
            n_thread: 0,
            ..Default::default()
        };
        assert_eq!(
            validate_config(&config, &IN, &OUT),
            Err(EisError::NumberOfThreadTooSmall)
        );
    }

    #[test]
    fn output_checked_after_input() {
        let config = EisConfig::default();
        let small_out = ImageDef::new(ImageFormat::Nv12, 1600, 320);
        assert_eq!(
            validate_config(&config, &IN, &small_out),
            Err(EisError::HeightTooSmall)
        );
        let in_def = ImageDef::new(ImageFormat::Nv12, 1280, 720);
        assert_eq!(
            validate_config(&config, &in_def, &OUT),
            Err(EisError::WidthOutImageTooLarge)
        );
    }

    #[test]
    fn bounds_are_inclusive() {
        let config = EisConfig {
            border: MAX_BORDER,
            n_thread: MAX_THREAD,
            ..Default::default()
        };
        let min = ImageDef::new(ImageFormat::Yuv422, MIN_WIDTH, MIN_HEIGHT);
        let max = ImageDef::new(ImageFormat::Yuv422, MAX_WIDTH, MAX_HEIGHT);
        assert_eq!(validate_config(&config, &max, &min), Ok(()));
        assert_eq!(validate_config(&config, &min, &min), Ok(()));
    }

    #[test]
    fn focal_only_required_with_gyro() {
        let mut config = EisConfig {
            lens_focal_in_pixel: 0.0,
            ..Default::default()
        };
        assert_eq!(validate_config(&config, &IN, &OUT), Ok(()));
        config.gyro_disabled = false;
        assert_eq!(
            validate_config(&config, &IN, &OUT),
            Err(EisError::InvalidConfiguration)
        );
    }

    #[test]
    fn settings_order() {
        let settings = Settings {
            trans_smooth: f32::NAN,
            rot_smooth: 2.0,
            ..Default::default()
        };
        assert_eq!(
            validate_settings(&settings, &OUT),
            Err(EisError::TransSmoothTooSmall)
        );
        let settings = Settings {
            rot_smooth: -0.1,
            ..Default::default()
        };
        assert_eq!(
            validate_settings(&settings, &OUT),
            Err(EisError::RotSmoothTooSmall)
        );
        let settings = Settings {
            digital_scaling_product: -1.0,
            ..Default::default()
        };
        assert_eq!(
            validate_settings(&settings, &OUT),
            Err(EisError::DigitalScalingProductTooSmall)
        );
    }

    #[test]
    fn vb_ratio_limit() {
        let mut settings = Settings {
            digital_scaling_product: 1.0,
            sensor_frame_length: 900,
            ..Default::default()
        };
        assert_eq!(validate_settings(&settings, &OUT), Ok(()));
        settings.sensor_frame_length = 899;
        assert_eq!(
            validate_settings(&settings, &OUT),
            Err(EisError::VbRatioTooLarge)
        );
        settings.sensor_frame_length = 0;
        assert_eq!(
            validate_settings(&settings, &OUT),
            Err(EisError::VbRatioTooLarge)
        );
    }

    #[test]
    fn raw_modes() {
        assert_eq!(Mode::try_from(0), Ok(Mode::Off));
        assert_eq!(Mode::try_from(1), Ok(Mode::PassThrough));
        assert_eq!(Mode::try_from(4), Ok(Mode::On));
        assert_eq!(Mode::try_from(2), Err(EisError::InvalidMode));
        assert_eq!(Mode::try_from(5), Err(EisError::InvalidMode));
    }
}
