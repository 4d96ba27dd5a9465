// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use clap::Parser;
use edgefirst_eis::{EisConfig, ImageDef, ImageFormat, Mode, Settings};
use std::path::PathBuf;

/// Raw frame layouts accepted on the command line.
#[derive(clap::ValueEnum, Clone, Debug, PartialEq, Copy)]
pub enum FrameFormat {
    /// NV12 4:2:0 semi-planar
    Nv12,
    /// Packed 4:2:2, UYVY byte order
    Yuv422,
}

impl From<FrameFormat> for ImageFormat {
    fn from(format: FrameFormat) -> Self {
        match format {
            FrameFormat::Nv12 => ImageFormat::Nv12,
            FrameFormat::Yuv422 => ImageFormat::Yuv422,
        }
    }
}

/// Stabilization modes.
#[derive(clap::ValueEnum, Clone, Debug, PartialEq, Copy)]
pub enum StabilizationMode {
    /// Centered crop without correction
    Off,
    /// Border crop scaled to the output, motion tracked but not corrected
    PassThrough,
    /// Full stabilization
    On,
}

impl From<StabilizationMode> for Mode {
    fn from(mode: StabilizationMode) -> Self {
        match mode {
            StabilizationMode::Off => Mode::Off,
            StabilizationMode::PassThrough => Mode::PassThrough,
            StabilizationMode::On => Mode::On,
        }
    }
}

/// Command-line arguments for the EdgeFirst stabilization tool.
///
/// Reads a raw video file of concatenated frames, stabilizes every frame
/// and writes the cropped result as raw frames. Arguments can be specified
/// via command line or environment variables.
///
/// # Example
///
/// ```bash
/// # Via command line
/// edgefirst-eis --input shaky.nv12 --output stable.nv12 --border 0.1
///
/// # Via environment variables
/// export BORDER=0.15
/// edgefirst-eis --input shaky.nv12 --output stable.nv12
/// ```
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Raw input video made of concatenated frames
    #[arg(short, long, env = "INPUT")]
    pub input: PathBuf,

    /// Raw output video, frames are appended in order
    #[arg(short, long, env = "OUTPUT")]
    pub output: PathBuf,

    /// Pixel format of both input and output frames
    #[arg(long, env = "FORMAT", default_value = "nv12", value_enum)]
    pub format: FrameFormat,

    /// Input frame resolution in pixels (width height)
    #[arg(
        long,
        env = "INPUT_SIZE",
        default_value = "1920 1080",
        value_delimiter = ' ',
        num_args = 2
    )]
    pub input_size: Vec<usize>,

    /// Output frame resolution in pixels (width height)
    #[arg(
        long,
        env = "OUTPUT_SIZE",
        default_value = "1600 900",
        value_delimiter = ' ',
        num_args = 2
    )]
    pub output_size: Vec<usize>,

    /// Stabilization margin on each side as a fraction of the input size
    #[arg(long, env = "BORDER", default_value = "0.1")]
    pub border: f32,

    /// Engine threads including the calling thread
    #[arg(short, long, env = "THREADS", default_value = "4")]
    pub threads: u32,

    /// Translation smoothing, 0.0 follows the scene and 1.0 holds the frame
    #[arg(long, env = "TRANS_SMOOTH", default_value = "0.9")]
    pub trans_smooth: f32,

    /// Rotation smoothing, same scale as the translation smoothing
    #[arg(long, env = "ROT_SMOOTH", default_value = "0.9")]
    pub rot_smooth: f32,

    /// Stabilization mode
    #[arg(short, long, env = "MODE", default_value = "on", value_enum)]
    pub mode: StabilizationMode,

    /// Sensor lines per frame including vertical blanking
    #[arg(long, env = "SENSOR_FRAME_LENGTH", default_value = "1125")]
    pub sensor_frame_length: usize,

    /// Product of all digital scaling factors in the sensor pipeline
    #[arg(long, env = "DIGITAL_SCALING", default_value = "1.0")]
    pub digital_scaling: f32,

    /// Stop after this many frames
    #[arg(long, env = "FRAMES")]
    pub frames: Option<usize>,

    /// Path to camera calibration JSON file (isp-imx format), provides the
    /// lens focal length for gyroscope stabilization
    #[arg(long, env = "CALIBRATION")]
    pub calibration: Option<PathBuf>,

    /// Lens focal length in pixels, overrides the calibration file
    #[arg(long, env = "FOCAL")]
    pub focal: Option<f32>,

    /// Recorded gyroscope samples (JSON) replayed frame by frame; enables
    /// gyroscope stabilization
    #[arg(long, env = "GYRO_LOG")]
    pub gyro_log: Option<PathBuf>,

    /// CPU cores to pin engine threads to, in thread order
    #[arg(long, env = "AFFINITY", value_delimiter = ' ', num_args = 1..)]
    pub affinity: Vec<usize>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Enable Tracy profiler for performance analysis
    #[arg(long, env = "TRACY")]
    pub tracy: bool,
}

impl Args {
    pub fn in_def(&self) -> ImageDef {
        ImageDef::new(self.format.into(), self.input_size[0], self.input_size[1])
    }

    pub fn out_def(&self) -> ImageDef {
        ImageDef::new(self.format.into(), self.output_size[0], self.output_size[1])
    }

    pub fn config(&self, focal: Option<f32>) -> EisConfig {
        let defaults = EisConfig::default();
        EisConfig {
            border: self.border,
            n_thread: self.threads,
            gyro_disabled: self.gyro_log.is_none(),
            lens_focal_in_pixel: focal.unwrap_or(defaults.lens_focal_in_pixel),
        }
    }

    pub fn settings(&self, dropped_frames: u16) -> Settings {
        Settings {
            trans_smooth: self.trans_smooth,
            rot_smooth: self.rot_smooth,
            digital_scaling_product: self.digital_scaling,
            sensor_frame_length: self.sensor_frame_length,
            dropped_frames,
            mode: self.mode.into(),
        }
    }
}
