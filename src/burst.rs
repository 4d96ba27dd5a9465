// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Safe owners for the Visidon still-image engines.
//!
//! Each engine is loaded at runtime from its vendor library, initialized
//! into an opaque handle owned by exactly one value, and released on drop
//! or through the consuming `release` method. Buffers are length-checked
//! against the engine's format and geometry before their pointers cross
//! into the library, and process calls are refused until a frame was added.

use libc::{c_char, c_float, c_int, c_void};
use std::{ffi::CStr, marker::PhantomData, ptr::null_mut};
use thiserror::Error;
use tracing::{debug, warn};
use visidon_sys::{
    beauty::{self, VDBeautyFace, VDBeautyShot, VDBeautyShotData},
    hdr::{VDHDRParameters, VDHDR},
    libloading,
    lowlight::{VDLowLight, VDLowLightParameters},
    single_shot_hdr::{self, VDSingleShotHDR},
    superphoto::{VDSuperPhoto, VDSuperPhotoInitializeParams, VDSuperPhotoRuntimeParams},
    VDDatatype, VD_OK,
};

pub const HDR_LIBRARY: &str = "libVDHDRAPI.so";
pub const LOW_LIGHT_LIBRARY: &str = "libVDLowLightAPI.so";
pub const SUPER_PHOTO_LIBRARY: &str = "libVDSuperPhotoAPI.so";
pub const BEAUTY_LIBRARY: &str = "libVDBeautyEngine.so";
pub const SINGLE_SHOT_HDR_LIBRARY: &str = "libVDSingleShotHDRAPI.so";

#[derive(Error, Debug)]
pub enum BurstError {
    #[error("failed to load engine library: {0}")]
    Load(#[from] libloading::Error),
    #[error("{0} failed")]
    Engine(&'static str),
    #[error("no frames were added before processing")]
    NoFrames,
    #[error("engine accepts at most {max} frames")]
    TooManyFrames { max: usize },
    #[error("buffer holds {actual} bytes but {expected} are required")]
    FrameSize { expected: usize, actual: usize },
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

fn check(status: c_int, entry: &'static str) -> Result<(), BurstError> {
    if status == VD_OK {
        Ok(())
    } else {
        Err(BurstError::Engine(entry))
    }
}

fn check_len(buffer: &[u8], expected: usize) -> Result<(), BurstError> {
    if buffer.len() < expected {
        return Err(BurstError::FrameSize {
            expected,
            actual: buffer.len(),
        });
    }
    Ok(())
}

fn c_dim(value: c_int, what: &str) -> Result<usize, BurstError> {
    match usize::try_from(value) {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(BurstError::InvalidParameter(format!("{what} must be positive, got {value}"))),
    }
}

fn to_c(value: usize, what: &str) -> Result<c_int, BurstError> {
    c_int::try_from(value)
        .map_err(|_| BurstError::InvalidParameter(format!("{what} {value} out of range")))
}

/// Copies a library owned version string.
///
/// # Safety
///
/// `ptr` must be null or point to a NUL terminated string that stays
/// valid for the duration of the call.
unsafe fn version_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    // SAFETY: non-null and NUL terminated per the caller contract.
    Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
}

/// Bytes needed by a frame of `format`, with `pad_cols` extra bytes per row
/// and `pad_rows` extra rows between luma and chroma.
pub fn frame_size(
    format: VDDatatype,
    cols: usize,
    rows: usize,
    pad_cols: usize,
    pad_rows: usize,
) -> Result<usize, BurstError> {
    use visidon_sys::*;
    let stride = cols + pad_cols;
    let size = match format {
        VD_YUV_NV12 | VD_YUV_NV21 | VD_YUV_420P => stride * (rows + pad_rows) + stride * rows / 2,
        VD_YUV_NV16 => stride * (rows + pad_rows) + stride * rows,
        VD_YUV422 | VD_YUV_YUYV | VD_YUV_UYVY | VD_RGB565 => 2 * stride * rows,
        VD_RawGray => stride * rows,
        VD_RGB888 => 3 * stride * rows,
        VD_RGBA8888 => 4 * stride * rows,
        _ => {
            return Err(BurstError::InvalidParameter(format!(
                "unsupported frame format {format}"
            )))
        }
    };
    Ok(size)
}

/// Input frame and fused output sizes for `params`. Added frames carry the
/// configured padding, the output does not.
fn hdr_sizes(params: &VDHDRParameters) -> Result<(usize, usize), BurstError> {
    let (cols, rows) = (c_dim(params.cols, "cols")?, c_dim(params.rows, "rows")?);
    let frame_len = frame_size(
        params.type_,
        cols,
        rows,
        usize::try_from(params.extraPadCols).unwrap_or(0),
        usize::try_from(params.extraPadRows).unwrap_or(0),
    )?;
    Ok((frame_len, frame_size(params.type_, cols, rows, 0, 0)?))
}

/// Multi-frame HDR fusion.
///
/// The engine keeps a pointer to every added frame instead of copying it,
/// so frames stay borrowed until the engine is released.
pub struct HdrEngine<'f> {
    lib: VDHDR,
    handle: *mut c_void,
    frame_len: usize,
    output_len: usize,
    total_frames: usize,
    frames: usize,
    _frames: PhantomData<&'f mut [u8]>,
}

impl<'f> HdrEngine<'f> {
    /// Loads the HDR library and initializes an engine for `cols` x `rows`
    /// frames. `configure` may adjust the vendor defaults before init.
    pub fn new(
        cols: usize,
        rows: usize,
        configure: impl FnOnce(&mut VDHDRParameters),
    ) -> Result<Self, BurstError> {
        Self::open(HDR_LIBRARY, cols, rows, configure)
    }

    pub fn open(
        path: &str,
        cols: usize,
        rows: usize,
        configure: impl FnOnce(&mut VDHDRParameters),
    ) -> Result<Self, BurstError> {
        // SAFETY: the library runs no initializers beyond its C runtime.
        let lib = unsafe { VDHDR::new(path) }?;
        let (c_cols, c_rows) = (to_c(cols, "cols")?, to_c(rows, "rows")?);
        // SAFETY: returns the parameter struct by value and keeps no state.
        let mut params = unsafe { lib.VDHDRGetDefaultParams(c_cols, c_rows) };
        configure(&mut params);

        let (frame_len, output_len) = hdr_sizes(&params)?;
        let total_frames = c_dim(params.totalFrames, "totalFrames")?;

        let mut handle = null_mut();
        // SAFETY: `handle` is a valid out pointer for the new engine.
        check(unsafe { lib.VDInitializeHDR(params, &mut handle) }, "VDInitializeHDR")?;
        debug!("HDR engine initialized for {total_frames} frames");
        Ok(Self {
            lib,
            handle,
            frame_len,
            output_len,
            total_frames,
            frames: 0,
            _frames: PhantomData,
        })
    }

    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    /// Bytes written by [`Self::process`]: the fused frame carries no padding.
    pub fn output_len(&self) -> usize {
        self.output_len
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn add_frame(&mut self, frame: &'f mut [u8]) -> Result<(), BurstError> {
        if self.frames == self.total_frames {
            return Err(BurstError::TooManyFrames {
                max: self.total_frames,
            });
        }
        check_len(frame, self.frame_len)?;
        check(
            // SAFETY: the frame holds `frame_len` bytes and stays borrowed for
            // 'f, which outlives the handle keeping its pointer.
            unsafe { self.lib.VDHDR_AddFrame(frame.as_mut_ptr(), self.handle) },
            "VDHDR_AddFrame",
        )?;
        self.frames += 1;
        Ok(())
    }

    /// Fuses the added frames into `output` and returns how many frames
    /// contributed.
    pub fn process(&mut self, output: &mut [u8]) -> Result<usize, BurstError> {
        if self.frames == 0 {
            return Err(BurstError::NoFrames);
        }
        check_len(output, self.output_len)?;
        // SAFETY: the handle is live and `output` holds one unpadded frame.
        let used = unsafe { self.lib.VDHDR_Process(output.as_mut_ptr(), self.handle) };
        usize::try_from(used).map_err(|_| BurstError::Engine("VDHDR_Process"))
    }

    pub fn version(&self) -> Option<String> {
        // SAFETY: the library returns a static NUL terminated string or null.
        unsafe { version_string(self.lib.VDHDR_GetVersion()) }
    }

    pub fn release(mut self) -> Result<(), BurstError> {
        self.release_handle()
    }

    fn release_handle(&mut self) -> Result<(), BurstError> {
        if self.handle.is_null() {
            return Ok(());
        }
        // SAFETY: the handle is non-null and released exactly once here.
        let status = unsafe { self.lib.VDReleaseHDR(&mut self.handle) };
        self.handle = null_mut();
        debug!("HDR engine released");
        check(status, "VDReleaseHDR")
    }
}

impl Drop for HdrEngine<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.release_handle() {
            warn!("{err}");
        }
    }
}

/// Multi-frame low-light denoising. Frames are copied by the engine.
pub struct LowLightEngine {
    lib: VDLowLight,
    handle: *mut c_void,
    frame_len: usize,
    total_frames: usize,
    frames: usize,
}

impl LowLightEngine {
    /// Loads the low-light library and initializes an engine, optionally
    /// limited to `cores` processing cores.
    pub fn new(params: VDLowLightParameters, cores: Option<usize>) -> Result<Self, BurstError> {
        Self::open(LOW_LIGHT_LIBRARY, params, cores)
    }

    pub fn open(
        path: &str,
        params: VDLowLightParameters,
        cores: Option<usize>,
    ) -> Result<Self, BurstError> {
        let frame_len = frame_size(
            params.type_,
            c_dim(params.cols, "cols")?,
            c_dim(params.rows, "rows")?,
            usize::try_from(params.extraPadCols).unwrap_or(0),
            usize::try_from(params.extraPadRows).unwrap_or(0),
        )?;
        let total_frames = c_dim(params.totalFrames, "totalFrames")?;

        // SAFETY: the library runs no initializers beyond its C runtime.
        let lib = unsafe { VDLowLight::new(path) }?;
        let mut handle = null_mut();
        // SAFETY: `handle` is a valid out pointer for the new engine.
        let status = match cores {
            Some(cores) => unsafe {
                lib.VDInitializeLowLightWithCores(params, to_c(cores, "cores")?, &mut handle)
            },
            None => unsafe { lib.VDInitializeLowLight(params, &mut handle) },
        };
        check(status, "VDInitializeLowLight")?;
        debug!("low-light engine initialized for {total_frames} frames");
        Ok(Self {
            lib,
            handle,
            frame_len,
            total_frames,
            frames: 0,
        })
    }

    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    pub fn add_frame(&mut self, frame: &mut [u8]) -> Result<(), BurstError> {
        if self.frames == self.total_frames {
            return Err(BurstError::TooManyFrames {
                max: self.total_frames,
            });
        }
        check_len(frame, self.frame_len)?;
        // allocate = 1: the engine keeps its own copy.
        check(
            // SAFETY: the frame holds `frame_len` bytes and is copied before
            // the call returns.
            unsafe { self.lib.VDLowLight_AddFrame(frame.as_mut_ptr(), 1, self.handle) },
            "VDLowLight_AddFrame",
        )?;
        self.frames += 1;
        Ok(())
    }

    pub fn process(&mut self, output: &mut [u8]) -> Result<(), BurstError> {
        if self.frames == 0 {
            return Err(BurstError::NoFrames);
        }
        check_len(output, self.frame_len)?;
        check(
            // SAFETY: the handle is live and `output` holds one frame.
            unsafe { self.lib.VDLowLight_Process(output.as_mut_ptr(), self.handle) },
            "VDLowLight_Process",
        )
    }

    pub fn version(&self) -> Option<String> {
        // SAFETY: the library returns a static NUL terminated string or null.
        unsafe { version_string(self.lib.VDLowLight_GetVersion()) }
    }

    pub fn release(mut self) -> Result<(), BurstError> {
        self.release_handle()
    }

    fn release_handle(&mut self) -> Result<(), BurstError> {
        if self.handle.is_null() {
            return Ok(());
        }
        // SAFETY: the handle is non-null and released exactly once here.
        let status = unsafe { self.lib.VDReleaseLowLight(&mut self.handle) };
        self.handle = null_mut();
        debug!("low-light engine released");
        check(status, "VDReleaseLowLight")
    }
}

impl Drop for LowLightEngine {
    fn drop(&mut self) {
        if let Err(err) = self.release_handle() {
            warn!("{err}");
        }
    }
}

/// Multi-frame super resolution. Frames are copied into engine storage.
pub struct SuperPhotoEngine {
    lib: VDSuperPhoto,
    handle: *mut c_void,
    format: VDDatatype,
    frame_len: usize,
    total_frames: usize,
    frames: usize,
}

impl SuperPhotoEngine {
    pub fn new(
        params: VDSuperPhotoInitializeParams,
        cores: Option<usize>,
    ) -> Result<Self, BurstError> {
        Self::open(SUPER_PHOTO_LIBRARY, params, cores)
    }

    pub fn open(
        path: &str,
        params: VDSuperPhotoInitializeParams,
        cores: Option<usize>,
    ) -> Result<Self, BurstError> {
        let frame_len = frame_size(
            params.type_,
            c_dim(params.cols, "cols")?,
            c_dim(params.rows, "rows")?,
            usize::try_from(params.extraPadCols).unwrap_or(0),
            usize::try_from(params.extraPadRows).unwrap_or(0),
        )?;
        let total_frames = c_dim(params.totalFrames, "totalFrames")?;

        // SAFETY: the library runs no initializers beyond its C runtime.
        let lib = unsafe { VDSuperPhoto::new(path) }?;
        let mut handle = null_mut();
        // SAFETY: `handle` is a valid out pointer for the new engine.
        let status = match cores {
            Some(cores) => unsafe {
                lib.VDInitializeSuperPhotoWithCores(params, to_c(cores, "cores")?, &mut handle)
            },
            None => unsafe { lib.VDInitializeSuperPhoto(params, &mut handle) },
        };
        check(status, "VDInitializeSuperPhoto")?;
        debug!("super-photo engine initialized for {total_frames} frames");
        Ok(Self {
            lib,
            handle,
            format: params.type_,
            frame_len,
            total_frames,
            frames: 0,
        })
    }

    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    /// Output geometry the engine will produce.
    pub fn output_size(&self) -> Result<(usize, usize), BurstError> {
        // SAFETY: both getters only read the live handle.
        let cols = unsafe { self.lib.VDSuperPhoto_GetOuputWidth(self.handle) };
        let rows = unsafe { self.lib.VDSuperPhoto_GetOuputHeight(self.handle) };
        Ok((c_dim(cols, "output width")?, c_dim(rows, "output height")?))
    }

    /// Scene darkness hint, 0 (bright) to 10 (very dark), for a frame
    /// captured at `iso`.
    pub fn low_light_scene_value(
        &self,
        iso: i32,
        frame: &mut [u8],
        cols: usize,
        rows: usize,
    ) -> Result<i32, BurstError> {
        check_len(frame, frame_size(self.format, cols, rows, 0, 0)?)?;
        // SAFETY: `frame` was checked against the unpadded size of `cols` x `rows`.
        Ok(unsafe {
            self.lib.VDSuperPhoto_GetLowLightSceneValue(
                iso,
                frame.as_mut_ptr(),
                to_c(cols, "cols")?,
                to_c(rows, "rows")?,
            )
        })
    }

    pub fn add_frame(&mut self, frame: &mut [u8]) -> Result<(), BurstError> {
        if self.frames == self.total_frames {
            return Err(BurstError::TooManyFrames {
                max: self.total_frames,
            });
        }
        check_len(frame, self.frame_len)?;
        check(
            // SAFETY: the frame holds `frame_len` bytes and is copied into
            // engine storage.
            unsafe {
                self.lib
                    .VDSuperPhoto_AddFrameAndAllocate(frame.as_mut_ptr(), self.handle)
            },
            "VDSuperPhoto_AddFrameAndAllocate",
        )?;
        self.frames += 1;
        Ok(())
    }

    /// Runs the engine over the added frames, writing into `output`, which
    /// must hold an image of [`Self::output_size`].
    pub fn process(
        &mut self,
        params: VDSuperPhotoRuntimeParams,
        output: &mut [u8],
    ) -> Result<(), BurstError> {
        if self.frames == 0 {
            return Err(BurstError::NoFrames);
        }
        let (cols, rows) = self.output_size()?;
        check_len(output, frame_size(self.format, cols, rows, 0, 0)?)?;
        // SAFETY: `output` is sized for the engine output and stays borrowed
        // until the process call below has returned.
        check(
            unsafe {
                self.lib
                    .VDSuperPhoto_AddOutputBuffer(output.as_mut_ptr(), self.handle)
            },
            "VDSuperPhoto_AddOutputBuffer",
        )?;
        check(
            // SAFETY: the handle is live with frames and an output attached.
            unsafe { self.lib.VDSuperPhoto_Process(params, self.handle) },
            "VDSuperPhoto_Process",
        )
    }

    pub fn version(&self) -> Option<String> {
        // SAFETY: the library returns a static NUL terminated string or null.
        unsafe { version_string(self.lib.VDSuperPhoto_GetVersion()) }
    }

    pub fn release(mut self) -> Result<(), BurstError> {
        self.release_handle()
    }

    fn release_handle(&mut self) -> Result<(), BurstError> {
        if self.handle.is_null() {
            return Ok(());
        }
        // SAFETY: the handle is non-null and released exactly once here.
        let status = unsafe { self.lib.VDReleaseSuperPhoto(&mut self.handle) };
        self.handle = null_mut();
        debug!("super-photo engine released");
        check(status, "VDReleaseSuperPhoto")
    }
}

impl Drop for SuperPhotoEngine {
    fn drop(&mut self) {
        if let Err(err) = self.release_handle() {
            warn!("{err}");
        }
    }
}

/// Frame handed to the beauty engine, processed in place.
#[derive(Debug)]
pub struct BeautyImage<'a> {
    pub data: &'a mut [u8],
    pub cols: usize,
    pub rows: usize,
    pub format: beauty::VDBeatyShotImageFormat,
    /// Strength per filter, indexed by the `beauty` filter constants.
    pub filters: [i32; beauty::NUMBER_OF_BEAUTYFILTERS],
    /// Faces known to the caller; the engine tracks faces itself in preview
    /// mode when none are given.
    pub faces: Vec<VDBeautyFace>,
    pub force_smoothing: bool,
    pub color_noise_reduction: i32,
    pub luminance_noise_reduction: i32,
    pub sharpening: i32,
    /// Orientation of still images relative to preview, 90 or 270.
    pub still_rotation: i32,
}

impl<'a> BeautyImage<'a> {
    pub fn new(
        data: &'a mut [u8],
        cols: usize,
        rows: usize,
        format: beauty::VDBeatyShotImageFormat,
    ) -> Self {
        Self {
            data,
            cols,
            rows,
            format,
            filters: [0; beauty::NUMBER_OF_BEAUTYFILTERS],
            faces: Vec::new(),
            force_smoothing: false,
            color_noise_reduction: 0,
            luminance_noise_reduction: 0,
            sharpening: 0,
            still_rotation: 90,
        }
    }

    fn shot_data(&mut self) -> Result<VDBeautyShotData, BurstError> {
        let expected = match self.format {
            beauty::YUV_420_NV12 | beauty::YUV_420_NV21 | beauty::YUV_YV12 => {
                self.cols * self.rows * 3 / 2
            }
            beauty::YUV_YUYV => 2 * self.cols * self.rows,
            beauty::RGB_888 => 3 * self.cols * self.rows,
            other => {
                return Err(BurstError::InvalidParameter(format!(
                    "unsupported beauty image format {other}"
                )))
            }
        };
        check_len(self.data, expected)?;
        if self.faces.len() > beauty::MAX_BEAUTY_SHOT_FACES_IN_TRACK {
            return Err(BurstError::InvalidParameter(format!(
                "at most {} faces are supported",
                beauty::MAX_BEAUTY_SHOT_FACES_IN_TRACK
            )));
        }
        let mut faces = [VDBeautyFace::default(); beauty::MAX_BEAUTY_SHOT_FACES_IN_TRACK];
        faces[..self.faces.len()].copy_from_slice(&self.faces);

        Ok(VDBeautyShotData {
            imagePtr: self.data.as_mut_ptr(),
            imageCols: to_c(self.cols, "cols")?,
            imageRows: to_c(self.rows, "rows")?,
            nbrOfFaces: self.faces.len() as c_int,
            faces,
            jpegDataSize: 0,
            jpegSavingQuality: 0,
            outputJpeg: null_mut(),
            ouputJpegDataSize: 0,
            imageFormat: self.format,
            beautyFilterParams: self.filters,
            forceSmoothing: c_int::from(self.force_smoothing),
            colorNoiseReduction: self.color_noise_reduction,
            luminanceNoiseReduction: self.luminance_noise_reduction,
            sharpening: self.sharpening,
            padRows: 0,
            padCols: 0,
            stillImageRotation: self.still_rotation,
        })
    }
}

/// Face beautification for preview frames and still images.
pub struct BeautyEngine {
    lib: VDBeautyShot,
    handle: *mut c_void,
}

impl BeautyEngine {
    pub fn new(
        preview_cols: usize,
        preview_rows: usize,
        mode: beauty::VDBeautyEngineProcessingMode,
        memory: beauty::VDBeautyEngineGPUMemoryMode,
        cores: Option<usize>,
    ) -> Result<Self, BurstError> {
        Self::open(BEAUTY_LIBRARY, preview_cols, preview_rows, mode, memory, cores)
    }

    pub fn open(
        path: &str,
        preview_cols: usize,
        preview_rows: usize,
        mode: beauty::VDBeautyEngineProcessingMode,
        memory: beauty::VDBeautyEngineGPUMemoryMode,
        cores: Option<usize>,
    ) -> Result<Self, BurstError> {
        if memory == beauty::RENDER_TO_WINDOW {
            return Err(BurstError::InvalidParameter(
                "window rendering needs a native window, use open_with_window".to_owned(),
            ));
        }
        let cols = to_c(preview_cols, "preview cols")?;
        let rows = to_c(preview_rows, "preview rows")?;
        // SAFETY: the library runs no initializers beyond its C runtime.
        let lib = unsafe { VDBeautyShot::new(path) }?;
        let mut handle = null_mut();
        // SAFETY: `handle` is a valid out pointer for the new engine.
        let status = match cores {
            Some(cores) => unsafe {
                lib.VDInitializeBeautyShotWithCores(
                    cols,
                    rows,
                    mode,
                    memory,
                    to_c(cores, "cores")?,
                    &mut handle,
                )
            },
            None => unsafe { lib.VDInitializeBeautyShot(cols, rows, mode, memory, &mut handle) },
        };
        check(status, "VDInitializeBeautyShot")?;
        debug!("beauty engine initialized for {preview_cols}x{preview_rows} preview");
        Ok(Self { lib, handle })
    }

    /// Initializes an engine rendering previews straight to `window`.
    ///
    /// # Safety
    ///
    /// `window` must be a valid native window handle that outlives the
    /// engine.
    pub unsafe fn open_with_window(
        path: &str,
        preview_cols: usize,
        preview_rows: usize,
        mode: beauty::VDBeautyEngineProcessingMode,
        window: *mut c_void,
        cores: Option<usize>,
    ) -> Result<Self, BurstError> {
        let cols = to_c(preview_cols, "preview cols")?;
        let rows = to_c(preview_rows, "preview rows")?;
        // SAFETY: the library runs no initializers beyond its C runtime.
        let lib = unsafe { VDBeautyShot::new(path) }?;
        let mut handle = null_mut();
        // SAFETY: `handle` is a valid out pointer and the caller vouches for
        // `window`.
        let status = match cores {
            Some(cores) => unsafe {
                lib.VDInitializeBeautyShotWithWindowAndCores(
                    cols,
                    rows,
                    mode,
                    beauty::RENDER_TO_WINDOW,
                    window,
                    to_c(cores, "cores")?,
                    &mut handle,
                )
            },
            None => unsafe {
                lib.VDInitializeBeautyShotWithWindow(
                    cols,
                    rows,
                    mode,
                    beauty::RENDER_TO_WINDOW,
                    window,
                    &mut handle,
                )
            },
        };
        check(status, "VDInitializeBeautyShotWithWindow")?;
        Ok(Self { lib, handle })
    }

    /// Configures the rendered preview: output size, a 4x4 texture
    /// transform and the scissor box `[x, y, width, height]`.
    pub fn setup_preview_output(
        &mut self,
        cols: usize,
        rows: usize,
        transform: &mut [c_float; 16],
        scissor: &mut [c_int; 4],
    ) -> Result<(), BurstError> {
        check(
            // SAFETY: both arrays are exclusively borrowed for the call.
            unsafe {
                self.lib.VDSetupPreviewOutput(
                    to_c(cols, "cols")?,
                    to_c(rows, "rows")?,
                    transform.as_mut_ptr(),
                    scissor.as_mut_ptr(),
                    self.handle,
                )
            },
            "VDSetupPreviewOutput",
        )
    }

    /// Lighter filtering suited to minors.
    pub fn set_minor_mode(&mut self, enabled: bool) -> Result<(), BurstError> {
        check(
            // SAFETY: the handle is live.
            unsafe { self.lib.VDSetMinorMode(c_int::from(enabled), self.handle) },
            "VDSetMinorMode",
        )
    }

    pub fn process_preview(&mut self, image: &mut BeautyImage<'_>) -> Result<(), BurstError> {
        let mut data = image.shot_data()?;
        check(
            // SAFETY: `data` points into `image`, which `shot_data` checked
            // and which stays borrowed for the call.
            unsafe { self.lib.VDProcessPreviewFrame(&mut data, self.handle) },
            "VDProcessPreviewFrame",
        )
    }

    pub fn process_still(&mut self, image: &mut BeautyImage<'_>) -> Result<(), BurstError> {
        let mut data = image.shot_data()?;
        check(
            // SAFETY: `data` points into `image`, which `shot_data` checked
            // and which stays borrowed for the call.
            unsafe { self.lib.VDProcessStillImage(&mut data, self.handle) },
            "VDProcessStillImage",
        )
    }

    /// Faces currently tracked by the engine.
    pub fn faces(&self) -> Vec<VDBeautyFace> {
        // SAFETY: the getters only read the live handle, and `index` stays
        // below the count it reported.
        let count = unsafe { self.lib.VDGetNumberOfBeautyFaces(self.handle) }.max(0);
        (0..count)
            .map(|index| unsafe { self.lib.VDGetBeautyFace(index, self.handle) })
            .collect()
    }

    pub fn version(&self) -> Option<String> {
        // SAFETY: the library returns a static NUL terminated string or null.
        unsafe { version_string(self.lib.VDBeautyShot_GetVersion()) }
    }

    pub fn release(mut self) -> Result<(), BurstError> {
        self.release_handle()
    }

    fn release_handle(&mut self) -> Result<(), BurstError> {
        if self.handle.is_null() {
            return Ok(());
        }
        // SAFETY: the handle is non-null and released exactly once here.
        let status = unsafe { self.lib.VDReleaseBeautyShot(&mut self.handle) };
        self.handle = null_mut();
        debug!("beauty engine released");
        check(status, "VDReleaseBeautyShot")
    }
}

impl Drop for BeautyEngine {
    fn drop(&mut self) {
        if let Err(err) = self.release_handle() {
            warn!("{err}");
        }
    }
}

/// Bytes needed by a single-shot HDR frame.
pub fn single_shot_frame_size(
    format: single_shot_hdr::VDSingleShotHDRImageFormat,
    cols: usize,
    rows: usize,
) -> Result<usize, BurstError> {
    match format {
        single_shot_hdr::IMAGE_FORMAT_NV21 | single_shot_hdr::IMAGE_FORMAT_YV12 => {
            Ok(cols * rows * 3 / 2)
        }
        single_shot_hdr::IMAGE_FORMAT_YUYV => Ok(2 * cols * rows),
        other => Err(BurstError::InvalidParameter(format!(
            "unsupported single-shot HDR format {other}"
        ))),
    }
}

/// Single frame dynamic range optimisation.
pub struct SingleShotHdrEngine {
    lib: VDSingleShotHDR,
    handle: *mut c_void,
    cols: usize,
    rows: usize,
    format: single_shot_hdr::VDSingleShotHDRImageFormat,
}

impl SingleShotHdrEngine {
    pub fn new(cols: usize, rows: usize) -> Result<Self, BurstError> {
        Self::open(SINGLE_SHOT_HDR_LIBRARY, cols, rows)
    }

    pub fn open(path: &str, cols: usize, rows: usize) -> Result<Self, BurstError> {
        let c_cols = to_c(cols, "cols")?;
        let c_rows = to_c(rows, "rows")?;
        // SAFETY: the library runs no initializers beyond its C runtime.
        let lib = unsafe { VDSingleShotHDR::new(path) }?;
        let mut handle = null_mut();
        check(
            // SAFETY: `handle` is a valid out pointer for the new engine.
            unsafe {
                lib.VDInitializeSingleShotHDR(
                    c_cols,
                    c_rows,
                    single_shot_hdr::MEMCPY_PIXELBUFFEROBJECT,
                    &mut handle,
                )
            },
            "VDInitializeSingleShotHDR",
        )?;
        debug!("single-shot HDR engine initialized for {cols}x{rows}");
        Ok(Self {
            lib,
            handle,
            cols,
            rows,
            format: single_shot_hdr::IMAGE_FORMAT_NV21,
        })
    }

    fn set_int(
        &mut self,
        what: single_shot_hdr::VDSingleShotHDRParam,
        value: c_int,
    ) -> Result<(), BurstError> {
        let mut value = value;
        check(
            // SAFETY: every integer parameter is read through a c_int pointer
            // that lives for the call.
            unsafe {
                self.lib.VDSetSingleShotHDRParameter(
                    what,
                    (&mut value as *mut c_int).cast(),
                    self.handle,
                )
            },
            "VDSetSingleShotHDRParameter",
        )
    }

    pub fn set_image_format(
        &mut self,
        format: single_shot_hdr::VDSingleShotHDRImageFormat,
    ) -> Result<(), BurstError> {
        single_shot_frame_size(format, self.cols, self.rows)?;
        self.set_int(single_shot_hdr::VDDRO_IMAGE_FORMAT, format)?;
        self.format = format;
        Ok(())
    }

    pub fn set_noise_removal(&mut self, strength: i32) -> Result<(), BurstError> {
        self.set_int(single_shot_hdr::VDDRO_NOISEREMOVAL_STRENGTH, strength)
    }

    pub fn set_preview_size(&mut self, cols: usize, rows: usize) -> Result<(), BurstError> {
        self.set_int(single_shot_hdr::VDDRO_PREVIEW_WIDTH, to_c(cols, "cols")?)?;
        self.set_int(single_shot_hdr::VDDRO_PREVIEW_HEIGHT, to_c(rows, "rows")?)
    }

    /// Processes a frame in place.
    pub fn process_frame(
        &mut self,
        frame: &mut [u8],
        intensity: i32,
        contrast: i32,
    ) -> Result<(), BurstError> {
        check_len(frame, single_shot_frame_size(self.format, self.cols, self.rows)?)?;
        check(
            // SAFETY: `frame` was checked against the configured format and size.
            unsafe {
                self.lib.VDProcessSingleShotHDRFrame(
                    frame.as_mut_ptr(),
                    intensity,
                    contrast,
                    self.handle,
                )
            },
            "VDProcessSingleShotHDRFrame",
        )
    }

    /// Processes a still image of any size in place.
    pub fn process_still(
        &self,
        image: &mut [u8],
        cols: usize,
        rows: usize,
        format: single_shot_hdr::VDSingleShotHDRImageFormat,
        intensity: i32,
        contrast: i32,
    ) -> Result<(), BurstError> {
        check_len(image, single_shot_frame_size(format, cols, rows)?)?;
        check(
            // SAFETY: `image` was checked against `format` at `cols` x `rows`.
            unsafe {
                self.lib.VDProcessSingleShotHDRStill(
                    image.as_mut_ptr(),
                    to_c(cols, "cols")?,
                    to_c(rows, "rows")?,
                    format,
                    intensity,
                    contrast,
                )
            },
            "VDProcessSingleShotHDRStill",
        )
    }

    pub fn version(&self) -> Option<String> {
        // SAFETY: the library returns a static NUL terminated string or null.
        unsafe { version_string(self.lib.VDSingleShotHDR_GetVersion()) }
    }

    pub fn release(mut self) -> Result<(), BurstError> {
        self.release_handle()
    }

    fn release_handle(&mut self) -> Result<(), BurstError> {
        if self.handle.is_null() {
            return Ok(());
        }
        // SAFETY: the handle is non-null and released exactly once here.
        let status = unsafe { self.lib.VDReleaseSingleShotHDR(&mut self.handle) };
        self.handle = null_mut();
        debug!("single-shot HDR engine released");
        check(status, "VDReleaseSingleShotHDR")
    }
}

impl Drop for SingleShotHdrEngine {
    fn drop(&mut self) {
        if let Err(err) = self.release_handle() {
            warn!("{err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use visidon_sys::{VD_JPEG, VD_RGB888, VD_YUV_NV12, VD_YUV_UYVY};

    #[test]
    fn frame_sizes() {
        assert_eq!(frame_size(VD_YUV_NV12, 1920, 1080, 0, 0).unwrap(), 3_110_400);
        assert_eq!(
            frame_size(VD_YUV_NV12, 640, 480, 64, 16).unwrap(),
            704 * 496 + 704 * 240
        );
        assert_eq!(frame_size(VD_YUV_UYVY, 640, 480, 0, 0).unwrap(), 614_400);
        assert_eq!(frame_size(VD_RGB888, 2, 2, 0, 0).unwrap(), 12);
        assert!(matches!(
            frame_size(VD_JPEG, 640, 480, 0, 0),
            Err(BurstError::InvalidParameter(_))
        ));
        assert_eq!(
            single_shot_frame_size(single_shot_hdr::IMAGE_FORMAT_YUYV, 640, 480).unwrap(),
            614_400
        );
    }

    #[test]
    fn hdr_output_is_unpadded() {
        let params = VDHDRParameters {
            type_: VD_YUV_NV12,
            cols: 640,
            rows: 480,
            extraPadCols: 64,
            extraPadRows: 16,
            totalFrames: 3,
            ..Default::default()
        };
        let (frame_len, output_len) = hdr_sizes(&params).unwrap();
        assert_eq!(frame_len, 704 * 496 + 704 * 240);
        assert_eq!(output_len, 460_800);
    }

    #[test]
    fn short_buffers_are_refused() {
        let buf = [0u8; 10];
        assert!(matches!(
            check_len(&buf, 11),
            Err(BurstError::FrameSize {
                expected: 11,
                actual: 10
            })
        ));
        assert!(check_len(&buf, 10).is_ok());
    }

    #[test]
    fn status_names_the_entry_point() {
        assert!(check(VD_OK, "VDHDR_AddFrame").is_ok());
        let err = check(visidon_sys::VD_NOK, "VDHDR_AddFrame").unwrap_err();
        assert_eq!(err.to_string(), "VDHDR_AddFrame failed");
    }

    #[test]
    fn version_strings() {
        // SAFETY: null is accepted and `text` is a NUL terminated literal.
        assert_eq!(unsafe { version_string(std::ptr::null()) }, None);
        let text = c"4.2.1";
        assert_eq!(
            unsafe { version_string(text.as_ptr()) }.as_deref(),
            Some("4.2.1")
        );
    }

    #[test]
    fn dimensions_must_be_positive() {
        assert!(c_dim(0, "cols").is_err());
        assert!(c_dim(-4, "rows").is_err());
        assert_eq!(c_dim(640, "cols").unwrap(), 640);
    }
}
