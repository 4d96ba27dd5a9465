// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Raw bindings for the Visidon imaging engines.
//!
//! The engines ship as closed shared libraries, so every entry point is
//! resolved at runtime with `libloading`. Each engine gets its own module
//! holding its C types and a loader struct exposing the entry points as
//! `unsafe` methods named after the C symbols.

#![allow(non_camel_case_types, non_snake_case, non_upper_case_globals)]

use libc::c_int;

pub use libloading;

macro_rules! dynamic_library {
    (
        $(#[$meta:meta])*
        pub struct $name:ident {
            $(fn $func:ident($($arg:ident: $ty:ty),* $(,)?) -> $ret:ty;)*
        }
    ) => {
        $(#[$meta])*
        pub struct $name {
            __library: ::libloading::Library,
            $($func: unsafe extern "C" fn($($ty),*) -> $ret,)*
        }

        impl $name {
            /// Loads the shared library at `path` and resolves every entry
            /// point.
            ///
            /// # Safety
            ///
            /// Loading a library runs its initialisers. The caller must
            /// ensure the library at `path` is the expected vendor build
            /// whose symbols match the declared signatures.
            pub unsafe fn new<P>(path: P) -> Result<Self, ::libloading::Error>
            where
                P: AsRef<::std::ffi::OsStr>,
            {
                let library = unsafe { ::libloading::Library::new(path) }?;
                unsafe { Self::from_library(library) }
            }

            /// Resolves every entry point from an already opened library.
            ///
            /// # Safety
            ///
            /// Same requirements as [`Self::new`].
            pub unsafe fn from_library(
                library: ::libloading::Library,
            ) -> Result<Self, ::libloading::Error> {
                $(
                    let $func = unsafe {
                        *library.get::<unsafe extern "C" fn($($ty),*) -> $ret>(
                            concat!(stringify!($func), "\0").as_bytes(),
                        )?
                    };
                )*
                Ok(Self {
                    __library: library,
                    $($func,)*
                })
            }

            $(
                /// Calls the C entry point of the same name.
                ///
                /// # Safety
                ///
                /// Pointer arguments must satisfy the vendor contract for
                /// this entry point.
                pub unsafe fn $func(&self, $($arg: $ty),*) -> $ret {
                    unsafe { (self.$func)($($arg),*) }
                }
            )*
        }
    };
}

/// General status returned by the HDR, low-light and super-photo engines.
pub type VDErrorType = c_int;
pub const VD_OK: VDErrorType = 0;
pub const VD_NOK: VDErrorType = 1;

/// Pixel layouts shared by the multi-frame engines.
pub type VDDatatype = c_int;
pub const VD_RawGray: VDDatatype = 1;
pub const VD_YUV422: VDDatatype = 2;
pub const VD_RGB565: VDDatatype = 3;
pub const VD_RGBA8888: VDDatatype = 4;
pub const VD_RawBayer: VDDatatype = 5;
pub const VD_RGB888: VDDatatype = 6;
pub const VD_JPEG: VDDatatype = 7;
pub const VD_YUV_NV21: VDDatatype = 8;
pub const VD_YUV_NV12: VDDatatype = 9;
pub const VD_YUV_NV16: VDDatatype = 10;
pub const VD_YUV_420P: VDDatatype = 11;
pub const VD_YUV_YUYV: VDDatatype = 12;
pub const VD_YUV_UYVY: VDDatatype = 13;
pub const VD_BAYER10: VDDatatype = 14;

pub mod hdr {
    use super::{VDDatatype, VDErrorType};
    use libc::{c_char, c_int, c_uchar, c_void};

    #[repr(C)]
    #[derive(Debug, Clone, Copy, Default)]
    pub struct VDHDRParameters {
        pub type_: VDDatatype,
        pub cols: c_int,
        pub rows: c_int,
        pub extraPadRows: c_int,
        pub extraPadCols: c_int,
        pub totalFrames: c_int,
        pub contrastEnhancement: c_int,
        pub colorBoost: c_int,
        pub noiseReductionStrength: c_int,
        pub colorFilterStrength: c_int,
        pub sharpen: c_int,
    }

    dynamic_library! {
        /// Multi-frame HDR engine entry points.
        pub struct VDHDR {
            fn VDHDRGetDefaultParams(cols: c_int, rows: c_int) -> VDHDRParameters;
            fn VDInitializeHDR(params: VDHDRParameters, engine: *mut *mut c_void) -> VDErrorType;
            fn VDReleaseHDR(engine: *mut *mut c_void) -> VDErrorType;
            fn VDHDR_AddFrame(yuvImage: *mut c_uchar, engine: *mut c_void) -> VDErrorType;
            fn VDHDR_Process(outputYUV: *mut c_uchar, engine: *mut c_void) -> c_int;
            fn VDHDR_GetVersion() -> *mut c_char;
        }
    }
}

pub mod lowlight {
    use super::{VDDatatype, VDErrorType};
    use libc::{c_char, c_int, c_uchar, c_void};

    #[repr(C)]
    #[derive(Debug, Clone, Copy, Default)]
    pub struct VDLowLightParameters {
        pub type_: VDDatatype,
        pub noiseReductionStrength: c_int,
        pub colorFilterStrength: c_int,
        pub dynamicRangeBoost: c_int,
        pub lowIntensityBoost: c_int,
        pub contrastStretching: c_int,
        pub colorBoost: c_int,
        pub colorNormalization: c_int,
        pub effectiveFrames: c_int,
        pub deghostingStrength: c_int,
        pub movingObjectNoiseRemoval: c_int,
        pub cols: c_int,
        pub rows: c_int,
        pub extraPadRows: c_int,
        pub extraPadCols: c_int,
        pub totalFrames: c_int,
        pub sharpen: c_int,
    }

    dynamic_library! {
        /// Low-light burst engine entry points.
        pub struct VDLowLight {
            fn VDInitializeLowLight(
                params: VDLowLightParameters,
                engine: *mut *mut c_void,
            ) -> VDErrorType;
            fn VDInitializeLowLightWithCores(
                params: VDLowLightParameters,
                numberOfCores: c_int,
                engine: *mut *mut c_void,
            ) -> VDErrorType;
            fn VDReleaseLowLight(engine: *mut *mut c_void) -> VDErrorType;
            fn VDLowLight_AddFrame(
                yuvImage: *mut c_uchar,
                allocate: c_int,
                engine: *mut c_void,
            ) -> VDErrorType;
            fn VDLowLight_Process(outputYUV: *mut c_uchar, engine: *mut c_void) -> VDErrorType;
            fn VDLowLight_GetVersion() -> *mut c_char;
        }
    }
}

pub mod superphoto {
    use super::{VDDatatype, VDErrorType};
    use libc::{c_char, c_float, c_int, c_uchar, c_void};

    pub type VDSuperPhotoMode = c_int;
    /// Scale the images to the requested output size.
    pub const VD_SCALE: VDSuperPhotoMode = 0;
    /// Crop from the center and zoom back to the input size.
    pub const VD_ZOOM: VDSuperPhotoMode = 1;

    #[repr(C)]
    #[derive(Debug, Clone, Copy, Default)]
    pub struct VDSuperPhotoInitializeParams {
        pub totalFrames: c_int,
        pub type_: VDDatatype,
        pub cols: c_int,
        pub rows: c_int,
        pub extraPadRows: c_int,
        pub extraPadCols: c_int,
        pub mode: VDSuperPhotoMode,
        pub zoom: c_float,
        pub outputCols: c_int,
        pub outputRows: c_int,
    }

    #[repr(C)]
    #[derive(Debug, Clone, Copy, Default)]
    pub struct VDSuperPhotoRuntimeParams {
        pub noiseReductionStrength: c_int,
        pub colorFilterStrength: c_int,
        pub sharpen: c_int,
        pub contrastStretching: c_int,
        pub isoValue: c_int,
        pub gain: c_float,
        pub dynamicRangeBoost: c_int,
        pub lowIntensityBoost: c_int,
        pub colorBoost: c_int,
        pub deghostingStrength: c_int,
    }

    dynamic_library! {
        /// Super-photo (multi-frame super resolution) engine entry points.
        pub struct VDSuperPhoto {
            fn VDInitializeSuperPhoto(
                params: VDSuperPhotoInitializeParams,
                engine: *mut *mut c_void,
            ) -> VDErrorType;
            fn VDInitializeSuperPhotoWithCores(
                params: VDSuperPhotoInitializeParams,
                numberOfCores: c_int,
                engine: *mut *mut c_void,
            ) -> VDErrorType;
            fn VDReleaseSuperPhoto(engine: *mut *mut c_void) -> VDErrorType;
            fn VDSuperPhoto_GetLowLightSceneValue(
                isoValue: c_int,
                yuvImage: *mut c_uchar,
                cols: c_int,
                rows: c_int,
            ) -> c_int;
            fn VDSuperPhoto_AddFrame(yuvImage: *mut c_uchar, engine: *mut c_void) -> VDErrorType;
            fn VDSuperPhoto_AddFrameAndAllocate(
                yuvImage: *mut c_uchar,
                engine: *mut c_void,
            ) -> VDErrorType;
            fn VDSuperPhoto_Process(
                params: VDSuperPhotoRuntimeParams,
                engine: *mut c_void,
            ) -> VDErrorType;
            fn VDSuperPhoto_GetOuputWidth(engine: *mut c_void) -> c_int;
            fn VDSuperPhoto_GetOuputHeight(engine: *mut c_void) -> c_int;
            fn VDSuperPhoto_AddOutputBuffer(
                output: *mut c_uchar,
                engine: *mut c_void,
            ) -> VDErrorType;
            fn VDSuperPhoto_GetVersion() -> *mut c_char;
        }
    }
}

pub mod beauty {
    use libc::{c_char, c_float, c_int, c_uchar, c_void};

    pub const MAX_BEAUTY_SHOT_FACES_IN_TRACK: usize = 5;

    pub type VDBeautyFilters = c_int;
    pub const SKIN_SMOOTHING: VDBeautyFilters = 0;
    pub const SPOT_SMOOTHING: VDBeautyFilters = 1;
    pub const FACE_CONTOURING: VDBeautyFilters = 2;
    pub const TEETH_WHITENING: VDBeautyFilters = 3;
    pub const EYE_SHAPING: VDBeautyFilters = 4;
    pub const CHEEK_BLUSHING: VDBeautyFilters = 5;
    pub const SKIN_TONE_ADJUSTING: VDBeautyFilters = 6;
    pub const MOUTH_SHAPING: VDBeautyFilters = 7;
    pub const NOSE_SHAPING: VDBeautyFilters = 8;
    pub const EYEBROW_SHAPING: VDBeautyFilters = 9;
    pub const FACE_SHAPING: VDBeautyFilters = 10;
    pub const OUT_FOCUS: VDBeautyFilters = 11;
    pub const EYE_BRIGHTENING: VDBeautyFilters = 12;
    pub const LIP_TONING: VDBeautyFilters = 13;
    pub const SKIN_COLOR_ADJUSTING: VDBeautyFilters = 14;
    pub const SKIN_COLOR_CHANGE: VDBeautyFilters = 15;
    pub const MAX_BEAUTY_FILTER: VDBeautyFilters = 16;
    pub const NUMBER_OF_BEAUTYFILTERS: usize = MAX_BEAUTY_FILTER as usize;

    pub type VDBeatyShotImageFormat = c_int;
    pub const YUV_420_NV12: VDBeatyShotImageFormat = 0;
    pub const YUV_420_NV21: VDBeatyShotImageFormat = 1;
    pub const RGB_888: VDBeatyShotImageFormat = 2;
    pub const JPEG_COMPRESSED: VDBeatyShotImageFormat = 3;
    pub const YUV_YUYV: VDBeatyShotImageFormat = 4;
    pub const YUV_YV12: VDBeatyShotImageFormat = 5;

    pub type VDBeautyEngineGPUMemoryMode = c_int;
    pub const MEMCPY_READPIXELS: VDBeautyEngineGPUMemoryMode = 0;
    pub const MEMCPY_GRAPHICBUFFER: VDBeautyEngineGPUMemoryMode = 1;
    pub const RENDER_TO_WINDOW: VDBeautyEngineGPUMemoryMode = 2;

    pub type VDBeautyEngineProcessingMode = c_int;
    pub const VDBEAUTY_REALTIME_WITH_FACETRACKING_AND_STILL: VDBeautyEngineProcessingMode = 0;
    pub const VDBEAUTY_REALTIME_AND_STILL: VDBeautyEngineProcessingMode = 1;
    pub const VDBEAUTY_STILL: VDBeautyEngineProcessingMode = 2;

    pub type VDBeautyErrorCode = c_int;
    pub const VDBEAUTY_OK: VDBeautyErrorCode = 0;
    pub const VDBEAUTY_NOK: VDBeautyErrorCode = 1;

    #[repr(C)]
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct VDBeautyFace {
        pub left: c_int,
        pub top: c_int,
        pub right: c_int,
        pub bottom: c_int,
        pub leftEyeX: c_int,
        pub leftEyeY: c_int,
        pub rightEyeX: c_int,
        pub rightEyeY: c_int,
        pub smile: c_int,
    }

    #[repr(C)]
    #[derive(Debug, Clone, Copy)]
    pub struct VDBeautyShotData {
        pub imagePtr: *mut c_uchar,
        pub imageCols: c_int,
        pub imageRows: c_int,
        pub nbrOfFaces: c_int,
        pub faces: [VDBeautyFace; MAX_BEAUTY_SHOT_FACES_IN_TRACK],
        pub jpegDataSize: c_int,
        pub jpegSavingQuality: c_int,
        pub outputJpeg: *mut c_uchar,
        pub ouputJpegDataSize: c_int,
        pub imageFormat: VDBeatyShotImageFormat,
        pub beautyFilterParams: [i32; NUMBER_OF_BEAUTYFILTERS],
        pub forceSmoothing: c_int,
        pub colorNoiseReduction: c_int,
        pub luminanceNoiseReduction: c_int,
        pub sharpening: c_int,
        pub padRows: c_int,
        pub padCols: c_int,
        pub stillImageRotation: c_int,
    }

    dynamic_library! {
        /// Beauty-shot (face beautification) engine entry points.
        pub struct VDBeautyShot {
            fn VDInitializeBeautyShotWithCores(
                previewCols: c_int,
                previewRows: c_int,
                processingMode: VDBeautyEngineProcessingMode,
                gpuMemoryMode: VDBeautyEngineGPUMemoryMode,
                numberOfCores: c_int,
                engine: *mut *mut c_void,
            ) -> VDBeautyErrorCode;
            fn VDInitializeBeautyShot(
                previewCols: c_int,
                previewRows: c_int,
                processingMode: VDBeautyEngineProcessingMode,
                gpuMemoryMode: VDBeautyEngineGPUMemoryMode,
                engine: *mut *mut c_void,
            ) -> VDBeautyErrorCode;
            fn VDInitializeBeautyShotWithWindowAndCores(
                previewCols: c_int,
                previewRows: c_int,
                processingMode: VDBeautyEngineProcessingMode,
                gpuMemoryMode: VDBeautyEngineGPUMemoryMode,
                window: *mut c_void,
                numberOfCores: c_int,
                engine: *mut *mut c_void,
            ) -> VDBeautyErrorCode;
            fn VDInitializeBeautyShotWithWindow(
                previewCols: c_int,
                previewRows: c_int,
                processingMode: VDBeautyEngineProcessingMode,
                gpuMemoryMode: VDBeautyEngineGPUMemoryMode,
                window: *mut c_void,
                engine: *mut *mut c_void,
            ) -> VDBeautyErrorCode;
            fn VDSetupPreviewOutput(
                outWidth: c_int,
                outHeight: c_int,
                transformMatrix: *mut c_float,
                scissorBox: *mut c_int,
                engine: *mut c_void,
            ) -> VDBeautyErrorCode;
            fn VDReleaseBeautyShot(engine: *mut *mut c_void) -> VDBeautyErrorCode;
            fn VDProcessPreviewFrame(
                data: *mut VDBeautyShotData,
                engine: *mut c_void,
            ) -> VDBeautyErrorCode;
            fn VDProcessStillImage(
                data: *mut VDBeautyShotData,
                engine: *mut c_void,
            ) -> VDBeautyErrorCode;
            fn VDSetMinorMode(isSetMinorMode: c_int, engine: *mut c_void) -> VDBeautyErrorCode;
            fn VDBeautyShot_GetVersion() -> *mut c_char;
            fn VDGetBeautyFace(faceIndex: c_int, engine: *mut c_void) -> VDBeautyFace;
            fn VDGetNumberOfBeautyFaces(engine: *mut c_void) -> c_int;
        }
    }
}

pub mod single_shot_hdr {
    use libc::{c_char, c_int, c_uchar, c_void};

    pub type VDSingleShotHDRErrorCode = c_int;
    pub const VDSINGLESHOTHDR_OK: VDSingleShotHDRErrorCode = 0;
    pub const VDSINGLESHOTHDR_NOK: VDSingleShotHDRErrorCode = 1;

    pub type VDSingleShotHDRParam = c_int;
    pub const VDDRO_TRANSFORM_MATRIX: VDSingleShotHDRParam = 0;
    pub const VDDRO_PREVIEW_WIDTH: VDSingleShotHDRParam = 1;
    pub const VDDRO_PREVIEW_HEIGHT: VDSingleShotHDRParam = 2;
    pub const VDDRO_RECORDING_SURFACE: VDSingleShotHDRParam = 3;
    pub const VDDRO_RECORD: VDSingleShotHDRParam = 4;
    pub const VDDRO_RECORDING_TIMESTAMP: VDSingleShotHDRParam = 5;
    pub const VDDRO_RECORDING_TRANSFORM_MATRIX: VDSingleShotHDRParam = 6;
    pub const VDDRO_RECORDING_WIDTH: VDSingleShotHDRParam = 7;
    pub const VDDRO_RECORDING_HEIGHT: VDSingleShotHDRParam = 8;
    pub const VDDRO_IMAGE_FORMAT: VDSingleShotHDRParam = 9;
    pub const VDDRO_NOISEREMOVAL_STRENGTH: VDSingleShotHDRParam = 10;

    pub type VDSingleShotHDRImageFormat = c_int;
    pub const IMAGE_FORMAT_NV21: VDSingleShotHDRImageFormat = 17;
    pub const IMAGE_FORMAT_YV12: VDSingleShotHDRImageFormat = 842094169;
    pub const IMAGE_FORMAT_YUYV: VDSingleShotHDRImageFormat = 20;

    pub type VDSingleShotHDRGPUMemoryMode = c_int;
    pub const MEMCPY_PIXELBUFFEROBJECT: VDSingleShotHDRGPUMemoryMode = 0;
    pub const RENDER_TO_WINDOW: VDSingleShotHDRGPUMemoryMode = 1;

    dynamic_library! {
        /// Single-shot HDR (dynamic range optimisation) engine entry points.
        pub struct VDSingleShotHDR {
            fn VDInitializeSingleShotHDR(
                cols: c_int,
                rows: c_int,
                gpuMemoryMode: VDSingleShotHDRGPUMemoryMode,
                engine: *mut *mut c_void,
            ) -> VDSingleShotHDRErrorCode;
            fn VDInitializeSingleShotHDRWithWindow(
                cols: c_int,
                rows: c_int,
                window: *mut c_void,
                gpuMemoryMode: VDSingleShotHDRGPUMemoryMode,
                engine: *mut *mut c_void,
            ) -> VDSingleShotHDRErrorCode;
            fn VDReleaseSingleShotHDR(engine: *mut *mut c_void) -> VDSingleShotHDRErrorCode;
            fn VDSetSingleShotHDRParameter(
                what: c_int,
                value: *mut c_void,
                engine: *mut c_void,
            ) -> VDSingleShotHDRErrorCode;
            fn VDProcessSingleShotHDRFrame(
                image: *mut c_uchar,
                intensityStrength: c_int,
                contrastStrength: c_int,
                engine: *mut c_void,
            ) -> VDSingleShotHDRErrorCode;
            fn VDProcessSingleShotHDRStill(
                image: *mut c_uchar,
                cols: c_int,
                rows: c_int,
                format: VDSingleShotHDRImageFormat,
                intensityStrength: c_int,
                contrastStrength: c_int,
            ) -> VDSingleShotHDRErrorCode;
            fn VDSingleShotHDR_GetVersion() -> *mut c_char;
        }
    }
}
