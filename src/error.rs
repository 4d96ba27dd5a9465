// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use thiserror::Error;

/// Status returned by every stabilization engine operation.
///
/// Each variant names exactly one violated precondition or one internal
/// failure. The numeric codes returned by [`EisError::code`] are stable and
/// match the engine's historical status enumeration, with `0` reserved for
/// success.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EisError {
    #[error("image width is larger than the supported maximum")]
    WidthTooLarge,
    #[error("image height is larger than the supported maximum")]
    HeightTooLarge,
    #[error("image width is smaller than the supported minimum")]
    WidthTooSmall,
    #[error("image height is smaller than the supported minimum")]
    HeightTooSmall,
    #[error("border must not be negative")]
    BorderTooSmall,
    #[error("border is larger than the maximum stabilization margin")]
    BorderTooLarge,
    #[error("translation smoothing must not exceed 1.0")]
    TransSmoothTooLarge,
    #[error("translation smoothing must not be negative")]
    TransSmoothTooSmall,
    #[error("rotation smoothing must not exceed 1.0")]
    RotSmoothTooLarge,
    #[error("rotation smoothing must not be negative")]
    RotSmoothTooSmall,
    #[error("digital scaling product must not be negative")]
    DigitalScalingProductTooSmall,
    #[error("vertical blanking ratio exceeds 1.0")]
    VbRatioTooLarge,
    #[error("unknown input image format")]
    InvalidInputFormat,
    #[error("unknown output image format")]
    InvalidOutputFormat,
    #[error("row stride is smaller than the row width or the plane is too short")]
    InvalidRowStride,
    #[error("unknown stabilization mode")]
    InvalidMode,
    #[error("image definition changed without re-initialization")]
    InvalidImgDefinitionChange,
    #[error("transform samples outside of the input image")]
    InvalidMatrix,
    #[error("configuration or call sequence not allowed")]
    InvalidConfiguration,
    #[error("image definition does not match the initialized definition")]
    ImageDefinitionMismatch,
    #[error("too many worker threads requested")]
    NumberOfThreadTooLarge,
    #[error("at least one thread is required")]
    NumberOfThreadTooSmall,
    #[error("output image is wider than the input image")]
    WidthOutImageTooLarge,
    #[error("output image is taller than the input image")]
    HeightOutImageTooLarge,
    #[error("failed to start a worker thread")]
    ThreadInitFail,
    #[error("failed to stop a worker thread")]
    ThreadCancelFail,
    #[error("failed to enable the gyroscope")]
    GyroEnableFail,
    #[error("failed to query the gyroscope minimum delay")]
    GyroGetMinDelayFail,
    #[error("failed to set the gyroscope event rate")]
    GyroSetEventRateFail,
    #[error("failed to disable the gyroscope")]
    GyroDisableFail,
}

/// Broad class of an [`EisError`], telling the caller what to do about it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Static configuration or image definition rejected at init. Fix the
    /// configuration; retrying unchanged is pointless.
    Configuration,
    /// Per-frame settings or descriptors rejected by a process call.
    Settings,
    /// Lifecycle misuse or a transform the engine could not honour.
    Usage,
    /// Thread or gyroscope failure, possibly transient.
    Resource,
}

const CODES: [EisError; 30] = [
    EisError::WidthTooLarge,
    EisError::HeightTooLarge,
    EisError::WidthTooSmall,
    EisError::HeightTooSmall,
    EisError::BorderTooSmall,
    EisError::BorderTooLarge,
    EisError::TransSmoothTooLarge,
    EisError::TransSmoothTooSmall,
    EisError::RotSmoothTooLarge,
    EisError::RotSmoothTooSmall,
    EisError::DigitalScalingProductTooSmall,
    EisError::VbRatioTooLarge,
    EisError::InvalidInputFormat,
    EisError::InvalidOutputFormat,
    EisError::InvalidRowStride,
    EisError::InvalidMode,
    EisError::InvalidImgDefinitionChange,
    EisError::InvalidMatrix,
    EisError::InvalidConfiguration,
    EisError::ImageDefinitionMismatch,
    EisError::NumberOfThreadTooLarge,
    EisError::NumberOfThreadTooSmall,
    EisError::WidthOutImageTooLarge,
    EisError::HeightOutImageTooLarge,
    EisError::ThreadInitFail,
    EisError::ThreadCancelFail,
    EisError::GyroEnableFail,
    EisError::GyroGetMinDelayFail,
    EisError::GyroSetEventRateFail,
    EisError::GyroDisableFail,
];

impl EisError {
    /// Stable numeric status code, `1..=30`.
    pub fn code(self) -> u32 {
        // CODES is ordered by code, starting at 1.
        CODES
            .iter()
            .position(|e| *e == self)
            .map_or(0, |idx| idx as u32 + 1)
    }

    /// Maps a numeric status back to an error. `0` (success) and unknown
    /// codes return `None`.
    pub fn from_code(code: u32) -> Option<Self> {
        let idx = code.checked_sub(1)? as usize;
        CODES.get(idx).copied()
    }

    pub fn kind(self) -> ErrorKind {
        use EisError::*;
        match self {
            WidthTooLarge | HeightTooLarge | WidthTooSmall | HeightTooSmall | BorderTooSmall
            | BorderTooLarge | InvalidInputFormat | InvalidOutputFormat
            | NumberOfThreadTooLarge | NumberOfThreadTooSmall | WidthOutImageTooLarge
            | HeightOutImageTooLarge => ErrorKind::Configuration,
            TransSmoothTooLarge | TransSmoothTooSmall | RotSmoothTooLarge | RotSmoothTooSmall
            | DigitalScalingProductTooSmall | VbRatioTooLarge | InvalidRowStride | InvalidMode => {
                ErrorKind::Settings
            }
            InvalidImgDefinitionChange | InvalidMatrix | InvalidConfiguration
            | ImageDefinitionMismatch => ErrorKind::Usage,
            ThreadInitFail | ThreadCancelFail | GyroEnableFail | GyroGetMinDelayFail
            | GyroSetEventRateFail | GyroDisableFail => ErrorKind::Resource,
        }
    }

    /// Only thread and gyroscope failures may succeed on a later attempt.
    pub fn is_retryable(self) -> bool {
        self.kind() == ErrorKind::Resource
    }
}
