// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use edgefirst_eis::burst::{frame_size, BurstError, HdrEngine, SingleShotHdrEngine};
use serial_test::serial;
use std::error::Error;
use visidon_sys::{VD_RGB888, VD_YUV_NV12};

const MISSING: &str = "/nonexistent/libVDMissing.so";

#[test]
#[serial]
fn test_missing_library() -> Result<(), Box<dyn Error>> {
    let hdr = HdrEngine::open(MISSING, 1920, 1080, |_| {});
    match hdr {
        Err(BurstError::Load(err)) => println!("hdr: {}", err),
        Err(err) => return Err(err.into()),
        Ok(_) => return Err("HDR engine opened without a library".into()),
    }

    let single = SingleShotHdrEngine::open(MISSING, 1920, 1080);
    assert!(matches!(single, Err(BurstError::Load(_))));
    Ok(())
}

#[test]
#[serial]
fn test_frame_size() -> Result<(), Box<dyn Error>> {
    assert_eq!(frame_size(VD_YUV_NV12, 1920, 1080, 0, 0)?, 3110400);
    // Padding rows sit between the luma and chroma planes.
    assert_eq!(frame_size(VD_YUV_NV12, 1920, 1080, 64, 8)?, 1984 * 1088 + 1984 * 540);
    assert_eq!(frame_size(VD_RGB888, 640, 480, 0, 0)?, 921600);
    Ok(())
}
