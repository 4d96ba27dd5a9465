// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use edgefirst_eis::{
    image::{image_size, Rect},
    EisError, Image, ImageDef, ImageDesc, ImageFormat,
};
use serial_test::serial;
use std::error::Error;

#[test]
#[serial]
fn test_formats() -> Result<(), Box<dyn Error>> {
    let mut img = Image::new(1920, 1080, ImageFormat::Nv12);

    println!("{}", img);
    assert_eq!(img.size(), 3110400);
    assert_eq!(img.size(), image_size(1920, 1080, ImageFormat::Nv12));

    img = Image::new(1920, 1080, ImageFormat::Yuv422);
    println!("{}", img);
    assert_eq!(img.size(), 4147200);

    img = Image::new(640, 480, ImageFormat::Nv12);
    println!("{}", img);
    assert_eq!(img.size(), 460800);

    Ok(())
}

#[test]
#[serial]
fn test_raw_formats() -> Result<(), Box<dyn Error>> {
    assert_eq!(ImageFormat::from_raw_input(0)?, ImageFormat::Nv12);
    assert_eq!(ImageFormat::from_raw_output(1)?, ImageFormat::Yuv422);
    assert_eq!(
        ImageFormat::from_raw_input(7),
        Err(EisError::InvalidInputFormat)
    );
    assert_eq!(
        ImageFormat::from_raw_output(2),
        Err(EisError::InvalidOutputFormat)
    );
    assert_eq!(ImageFormat::Yuv422.to_string(), "UYVY");
    Ok(())
}

#[test]
#[serial]
fn test_from_vec() -> Result<(), Box<dyn Error>> {
    let def = ImageDef::new(ImageFormat::Nv12, 640, 480);
    let img = Image::from_vec(def, vec![16; def.size()])?;
    assert_eq!(img.def(), &def);
    assert_eq!((img.width(), img.height(), img.format()), (640, 480, ImageFormat::Nv12));
    assert!(img.desc().validate().is_ok());
    assert_eq!(img.into_vec().len(), 460800);

    let short = Image::from_vec(def, vec![0; def.size() - 1]);
    assert_eq!(short, Err(EisError::InvalidRowStride));
    Ok(())
}

#[test]
#[serial]
fn test_descriptors() -> Result<(), Box<dyn Error>> {
    let mut img = Image::new(1920, 1080, ImageFormat::Yuv422);
    img.desc().validate()?;
    img.desc_mut().validate()?;
    assert_eq!(img.desc().def(), img.def());

    let pix = vec![0u8; 1920 * 2 * 1080];
    assert_eq!(
        ImageDesc::yuv422(1920, 1080, &pix, 1920).validate(),
        Err(EisError::InvalidRowStride)
    );
    assert_eq!(
        ImageDesc::yuv422(1920, 1080, &pix[..pix.len() - 2], 3840).validate(),
        Err(EisError::InvalidRowStride)
    );
    Ok(())
}

#[test]
#[serial]
fn test_centered_crop() -> Result<(), Box<dyn Error>> {
    let input = ImageDef::new(ImageFormat::Nv12, 1920, 1080);

    let crop = Rect::centered(&input, &ImageDef::new(ImageFormat::Nv12, 1600, 900));
    println!("{:?}", crop);
    assert_eq!((crop.x, crop.y, crop.width, crop.height), (160, 90, 1600, 900));

    // Odd offsets are rounded down to keep chroma aligned.
    let crop = Rect::centered(&input, &ImageDef::new(ImageFormat::Nv12, 1280, 1074));
    assert_eq!((crop.x, crop.y), (320, 2));

    Ok(())
}
