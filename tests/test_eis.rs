// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use edgefirst_eis::{
    version, EisConfig, EisError, EisState, GyroSample, Gyroscope, Image, ImageDef, ImageDesc,
    ImageDescMut, ImageFormat, Mode, Scratch, Settings, Stabilizer, State, Version,
};
use parking_lot::Mutex;
use serial_test::serial;
use std::{
    error::Error,
    io,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

const IN_DEF: ImageDef = ImageDef::new(ImageFormat::Nv12, 1920, 1080);
const OUT_DEF: ImageDef = ImageDef::new(ImageFormat::Nv12, 1600, 900);
const SENTINEL: u8 = 0xA5;

/// Frame with a distinct value at every luma and chroma position.
fn pattern(def: ImageDef) -> Image {
    let mut img = Image::new(def.width, def.height, def.format);
    for (i, px) in img.as_slice_mut().iter_mut().enumerate() {
        *px = (i % 251) as u8;
    }
    img
}

/// Pseudo-random value in 0..128 for every index, without periodic structure.
fn noise(n: usize) -> u8 {
    let mut z = (n as u64).wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    ((z ^ (z >> 31)) % 128) as u8
}

/// Separable NV12 texture moved `shift` pixels to the right.
fn textured(def: ImageDef, shift: usize) -> Image {
    let mut img = filled(def, 128);
    let (y, _) = img.as_slice_mut().split_at_mut(def.width * def.height);
    for (row, line) in y.chunks_exact_mut(def.width).enumerate() {
        for (col, px) in line.iter_mut().enumerate() {
            *px = noise(col + 64 - shift) + noise(row + 5064);
        }
    }
    img
}

/// Luma ramp rising by 0.08 per pixel along both axes.
fn ramp(def: ImageDef) -> Image {
    let mut img = filled(def, 128);
    let (y, _) = img.as_slice_mut().split_at_mut(def.width * def.height);
    for (row, line) in y.chunks_exact_mut(def.width).enumerate() {
        for (col, px) in line.iter_mut().enumerate() {
            *px = (0.08 * (col + row) as f32).round() as u8;
        }
    }
    img
}

fn filled(def: ImageDef, value: u8) -> Image {
    let mut img = Image::new(def.width, def.height, def.format);
    img.as_slice_mut().fill(value);
    img
}

fn ready(config: EisConfig) -> Result<EisState, EisError> {
    let mut eis = EisState::new();
    eis.init(&config, &IN_DEF, &OUT_DEF)?;
    Ok(eis)
}

#[derive(Clone, Copy, PartialEq)]
enum Failure {
    None,
    Enable,
    MinDelay,
    EventRate,
    Disable,
}

struct MockGyro {
    failure: Failure,
    enabled: Arc<AtomicBool>,
    samples: Arc<Mutex<Vec<GyroSample>>>,
}

impl MockGyro {
    fn new(failure: Failure) -> Self {
        Self {
            failure,
            enabled: Arc::new(AtomicBool::new(false)),
            samples: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn fail(&self, step: Failure) -> io::Result<()> {
        if self.failure == step {
            return Err(io::Error::other("sensor unavailable"));
        }
        Ok(())
    }
}

impl Gyroscope for MockGyro {
    fn enable(&mut self) -> io::Result<()> {
        self.fail(Failure::Enable)?;
        self.enabled.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn min_delay(&mut self) -> io::Result<Duration> {
        self.fail(Failure::MinDelay)?;
        Ok(Duration::from_millis(5))
    }

    fn set_event_rate(&mut self, _period: Duration) -> io::Result<()> {
        self.fail(Failure::EventRate)
    }

    fn disable(&mut self) -> io::Result<()> {
        self.fail(Failure::Disable)?;
        self.enabled.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn drain(&mut self) -> Vec<GyroSample> {
        std::mem::take(&mut *self.samples.lock())
    }
}

fn gyro_config() -> EisConfig {
    EisConfig {
        gyro_disabled: false,
        lens_focal_in_pixel: 1500.0,
        ..Default::default()
    }
}

#[test]
#[serial]
fn test_init_finalize() -> Result<(), Box<dyn Error>> {
    let mut eis = EisState::new();
    println!("{:?} version {}", eis, eis.version());
    assert_eq!(eis.state(), State::Uninitialized);

    eis.init(&EisConfig::default(), &IN_DEF, &OUT_DEF)?;
    assert_eq!(eis.state(), State::Ready);
    assert_eq!(eis.config(), Some(&EisConfig::default()));

    eis.finalize()?;
    assert_eq!(eis.state(), State::Finalized);
    assert_eq!(eis.finalize(), Err(EisError::InvalidConfiguration));

    // A finalized state can be initialized again.
    eis.init(&EisConfig::default(), &IN_DEF, &OUT_DEF)?;
    assert_eq!(eis.state(), State::Ready);
    eis.finalize()?;

    Ok(())
}

#[test]
#[serial]
fn test_init_rejects_bounds() -> Result<(), Box<dyn Error>> {
    let mut eis = EisState::new();
    let config = EisConfig::default();

    let cases = [
        (ImageDef::new(ImageFormat::Nv12, 2048, 1080), OUT_DEF, EisError::WidthTooLarge),
        (ImageDef::new(ImageFormat::Nv12, 1920, 1200), OUT_DEF, EisError::HeightTooLarge),
        (IN_DEF, ImageDef::new(ImageFormat::Nv12, 320, 900), EisError::WidthTooSmall),
        (IN_DEF, ImageDef::new(ImageFormat::Nv12, 1600, 240), EisError::HeightTooSmall),
        (
            ImageDef::new(ImageFormat::Nv12, 1280, 720),
            ImageDef::new(ImageFormat::Nv12, 1600, 720),
            EisError::WidthOutImageTooLarge,
        ),
        (
            ImageDef::new(ImageFormat::Nv12, 1280, 720),
            ImageDef::new(ImageFormat::Nv12, 1280, 900),
            EisError::HeightOutImageTooLarge,
        ),
        (
            IN_DEF,
            ImageDef::new(ImageFormat::Yuv422, 1600, 900),
            EisError::ImageDefinitionMismatch,
        ),
    ];
    for (in_def, out_def, expected) in cases {
        assert_eq!(eis.init(&config, &in_def, &out_def), Err(expected));
        assert_eq!(eis.state(), State::Uninitialized);
    }

    let bad = [
        (EisConfig { border: -0.01, ..config }, EisError::BorderTooSmall),
        (EisConfig { border: f32::NAN, ..config }, EisError::BorderTooSmall),
        (EisConfig { border: 0.3, ..config }, EisError::BorderTooLarge),
        (EisConfig { n_thread: 0, ..config }, EisError::NumberOfThreadTooSmall),
        (EisConfig { n_thread: 9, ..config }, EisError::NumberOfThreadTooLarge),
    ];
    for (config, expected) in bad {
        assert_eq!(eis.init(&config, &IN_DEF, &OUT_DEF), Err(expected));
        assert_eq!(eis.state(), State::Uninitialized);
    }

    Ok(())
}

#[test]
#[serial]
fn test_reinit_while_ready() -> Result<(), Box<dyn Error>> {
    let mut eis = ready(EisConfig::default())?;

    let other = ImageDef::new(ImageFormat::Nv12, 1280, 720);
    assert_eq!(
        eis.init(&EisConfig::default(), &IN_DEF, &other),
        Err(EisError::InvalidImgDefinitionChange)
    );
    let config = EisConfig {
        n_thread: 2,
        ..Default::default()
    };
    assert_eq!(
        eis.init(&config, &IN_DEF, &OUT_DEF),
        Err(EisError::InvalidConfiguration)
    );
    assert_eq!(eis.state(), State::Ready);
    assert_eq!(eis.config().map(|c| c.n_thread), Some(4));

    eis.finalize()?;
    Ok(())
}

#[test]
#[serial]
fn test_process_outside_ready() -> Result<(), Box<dyn Error>> {
    let input = pattern(IN_DEF);
    let mut output = filled(OUT_DEF, SENTINEL);
    let mut scratch = Scratch::new();
    let settings = Settings::default();

    let mut eis = EisState::new();
    let err = eis.process(&input.desc(), &mut output.desc_mut(), &settings, &mut scratch);
    assert_eq!(err, Err(EisError::InvalidConfiguration));

    eis.init(&EisConfig::default(), &IN_DEF, &OUT_DEF)?;
    eis.finalize()?;
    let err = eis.process(&input.desc(), &mut output.desc_mut(), &settings, &mut scratch);
    assert_eq!(err, Err(EisError::InvalidConfiguration));
    assert_eq!(eis.thread_list(), Err(EisError::InvalidConfiguration));

    assert!(output.as_slice().iter().all(|&px| px == SENTINEL));
    assert_eq!(scratch.bands(), 0);
    Ok(())
}

#[test]
#[serial]
fn test_process_rejects_without_writing() -> Result<(), Box<dyn Error>> {
    let mut eis = ready(EisConfig::default())?;
    let input = pattern(IN_DEF);
    let mut scratch = Scratch::new();

    // Output definition differs from the one given at init.
    let mut small = filled(ImageDef::new(ImageFormat::Nv12, 1280, 720), SENTINEL);
    let err = eis.process(
        &input.desc(),
        &mut small.desc_mut(),
        &Settings::default(),
        &mut scratch,
    );
    assert_eq!(err, Err(EisError::ImageDefinitionMismatch));
    assert!(small.as_slice().iter().all(|&px| px == SENTINEL));

    let mut output = filled(OUT_DEF, SENTINEL);
    let settings = [
        (
            Settings {
                trans_smooth: 1.5,
                ..Default::default()
            },
            EisError::TransSmoothTooLarge,
        ),
        (
            Settings {
                rot_smooth: -0.1,
                ..Default::default()
            },
            EisError::RotSmoothTooSmall,
        ),
        (
            Settings {
                digital_scaling_product: -1.0,
                ..Default::default()
            },
            EisError::DigitalScalingProductTooSmall,
        ),
        (
            Settings {
                sensor_frame_length: 800,
                ..Default::default()
            },
            EisError::VbRatioTooLarge,
        ),
        (
            Settings {
                sensor_frame_length: 0,
                ..Default::default()
            },
            EisError::VbRatioTooLarge,
        ),
    ];
    for (settings, expected) in settings {
        let err = eis.process(&input.desc(), &mut output.desc_mut(), &settings, &mut scratch);
        assert_eq!(err, Err(expected));
    }
    assert!(output.as_slice().iter().all(|&px| px == SENTINEL));
    assert_eq!(eis.motion().map(|m| m.frames), Some(0));
    assert_eq!(scratch.bands(), 0);

    eis.finalize()?;
    Ok(())
}

#[test]
#[serial]
fn test_row_stride() -> Result<(), Box<dyn Error>> {
    let mut eis = ready(EisConfig::default())?;
    let input = pattern(IN_DEF);
    let mut output = filled(OUT_DEF, SENTINEL);
    let mut scratch = Scratch::new();

    let (y, uv) = input.as_slice().split_at(1920 * 1080);
    let narrow = ImageDesc::nv12(1920, 1080, y, 1000, uv, 1920);
    let err = eis.process(
        &narrow,
        &mut output.desc_mut(),
        &Settings::default(),
        &mut scratch,
    );
    assert_eq!(err, Err(EisError::InvalidRowStride));

    // Padded output rows are accepted and the padding is left alone.
    let stride = 1664;
    let mut y_out = vec![SENTINEL; stride * 900];
    let mut uv_out = vec![SENTINEL; stride * 450];
    let mut padded = ImageDescMut::nv12(1600, 900, &mut y_out, stride, &mut uv_out, stride);
    let settings = Settings {
        mode: Mode::Off,
        ..Default::default()
    };
    eis.process(&input.desc(), &mut padded, &settings, &mut scratch)?;
    assert!(y_out.chunks(stride).all(|row| row[1600..].iter().all(|&px| px == SENTINEL)));
    assert_eq!(y_out[0], y[90 * 1920 + 160]);

    eis.finalize()?;
    Ok(())
}

#[test]
#[serial]
fn test_off_is_centered_crop() -> Result<(), Box<dyn Error>> {
    let mut eis = ready(EisConfig::default())?;
    let input = pattern(IN_DEF);
    let mut output = filled(OUT_DEF, SENTINEL);
    let mut scratch = Scratch::new();
    let settings = Settings {
        mode: Mode::Off,
        ..Default::default()
    };

    let transform = eis.process(&input.desc(), &mut output.desc_mut(), &settings, &mut scratch)?;
    println!("off: {:?}", transform);
    assert_eq!(transform.matrix, [1.0, 0.0, 160.0, 0.0, 1.0, 90.0]);
    assert!(scratch.bands() > 0);

    let (y_in, uv_in) = input.as_slice().split_at(1920 * 1080);
    let (y_out, uv_out) = output.as_slice().split_at(1600 * 900);
    for row in 0..900 {
        let src = (row + 90) * 1920 + 160;
        assert_eq!(&y_out[row * 1600..][..1600], &y_in[src..src + 1600], "luma row {row}");
    }
    for row in 0..450 {
        let src = (row + 45) * 1920 + 160;
        assert_eq!(&uv_out[row * 1600..][..1600], &uv_in[src..src + 1600], "chroma row {row}");
    }

    eis.finalize()?;
    Ok(())
}

#[test]
#[serial]
fn test_static_scene() -> Result<(), Box<dyn Error>> {
    let mut eis = ready(EisConfig::default())?;
    let input = filled(IN_DEF, 128);
    let mut output = filled(OUT_DEF, SENTINEL);
    let mut scratch = Scratch::new();

    for mode in [Mode::PassThrough, Mode::On] {
        let settings = Settings {
            mode,
            ..Default::default()
        };
        let first = eis.process(&input.desc(), &mut output.desc_mut(), &settings, &mut scratch)?;
        for _ in 0..4 {
            let next =
                eis.process(&input.desc(), &mut output.desc_mut(), &settings, &mut scratch)?;
            assert_eq!(next, first);
        }
        assert_eq!(first.correction.dx, 0.0);
        assert_eq!(first.correction.dy, 0.0);
        assert_eq!(first.correction.dtheta, 0.0);
        assert!(output.as_slice().iter().all(|&px| px == 128));
    }
    assert_eq!(eis.motion().map(|m| m.frames), Some(10));

    eis.finalize()?;
    Ok(())
}

#[test]
#[serial]
fn test_yuv422() -> Result<(), Box<dyn Error>> {
    let in_def = ImageDef::new(ImageFormat::Yuv422, 1280, 720);
    let out_def = ImageDef::new(ImageFormat::Yuv422, 1024, 576);
    let mut eis = EisState::new();
    eis.init(
        &EisConfig {
            n_thread: 3,
            ..Default::default()
        },
        &in_def,
        &out_def,
    )?;

    let input = pattern(in_def);
    let mut output = filled(out_def, SENTINEL);
    let mut scratch = Scratch::new();

    let off = Settings {
        mode: Mode::Off,
        ..Default::default()
    };
    let transform = eis.process(&input.desc(), &mut output.desc_mut(), &off, &mut scratch)?;
    assert_eq!(transform.matrix, [1.0, 0.0, 128.0, 0.0, 1.0, 72.0]);
    let src = 72 * 2560 + 2 * 128;
    assert_eq!(&output.as_slice()[..2048], &input.as_slice()[src..src + 2048]);

    let flat = filled(in_def, 77);
    eis.process(&flat.desc(), &mut output.desc_mut(), &Settings::default(), &mut scratch)?;
    assert!(output.as_slice().iter().all(|&px| px == 77));

    eis.finalize()?;
    Ok(())
}

#[test]
#[serial]
fn test_thread_list() -> Result<(), Box<dyn Error>> {
    for n_thread in [1, 3, 8] {
        let eis = ready(EisConfig {
            n_thread,
            ..Default::default()
        })?;
        let threads = eis.thread_list()?;
        println!("{} threads: {:?}", n_thread, threads);
        assert_eq!(threads.len(), n_thread as usize);
        assert_eq!(threads[0], unsafe { libc::pthread_self() });
        // Dropping a ready state tears it down.
        drop(eis);
    }
    Ok(())
}

#[test]
#[serial]
fn test_gyro_required() -> Result<(), Box<dyn Error>> {
    let mut eis = EisState::new();
    assert_eq!(
        eis.init(&gyro_config(), &IN_DEF, &OUT_DEF),
        Err(EisError::GyroEnableFail)
    );
    assert_eq!(eis.state(), State::Uninitialized);

    let config = EisConfig {
        lens_focal_in_pixel: 0.0,
        ..gyro_config()
    };
    eis.attach_gyroscope(Box::new(MockGyro::new(Failure::None)))?;
    assert_eq!(
        eis.init(&config, &IN_DEF, &OUT_DEF),
        Err(EisError::InvalidConfiguration)
    );
    Ok(())
}

#[test]
#[serial]
fn test_gyro_failures() -> Result<(), Box<dyn Error>> {
    let cases = [
        (Failure::Enable, EisError::GyroEnableFail),
        (Failure::MinDelay, EisError::GyroGetMinDelayFail),
        (Failure::EventRate, EisError::GyroSetEventRateFail),
    ];
    for (failure, expected) in cases {
        let gyro = MockGyro::new(failure);
        let enabled = gyro.enabled.clone();
        let mut eis = EisState::with_gyroscope(gyro);
        assert_eq!(eis.init(&gyro_config(), &IN_DEF, &OUT_DEF), Err(expected));
        assert_eq!(eis.state(), State::Uninitialized);
        assert!(!enabled.load(Ordering::SeqCst));
    }

    let mut eis = EisState::with_gyroscope(MockGyro::new(Failure::Disable));
    eis.init(&gyro_config(), &IN_DEF, &OUT_DEF)?;
    assert_eq!(
        eis.attach_gyroscope(Box::new(MockGyro::new(Failure::None))),
        Err(EisError::InvalidConfiguration)
    );
    assert_eq!(eis.finalize(), Err(EisError::GyroDisableFail));
    assert_eq!(eis.state(), State::Finalized);

    Ok(())
}

#[test]
#[serial]
fn test_gyro_motion() -> Result<(), Box<dyn Error>> {
    let gyro = MockGyro::new(Failure::None);
    let samples = gyro.samples.clone();
    let enabled = gyro.enabled.clone();
    let mut eis = EisState::with_gyroscope(gyro);
    eis.init(&gyro_config(), &IN_DEF, &OUT_DEF)?;
    assert!(enabled.load(Ordering::SeqCst));

    let input = pattern(IN_DEF);
    let mut output = filled(OUT_DEF, SENTINEL);
    let mut scratch = Scratch::new();

    // 1 rad/s of yaw for 10 ms through a 1500 px lens is 15 px.
    samples.lock().extend([
        GyroSample {
            dt: 0.005,
            x: 0.0,
            y: 1.0,
            z: 0.0,
        };
        2
    ]);

    // Settings are checked before the sensor is drained, so a frame they
    // reject leaves the samples queued.
    let bad = Settings {
        sensor_frame_length: 800,
        ..Default::default()
    };
    let err = eis.process(&input.desc(), &mut output.desc_mut(), &bad, &mut scratch);
    assert_eq!(err, Err(EisError::VbRatioTooLarge));
    assert_eq!(eis.motion().map(|m| m.frames), Some(0));

    let transform = eis.process(
        &input.desc(),
        &mut output.desc_mut(),
        &Settings::default(),
        &mut scratch,
    )?;
    println!("gyro: {:?}", transform);
    let motion = eis.motion().ok_or("engine not ready")?;
    assert!((motion.velocity.dx - 15.0).abs() < 1e-3);
    assert!((transform.correction.dx - 13.5).abs() < 1e-3);
    assert_eq!(transform.correction.dy, 0.0);
    assert!(transform.matrix[1] > 0.0);

    eis.finalize()?;
    assert!(!enabled.load(Ordering::SeqCst));
    Ok(())
}

#[test]
#[serial]
fn test_version_through_trait() -> Result<(), Box<dyn Error>> {
    fn release(engine: &dyn Stabilizer) -> Version {
        engine.version()
    }

    let mut eis = EisState::new();
    assert_eq!(release(&eis), version());
    eis.init(&EisConfig::default(), &IN_DEF, &OUT_DEF)?;
    assert_eq!(release(&eis), version());
    eis.finalize()?;
    assert_eq!(release(&eis), version());
    println!("version {}", release(&eis));
    Ok(())
}

#[test]
#[serial]
fn test_thread_list_follows_process() -> Result<(), Box<dyn Error>> {
    let eis = ready(EisConfig::default())?;
    let main = unsafe { libc::pthread_self() };
    assert_eq!(eis.thread_list()?[0], main);

    let worker = std::thread::spawn(move || -> Result<_, EisError> {
        let mut eis = eis;
        let input = filled(IN_DEF, 128);
        let mut output = filled(OUT_DEF, SENTINEL);
        let mut scratch = Scratch::new();
        eis.process(
            &input.desc(),
            &mut output.desc_mut(),
            &Settings::default(),
            &mut scratch,
        )?;
        let caller = unsafe { libc::pthread_self() };
        let threads = eis.thread_list()?;
        Ok((eis, caller, threads))
    });
    let (mut eis, caller, threads) = worker.join().map_err(|_| "process thread panicked")??;

    println!("caller {:?} threads {:?}", caller, threads);
    assert_ne!(caller, main);
    assert_eq!(threads.len(), 4);
    assert_eq!(threads[0], caller);
    assert!(!threads[1..].contains(&caller));
    assert!(!threads.contains(&main));

    eis.finalize()?;
    Ok(())
}

#[test]
#[serial]
fn test_image_motion_settles() -> Result<(), Box<dyn Error>> {
    let shifts = [0, 6, 12, 12, 12, 12];
    let mut output = filled(OUT_DEF, SENTINEL);
    let mut scratch = Scratch::new();

    for smooth in [0.5, 0.9, 0.99, 1.0] {
        let mut eis = ready(EisConfig::default())?;
        let settings = Settings {
            trans_smooth: smooth,
            ..Default::default()
        };

        let mut expected = 0.0f32;
        let mut previous_shift = 0;
        let mut previous_correction = f32::INFINITY;
        for (frame, &shift) in shifts.iter().enumerate() {
            let input = textured(IN_DEF, shift);
            let transform =
                eis.process(&input.desc(), &mut output.desc_mut(), &settings, &mut scratch)?;
            let motion = eis.motion().ok_or("engine not ready")?;

            let velocity = (shift - previous_shift) as f32;
            expected = smooth * (expected + velocity);
            println!(
                "s {smooth} frame {frame}: velocity {:?} correction {:?}",
                motion.velocity, transform.correction
            );
            assert_eq!(motion.velocity.dx, velocity, "frame {frame}");
            assert_eq!(motion.velocity.dy, 0.0, "frame {frame}");
            assert!((transform.correction.dx - expected).abs() < 1e-3, "frame {frame}");
            assert_eq!(transform.correction.dy, 0.0);

            // Once the scene stops moving the correction never grows.
            if frame > 2 {
                let magnitude = transform.correction.dx.abs();
                assert!(magnitude <= previous_correction + 1e-4, "frame {frame}");
            }
            previous_correction = transform.correction.dx.abs();
            previous_shift = shift;
        }

        if smooth == 1.0 {
            assert!((previous_correction - 12.0).abs() < 1e-3);
        }
        assert_eq!(eis.motion().map(|m| m.frames), Some(shifts.len() as u64));
        eis.finalize()?;
    }
    Ok(())
}

#[test]
#[serial]
fn test_dropped_frames() -> Result<(), Box<dyn Error>> {
    let mut eis = ready(EisConfig::default())?;
    let mut output = filled(OUT_DEF, SENTINEL);
    let mut scratch = Scratch::new();
    let settings = Settings {
        trans_smooth: 0.5,
        ..Default::default()
    };

    let first = textured(IN_DEF, 0);
    eis.process(&first.desc(), &mut output.desc_mut(), &settings, &mut scratch)?;

    // 12 px over two intervals: one frame was lost in between.
    let second = textured(IN_DEF, 12);
    let dropped = Settings {
        dropped_frames: 1,
        ..settings
    };
    let transform =
        eis.process(&second.desc(), &mut output.desc_mut(), &dropped, &mut scratch)?;
    let motion = eis.motion().ok_or("engine not ready")?;
    println!("dropped: {:?} {:?}", motion, transform.correction);

    assert_eq!(motion.velocity.dx, 6.0);
    assert_eq!(motion.frames, 3);
    assert!((transform.correction.dx - 4.5).abs() < 1e-3);

    eis.finalize()?;
    Ok(())
}

#[test]
#[serial]
fn test_pass_through_pixels() -> Result<(), Box<dyn Error>> {
    let mut eis = ready(EisConfig::default())?;
    let input = ramp(IN_DEF);
    let mut output = filled(OUT_DEF, SENTINEL);
    let mut scratch = Scratch::new();
    let settings = Settings {
        mode: Mode::PassThrough,
        ..Default::default()
    };

    let transform = eis.process(&input.desc(), &mut output.desc_mut(), &settings, &mut scratch)?;
    println!("pass-through: {:?}", transform);
    let (u, v) = transform.apply(0.0, 0.0);
    assert!((u - 191.98).abs() < 1e-2 && (v - 107.98).abs() < 1e-2);
    let (u, v) = transform.apply(1599.0, 899.0);
    assert!((u - 1727.02).abs() < 1e-2 && (v - 971.02).abs() < 1e-2);

    let (y_out, uv_out) = output.as_slice().split_at(1600 * 900);
    for row in (0..900).step_by(37) {
        for col in (0..1600).step_by(53) {
            let (u, v) = transform.apply(col as f32, row as f32);
            let expected = 0.08 * (u + v);
            let actual = f32::from(y_out[row * 1600 + col]);
            assert!(
                (actual - expected).abs() <= 1.1,
                "({col}, {row}) -> ({u}, {v}): {actual} vs {expected}"
            );
        }
    }
    assert!(uv_out.iter().all(|&px| px == 128));

    eis.finalize()?;
    Ok(())
}

#[test]
#[serial]
fn test_invalid_matrix_does_not_poison() -> Result<(), Box<dyn Error>> {
    let gyro = MockGyro::new(Failure::None);
    let samples = gyro.samples.clone();
    let mut eis = EisState::with_gyroscope(gyro);
    eis.init(&gyro_config(), &IN_DEF, &OUT_DEF)?;

    let input = pattern(IN_DEF);
    let mut output = filled(OUT_DEF, SENTINEL);
    let mut scratch = Scratch::new();

    // The rate overflows to an infinite shift, which no smoothing can bring
    // back into the frame.
    samples.lock().push(GyroSample {
        dt: 1.0,
        x: 0.0,
        y: f32::MAX,
        z: 0.0,
    });
    let runaway = Settings {
        trans_smooth: 0.0,
        ..Default::default()
    };
    let err = eis.process(&input.desc(), &mut output.desc_mut(), &runaway, &mut scratch);
    assert_eq!(err, Err(EisError::InvalidMatrix));
    assert!(output.as_slice().iter().all(|&px| px == SENTINEL));
    assert_eq!(eis.motion().map(|m| m.frames), Some(0));

    samples.lock().push(GyroSample {
        dt: 0.005,
        x: 0.0,
        y: 1.0,
        z: 0.0,
    });
    let transform = eis.process(
        &input.desc(),
        &mut output.desc_mut(),
        &Settings::default(),
        &mut scratch,
    )?;
    println!("after rejection: {:?}", transform);
    let motion = eis.motion().ok_or("engine not ready")?;
    assert_eq!(motion.frames, 1);
    assert!((motion.velocity.dx - 7.5).abs() < 1e-3);
    assert!((transform.correction.dx - 6.75).abs() < 1e-3);
    assert!(transform.matrix.iter().all(|m| m.is_finite()));

    eis.finalize()?;
    Ok(())
}
