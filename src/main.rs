// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use args::Args;
use clap::Parser;
use edgefirst_eis::{version, EisState, Image, Scratch, Stabilizer};
use replay::GyroLog;
use std::{
    error::Error,
    fs::File,
    io::{self, BufReader, BufWriter, Read, Write},
    path::Path,
    time::Instant,
};
use tracing::{debug, info, info_span, warn, Level};
use tracing_subscriber::{filter::LevelFilter, layer::SubscriberExt, Layer};

mod args;
mod replay;

fn update_fps(prev: &mut Instant, history: &mut [i64], index: &mut usize) -> i64 {
    let now = Instant::now();

    let elapsed = now.duration_since(*prev);
    *prev = now;

    history[*index] = 1e9 as i64 / (elapsed.as_nanos() as i64).max(1);
    *index = (*index + 1) % history.len();

    (history.iter().sum::<i64>() as f64 / history.len() as f64).round() as i64
}

fn init_tracing(args: &Args) -> Result<(), Box<dyn Error>> {
    let level = if args.verbose {
        LevelFilter::from_level(Level::DEBUG)
    } else {
        LevelFilter::from_level(Level::INFO)
    };

    let stdout = tracing_subscriber::fmt::layer().with_filter(level);
    let journald = tracing_journald::layer().ok().map(|l| l.with_filter(level));
    let tracy = if args.tracy {
        tracy_client::Client::start();
        Some(tracing_tracy::TracyLayer::default())
    } else {
        None
    };

    let subscriber = tracing_subscriber::registry()
        .with(stdout)
        .with(journald)
        .with(tracy);
    tracing::subscriber::set_global_default(subscriber)?;
    tracing_log::LogTracer::init()?;
    Ok(())
}

/// Reads the lens focal length in pixels from an isp-imx dewarp
/// calibration file.
fn read_focal(path: &Path) -> Result<f32, Box<dyn Error>> {
    let file = File::open(path)?;
    let json: serde_json::Value = serde_json::from_reader(BufReader::new(file))?;
    let dewarp_configs = &json["dewarpConfigArray"];
    if !dewarp_configs.is_array() {
        return Err(Box::from("Did not find dewarpConfigArray as an array"));
    }

    let Some(camera_matrix) = dewarp_configs[0]["camera_matrix"].as_array() else {
        return Err(Box::from("Did not find camera_matrix as an array"));
    };
    if camera_matrix.len() != 9 {
        return Err(Box::from(format!(
            "Expected exactly 9 elements in camera_matrix array but found {}",
            camera_matrix.len()
        )));
    }

    match camera_matrix[0].as_f64() {
        Some(fx) if fx > 0.0 => Ok(fx as f32),
        _ => Err(Box::from("camera_matrix focal length is not a positive number")),
    }
}

fn pin_threads(threads: &[libc::pthread_t], cores: &[usize]) {
    for (index, (&thread, &core)) in threads.iter().zip(cores).enumerate() {
        let ret = unsafe {
            let mut set: libc::cpu_set_t = std::mem::zeroed();
            libc::CPU_ZERO(&mut set);
            libc::CPU_SET(core, &mut set);
            libc::pthread_setaffinity_np(thread, std::mem::size_of::<libc::cpu_set_t>(), &set)
        };
        if ret != 0 {
            warn!(
                "failed to pin engine thread {} to core {}: {}",
                index,
                core,
                io::Error::from_raw_os_error(ret)
            );
        } else {
            debug!("pinned engine thread {} to core {}", index, core);
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_tracing(&args)?;

    let in_def = args.in_def();
    let out_def = args.out_def();

    let focal = match (args.focal, &args.calibration) {
        (Some(focal), _) => Some(focal),
        (None, Some(path)) => Some(read_focal(path)?),
        (None, None) => None,
    };

    let mut gyro_log = match &args.gyro_log {
        Some(path) => Some(GyroLog::load(path)?),
        None => None,
    };

    let mut eis = match &gyro_log {
        Some(log) => EisState::with_gyroscope(log.gyroscope()),
        None => EisState::new(),
    };
    eis.init(&args.config(focal), &in_def, &out_def)?;
    info!(
        "EdgeFirst EIS {} stabilizing {} into {} with {} threads",
        version(),
        in_def,
        out_def,
        args.threads
    );

    if !args.affinity.is_empty() {
        pin_threads(&eis.thread_list()?, &args.affinity);
    }

    let mut reader = BufReader::new(File::open(&args.input)?);
    let mut writer = BufWriter::new(File::create(&args.output)?);
    let mut input = Image::new(in_def.width, in_def.height, in_def.format);
    let mut output = Image::new(out_def.width, out_def.height, out_def.format);
    let mut scratch = Scratch::new();

    let mut prev = Instant::now();
    let mut history = vec![0; 30];
    let mut index = 0;
    let mut frames = 0;

    while args.frames.map_or(true, |limit| frames < limit) {
        match reader.read_exact(input.as_slice_mut()) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        }

        let dropped = gyro_log.as_mut().map_or(0, |log| log.next_frame());
        let settings = args.settings(dropped);

        let transform = {
            let _span = info_span!("frame", index = frames).entered();
            eis.process(&input.desc(), &mut output.desc_mut(), &settings, &mut scratch)?
        };
        writer.write_all(output.as_slice())?;

        let fps = update_fps(&mut prev, &mut history, &mut index);
        debug!(
            "frame {} dx={:.2} dy={:.2} dtheta={:.5} bands={} fps={}",
            frames,
            transform.correction.dx,
            transform.correction.dy,
            transform.correction.dtheta,
            scratch.bands(),
            fps
        );
        if frames % history.len() == 0 {
            info!("frame {} fps={}", frames, fps);
        }

        if let Some(client) = tracy_client::Client::running() {
            client.frame_mark();
        }
        frames += 1;
    }

    writer.flush()?;
    eis.finalize()?;
    info!("stabilized {} frames into {}", frames, args.output.display());
    Ok(())
}
