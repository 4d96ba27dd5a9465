// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use edgefirst_eis::{GyroSample, Gyroscope};
use kanal::{Receiver, Sender};
use std::{
    collections::VecDeque, error::Error, fs::File, io, io::BufReader, path::Path, time::Duration,
};
use tracing::debug;

/// Default replay period when the log does not carry one.
const DEFAULT_PERIOD: Duration = Duration::from_millis(5);

/// Gyroscope samples recorded alongside a raw video.
///
/// The log is a JSON object with an optional `period_us` and a `frames`
/// array holding, per video frame, the number of frames the sensor
/// dropped before it and the samples captured since the previous frame as
/// `[dt, x, y, z]` arrays (seconds and radians per second):
///
/// ```json
/// { "period_us": 5000,
///   "frames": [ { "dropped": 0, "samples": [[0.005, 0.01, -0.02, 0.0]] } ] }
/// ```
pub struct GyroLog {
    period: Duration,
    frames: VecDeque<(u16, Vec<GyroSample>)>,
    feed: Sender<GyroSample>,
    events: Receiver<GyroSample>,
}

impl GyroLog {
    pub fn load(path: &Path) -> Result<Self, Box<dyn Error>> {
        let file = File::open(path)?;
        let json: serde_json::Value = serde_json::from_reader(BufReader::new(file))?;

        let period = json["period_us"]
            .as_u64()
            .map_or(DEFAULT_PERIOD, Duration::from_micros);
        let Some(entries) = json["frames"].as_array() else {
            return Err(Box::from("Did not find frames as an array"));
        };

        let mut frames = VecDeque::with_capacity(entries.len());
        for entry in entries {
            let dropped = entry["dropped"].as_u64().unwrap_or(0).min(u16::MAX as u64) as u16;
            let samples = entry["samples"]
                .as_array()
                .map(|samples| samples.iter().filter_map(parse_sample).collect())
                .unwrap_or_default();
            frames.push_back((dropped, samples));
        }
        debug!("loaded {} gyroscope frames from {}", frames.len(), path.display());

        let (feed, events) = kanal::unbounded();
        Ok(Self {
            period,
            frames,
            feed,
            events,
        })
    }

    /// Sensor side of the log, handed to the engine.
    pub fn gyroscope(&self) -> ReplayGyroscope {
        ReplayGyroscope {
            events: self.events.clone(),
            period: self.period,
            enabled: false,
        }
    }

    /// Delivers the samples recorded for the next frame and returns how
    /// many frames were dropped before it.
    pub fn next_frame(&mut self) -> u16 {
        match self.frames.pop_front() {
            Some((dropped, samples)) => {
                for sample in samples {
                    if self.feed.send(sample).is_err() {
                        break;
                    }
                }
                dropped
            }
            None => 0,
        }
    }
}

fn parse_sample(value: &serde_json::Value) -> Option<GyroSample> {
    let v = value.as_array()?;
    let field = |i: usize| v.get(i).and_then(|x| x.as_f64()).map(|x| x as f32);
    Some(GyroSample {
        dt: field(0)?,
        x: field(1)?,
        y: field(2)?,
        z: field(3)?,
    })
}

/// [`Gyroscope`] fed from a [`GyroLog`].
pub struct ReplayGyroscope {
    events: Receiver<GyroSample>,
    period: Duration,
    enabled: bool,
}

impl Gyroscope for ReplayGyroscope {
    fn enable(&mut self) -> io::Result<()> {
        self.enabled = true;
        Ok(())
    }

    fn min_delay(&mut self) -> io::Result<Duration> {
        Ok(self.period)
    }

    fn set_event_rate(&mut self, period: Duration) -> io::Result<()> {
        if period < self.period {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("log was recorded at {:?}", self.period),
            ));
        }
        Ok(())
    }

    fn disable(&mut self) -> io::Result<()> {
        self.enabled = false;
        Ok(())
    }

    fn drain(&mut self) -> Vec<GyroSample> {
        if !self.enabled {
            return Vec::new();
        }
        let mut samples = Vec::new();
        while let Ok(Some(sample)) = self.events.try_recv() {
            samples.push(sample);
        }
        samples
    }
}
