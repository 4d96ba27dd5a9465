// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Engine-owned pool of native worker threads.
//!
//! The pool is created once at init and joined at finalize. Each frame is
//! cut into indexed bands; the coordinating thread runs the first band
//! itself while the workers take the rest, and returns once every band is
//! done.

use crate::error::EisError;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::{
    ops::Range,
    os::unix::thread::JoinHandleExt,
    thread::{self, JoinHandle},
};
use tracing::{debug, warn};

pub struct WorkerPool {
    pool: Option<ThreadPool>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Starts `n_thread - 1` workers; the calling thread is the remaining
    /// one. If any worker fails to start, the ones already running are
    /// joined before returning [`EisError::ThreadInitFail`].
    pub fn new(n_thread: u32) -> Result<Self, EisError> {
        let count = n_thread.saturating_sub(1) as usize;
        if count == 0 {
            return Ok(Self {
                pool: None,
                workers: Vec::new(),
            });
        }

        let mut workers = Vec::with_capacity(count);
        let built = ThreadPoolBuilder::new()
            .num_threads(count)
            .thread_name(|index| format!("eis-worker-{}", index + 1))
            .spawn_handler(|worker| {
                let mut builder = thread::Builder::new();
                if let Some(name) = worker.name() {
                    builder = builder.name(name.to_owned());
                }
                if let Some(size) = worker.stack_size() {
                    builder = builder.stack_size(size);
                }
                workers.push(builder.spawn(move || worker.run())?);
                Ok(())
            })
            .build();

        match built {
            Ok(pool) => {
                debug!("eis worker pool started with {} workers", workers.len());
                Ok(Self {
                    pool: Some(pool),
                    workers,
                })
            }
            Err(err) => {
                warn!("failed to start eis workers: {err}");
                let mut partial = Self {
                    pool: None,
                    workers,
                };
                if let Err(err) = partial.shutdown() {
                    warn!("failed to stop partially started pool: {err}");
                }
                Err(EisError::ThreadInitFail)
            }
        }
    }

    /// Threads taking part in each frame, the coordinator included.
    pub fn threads(&self) -> usize {
        self.workers.len() + 1
    }

    /// Native handles of the worker threads, in spawn order.
    pub fn handles(&self) -> Vec<libc::pthread_t> {
        self.workers
            .iter()
            .map(|handle| handle.as_pthread_t() as libc::pthread_t)
            .collect()
    }

    /// Runs `task(0..count)` across the pool and returns once every index
    /// has completed. A panic in any task is resumed on the caller after
    /// all tasks have finished.
    pub fn run<F>(&self, count: usize, task: F)
    where
        F: Fn(usize) + Sync,
    {
        let pool = match &self.pool {
            Some(pool) if count > 1 => pool,
            _ => {
                (0..count).for_each(task);
                return;
            }
        };

        let task = &task;
        pool.in_place_scope(|scope| {
            for index in 1..count {
                scope.spawn(move |_| task(index));
            }
            task(0);
        });
    }

    /// Stops and joins every worker.
    pub fn shutdown(&mut self) -> Result<(), EisError> {
        // Dropping the pool tells the workers to exit once idle.
        drop(self.pool.take());

        let mut result = Ok(());
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                result = Err(EisError::ThreadCancelFail);
            }
        }
        debug!("eis worker pool joined");
        result
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if !self.workers.is_empty() {
            if let Err(err) = self.shutdown() {
                warn!("eis worker pool teardown failed: {err}");
            }
        }
    }
}

/// Splits `rows` into at most `parts` contiguous bands whose starts are
/// multiples of `align`.
pub fn split_rows(rows: usize, parts: usize, align: usize) -> Vec<Range<usize>> {
    let align = align.max(1);
    let parts = parts.clamp(1, rows.div_ceil(align).max(1));
    let band = rows.div_ceil(parts).div_ceil(align) * align;
    (0..rows)
        .step_by(band.max(1))
        .map(|start| start..(start + band).min(rows))
        .collect()
}
