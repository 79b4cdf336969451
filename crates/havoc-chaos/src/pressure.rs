//! Resource pressure faults
//!
//! CPU and memory load generators. Both are bounded by a duration and
//! self-terminating: they release every resource when the window elapses,
//! so there is nothing to deactivate. Utilization is sampled while the
//! load runs and summarized in a [`PressureReport`].

use std::time::{Duration, Instant};
use sysinfo::System;
use tracing::{debug, info};

/// Utilization samples gathered while a pressure experiment ran
#[derive(Debug, Clone)]
pub struct PressureReport {
    /// Utilization percentage per sample, in sample order
    pub samples: Vec<f32>,
    /// Highest sampled utilization
    pub peak: f32,
    /// Mean sampled utilization
    pub average: f32,
    /// Wall-clock time the experiment actually ran
    pub elapsed: Duration,
}

impl PressureReport {
    fn from_samples(samples: Vec<f32>, elapsed: Duration) -> Self {
        let peak = samples.iter().copied().fold(0.0_f32, f32::max);
        let average = if samples.is_empty() {
            0.0
        } else {
            samples.iter().sum::<f32>() / samples.len() as f32
        };
        Self {
            samples,
            peak,
            average,
            elapsed,
        }
    }
}

fn sample_interval(duration: Duration) -> Duration {
    (duration / 5).max(Duration::from_millis(50))
}

/// Burn CPU on `workers` blocking threads for `duration`.
///
/// Samples global CPU utilization while the burn runs. The worker threads
/// stop at the deadline on their own.
pub async fn cpu_load(duration: Duration, workers: usize) -> PressureReport {
    info!(workers, duration_ms = duration.as_millis() as u64, "starting cpu load");
    let start = Instant::now();
    let deadline = start + duration;

    let handles: Vec<_> = (0..workers.max(1))
        .map(|_| {
            tokio::task::spawn_blocking(move || {
                let mut x = 0u64;
                while Instant::now() < deadline {
                    // Arithmetic the optimizer cannot elide
                    x = x.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                }
                x
            })
        })
        .collect();

    let mut system = System::new();
    system.refresh_cpu_usage();
    let interval = sample_interval(duration);
    let mut samples = Vec::new();
    while Instant::now() < deadline {
        tokio::time::sleep(interval.min(deadline.saturating_duration_since(Instant::now()))).await;
        system.refresh_cpu_usage();
        let usage = system.global_cpu_usage();
        debug!(usage, "cpu sample");
        samples.push(usage);
    }

    for handle in handles {
        let _ = handle.await;
    }

    PressureReport::from_samples(samples, start.elapsed())
}

/// Hold roughly `megabytes` of allocated, touched memory for `duration`.
///
/// Samples used-memory percentage while the allocation is held. The memory
/// is released when the window elapses.
pub async fn memory_pressure(duration: Duration, megabytes: u64) -> PressureReport {
    info!(megabytes, duration_ms = duration.as_millis() as u64, "starting memory pressure");
    let start = Instant::now();
    let deadline = start + duration;

    // Allocate in 1 MiB blocks and touch every page so the pages are resident
    let blocks: Vec<Vec<u8>> = (0..megabytes)
        .map(|i| vec![(i % 251) as u8; 1024 * 1024])
        .collect();

    let mut system = System::new();
    let interval = sample_interval(duration);
    let mut samples = Vec::new();
    while Instant::now() < deadline {
        tokio::time::sleep(interval.min(deadline.saturating_duration_since(Instant::now()))).await;
        system.refresh_memory();
        let total = system.total_memory();
        let used_pct = if total == 0 {
            0.0
        } else {
            system.used_memory() as f32 / total as f32 * 100.0
        };
        debug!(used_pct, "memory sample");
        samples.push(used_pct);
    }

    drop(blocks);
    PressureReport::from_samples(samples, start.elapsed())
}
