//! Background color sampling for diagnostics.
//!
//! Spawns a thread that owns the color sensor and pushes readings through a
//! bounded channel. The consumer drains and classifies on its own thread;
//! nothing is shared but the channel and a few atomics. Production
//! behaviors sample cooperatively instead (see `voting`).
//!
//! Each `ColorSampler` spawns exactly one thread that is shut down and
//! joined when the sampler is dropped.
use crossbeam_channel as xch;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use carousel_traits::{Clock, ColorSensor};

use crate::color::ColorSample;

/// Channel capacity; readings beyond this are discarded until drained.
pub const QUEUE_DEPTH: usize = 64;

pub struct ColorSampler {
    rx: xch::Receiver<ColorSample>,
    last_ok: Arc<AtomicU64>,
    failures: Arc<AtomicU64>,
    longest_failure_run: Arc<AtomicU64>,
    overflow: Arc<AtomicU64>,
    epoch: Instant,
    shutdown: Arc<AtomicBool>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl ColorSampler {
    pub fn spawn<S, C>(mut sensor: S, hz: u32, clock: C) -> Self
    where
        S: ColorSensor + Send + 'static,
        C: Clock + Send + Sync + 'static,
    {
        let (tx, rx) = xch::bounded(QUEUE_DEPTH);
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let last_ok = Arc::new(AtomicU64::new(0));
        let last_ok_clone = last_ok.clone();
        let failures = Arc::new(AtomicU64::new(0));
        let failures_clone = failures.clone();
        let longest_run = Arc::new(AtomicU64::new(0));
        let longest_run_clone = longest_run.clone();
        let overflow = Arc::new(AtomicU64::new(0));
        let overflow_clone = overflow.clone();
        let period = crate::config::period_for(hz);
        let epoch = clock.now();

        let join_handle = std::thread::spawn(move || {
            let mut run: u64 = 0;
            loop {
                if shutdown_clone.load(Ordering::Relaxed) {
                    tracing::debug!("color sampler received shutdown signal");
                    break;
                }

                match sensor.read() {
                    Ok(r) => {
                        run = 0;
                        let sample = ColorSample::from_reading(r, clock.now());
                        match tx.try_send(sample) {
                            Ok(()) => {}
                            Err(xch::TrySendError::Full(_)) => {
                                overflow_clone.fetch_add(1, Ordering::Relaxed);
                            }
                            Err(xch::TrySendError::Disconnected(_)) => {
                                tracing::debug!("color sampler consumer disconnected, exiting thread");
                                break;
                            }
                        }
                        last_ok_clone.store(clock.ms_since(epoch), Ordering::Relaxed);
                    }
                    Err(e) => {
                        failures_clone.fetch_add(1, Ordering::Relaxed);
                        run += 1;
                        longest_run_clone.fetch_max(run, Ordering::Relaxed);
                        tracing::trace!(error = %e, "color sampler read failed");
                    }
                }

                if shutdown_clone.load(Ordering::Relaxed) {
                    break;
                }
                clock.sleep(period);
            }
            tracing::trace!("color sampler thread exiting cleanly");
        });

        Self {
            rx,
            last_ok,
            failures,
            longest_failure_run: longest_run,
            overflow,
            epoch,
            shutdown,
            join_handle: Some(join_handle),
        }
    }

    /// Every reading queued since the last drain, oldest first.
    pub fn drain(&self) -> Vec<ColorSample> {
        self.rx.try_iter().collect()
    }

    pub fn latest(&self) -> Option<ColorSample> {
        self.rx.try_iter().last()
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Longest streak of back-to-back failed reads so far. Kept as a
    /// high-water mark so a streak between two drains is not missed.
    pub fn longest_failure_run(&self) -> u64 {
        self.longest_failure_run.load(Ordering::Relaxed)
    }

    /// Readings discarded because the queue was full.
    pub fn overflowed(&self) -> u64 {
        self.overflow.load(Ordering::Relaxed)
    }

    /// Milliseconds since the last good read, measured on `now_ms` from
    /// the sampler epoch.
    pub fn stalled_for(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.last_ok.load(Ordering::Relaxed))
    }

    pub fn epoch(&self) -> Instant {
        self.epoch
    }
}

impl Drop for ColorSampler {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        // The thread exits at its next flag check: after the current read or
        // before the next sleep.
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => tracing::trace!("color sampler thread joined"),
                Err(e) => tracing::warn!(?e, "color sampler thread panicked during shutdown"),
            }
        }
    }
}
