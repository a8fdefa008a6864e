//! Fixed-rate cooperative loop driving one behavior to completion.
use std::sync::atomic::{AtomicBool, Ordering};

use crate::choreo::{Behavior, Scheduler};
use crate::config::LoopCfg;
use crate::error::{CarouselError, Report, Result};
use crate::status::ChoreoStatus;

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub behavior: &'static str,
    pub ticks: u64,
    pub elapsed_ms: u64,
    /// Degraded-proceed count accumulated on the rig during this run.
    pub degraded: u32,
}

/// Run `behavior` on `scheduler` until it completes.
///
/// The loop sleeps one period of `loop_hz` on the rig clock between ticks.
/// A raised `shutdown` flag interrupts the behavior and returns
/// `Interrupted`; exceeding `max_behavior_ms` (when non-zero) interrupts it
/// and returns `Timeout`. Aborts come back as errors.
pub fn run_behavior(
    scheduler: &mut Scheduler,
    behavior: Box<dyn Behavior>,
    cfg: &LoopCfg,
    shutdown: &AtomicBool,
) -> Result<RunReport> {
    let name = behavior.name();
    let clock = scheduler.rig().clock();
    let period = cfg.period();
    let degraded_before = scheduler.rig().health().degraded;
    let start = clock.now();
    let mut ticks: u64 = 0;

    scheduler.start(behavior);
    tracing::info!(behavior = name, loop_hz = cfg.loop_hz, "run start");

    loop {
        if shutdown.load(Ordering::Relaxed) {
            scheduler.interrupt();
            tracing::warn!(behavior = name, ticks, "run interrupted by shutdown");
            return Err(Report::new(CarouselError::Interrupted));
        }
        let elapsed_ms = clock.ms_since(start);
        if cfg.max_behavior_ms > 0 && elapsed_ms >= cfg.max_behavior_ms {
            scheduler.interrupt();
            tracing::error!(behavior = name, elapsed_ms, "max run time exceeded");
            return Err(Report::new(CarouselError::Timeout));
        }

        ticks += 1;
        match scheduler.tick() {
            Some(ChoreoStatus::Running) => clock.sleep(period),
            Some(ChoreoStatus::Complete) | None => {
                let report = RunReport {
                    behavior: name,
                    ticks,
                    elapsed_ms: clock.ms_since(start),
                    degraded: scheduler
                        .rig()
                        .health()
                        .degraded
                        .saturating_sub(degraded_before),
                };
                tracing::info!(
                    behavior = name,
                    ticks,
                    elapsed_ms = report.elapsed_ms,
                    degraded = report.degraded,
                    "run complete"
                );
                return Ok(report);
            }
            Some(ChoreoStatus::Aborted(e)) => {
                return Err(Report::new(e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::LoopCfg;
    use std::time::Duration;

    #[test]
    fn loop_period_from_rate() {
        let mut cfg = LoopCfg::default();
        assert_eq!(cfg.period(), Duration::from_millis(20));
        cfg.loop_hz = 0;
        assert_eq!(cfg.period(), Duration::from_secs(1));
        cfg.loop_hz = 3_000_000;
        assert_eq!(cfg.period(), Duration::from_micros(1));
    }
}
