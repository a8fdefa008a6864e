//! Majority-vote color detection over a bounded sampling window.
//!
//! The sampler is cooperative: each `tick` does at most one sensor read and
//! returns immediately. Choreography drives it from its own tick; manual
//! tooling can use [`VotingSampler::run_blocking`].
use std::time::{Duration, Instant};

use carousel_traits::{Clock, ColorSensor};

use crate::calibration::Thresholds;
use crate::classifier::Classifier;
use crate::color::{ColorSample, Verdict};
use crate::config::VotingCfg;
use crate::error::CarouselError;

/// Verdicts collected during one detection attempt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VoteTally {
    votes: Vec<Verdict>,
    dropped: u32,
}

impl VoteTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, v: Verdict) {
        self.votes.push(v);
    }

    pub fn record_drop(&mut self) {
        self.dropped = self.dropped.saturating_add(1);
    }

    pub fn len(&self) -> usize {
        self.votes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }

    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    pub fn votes(&self) -> &[Verdict] {
        &self.votes
    }

    pub fn count(&self, v: Verdict) -> usize {
        self.votes.iter().filter(|&&x| x == v).count()
    }

    /// Resolve the tally.
    ///
    /// `Absent` needs strictly more than `none_ratio` of all votes. Otherwise
    /// the color with strictly more votes wins; a tie (including zero color
    /// votes) or an empty tally is `Unknown`.
    pub fn resolve(&self, none_ratio: f64) -> Verdict {
        let total = self.votes.len();
        if total == 0 {
            return Verdict::Unknown;
        }
        let absent = self.count(Verdict::Absent) as f64;
        if absent > none_ratio * total as f64 {
            return Verdict::Absent;
        }
        let green = self.count(Verdict::Green);
        let purple = self.count(Verdict::Purple);
        match green.cmp(&purple) {
            std::cmp::Ordering::Greater => Verdict::Green,
            std::cmp::Ordering::Less => Verdict::Purple,
            std::cmp::Ordering::Equal => Verdict::Unknown,
        }
    }
}

/// Final result of one detection attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct VoteOutcome {
    pub verdict: Verdict,
    pub tally: VoteTally,
    /// The window expired before `max_samples` votes were collected.
    pub timed_out: bool,
    /// Set when the sensor failed too many reads in a row.
    pub fault: Option<CarouselError>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SamplerPoll {
    Pending,
    Ready(VoteOutcome),
}

#[derive(Debug, Clone)]
pub struct VotingSampler {
    cfg: VotingCfg,
    tally: VoteTally,
    started: Option<Instant>,
    next_read: Option<Instant>,
    consecutive_failures: u8,
}

impl VotingSampler {
    pub fn new(cfg: VotingCfg) -> Self {
        Self {
            cfg,
            tally: VoteTally::new(),
            started: None,
            next_read: None,
            consecutive_failures: 0,
        }
    }

    pub fn tally(&self) -> &VoteTally {
        &self.tally
    }

    pub fn is_started(&self) -> bool {
        self.started.is_some()
    }

    /// Forget all votes; the next tick opens a new window.
    pub fn reset(&mut self) {
        self.tally = VoteTally::new();
        self.started = None;
        self.next_read = None;
        self.consecutive_failures = 0;
    }

    fn finish(&self, timed_out: bool) -> SamplerPoll {
        let verdict = self.tally.resolve(self.cfg.none_ratio);
        tracing::debug!(
            verdict = verdict.name(),
            votes = self.tally.len(),
            dropped = self.tally.dropped(),
            timed_out,
            "vote resolved"
        );
        SamplerPoll::Ready(VoteOutcome {
            verdict,
            tally: self.tally.clone(),
            timed_out,
            fault: None,
        })
    }

    /// Advance the vote. The first call opens the window and samples at once.
    pub fn tick(
        &mut self,
        now: Instant,
        sensor: &mut dyn ColorSensor,
        classifier: &Classifier,
        thresholds: &Thresholds,
    ) -> SamplerPoll {
        let started = *self.started.get_or_insert(now);
        if now.saturating_duration_since(started) >= Duration::from_millis(self.cfg.window_ms) {
            return self.finish(true);
        }
        let due = self.next_read.is_none_or(|t| now >= t);
        if !due {
            return SamplerPoll::Pending;
        }
        self.next_read = Some(now + Duration::from_millis(self.cfg.sample_interval_ms));

        match sensor.read() {
            Ok(raw) => {
                self.consecutive_failures = 0;
                let sample = ColorSample::from_reading(raw, now);
                self.tally.push(classifier.classify(&sample, thresholds));
            }
            Err(e) => {
                self.tally.record_drop();
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                tracing::warn!(
                    error = %e,
                    consecutive = self.consecutive_failures,
                    "color read dropped"
                );
                if self.consecutive_failures >= self.cfg.max_consecutive_failures.max(1) {
                    return SamplerPoll::Ready(VoteOutcome {
                        verdict: Verdict::Unknown,
                        tally: self.tally.clone(),
                        timed_out: false,
                        fault: Some(CarouselError::SensorFault(e.to_string())),
                    });
                }
            }
        }

        if self.tally.len() >= self.cfg.max_samples as usize {
            return self.finish(false);
        }
        SamplerPoll::Pending
    }

    /// Drive the vote to completion, sleeping on `clock` between reads.
    pub fn run_blocking(
        &mut self,
        clock: &dyn Clock,
        sensor: &mut dyn ColorSensor,
        classifier: &Classifier,
        thresholds: &Thresholds,
    ) -> VoteOutcome {
        let pause = Duration::from_millis(self.cfg.sample_interval_ms.max(1));
        loop {
            match self.tick(clock.now(), sensor, classifier, thresholds) {
                SamplerPoll::Ready(outcome) => return outcome,
                SamplerPoll::Pending => clock.sleep(pause),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carousel_traits::{HwResult, RawColorReading};

    fn tally(v: &[Verdict]) -> VoteTally {
        let mut t = VoteTally::new();
        v.iter().for_each(|&x| t.push(x));
        t
    }

    #[test]
    fn absent_needs_strict_majority_over_ratio() {
        use Verdict::*;
        // 6 of 10 is exactly 60%: not enough.
        let t = tally(&[
            Absent, Absent, Absent, Absent, Absent, Absent, Green, Green, Green, Purple,
        ]);
        assert_eq!(t.resolve(0.6), Green);
        let t = tally(&[
            Absent, Absent, Absent, Absent, Absent, Absent, Absent, Green, Green, Purple,
        ]);
        assert_eq!(t.resolve(0.6), Absent);
    }

    #[test]
    fn ties_and_empty_are_unknown() {
        use Verdict::*;
        assert_eq!(VoteTally::new().resolve(0.6), Unknown);
        assert_eq!(tally(&[Green, Purple, Unknown]).resolve(0.6), Unknown);
        assert_eq!(tally(&[Unknown, Unknown]).resolve(0.6), Unknown);
        assert_eq!(tally(&[Unknown, Purple, Unknown]).resolve(0.6), Purple);
    }

    struct Failing;
    impl ColorSensor for Failing {
        fn read(&mut self) -> HwResult<RawColorReading> {
            Err("bus stuck".into())
        }
    }

    #[test]
    fn consecutive_failures_fault_the_vote() {
        let mut s = VotingSampler::new(VotingCfg::default());
        let t = Thresholds::cold_start();
        let c = Classifier::default();
        let t0 = Instant::now();
        let mut sensor = Failing;
        assert_eq!(s.tick(t0, &mut sensor, &c, &t), SamplerPoll::Pending);
        assert_eq!(
            s.tick(t0 + Duration::from_millis(20), &mut sensor, &c, &t),
            SamplerPoll::Pending
        );
        match s.tick(t0 + Duration::from_millis(40), &mut sensor, &c, &t) {
            SamplerPoll::Ready(o) => {
                assert_eq!(o.verdict, Verdict::Unknown);
                assert!(matches!(o.fault, Some(CarouselError::SensorFault(_))));
                assert_eq!(o.tally.dropped(), 3);
            }
            SamplerPoll::Pending => panic!("expected fault"),
        }
    }

    #[test]
    fn reads_are_paced_by_interval() {
        struct Counting(u32);
        impl ColorSensor for Counting {
            fn read(&mut self) -> HwResult<RawColorReading> {
                self.0 += 1;
                Ok(RawColorReading {
                    red: 400.0,
                    green: 450.0,
                    blue: 150.0,
                    distance: 3.0,
                })
            }
        }
        let mut s = VotingSampler::new(VotingCfg::default());
        let (t, c) = (Thresholds::cold_start(), Classifier::default());
        let mut sensor = Counting(0);
        let t0 = Instant::now();
        s.tick(t0, &mut sensor, &c, &t);
        s.tick(t0 + Duration::from_millis(5), &mut sensor, &c, &t);
        s.tick(t0 + Duration::from_millis(19), &mut sensor, &c, &t);
        assert_eq!(sensor.0, 1);
        s.tick(t0 + Duration::from_millis(20), &mut sensor, &c, &t);
        assert_eq!(sensor.0, 2);
    }
}
