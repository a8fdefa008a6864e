//! Single-sample color classification.
use crate::calibration::Thresholds;
use crate::color::{ColorSample, GameColor, Verdict};

/// What to answer when a close sample satisfies neither color predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AmbiguityPolicy {
    /// Something is there; its color is unknown.
    #[default]
    Conservative,
    /// Treat an unrecognisable sample as no piece at all.
    NeitherIsAbsent,
}

/// Pure classifier: same sample and thresholds always give the same verdict.
#[derive(Debug, Clone, Copy, Default)]
pub struct Classifier {
    policy: AmbiguityPolicy,
}

impl Classifier {
    pub fn new(policy: AmbiguityPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> AmbiguityPolicy {
        self.policy
    }

    pub fn classify(&self, sample: &ColorSample, t: &Thresholds) -> Verdict {
        // Distance wins over color: a far sample is never a piece.
        if !sample.distance.is_finite() || sample.distance > t.max_presence_distance {
            return Verdict::Absent;
        }
        let n = sample.normalized();
        let green = t.bounds(GameColor::Green).contains(&n);
        let purple = t.bounds(GameColor::Purple).contains(&n);
        match (green, purple) {
            (true, false) => Verdict::Green,
            (false, true) => Verdict::Purple,
            (true, true) => Verdict::Unknown,
            (false, false) => match self.policy {
                AmbiguityPolicy::Conservative => Verdict::Unknown,
                AmbiguityPolicy::NeitherIsAbsent => Verdict::Absent,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::ColorBounds;
    use crate::color::Channel;

    fn overlapping() -> Thresholds {
        Thresholds {
            green: ColorBounds::default().with_min(Channel::Green, 30.0),
            purple: ColorBounds::default().with_min(Channel::Blue, 30.0),
            max_presence_distance: 5.0,
        }
    }

    #[test]
    fn distance_checked_first() {
        let t = Thresholds::cold_start();
        let far_green = ColorSample::from_percent(40.0, 45.0, 15.0, 9.0);
        assert_eq!(Classifier::default().classify(&far_green, &t), Verdict::Absent);
    }

    #[test]
    fn both_predicates_true_is_unknown() {
        let s = ColorSample::from_percent(20.0, 40.0, 40.0, 2.0);
        assert_eq!(Classifier::default().classify(&s, &overlapping()), Verdict::Unknown);
    }

    #[test]
    fn neither_predicate_follows_policy() {
        let s = ColorSample::from_percent(80.0, 10.0, 10.0, 2.0);
        let t = overlapping();
        assert_eq!(Classifier::default().classify(&s, &t), Verdict::Unknown);
        assert_eq!(
            Classifier::new(AmbiguityPolicy::NeitherIsAbsent).classify(&s, &t),
            Verdict::Absent
        );
    }

    #[test]
    fn cold_start_separates_reference_pieces() {
        let c = Classifier::default();
        let t = Thresholds::cold_start();
        let green = ColorSample::from_percent(400.0, 450.0, 150.0, 3.0);
        let purple = ColorSample::from_percent(150.0, 200.0, 400.0, 3.5);
        assert_eq!(c.classify(&green, &t), Verdict::Green);
        assert_eq!(c.classify(&purple, &t), Verdict::Purple);
    }
}
