//! Color samples and the discrete outcomes of classifying them.
use std::fmt;
use std::time::Instant;

use carousel_traits::RawColorReading;

/// The two game-piece colors the carousel tells apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameColor {
    Green,
    Purple,
}

impl GameColor {
    pub const ALL: [GameColor; 2] = [GameColor::Green, GameColor::Purple];

    pub fn name(self) -> &'static str {
        match self {
            GameColor::Green => "green",
            GameColor::Purple => "purple",
        }
    }
}

impl fmt::Display for GameColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of classifying one sample or resolving a vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    Green,
    Purple,
    /// Nothing within presence range.
    Absent,
    /// Something is there but the color is ambiguous.
    Unknown,
}

impl Verdict {
    pub fn color(self) -> Option<GameColor> {
        match self {
            Verdict::Green => Some(GameColor::Green),
            Verdict::Purple => Some(GameColor::Purple),
            Verdict::Absent | Verdict::Unknown => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Verdict::Green => "green",
            Verdict::Purple => "purple",
            Verdict::Absent => "absent",
            Verdict::Unknown => "unknown",
        }
    }
}

impl From<GameColor> for Verdict {
    fn from(c: GameColor) -> Self {
        match c {
            GameColor::Green => Verdict::Green,
            GameColor::Purple => Verdict::Purple,
        }
    }
}

/// Color channel index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Red,
    Green,
    Blue,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Red, Channel::Green, Channel::Blue];

    #[inline]
    pub(crate) fn index(self) -> usize {
        match self {
            Channel::Red => 0,
            Channel::Green => 1,
            Channel::Blue => 2,
        }
    }
}

/// Channel readings as a percentage of the channel sum.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Normalized(pub [f64; 3]);

impl Normalized {
    #[inline]
    pub fn get(&self, ch: Channel) -> f64 {
        self.0[ch.index()]
    }
}

/// One sensor poll.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorSample {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
    pub distance: f64,
    pub at: Instant,
}

impl ColorSample {
    pub fn from_reading(r: RawColorReading, at: Instant) -> Self {
        Self {
            red: r.red,
            green: r.green,
            blue: r.blue,
            distance: r.distance,
            at,
        }
    }

    /// Build a sample directly from channel percentages (sum 100).
    pub fn from_percent(red: f64, green: f64, blue: f64, distance: f64) -> Self {
        Self {
            red,
            green,
            blue,
            distance,
            at: Instant::now(),
        }
    }

    /// Percent of the channel sum per channel. A zero (or non-finite) sum
    /// yields all zeros, which satisfies no color's lower bounds.
    pub fn normalized(&self) -> Normalized {
        let sum = self.red + self.green + self.blue;
        if !(sum.is_finite() && sum > 0.0) {
            return Normalized::default();
        }
        Normalized([
            self.red / sum * 100.0,
            self.green / sum * 100.0,
            self.blue / sum * 100.0,
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_is_gain_independent() {
        let a = ColorSample::from_percent(40.0, 45.0, 15.0, 3.0).normalized();
        let b = ColorSample::from_percent(400.0, 450.0, 150.0, 3.0).normalized();
        for ch in Channel::ALL {
            assert!((a.get(ch) - b.get(ch)).abs() < 1e-9);
        }
        assert!((a.get(Channel::Green) - 45.0).abs() < 1e-9);
    }

    #[test]
    fn dark_reading_normalizes_to_zero() {
        let n = ColorSample::from_percent(0.0, 0.0, 0.0, 2.0).normalized();
        assert_eq!(n, Normalized::default());
    }
}
