//! Slot addressing, the actuator position map and the slot-state buffer.
//!
//! Angles are kept in integer centidegrees (1 cdeg = 0.01°) so that the
//! outtake offset invariant `outtake(i) - intake(i) == offset` holds exactly;
//! the normalized actuator command is derived from the integer angle.
use std::fmt;

use crate::color::{GameColor, Verdict};
use crate::error::CarouselError;

/// Number of physical slots.
pub const SLOT_COUNT: usize = 3;

/// A validated slot index in `0..3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Slot(u8);

impl Slot {
    pub const ALL: [Slot; SLOT_COUNT] = [Slot(0), Slot(1), Slot(2)];

    pub fn new(index: usize) -> Result<Self, CarouselError> {
        if index < SLOT_COUNT {
            Ok(Slot(index as u8))
        } else {
            Err(CarouselError::InvalidSlot(index))
        }
    }

    #[inline]
    pub fn index(self) -> usize {
        usize::from(self.0)
    }

    /// The slot after this one, wrapping 2 -> 0.
    #[inline]
    pub fn next(self) -> Slot {
        Slot((self.0 + 1) % SLOT_COUNT as u8)
    }
}

impl TryFrom<usize> for Slot {
    type Error = CarouselError;
    fn try_from(index: usize) -> Result<Self, Self::Error> {
        Slot::new(index)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a slot currently holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SlotState {
    #[default]
    Empty,
    Green,
    Purple,
    /// Occupied, color not (yet) known.
    Unknown,
}

impl SlotState {
    #[inline]
    pub fn is_filled(self) -> bool {
        self != SlotState::Empty
    }

    pub fn color(self) -> Option<GameColor> {
        match self {
            SlotState::Green => Some(GameColor::Green),
            SlotState::Purple => Some(GameColor::Purple),
            SlotState::Empty | SlotState::Unknown => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SlotState::Empty => "empty",
            SlotState::Green => "green",
            SlotState::Purple => "purple",
            SlotState::Unknown => "unknown",
        }
    }
}

impl From<GameColor> for SlotState {
    fn from(c: GameColor) -> Self {
        match c {
            GameColor::Green => SlotState::Green,
            GameColor::Purple => SlotState::Purple,
        }
    }
}

impl From<Verdict> for SlotState {
    /// `Absent` means the slot is empty; `Unknown` stays occupied-unknown.
    fn from(v: Verdict) -> Self {
        match v {
            Verdict::Green => SlotState::Green,
            Verdict::Purple => SlotState::Purple,
            Verdict::Absent => SlotState::Empty,
            Verdict::Unknown => SlotState::Unknown,
        }
    }
}

/// Which of a slot's two angular positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PositionKind {
    Intake,
    Outtake,
}

impl PositionKind {
    pub fn name(self) -> &'static str {
        match self {
            PositionKind::Intake => "intake",
            PositionKind::Outtake => "outtake",
        }
    }
}

/// A slot at one of its two positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CarouselPosition {
    pub slot: Slot,
    pub kind: PositionKind,
}

impl CarouselPosition {
    pub fn new(slot: Slot, kind: PositionKind) -> Self {
        Self { slot, kind }
    }
}

/// Convert degrees to integer centidegrees, rounding to nearest.
/// Non-finite input maps to 0.
#[inline]
fn to_cdeg(deg: f64) -> i32 {
    if !deg.is_finite() {
        return 0;
    }
    let scaled = (deg * 100.0).round();
    scaled.clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32
}

/// Pure `(slot, kind) -> actuator position` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionMap {
    range_cdeg: i32,
    base_cdeg: i32,
    spacing_cdeg: i32,
    offset_cdeg: i32,
    long_travel_cdeg: i32,
}

impl Default for PositionMap {
    /// 300° actuator, slots 120° apart starting at 0°, outtake 60° past intake.
    fn default() -> Self {
        Self {
            range_cdeg: 30_000,
            base_cdeg: 0,
            spacing_cdeg: 12_000,
            offset_cdeg: 6_000,
            long_travel_cdeg: 24_000,
        }
    }
}

impl PositionMap {
    /// Build a map from degrees. Every addressable angle must lie within
    /// `[0, range]`.
    pub fn new(
        range_deg: f64,
        base_deg: f64,
        spacing_deg: f64,
        outtake_offset_deg: f64,
    ) -> Result<Self, CarouselError> {
        let range_cdeg = to_cdeg(range_deg);
        let base_cdeg = to_cdeg(base_deg);
        let spacing_cdeg = to_cdeg(spacing_deg);
        let offset_cdeg = to_cdeg(outtake_offset_deg);
        if range_cdeg <= 0 {
            return Err(CarouselError::Config("actuator range must be > 0".into()));
        }
        if base_cdeg < 0 || spacing_cdeg <= 0 || offset_cdeg <= 0 {
            return Err(CarouselError::Config(
                "base must be >= 0; spacing and outtake offset must be > 0".into(),
            ));
        }
        let last = i64::from(base_cdeg) + 2 * i64::from(spacing_cdeg) + i64::from(offset_cdeg);
        if last > i64::from(range_cdeg) {
            return Err(CarouselError::Config(format!(
                "slot 2 outtake at {:.2}° exceeds actuator range {:.2}°",
                last as f64 / 100.0,
                range_deg
            )));
        }
        Ok(Self {
            range_cdeg,
            base_cdeg,
            spacing_cdeg,
            offset_cdeg,
            long_travel_cdeg: range_cdeg,
        })
    }

    /// Moves covering at least this angle count as long transitions.
    pub fn with_long_travel_deg(mut self, deg: f64) -> Self {
        self.long_travel_cdeg = to_cdeg(deg).clamp(1, self.range_cdeg);
        self
    }

    /// Angle in centidegrees for a slot position.
    pub fn angle_cdeg(&self, slot: Slot, kind: PositionKind) -> i32 {
        let intake = self.base_cdeg + self.spacing_cdeg * slot.index() as i32;
        match kind {
            PositionKind::Intake => intake,
            PositionKind::Outtake => intake + self.offset_cdeg,
        }
    }

    /// Normalized actuator command in `[0, 1]`.
    pub fn position(&self, slot: Slot, kind: PositionKind) -> f64 {
        f64::from(self.angle_cdeg(slot, kind)) / f64::from(self.range_cdeg)
    }

    pub fn intake_position(&self, slot: Slot) -> f64 {
        self.position(slot, PositionKind::Intake)
    }

    pub fn outtake_position(&self, slot: Slot) -> f64 {
        self.position(slot, PositionKind::Outtake)
    }

    #[inline]
    pub fn outtake_offset_cdeg(&self) -> i32 {
        self.offset_cdeg
    }

    /// Outtake offset as a normalized fraction of the actuator range.
    pub fn outtake_offset(&self) -> f64 {
        f64::from(self.offset_cdeg) / f64::from(self.range_cdeg)
    }

    /// Angular travel between two positions. An unknown start counts as a
    /// full-range move.
    pub fn travel_cdeg(&self, from: Option<CarouselPosition>, to: CarouselPosition) -> i32 {
        match from {
            Some(f) => (self.angle_cdeg(f.slot, f.kind) - self.angle_cdeg(to.slot, to.kind)).abs(),
            None => self.range_cdeg,
        }
    }

    pub fn is_long_travel(&self, from: Option<CarouselPosition>, to: CarouselPosition) -> bool {
        self.travel_cdeg(from, to) >= self.long_travel_cdeg
    }
}

/// State of the three slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SlotStore {
    slots: [SlotState; SLOT_COUNT],
}

impl SlotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_states(slots: [SlotState; SLOT_COUNT]) -> Self {
        Self { slots }
    }

    #[inline]
    pub fn state(&self, slot: Slot) -> SlotState {
        self.slots[slot.index()]
    }

    #[inline]
    pub fn set_state(&mut self, slot: Slot, state: SlotState) {
        self.slots[slot.index()] = state;
    }

    #[inline]
    pub fn clear(&mut self, slot: Slot) {
        self.set_state(slot, SlotState::Empty);
    }

    pub fn clear_all(&mut self) {
        self.slots = [SlotState::Empty; SLOT_COUNT];
    }

    pub fn count_filled(&self) -> usize {
        self.slots.iter().filter(|s| s.is_filled()).count()
    }

    /// First empty slot scanning circularly from `start` (inclusive).
    pub fn first_empty_from(&self, start: Slot) -> Option<Slot> {
        let mut slot = start;
        for _ in 0..SLOT_COUNT {
            if !self.state(slot).is_filled() {
                return Some(slot);
            }
            slot = slot.next();
        }
        None
    }

    pub fn is_full(&self) -> bool {
        self.count_filled() == SLOT_COUNT
    }

    pub fn is_empty(&self) -> bool {
        self.count_filled() == 0
    }

    pub fn snapshot(&self) -> [SlotState; SLOT_COUNT] {
        self.slots
    }

    /// Slots currently labelled with `color`, in index order.
    pub fn slots_holding(&self, color: GameColor) -> impl Iterator<Item = Slot> + '_ {
        let want = SlotState::from(color);
        Slot::ALL.into_iter().filter(move |s| self.state(*s) == want)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(i: usize) -> Slot {
        Slot::new(i).unwrap()
    }

    #[test]
    fn outtake_offset_is_exact_for_every_slot() {
        let map = PositionMap::default();
        for slot in Slot::ALL {
            let d = map.angle_cdeg(slot, PositionKind::Outtake)
                - map.angle_cdeg(slot, PositionKind::Intake);
            assert_eq!(d, map.outtake_offset_cdeg());
            assert_eq!(d, 6_000);
        }
    }

    #[test]
    fn default_map_spans_the_full_range() {
        let map = PositionMap::default();
        assert_eq!(map.intake_position(s(0)), 0.0);
        assert!((map.outtake_position(s(0)) - 0.2).abs() < 1e-12);
        assert!((map.intake_position(s(1)) - 0.4).abs() < 1e-12);
        assert_eq!(map.outtake_position(s(2)), 1.0);
        assert!((map.outtake_offset() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn map_rejects_geometry_outside_range() {
        let err = PositionMap::new(300.0, 10.0, 120.0, 60.0).unwrap_err();
        assert!(matches!(err, CarouselError::Config(_)));
        assert!(PositionMap::new(300.0, 0.0, 0.0, 60.0).is_err());
        assert!(PositionMap::new(360.0, 10.0, 120.0, 60.0).is_ok());
    }

    #[test]
    fn long_travel_covers_the_endpoints() {
        let map = PositionMap::default().with_long_travel_deg(240.0);
        let s0_in = CarouselPosition::new(s(0), PositionKind::Intake);
        let s2_out = CarouselPosition::new(s(2), PositionKind::Outtake);
        let s1_out = CarouselPosition::new(s(1), PositionKind::Outtake);
        assert!(map.is_long_travel(Some(s0_in), s2_out));
        assert!(!map.is_long_travel(Some(s2_out), s1_out));
        assert!(map.is_long_travel(None, s1_out));
        assert_eq!(map.travel_cdeg(Some(s1_out), s1_out), 0);
    }

    #[test]
    fn invalid_index_is_rejected_not_clamped() {
        assert_eq!(Slot::new(3), Err(CarouselError::InvalidSlot(3)));
        assert_eq!(Slot::try_from(99usize), Err(CarouselError::InvalidSlot(99)));
    }

    #[test]
    fn set_then_get_round_trips() {
        let mut store = SlotStore::new();
        for slot in Slot::ALL {
            for st in [
                SlotState::Green,
                SlotState::Purple,
                SlotState::Unknown,
                SlotState::Empty,
            ] {
                store.set_state(slot, st);
                assert_eq!(store.state(slot), st);
            }
            store.set_state(slot, SlotState::Green);
            store.clear(slot);
            assert_eq!(store.state(slot), SlotState::Empty);
        }
    }

    #[test]
    fn first_empty_wraps_around() {
        let store =
            SlotStore::from_states([SlotState::Empty, SlotState::Green, SlotState::Unknown]);
        assert_eq!(store.first_empty_from(s(1)), Some(s(0)));
        assert_eq!(store.first_empty_from(s(0)), Some(s(0)));
        let full = SlotStore::from_states([SlotState::Purple; 3]);
        assert_eq!(full.first_empty_from(s(2)), None);
        assert!(full.is_full());
    }

    #[test]
    fn first_empty_matches_fill_count_for_every_layout() {
        let states = [
            SlotState::Empty,
            SlotState::Green,
            SlotState::Purple,
            SlotState::Unknown,
        ];
        for a in states {
            for b in states {
                for c in states {
                    let store = SlotStore::from_states([a, b, c]);
                    for start in Slot::ALL {
                        match store.first_empty_from(start) {
                            Some(found) => {
                                assert_eq!(store.state(found), SlotState::Empty);
                                assert!(store.count_filled() < 3);
                            }
                            None => assert_eq!(store.count_filled(), 3),
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn slots_holding_lists_matches() {
        let store = SlotStore::from_states([SlotState::Green, SlotState::Purple, SlotState::Green]);
        let greens: Vec<_> = store.slots_holding(GameColor::Green).collect();
        assert_eq!(greens, vec![s(0), s(2)]);
        assert!(!store.is_empty());
    }
}
