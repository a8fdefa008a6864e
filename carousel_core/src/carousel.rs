//! Open-loop carousel controller.
//!
//! The actuator has no position feedback: a successful command is recorded as
//! the current position immediately and callers wait a settle duration
//! chosen from the travel distance.
use std::time::Duration;

use carousel_traits::PositionSink;

use crate::config::TimingCfg;
use crate::error::CarouselError;
use crate::hw_error::from_boxed;
use crate::slots::{CarouselPosition, PositionKind, PositionMap, Slot, SlotState, SlotStore};

pub struct Carousel {
    actuator: Box<dyn PositionSink>,
    map: PositionMap,
    slots: SlotStore,
    current: Option<CarouselPosition>,
}

impl core::fmt::Debug for Carousel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Carousel")
            .field("map", &self.map)
            .field("slots", &self.slots)
            .field("current", &self.current)
            .finish()
    }
}

impl Carousel {
    pub fn new(actuator: Box<dyn PositionSink>, map: PositionMap) -> Self {
        Self {
            actuator,
            map,
            slots: SlotStore::new(),
            current: None,
        }
    }

    /// Command the actuator to a slot position.
    pub fn move_to(&mut self, slot: Slot, kind: PositionKind) -> Result<(), CarouselError> {
        let pos = self.map.position(slot, kind);
        self.actuator.set_position(pos).map_err(from_boxed)?;
        self.current = Some(CarouselPosition::new(slot, kind));
        tracing::debug!(%slot, kind = kind.name(), pos, "carousel moved");
        Ok(())
    }

    pub fn current(&self) -> Option<CarouselPosition> {
        self.current
    }

    pub fn current_slot(&self) -> Option<Slot> {
        self.current.map(|p| p.slot)
    }

    pub fn current_kind(&self) -> Option<PositionKind> {
        self.current.map(|p| p.kind)
    }

    pub fn is_at(&self, slot: Slot, kind: PositionKind) -> bool {
        self.current == Some(CarouselPosition::new(slot, kind))
    }

    /// Move to the intake of the first empty slot at or after `from`.
    /// Returns `None` (and does not move) when all slots are full.
    pub fn advance_to_next_empty(&mut self, from: Slot) -> Result<Option<Slot>, CarouselError> {
        match self.slots.first_empty_from(from) {
            Some(slot) => {
                self.move_to(slot, PositionKind::Intake)?;
                Ok(Some(slot))
            }
            None => Ok(None),
        }
    }

    /// Settle time owed after moving from the current position to `target`.
    pub fn settle_for(&self, target: CarouselPosition, timing: &TimingCfg) -> Duration {
        if self.current == Some(target) {
            return Duration::ZERO;
        }
        if self.map.is_long_travel(self.current, target) {
            TimingCfg::ms(timing.long_settle_ms)
        } else {
            TimingCfg::ms(timing.rotate_settle_ms)
        }
    }

    pub fn set_slot_state(&mut self, slot: Slot, state: SlotState) {
        tracing::debug!(%slot, state = state.name(), "slot state");
        self.slots.set_state(slot, state);
    }

    pub fn clear_slot(&mut self, slot: Slot) {
        self.set_slot_state(slot, SlotState::Empty);
    }

    pub fn slot_state(&self, slot: Slot) -> SlotState {
        self.slots.state(slot)
    }

    pub fn slots(&self) -> &SlotStore {
        &self.slots
    }

    pub fn map(&self) -> &PositionMap {
        &self.map
    }
}
