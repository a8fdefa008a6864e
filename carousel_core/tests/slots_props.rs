use carousel_core::{PositionKind, PositionMap, Slot, SlotState, SlotStore};
use proptest::prelude::*;

fn arb_state() -> impl Strategy<Value = SlotState> {
    prop_oneof![
        Just(SlotState::Empty),
        Just(SlotState::Green),
        Just(SlotState::Purple),
        Just(SlotState::Unknown),
    ]
}

prop_compose! {
    // Geometries whose slot 2 outtake still fits in the range.
    fn arb_map()(
        base in 0u32..40,
        spacing in 20u32..120,
        offset in 5u32..60,
        slack in 0u32..60,
    ) -> PositionMap {
        let range = base + 2 * spacing + offset + slack;
        PositionMap::new(f64::from(range), f64::from(base), f64::from(spacing), f64::from(offset))
            .expect("geometry fits")
    }
}

proptest! {
    #[test]
    fn outtake_is_intake_plus_offset(map in arb_map()) {
        for slot in Slot::ALL {
            let intake = map.angle_cdeg(slot, PositionKind::Intake);
            let outtake = map.angle_cdeg(slot, PositionKind::Outtake);
            prop_assert_eq!(outtake - intake, map.outtake_offset_cdeg());
            let p = map.outtake_position(slot);
            prop_assert!((0.0..=1.0).contains(&p));
            prop_assert!(
                (p - map.intake_position(slot) - map.outtake_offset()).abs() < 1e-9
            );
        }
    }

    #[test]
    fn first_empty_is_the_circular_scan(
        states in prop::array::uniform3(arb_state()),
        start in 0usize..3,
    ) {
        let store = SlotStore::from_states(states);
        let start = Slot::new(start).unwrap();
        let found = store.first_empty_from(start);
        let expected = (0..3)
            .map(|k| Slot::new((start.index() + k) % 3).unwrap())
            .find(|s| states[s.index()] == SlotState::Empty);
        prop_assert_eq!(found, expected);
        prop_assert_eq!(found.is_none(), store.is_full());
    }

    #[test]
    fn filled_count_ignores_only_empty(states in prop::array::uniform3(arb_state())) {
        let store = SlotStore::from_states(states);
        let empties = states.iter().filter(|s| **s == SlotState::Empty).count();
        prop_assert_eq!(store.count_filled(), 3 - empties);
    }
}

#[test]
fn geometry_past_range_is_rejected() {
    assert!(PositionMap::new(300.0, 0.0, 120.0, 61.0).is_err());
    assert!(PositionMap::new(300.0, 0.0, 120.0, 60.0).is_ok());
    assert!(PositionMap::new(0.0, 0.0, 120.0, 60.0).is_err());
}
