//! Property tests for polyline cursor movement.

use edm_common::axis::AxisVec;
use edm_motion::segment::SegmentList;
use proptest::prelude::*;

fn point() -> impl Strategy<Value = AxisVec> {
    prop::array::uniform3(-1_000.0f64..1_000.0).prop_map(|p| AxisVec::from_slice(&p))
}

proptest! {
    #[test]
    fn cursor_stays_on_path(
        start in point(),
        waypoints in prop::collection::vec(point(), 1..8),
        moves in prop::collection::vec(-500.0f64..500.0, 1..40),
    ) {
        let list = SegmentList::from_waypoints(start, &waypoints);
        prop_assume!(list.is_some());
        let mut list = list.unwrap();
        let length = list.length();

        for delta in moves {
            let before = list.cursor();
            let moved = list.advance(delta);
            prop_assert!((list.cursor() - before - moved).abs() < 1e-6);
            prop_assert!(moved.abs() <= delta.abs() + 1e-9);
            prop_assert!(list.cursor() >= -1e-9 && list.cursor() <= length + 1e-6);
            let from_start = (list.position() - list.start_point()).norm();
            prop_assert!(from_start <= list.cursor() + 1e-6);
        }

        list.advance(2.0 * length);
        prop_assert!(list.at_end());
        prop_assert!(list.position().approx_eq(&list.end_point(), 1e-6));

        list.advance(-2.0 * length);
        prop_assert!(list.at_start());
        prop_assert!(list.position().approx_eq(&list.start_point(), 1e-6));
    }
}
