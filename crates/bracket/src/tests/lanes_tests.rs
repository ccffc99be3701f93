use super::*;

fn settings(names: &[&str], colors: &[&str]) -> LaneSettings {
    LaneSettings {
        names: names.iter().map(|name| name.to_string()).collect(),
        colors: colors.iter().map(|color| color.to_string()).collect(),
    }
}

#[test]
fn defaults_name_lanes_in_order() {
    let registry = LaneRegistry::with_defaults(4).expect("registry");
    let names: Vec<&str> = registry.lanes().iter().map(|lane| lane.name.as_str()).collect();
    assert_eq!(names, ["Lane 1", "Lane 2", "Lane 3", "Lane 4"]);
    assert_eq!(registry.get(0).map(|lane| lane.color.as_str()), Some("#FF0000"));
    assert_eq!(registry.get(3).map(|lane| lane.color.as_str()), Some("#00FF00"));

    let five = LaneRegistry::with_defaults(5).expect("registry");
    assert_eq!(five.get(4).map(|lane| lane.color.as_str()), Some("#FF00FF"));
}

#[test]
fn unsupported_lane_counts_are_rejected() {
    assert_eq!(
        LaneRegistry::with_defaults(3),
        Err(BracketError::UnsupportedLaneCount(3))
    );
    assert_eq!(
        LaneRegistry::with_defaults(6),
        Err(BracketError::UnsupportedLaneCount(6))
    );
}

#[test]
fn stored_lists_of_the_wrong_length_fall_back_to_defaults() {
    let stored = settings(&["North", "South"], &["#111111", "#222222", "#333333", "#444444"]);
    let registry = LaneRegistry::from_settings(&stored, 4).expect("registry");
    assert_eq!(registry.get(0).map(|lane| lane.name.as_str()), Some("Lane 1"));
    assert_eq!(registry.get(2).map(|lane| lane.color.as_str()), Some("#333333"));
}

#[test]
fn apply_requires_full_lists() {
    let mut registry = LaneRegistry::with_defaults(4).expect("registry");
    let short = settings(&["A", "B", "C"], &["#1", "#2", "#3", "#4"]);
    assert_eq!(
        registry.apply(&short),
        Err(BracketError::LaneSettingsLength {
            expected: 4,
            actual: 3
        })
    );
    assert_eq!(registry, LaneRegistry::with_defaults(4).expect("registry"));

    let full = settings(&["A", "B", "C", "D"], &["#1", "#2", "#3", "#4"]);
    registry.apply(&full).expect("apply");
    assert_eq!(registry.to_settings(), full);
}

#[test]
fn automatic_lanes_split_the_round_into_chunks() {
    let lanes: Vec<usize> = (0..8).map(|index| automatic_lane(index, 8, 4)).collect();
    assert_eq!(lanes, [0, 0, 1, 1, 2, 2, 3, 3]);

    let lanes: Vec<usize> = (0..13).map(|index| automatic_lane(index, 13, 4)).collect();
    assert_eq!(lanes, [0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 3]);

    assert_eq!(automatic_lane(0, 1, 4), 0);
    assert_eq!(automatic_lane(1, 2, 4), 1);
}

#[test]
fn manual_override_wins_and_is_capped() {
    let registry = LaneRegistry::with_defaults(4).expect("registry");
    let mut bout = Match::new("round-0-match-0");
    assert_eq!(registry.lane_for_main(&bout, 0, 32), 0);

    bout.lane = LaneAssignment::Manual { lane: 2 };
    assert_eq!(registry.lane_for_main(&bout, 0, 32), 2);

    bout.lane = LaneAssignment::Manual { lane: 9 };
    assert_eq!(registry.lane_for_main(&bout, 0, 32), 3);
    assert_eq!(
        registry.check(bout.lane),
        Err(BracketError::LaneOutOfRange {
            lane: 9,
            available: 4
        })
    );
    assert_eq!(registry.check(LaneAssignment::Automatic), Ok(()));
}

#[test]
fn placement_matches_rotate_through_lanes() {
    let registry = LaneRegistry::with_defaults(4).expect("registry");
    let bout = Match::new("consolation-3-4");
    assert_eq!(registry.lane_for_consolation(&bout, 0, 0), 0);
    assert_eq!(registry.lane_for_consolation(&bout, 0, 1), 1);
    assert_eq!(registry.lane_for_consolation(&bout, 1, 1), 3);
    assert_eq!(registry.lane_for_consolation(&bout, 2, 0), 0);
}
