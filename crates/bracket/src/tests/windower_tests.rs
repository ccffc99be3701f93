use super::*;

fn round_of(len: usize) -> Vec<Match> {
    (0..len)
        .map(|index| Match::new(format!("round-0-match-{index}")))
        .collect()
}

fn indices(group: &CallGroup<'_>) -> Vec<Option<usize>> {
    group
        .iter()
        .map(|entry| entry.as_ref().map(|entry| entry.match_index))
        .collect()
}

#[test]
fn interleaved_groups_take_one_match_per_lane_chunk() {
    let round = round_of(32);
    let groups = compute_groups(&round, 4, Windowing::Interleaved);
    assert_eq!(groups.len(), 8);
    assert_eq!(indices(&groups[0]), [Some(0), Some(8), Some(16), Some(24)]);
    assert_eq!(indices(&groups[7]), [Some(7), Some(15), Some(23), Some(31)]);
}

#[test]
fn short_rounds_leave_trailing_lanes_empty() {
    let round = round_of(13);
    let groups = compute_groups(&round, 4, Windowing::Interleaved);
    assert_eq!(groups.len(), 4);
    assert_eq!(indices(&groups[3]), [Some(3), Some(7), Some(11), None]);
    assert_eq!(indices(&groups[0]), [Some(0), Some(4), Some(8), Some(12)]);

    let final_round = round_of(1);
    let groups = compute_groups(&final_round, 4, Windowing::Interleaved);
    assert_eq!(indices(&groups[0]), [Some(0), None, None, None]);
}

#[test]
fn contiguous_groups_take_consecutive_matches() {
    let round = round_of(10);
    let groups = compute_groups(&round, 4, Windowing::Contiguous);
    assert_eq!(groups.len(), 3);
    assert_eq!(indices(&groups[1]), [Some(4), Some(5), Some(6), Some(7)]);
    assert_eq!(indices(&groups[2]), [Some(8), Some(9), None, None]);
}

#[test]
fn group_entries_carry_their_lane_and_match() {
    let round = round_of(8);
    let groups = compute_groups(&round, 4, Windowing::Interleaved);
    let entry = groups[1][2].expect("entry");
    assert_eq!(entry.lane, 2);
    assert_eq!(entry.bout.id.as_str(), "round-0-match-5");
}

#[test]
fn group_count_never_drops_below_one() {
    assert_eq!(group_count(0, 4), 1);
    assert_eq!(group_count(4, 4), 1);
    assert_eq!(group_count(5, 4), 2);
    assert_eq!(group_count(32, 5), 7);
}

#[test]
fn windowing_parses_case_insensitively() {
    assert_eq!("Contiguous".parse::<Windowing>(), Ok(Windowing::Contiguous));
    assert_eq!(" interleaved ".parse::<Windowing>(), Ok(Windowing::Interleaved));
    assert!("diagonal".parse::<Windowing>().is_err());
}

#[test]
fn cursor_navigation_stays_inside_the_round() {
    let mut cursor = CallroomCursor::default();
    assert!(!cursor.prev());
    assert!(cursor.next(3));
    assert!(cursor.next(3));
    assert!(!cursor.next(3));
    assert_eq!(cursor.group, 2);

    assert!(cursor.set_round(9, 6));
    assert_eq!((cursor.round, cursor.group), (5, 0));
    assert!(!cursor.set_round(5, 6));
}

#[test]
fn either_lock_freezes_navigation() {
    let mut cursor = CallroomCursor::default();
    assert!(cursor.toggle_sides_confirmed());
    assert!(cursor.navigation_locked());
    assert!(!cursor.next(4));

    cursor.toggle_fully_arranged();
    assert!(!cursor.toggle_sides_confirmed());
    assert!(cursor.sides_confirmed);

    cursor.toggle_fully_arranged();
    assert!(cursor.toggle_sides_confirmed());
    assert!(!cursor.navigation_locked());
    assert!(!cursor.swap_locked());
    assert!(cursor.next(4));
}

#[test]
fn clamp_pulls_the_cursor_into_a_smaller_bracket() {
    let mut cursor = CallroomCursor {
        round: 5,
        group: 7,
        ..CallroomCursor::default()
    };
    cursor.clamp(3, |round| if round == 2 { 1 } else { 4 });
    assert_eq!((cursor.round, cursor.group), (2, 0));
}

#[test]
fn attendance_cycles_per_slot() {
    let mut attendance = AttendanceMap::default();
    let id = MatchId::new("round-0-match-0");
    assert_eq!(attendance.get(&id).slot1, AttendanceStatus::Absent);

    assert_eq!(attendance.toggle(&id, Slot::One), AttendanceStatus::Present);
    assert_eq!(attendance.toggle(&id, Slot::One), AttendanceStatus::Checked);
    assert_eq!(attendance.get(&id).status(Slot::Two), AttendanceStatus::Absent);
    assert_eq!(attendance.toggle(&id, Slot::One), AttendanceStatus::Absent);
    assert_eq!(attendance.len(), 1);
}

#[test]
fn swapping_attendance_follows_the_fencers() {
    let mut attendance = AttendanceMap::default();
    let id = MatchId::new("round-1-match-3");
    assert!(!attendance.swap(&id));
    assert!(attendance.is_empty());

    attendance.toggle(&id, Slot::Two);
    assert!(attendance.swap(&id));
    let entry = attendance.get(&id);
    assert_eq!(entry.slot1, AttendanceStatus::Present);
    assert_eq!(entry.slot2, AttendanceStatus::Absent);
}

#[test]
fn attendance_encodes_as_a_map_keyed_by_match_id() {
    let mut attendance = AttendanceMap::default();
    attendance.toggle(&MatchId::new("round-0-match-2"), Slot::One);
    let json = serde_json::to_value(&attendance).expect("encode");
    assert_eq!(json["round-0-match-2"]["slot1"], "present");
}
