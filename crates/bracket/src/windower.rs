use std::{collections::BTreeMap, str::FromStr};

use serde::{Deserialize, Serialize};
use shared::{
    domain::{AttendanceStatus, MatchId, Slot},
    error::ParseError,
};

use crate::state::Match;

/// How a round is cut into call groups of one match per lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Windowing {
    /// Group g takes match `lane * chunk + g` for every lane.
    #[default]
    Interleaved,
    /// Group g takes matches `g * lanes .. g * lanes + lanes`.
    Contiguous,
}

impl FromStr for Windowing {
    type Err = ParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "interleaved" => Ok(Windowing::Interleaved),
            "contiguous" => Ok(Windowing::Contiguous),
            _ => Err(ParseError::new("windowing", value)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupEntry<'a> {
    pub lane: usize,
    pub match_index: usize,
    pub bout: &'a Match,
}

/// One entry per lane; `None` where the round has no match for that lane.
pub type CallGroup<'a> = Vec<Option<GroupEntry<'a>>>;

pub fn group_count(round_len: usize, lane_count: usize) -> usize {
    round_len.div_ceil(lane_count.max(1)).max(1)
}

pub fn compute_groups(round: &[Match], lane_count: usize, windowing: Windowing) -> Vec<CallGroup<'_>> {
    let lane_count = lane_count.max(1);
    let groups = group_count(round.len(), lane_count);
    (0..groups)
        .map(|group| {
            (0..lane_count)
                .map(|lane| {
                    let match_index = match windowing {
                        Windowing::Interleaved => lane * groups + group,
                        Windowing::Contiguous => group * lane_count + lane,
                    };
                    round.get(match_index).map(|bout| GroupEntry {
                        lane,
                        match_index,
                        bout,
                    })
                })
                .collect()
        })
        .collect()
}

/// Operator position in the call room plus the two progressive locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CallroomCursor {
    pub round: usize,
    pub group: usize,
    #[serde(default)]
    pub sides_confirmed: bool,
    #[serde(default)]
    pub fully_arranged: bool,
}

impl CallroomCursor {
    pub fn navigation_locked(&self) -> bool {
        self.sides_confirmed || self.fully_arranged
    }

    pub fn swap_locked(&self) -> bool {
        self.sides_confirmed || self.fully_arranged
    }

    pub fn set_round(&mut self, round: usize, total_rounds: usize) -> bool {
        let round = round.min(total_rounds.saturating_sub(1));
        let changed = self.round != round || self.group != 0;
        self.round = round;
        self.group = 0;
        changed
    }

    pub fn prev(&mut self) -> bool {
        if self.navigation_locked() || self.group == 0 {
            return false;
        }
        self.group -= 1;
        true
    }

    pub fn next(&mut self, groups: usize) -> bool {
        if self.navigation_locked() || self.group + 1 >= groups {
            return false;
        }
        self.group += 1;
        true
    }

    pub fn toggle_sides_confirmed(&mut self) -> bool {
        if self.fully_arranged {
            return false;
        }
        self.sides_confirmed = !self.sides_confirmed;
        true
    }

    pub fn toggle_fully_arranged(&mut self) {
        self.fully_arranged = !self.fully_arranged;
    }

    /// Pulls the cursor back inside a bracket that may have been replaced.
    pub fn clamp(&mut self, total_rounds: usize, groups_in_round: impl Fn(usize) -> usize) {
        self.round = self.round.min(total_rounds.saturating_sub(1));
        self.group = self.group.min(groups_in_round(self.round).saturating_sub(1));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MatchAttendance {
    pub slot1: AttendanceStatus,
    pub slot2: AttendanceStatus,
}

impl MatchAttendance {
    pub fn status(&self, slot: Slot) -> AttendanceStatus {
        match slot {
            Slot::One => self.slot1,
            Slot::Two => self.slot2,
        }
    }

    fn status_mut(&mut self, slot: Slot) -> &mut AttendanceStatus {
        match slot {
            Slot::One => &mut self.slot1,
            Slot::Two => &mut self.slot2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttendanceMap(BTreeMap<MatchId, MatchAttendance>);

impl AttendanceMap {
    pub fn get(&self, match_id: &MatchId) -> MatchAttendance {
        self.0.get(match_id).copied().unwrap_or_default()
    }

    pub fn toggle(&mut self, match_id: &MatchId, slot: Slot) -> AttendanceStatus {
        let entry = self.0.entry(match_id.clone()).or_default();
        let status = entry.status_mut(slot);
        *status = status.next();
        *status
    }

    /// Keeps statuses attached to the fencers when their slots are exchanged.
    pub fn swap(&mut self, match_id: &MatchId) -> bool {
        match self.0.get_mut(match_id) {
            Some(entry) => {
                std::mem::swap(&mut entry.slot1, &mut entry.slot2);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
#[path = "tests/windower_tests.rs"]
mod tests;
