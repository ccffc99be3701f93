use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    state::{LaneAssignment, Match},
    BracketError,
};

pub const SUPPORTED_LANE_COUNTS: [usize; 2] = [4, 5];
pub const DEFAULT_LANE_COLORS: [&str; 5] = ["#FF0000", "#0000FF", "#FFFF00", "#00FF00", "#FF00FF"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lane {
    pub name: String,
    pub color: String,
}

/// Persisted form of the lane names and colors of one event.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LaneSettings {
    pub names: Vec<String>,
    pub colors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaneRegistry {
    lanes: Vec<Lane>,
}

impl LaneRegistry {
    pub fn with_defaults(count: usize) -> Result<Self, BracketError> {
        if !SUPPORTED_LANE_COUNTS.contains(&count) {
            return Err(BracketError::UnsupportedLaneCount(count));
        }
        Ok(Self {
            lanes: (0..count)
                .map(|index| Lane {
                    name: default_name(index),
                    color: DEFAULT_LANE_COLORS[index].to_string(),
                })
                .collect(),
        })
    }

    /// Builds a registry from stored settings. A list that does not have
    /// exactly `count` entries is ignored in favour of the defaults.
    pub fn from_settings(settings: &LaneSettings, count: usize) -> Result<Self, BracketError> {
        let mut registry = Self::with_defaults(count)?;
        if settings.names.len() == count {
            for (lane, name) in registry.lanes.iter_mut().zip(&settings.names) {
                lane.name = name.clone();
            }
        } else if !settings.names.is_empty() {
            warn!(expected = count, actual = settings.names.len(), "ignoring stored lane names");
        }
        if settings.colors.len() == count {
            for (lane, color) in registry.lanes.iter_mut().zip(&settings.colors) {
                lane.color = color.clone();
            }
        } else if !settings.colors.is_empty() {
            warn!(expected = count, actual = settings.colors.len(), "ignoring stored lane colors");
        }
        Ok(registry)
    }

    /// Replaces names and colors; both lists must match the lane count.
    pub fn apply(&mut self, settings: &LaneSettings) -> Result<(), BracketError> {
        for list in [&settings.names, &settings.colors] {
            if list.len() != self.lanes.len() {
                return Err(BracketError::LaneSettingsLength {
                    expected: self.lanes.len(),
                    actual: list.len(),
                });
            }
        }
        for ((lane, name), color) in self
            .lanes
            .iter_mut()
            .zip(&settings.names)
            .zip(&settings.colors)
        {
            lane.name = name.clone();
            lane.color = color.clone();
        }
        Ok(())
    }

    pub fn to_settings(&self) -> LaneSettings {
        LaneSettings {
            names: self.lanes.iter().map(|lane| lane.name.clone()).collect(),
            colors: self.lanes.iter().map(|lane| lane.color.clone()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.lanes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }

    pub fn lanes(&self) -> &[Lane] {
        &self.lanes
    }

    pub fn get(&self, index: usize) -> Option<&Lane> {
        self.lanes.get(index)
    }

    pub fn check(&self, assignment: LaneAssignment) -> Result<(), BracketError> {
        match assignment {
            LaneAssignment::Manual { lane } if lane >= self.lanes.len() => {
                Err(BracketError::LaneOutOfRange {
                    lane,
                    available: self.lanes.len(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Lane index of a main-draw match at `index` in a round of `round_len`.
    pub fn lane_for_main(&self, bout: &Match, index: usize, round_len: usize) -> usize {
        self.resolve(bout.lane, || automatic_lane(index, round_len, self.lanes.len()))
    }

    pub fn lane_for_consolation(&self, bout: &Match, round: usize, index: usize) -> usize {
        self.resolve(bout.lane, || (round * 2 + index) % self.lanes.len().max(1))
    }

    fn resolve(&self, assignment: LaneAssignment, automatic: impl FnOnce() -> usize) -> usize {
        let last = self.lanes.len().saturating_sub(1);
        match assignment {
            LaneAssignment::Manual { lane } => lane.min(last),
            LaneAssignment::Automatic => automatic().min(last),
        }
    }
}

fn default_name(index: usize) -> String {
    format!("Lane {}", index + 1)
}

/// Splits a round into consecutive chunks of `ceil(round_len / lane_count)`
/// matches, one chunk per lane.
pub fn automatic_lane(index: usize, round_len: usize, lane_count: usize) -> usize {
    let lane_count = lane_count.max(1);
    let chunk = round_len.div_ceil(lane_count).max(1);
    (index / chunk).min(lane_count - 1)
}

#[cfg(test)]
#[path = "tests/lanes_tests.rs"]
mod tests;
