use std::{collections::BTreeMap, fmt};

use chrono::{Duration, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

const CALL_LEAD_MINUTES: i64 = 3;

/// Advisory start times, `round -> group -> "HH:MM"`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schedule(BTreeMap<usize, BTreeMap<usize, String>>);

impl Schedule {
    pub fn time_for(&self, round: usize, group: usize) -> Option<&str> {
        self.0.get(&round)?.get(&group).map(String::as_str)
    }

    /// Stores a start time; an empty value removes the entry.
    pub fn set_time(&mut self, round: usize, group: usize, time: impl Into<String>) -> bool {
        let time = time.into();
        let time = time.trim();
        if time.is_empty() {
            let Some(groups) = self.0.get_mut(&round) else {
                return false;
            };
            let removed = groups.remove(&group).is_some();
            if groups.is_empty() {
                self.0.remove(&round);
            }
            return removed;
        }
        let previous = self
            .0
            .entry(round)
            .or_default()
            .insert(group, time.to_string());
        previous.as_deref() != Some(time)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownPhase {
    Before,
    AtCall,
    After,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    pub phase: CountdownPhase,
    pub minutes: i64,
    pub seconds: i64,
}

impl fmt::Display for Countdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.phase {
            CountdownPhase::Before => "-",
            CountdownPhase::AtCall => "",
            CountdownPhase::After => "+",
        };
        write!(f, "{prefix}{:02}:{:02}", self.minutes, self.seconds)
    }
}

/// Time left until the call moment (start minus three minutes) of a group
/// starting at `start` ("HH:MM") on the day of `now`.
pub fn countdown(start: &str, now: NaiveDateTime) -> Option<Countdown> {
    let start = NaiveTime::parse_from_str(start.trim(), "%H:%M").ok()?;
    let target = now.date().and_time(start) - Duration::minutes(CALL_LEAD_MINUTES);
    let diff_ms = (target - now).num_milliseconds();
    let phase = match diff_ms {
        d if d > 0 => CountdownPhase::Before,
        0 => CountdownPhase::AtCall,
        _ => CountdownPhase::After,
    };
    let abs_ms = diff_ms.abs();
    Some(Countdown {
        phase,
        minutes: abs_ms / 60_000,
        seconds: (abs_ms % 60_000) / 1_000,
    })
}

#[cfg(test)]
#[path = "tests/schedule_tests.rs"]
mod tests;
