use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

id_newtype!(EventId);
id_newtype!(FencerId);
id_newtype!(MatchId);

impl EventId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

/// Display identity of a roster entry. Two fencers are the same person when
/// their ids match, regardless of the name fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fencer {
    pub id: FencerId,
    pub given_name: String,
    pub family_name: String,
    pub nation: String,
}

impl Fencer {
    pub fn new(
        id: impl Into<String>,
        given_name: impl Into<String>,
        family_name: impl Into<String>,
        nation: impl Into<String>,
    ) -> Self {
        Self {
            id: FencerId::new(id),
            given_name: given_name.into(),
            family_name: family_name.into(),
            nation: nation.into(),
        }
    }

    pub fn display(&self) -> String {
        format!("{} {} ({})", self.given_name, self.family_name, self.nation)
    }
}

impl PartialEq for Fencer {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Fencer {}

pub fn display_fencer(fencer: Option<&Fencer>) -> String {
    fencer.map(Fencer::display).unwrap_or_else(|| "—".to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Individual,
    Team,
}

impl Mode {
    pub fn participant_count(self) -> usize {
        match self {
            Mode::Individual => 64,
            Mode::Team => 16,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Individual => "individual",
            Mode::Team => "team",
        }
    }
}

impl FromStr for Mode {
    type Err = ParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "individual" | "einzel" => Ok(Mode::Individual),
            "team" => Ok(Mode::Team),
            _ => Err(ParseError::new("mode", value)),
        }
    }
}

/// One side of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    One,
    Two,
}

impl Slot {
    pub fn other(self) -> Self {
        match self {
            Slot::One => Slot::Two,
            Slot::Two => Slot::One,
        }
    }

    pub fn from_number(number: u8) -> Option<Self> {
        match number {
            1 => Some(Slot::One),
            2 => Some(Slot::Two),
            _ => None,
        }
    }

    pub fn number(self) -> u8 {
        match self {
            Slot::One => 1,
            Slot::Two => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    #[default]
    Absent,
    Present,
    Checked,
}

impl AttendanceStatus {
    pub fn next(self) -> Self {
        match self {
            AttendanceStatus::Absent => AttendanceStatus::Present,
            AttendanceStatus::Present => AttendanceStatus::Checked,
            AttendanceStatus::Checked => AttendanceStatus::Absent,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Present => "present",
            AttendanceStatus::Checked => "checked",
        }
    }
}

#[cfg(test)]
#[path = "tests/domain_tests.rs"]
mod tests;
