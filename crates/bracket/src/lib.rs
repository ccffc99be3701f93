use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use shared::{
    domain::EventId,
    protocol::{DocumentKind, RemoteChange},
};
use thiserror::Error;
use tokio::sync::broadcast;

mod generator;
pub mod lanes;
mod machine;
pub mod roster;
pub mod schedule;
pub mod state;
pub mod windower;

pub use generator::round_label;
pub use lanes::{Lane, LaneRegistry, LaneSettings};
pub use roster::RosterIndex;
pub use schedule::{countdown, Countdown, Schedule};
pub use state::{BracketState, ConsolationRound, LaneAssignment, Match, MatchRef};
pub use windower::{
    compute_groups, group_count, AttendanceMap, CallGroup, CallroomCursor, GroupEntry,
    MatchAttendance, Windowing,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BracketError {
    #[error("round {round} does not exist (bracket has {available} rounds)")]
    RoundOutOfRange { round: usize, available: usize },
    #[error("match {index} does not exist in round {round} ({available} matches)")]
    MatchOutOfRange {
        round: usize,
        index: usize,
        available: usize,
    },
    #[error("placement round {round} does not exist ({available} placement rounds)")]
    PlacementRoundOutOfRange { round: usize, available: usize },
    #[error("match {index} does not exist in placement round {round} ({available} matches)")]
    PlacementMatchOutOfRange {
        round: usize,
        index: usize,
        available: usize,
    },
    #[error("lane {lane} does not exist ({available} lanes configured)")]
    LaneOutOfRange { lane: usize, available: usize },
    #[error("unsupported lane count {0}; expected 4 or 5")]
    UnsupportedLaneCount(usize),
    #[error("lane settings need exactly {expected} entries, got {actual}")]
    LaneSettingsLength { expected: usize, actual: usize },
    #[error("cannot build a bracket for {0} participants")]
    UnsupportedParticipantCount(usize),
}

/// Outcome of an operation whose guard conditions may turn it into a no-op.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    Applied,
    Unchanged,
}

impl Mutation {
    pub fn is_applied(self) -> bool {
        matches!(self, Mutation::Applied)
    }

    pub fn from_changed(changed: bool) -> Self {
        if changed {
            Mutation::Applied
        } else {
            Mutation::Unchanged
        }
    }
}

/// Remote document store shared by every device attached to an event.
/// Saves replace the whole document; subscribers see every save.
#[async_trait]
pub trait SyncChannel: Send + Sync {
    async fn save_document(&self, event_id: &EventId, kind: DocumentKind, body: &str)
        -> Result<()>;
    async fn load_document(&self, event_id: &EventId, kind: DocumentKind)
        -> Result<Option<String>>;
    async fn delete_event(&self, event_id: &EventId) -> Result<()>;
    fn subscribe(&self) -> broadcast::Receiver<RemoteChange>;
}

#[async_trait]
pub trait SyncChannelExt: SyncChannel {
    async fn save_bracket(&self, event_id: &EventId, state: &BracketState) -> Result<()> {
        self.save_document(event_id, DocumentKind::Bracket, &encode(state)?)
            .await
    }

    async fn load_bracket(&self, event_id: &EventId) -> Result<Option<BracketState>> {
        decode(self.load_document(event_id, DocumentKind::Bracket).await?)
    }

    async fn save_attendance(&self, event_id: &EventId, attendance: &AttendanceMap) -> Result<()> {
        self.save_document(event_id, DocumentKind::Attendance, &encode(attendance)?)
            .await
    }

    async fn load_attendance(&self, event_id: &EventId) -> Result<Option<AttendanceMap>> {
        decode(self.load_document(event_id, DocumentKind::Attendance).await?)
    }

    async fn save_lane_settings(&self, event_id: &EventId, settings: &LaneSettings) -> Result<()> {
        self.save_document(event_id, DocumentKind::LaneSettings, &encode(settings)?)
            .await
    }

    async fn load_lane_settings(&self, event_id: &EventId) -> Result<Option<LaneSettings>> {
        decode(self.load_document(event_id, DocumentKind::LaneSettings).await?)
    }

    async fn save_schedule(&self, event_id: &EventId, schedule: &Schedule) -> Result<()> {
        self.save_document(event_id, DocumentKind::Schedule, &encode(schedule)?)
            .await
    }

    async fn load_schedule(&self, event_id: &EventId) -> Result<Option<Schedule>> {
        decode(self.load_document(event_id, DocumentKind::Schedule).await?)
    }

    async fn save_cursor(&self, event_id: &EventId, cursor: &CallroomCursor) -> Result<()> {
        self.save_document(event_id, DocumentKind::Cursor, &encode(cursor)?)
            .await
    }

    async fn load_cursor(&self, event_id: &EventId) -> Result<Option<CallroomCursor>> {
        decode(self.load_document(event_id, DocumentKind::Cursor).await?)
    }
}

impl<T: SyncChannel + ?Sized> SyncChannelExt for T {}

fn encode<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).context("failed to encode sync document")
}

fn decode<T: DeserializeOwned>(body: Option<String>) -> Result<Option<T>> {
    body.map(|body| serde_json::from_str(&body).context("malformed sync document"))
        .transpose()
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
