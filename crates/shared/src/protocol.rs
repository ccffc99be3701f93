use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::EventId;

/// The independently synchronised documents of one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Bracket,
    Attendance,
    LaneSettings,
    Schedule,
    Cursor,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 5] = [
        DocumentKind::Bracket,
        DocumentKind::Attendance,
        DocumentKind::LaneSettings,
        DocumentKind::Schedule,
        DocumentKind::Cursor,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentKind::Bracket => "bracket",
            DocumentKind::Attendance => "attendance",
            DocumentKind::LaneSettings => "lane_settings",
            DocumentKind::Schedule => "schedule",
            DocumentKind::Cursor => "cursor",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum RemotePayload {
    /// A full replacement body for one document, JSON encoded.
    Document { kind: DocumentKind, body: String },
    EventCleared,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteChange {
    pub event_id: EventId,
    pub payload: RemotePayload,
    pub changed_at: DateTime<Utc>,
}

impl RemoteChange {
    pub fn document(event_id: EventId, kind: DocumentKind, body: impl Into<String>) -> Self {
        Self {
            event_id,
            payload: RemotePayload::Document {
                kind,
                body: body.into(),
            },
            changed_at: Utc::now(),
        }
    }

    pub fn cleared(event_id: EventId) -> Self {
        Self {
            event_id,
            payload: RemotePayload::EventCleared,
            changed_at: Utc::now(),
        }
    }
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
