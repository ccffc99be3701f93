use std::{collections::HashMap, sync::Arc};

use anyhow::{Context, Result};
use bracket::{
    compute_groups, group_count, round_label, AttendanceMap, BracketError, BracketState,
    CallroomCursor, Lane, LaneAssignment, LaneRegistry, LaneSettings, MatchAttendance, MatchRef,
    Mutation, RosterIndex, Schedule, SyncChannel, SyncChannelExt,
};
use serde::de::DeserializeOwned;
use shared::{
    domain::{AttendanceStatus, EventId, Fencer, FencerId, MatchId, Mode, Slot},
    error::{ApiError, ErrorCode},
    protocol::{DocumentKind, RemoteChange, RemotePayload},
};
use tokio::{
    sync::{broadcast, broadcast::error::RecvError, Mutex},
    task::JoinHandle,
    time::{sleep, Instant},
};
use tracing::{debug, info, warn};

pub mod config;

use config::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    Local,
    Remote,
}

#[derive(Debug, Clone)]
pub enum CallroomEvent {
    BracketChanged {
        event_id: EventId,
        origin: ChangeOrigin,
    },
    AttendanceChanged {
        event_id: EventId,
        origin: ChangeOrigin,
    },
    LaneSettingsChanged {
        event_id: EventId,
        origin: ChangeOrigin,
    },
    ScheduleChanged {
        event_id: EventId,
        origin: ChangeOrigin,
    },
    CursorChanged {
        event_id: EventId,
        origin: ChangeOrigin,
    },
    EventReset {
        event_id: EventId,
        origin: ChangeOrigin,
    },
    SyncFailed {
        event_id: EventId,
        error: ApiError,
    },
}

/// One lane position of the call group the operator is looking at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSlotView {
    pub lane: usize,
    pub assigned_lane: Lane,
    pub match_index: usize,
    pub match_id: MatchId,
    pub slot1: Option<Fencer>,
    pub slot2: Option<Fencer>,
    pub winner: Option<Fencer>,
    pub attendance: MatchAttendance,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallGroupView {
    pub round: usize,
    pub round_label: String,
    pub group: usize,
    pub group_count: usize,
    pub start_time: Option<String>,
    pub sides_confirmed: bool,
    pub fully_arranged: bool,
    pub entries: Vec<Option<GroupSlotView>>,
}

pub fn new_event_id() -> EventId {
    EventId::generate()
}

struct EventSession {
    bracket: Option<BracketState>,
    attendance: AttendanceMap,
    lanes: LaneRegistry,
    schedule: Schedule,
    cursor: CallroomCursor,
}

impl EventSession {
    fn new(lanes: LaneRegistry) -> Self {
        Self {
            bracket: None,
            attendance: AttendanceMap::default(),
            lanes,
            schedule: Schedule::default(),
            cursor: CallroomCursor::default(),
        }
    }

    fn is_blank(&self) -> bool {
        self.bracket.is_none()
            && self.attendance.is_empty()
            && self.schedule.is_empty()
            && self.cursor == CallroomCursor::default()
    }

    fn groups_in_round(&self, round: usize) -> usize {
        let round_len = self
            .bracket
            .as_ref()
            .and_then(|state| state.rounds.get(round))
            .map_or(0, Vec::len);
        group_count(round_len, self.lanes.len())
    }

    fn clamp_cursor(&mut self) {
        let total_rounds = self.bracket.as_ref().map_or(1, |state| state.rounds.len());
        let mut cursor = self.cursor;
        cursor.clamp(total_rounds, |round| self.groups_in_round(round));
        self.cursor = cursor;
    }
}

/// Per-event call-room state. Every accepted local mutation is pushed to the
/// sync channel; remote snapshots replace the matching document wholesale.
pub struct CallroomClient {
    sync: Arc<dyn SyncChannel>,
    settings: Settings,
    default_lanes: LaneRegistry,
    inner: Mutex<HashMap<EventId, EventSession>>,
    events: broadcast::Sender<CallroomEvent>,
}

impl CallroomClient {
    pub fn new(sync: Arc<dyn SyncChannel>, settings: Settings) -> Result<Arc<Self>> {
        let default_lanes = LaneRegistry::with_defaults(settings.lane_count)
            .context("invalid lane configuration")?;
        let (events, _) = broadcast::channel(1024);
        Ok(Arc::new(Self {
            sync,
            settings,
            default_lanes,
            inner: Mutex::new(HashMap::new()),
            events,
        }))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<CallroomEvent> {
        self.events.subscribe()
    }

    /// Attaches to an event and pulls every stored document for it.
    pub async fn open_event(&self, event_id: &EventId) {
        {
            let mut guard = self.inner.lock().await;
            guard
                .entry(event_id.clone())
                .or_insert_with(|| EventSession::new(self.default_lanes.clone()));
        }

        for kind in DocumentKind::ALL {
            match self.sync.load_document(event_id, kind).await {
                Ok(Some(body)) => {
                    self.apply_document(event_id, kind, &body).await;
                }
                Ok(None) => {}
                Err(err) => self.sync_failed(event_id, ErrorCode::Transport, &err),
            }
        }
        info!(%event_id, "event opened");
    }

    pub async fn close_event(&self, event_id: &EventId) -> bool {
        self.inner.lock().await.remove(event_id).is_some()
    }

    pub async fn open_events(&self) -> Vec<EventId> {
        let mut ids: Vec<EventId> = self.inner.lock().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn bracket(&self, event_id: &EventId) -> Option<BracketState> {
        let guard = self.inner.lock().await;
        guard.get(event_id)?.bracket.clone()
    }

    pub async fn attendance(&self, event_id: &EventId) -> AttendanceMap {
        let guard = self.inner.lock().await;
        guard
            .get(event_id)
            .map(|session| session.attendance.clone())
            .unwrap_or_default()
    }

    pub async fn lanes(&self, event_id: &EventId) -> LaneRegistry {
        let guard = self.inner.lock().await;
        guard
            .get(event_id)
            .map_or_else(|| self.default_lanes.clone(), |session| session.lanes.clone())
    }

    pub async fn schedule(&self, event_id: &EventId) -> Schedule {
        let guard = self.inner.lock().await;
        guard
            .get(event_id)
            .map(|session| session.schedule.clone())
            .unwrap_or_default()
    }

    pub async fn cursor(&self, event_id: &EventId) -> CallroomCursor {
        let guard = self.inner.lock().await;
        guard
            .get(event_id)
            .map(|session| session.cursor)
            .unwrap_or_default()
    }

    /// Builds a fresh bracket, seats the seeded list and drops attendance and
    /// cursor state tied to the previous one. Returns the number of seated
    /// fencers.
    pub async fn create_bracket(
        &self,
        event_id: &EventId,
        mode: Mode,
        participant_count: usize,
        roster: &RosterIndex,
        seeded_ids: &[FencerId],
    ) -> Result<usize, BracketError> {
        let mut state = BracketState::generate(participant_count, mode)?;
        let seated = state.populate_first_round(roster, seeded_ids);

        let (attendance, cursor) = {
            let mut guard = self.inner.lock().await;
            let session = guard
                .entry(event_id.clone())
                .or_insert_with(|| EventSession::new(self.default_lanes.clone()));
            session.bracket = Some(state.clone());
            session.attendance = AttendanceMap::default();
            session.cursor = CallroomCursor::default();
            (session.attendance.clone(), session.cursor)
        };

        info!(%event_id, participant_count, seated, mode = mode.as_str(), "bracket created");
        self.push_bracket(event_id, &state).await;
        self.push_attendance(event_id, &attendance).await;
        self.push_cursor(event_id, &cursor).await;
        self.emit(CallroomEvent::BracketChanged {
            event_id: event_id.clone(),
            origin: ChangeOrigin::Local,
        });
        self.emit(CallroomEvent::AttendanceChanged {
            event_id: event_id.clone(),
            origin: ChangeOrigin::Local,
        });
        self.emit(CallroomEvent::CursorChanged {
            event_id: event_id.clone(),
            origin: ChangeOrigin::Local,
        });
        Ok(seated)
    }

    pub async fn select_winner(
        &self,
        event_id: &EventId,
        round: usize,
        index: usize,
        slot: Slot,
    ) -> Result<Mutation, BracketError> {
        self.mutate_bracket(event_id, |state, _| state.select_winner(round, index, slot))
            .await
    }

    pub async fn clear_winner(
        &self,
        event_id: &EventId,
        round: usize,
        index: usize,
    ) -> Result<Mutation, BracketError> {
        self.mutate_bracket(event_id, |state, _| state.clear_winner(round, index))
            .await
    }

    pub async fn select_consolation_winner(
        &self,
        event_id: &EventId,
        round: usize,
        index: usize,
        slot: Slot,
    ) -> Result<Mutation, BracketError> {
        self.mutate_bracket(event_id, |state, _| {
            state.select_consolation_winner(round, index, slot)
        })
        .await
    }

    pub async fn clear_consolation_winner(
        &self,
        event_id: &EventId,
        round: usize,
        index: usize,
    ) -> Result<Mutation, BracketError> {
        self.mutate_bracket(event_id, |state, _| {
            state.clear_consolation_winner(round, index)
        })
        .await
    }

    pub async fn set_lane_override(
        &self,
        event_id: &EventId,
        target: MatchRef,
        lane: LaneAssignment,
    ) -> Result<Mutation, BracketError> {
        self.mutate_bracket(event_id, |state, lanes| {
            lanes.check(lane)?;
            state.set_lane_override(target, lane)
        })
        .await
    }

    /// Resolved lane of a match: the manual override if set, else the
    /// automatic assignment.
    pub async fn lane_for(
        &self,
        event_id: &EventId,
        target: MatchRef,
    ) -> Result<Option<Lane>, BracketError> {
        let guard = self.inner.lock().await;
        let Some(session) = guard.get(event_id) else {
            return Ok(None);
        };
        let Some(state) = session.bracket.as_ref() else {
            return Ok(None);
        };
        let bout = state.match_at(target)?;
        let lane = match target {
            MatchRef::Main { round, index } => {
                session.lanes.lane_for_main(bout, index, state.rounds[round].len())
            }
            MatchRef::Consolation { round, index } => {
                session.lanes.lane_for_consolation(bout, round, index)
            }
        };
        Ok(session.lanes.get(lane).cloned())
    }

    /// Exchanges both slots of a main-draw match together with their
    /// attendance entries. Refused while either call-room lock is set.
    pub async fn swap_sides(
        &self,
        event_id: &EventId,
        round: usize,
        index: usize,
    ) -> Result<Mutation, BracketError> {
        let (state, attendance) = {
            let mut guard = self.inner.lock().await;
            let Some(session) = guard.get_mut(event_id) else {
                return Ok(Mutation::Unchanged);
            };
            if session.cursor.swap_locked() {
                debug!(%event_id, round, index, "swap refused while call room is locked");
                return Ok(Mutation::Unchanged);
            }
            let Some(state) = session.bracket.as_mut() else {
                return Ok(Mutation::Unchanged);
            };
            if !state.swap_sides(round, index)?.is_applied() {
                return Ok(Mutation::Unchanged);
            }
            let match_id = state.rounds[round][index].id.clone();
            let attendance = session
                .attendance
                .swap(&match_id)
                .then(|| session.attendance.clone());
            (state.clone(), attendance)
        };

        self.push_bracket(event_id, &state).await;
        self.emit(CallroomEvent::BracketChanged {
            event_id: event_id.clone(),
            origin: ChangeOrigin::Local,
        });
        if let Some(attendance) = attendance {
            self.push_attendance(event_id, &attendance).await;
            self.emit(CallroomEvent::AttendanceChanged {
                event_id: event_id.clone(),
                origin: ChangeOrigin::Local,
            });
        }
        Ok(Mutation::Applied)
    }

    /// Cycles the attendance of one side of a match in the call-room round.
    pub async fn toggle_attendance(
        &self,
        event_id: &EventId,
        match_index: usize,
        slot: Slot,
    ) -> Result<Option<AttendanceStatus>, BracketError> {
        let (status, attendance) = {
            let mut guard = self.inner.lock().await;
            let Some(session) = guard.get_mut(event_id) else {
                return Ok(None);
            };
            let Some(state) = session.bracket.as_ref() else {
                return Ok(None);
            };
            let round = session.cursor.round;
            let match_id = state.match_at(MatchRef::Main {
                round,
                index: match_index,
            })?
            .id
            .clone();
            let status = session.attendance.toggle(&match_id, slot);
            (status, session.attendance.clone())
        };

        debug!(%event_id, match_index, slot = slot.number(), status = status.as_str(), "attendance toggled");
        self.push_attendance(event_id, &attendance).await;
        self.emit(CallroomEvent::AttendanceChanged {
            event_id: event_id.clone(),
            origin: ChangeOrigin::Local,
        });
        Ok(Some(status))
    }

    pub async fn set_callroom_round(&self, event_id: &EventId, round: usize) -> Mutation {
        self.mutate_cursor(event_id, |session| {
            let total_rounds = session.bracket.as_ref()?.rounds.len();
            Some(session.cursor.set_round(round, total_rounds))
        })
        .await
    }

    pub async fn prev_group(&self, event_id: &EventId) -> Mutation {
        self.mutate_cursor(event_id, |session| {
            session.bracket.as_ref()?;
            Some(session.cursor.prev())
        })
        .await
    }

    pub async fn next_group(&self, event_id: &EventId) -> Mutation {
        self.mutate_cursor(event_id, |session| {
            session.bracket.as_ref()?;
            let groups = session.groups_in_round(session.cursor.round);
            Some(session.cursor.next(groups))
        })
        .await
    }

    pub async fn toggle_sides_confirmed(&self, event_id: &EventId) -> Mutation {
        self.mutate_cursor(event_id, |session| {
            session.bracket.as_ref()?;
            Some(session.cursor.toggle_sides_confirmed())
        })
        .await
    }

    pub async fn toggle_fully_arranged(&self, event_id: &EventId) -> Mutation {
        self.mutate_cursor(event_id, |session| {
            session.bracket.as_ref()?;
            session.cursor.toggle_fully_arranged();
            Some(true)
        })
        .await
    }

    pub async fn set_schedule_time(
        &self,
        event_id: &EventId,
        round: usize,
        group: usize,
        time: &str,
    ) -> Mutation {
        let schedule = {
            let mut guard = self.inner.lock().await;
            let session = guard
                .entry(event_id.clone())
                .or_insert_with(|| EventSession::new(self.default_lanes.clone()));
            if !session.schedule.set_time(round, group, time) {
                return Mutation::Unchanged;
            }
            session.schedule.clone()
        };

        if let Err(err) = self.sync.save_schedule(event_id, &schedule).await {
            self.sync_failed(event_id, ErrorCode::Transport, &err);
        }
        self.emit(CallroomEvent::ScheduleChanged {
            event_id: event_id.clone(),
            origin: ChangeOrigin::Local,
        });
        Mutation::Applied
    }

    pub async fn set_lane_settings(
        &self,
        event_id: &EventId,
        settings: &LaneSettings,
    ) -> Result<Mutation, BracketError> {
        let stored = {
            let mut guard = self.inner.lock().await;
            let session = guard
                .entry(event_id.clone())
                .or_insert_with(|| EventSession::new(self.default_lanes.clone()));
            let before = session.lanes.to_settings();
            session.lanes.apply(settings)?;
            let after = session.lanes.to_settings();
            if before == after {
                return Ok(Mutation::Unchanged);
            }
            after
        };

        if let Err(err) = self.sync.save_lane_settings(event_id, &stored).await {
            self.sync_failed(event_id, ErrorCode::Transport, &err);
        }
        self.emit(CallroomEvent::LaneSettingsChanged {
            event_id: event_id.clone(),
            origin: ChangeOrigin::Local,
        });
        Ok(Mutation::Applied)
    }

    /// Owned snapshot of the call group under the cursor.
    pub async fn current_groups(&self, event_id: &EventId) -> Option<CallGroupView> {
        let guard = self.inner.lock().await;
        let session = guard.get(event_id)?;
        let state = session.bracket.as_ref()?;
        let cursor = session.cursor;
        let round = state.rounds.get(cursor.round)?;

        let groups = compute_groups(round, session.lanes.len(), self.settings.windowing);
        let group_count = groups.len();
        let group = groups.into_iter().nth(cursor.group)?;
        let entries = group
            .into_iter()
            .map(|entry| {
                let entry = entry?;
                let assigned = session
                    .lanes
                    .lane_for_main(entry.bout, entry.match_index, round.len());
                Some(GroupSlotView {
                    lane: entry.lane,
                    assigned_lane: session.lanes.get(assigned)?.clone(),
                    match_index: entry.match_index,
                    match_id: entry.bout.id.clone(),
                    slot1: entry.bout.slot1.clone(),
                    slot2: entry.bout.slot2.clone(),
                    winner: entry.bout.winner.clone(),
                    attendance: session.attendance.get(&entry.bout.id),
                })
            })
            .collect();

        Some(CallGroupView {
            round: cursor.round,
            round_label: round_label(state.total_rounds, cursor.round),
            group: cursor.group,
            group_count,
            start_time: session
                .schedule
                .time_for(cursor.round, cursor.group)
                .map(str::to_string),
            sides_confirmed: cursor.sides_confirmed,
            fully_arranged: cursor.fully_arranged,
            entries,
        })
    }

    /// Discards bracket, attendance, schedule and cursor of an event, locally
    /// and in the sync channel. Lane settings survive.
    pub async fn reset_event(&self, event_id: &EventId) {
        let lanes = {
            let mut guard = self.inner.lock().await;
            let lanes = guard
                .get(event_id)
                .map_or_else(|| self.default_lanes.clone(), |session| session.lanes.clone());
            guard.insert(event_id.clone(), EventSession::new(lanes.clone()));
            lanes
        };

        info!(%event_id, "event reset");
        if let Err(err) = self.sync.delete_event(event_id).await {
            self.sync_failed(event_id, ErrorCode::Transport, &err);
        }
        if lanes != self.default_lanes {
            if let Err(err) = self.sync.save_lane_settings(event_id, &lanes.to_settings()).await {
                self.sync_failed(event_id, ErrorCode::Transport, &err);
            }
        }
        self.emit(CallroomEvent::EventReset {
            event_id: event_id.clone(),
            origin: ChangeOrigin::Local,
        });
    }

    /// Applies a change observed on the sync channel. Changes for events
    /// that are not open are ignored.
    pub async fn apply_remote_change(&self, change: RemoteChange) {
        let RemoteChange {
            event_id, payload, ..
        } = change;
        match payload {
            RemotePayload::Document { kind, body } => {
                self.apply_document(&event_id, kind, &body).await;
            }
            RemotePayload::EventCleared => {
                let cleared = {
                    let mut guard = self.inner.lock().await;
                    match guard.get_mut(&event_id) {
                        Some(session) if !session.is_blank() => {
                            let lanes = session.lanes.clone();
                            *session = EventSession::new(lanes);
                            true
                        }
                        _ => false,
                    }
                };
                if cleared {
                    info!(%event_id, "event cleared remotely");
                    self.emit(CallroomEvent::EventReset {
                        event_id,
                        origin: ChangeOrigin::Remote,
                    });
                }
            }
        }
    }

    pub fn spawn_remote_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let mut changes = self.sync.subscribe();
        let client = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(change) => client.apply_remote_change(change).await,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "remote listener lagged, reloading open events");
                        for event_id in client.open_events().await {
                            client.open_event(&event_id).await;
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!("remote listener stopped");
        })
    }

    /// Polls until a bracket for the event is present or the configured
    /// timeout passes. Returns whether a bracket arrived.
    pub async fn wait_for_initial_bracket(&self, event_id: &EventId) -> bool {
        let deadline = Instant::now() + self.settings.initial_snapshot_timeout();
        loop {
            if self.bracket(event_id).await.is_some() {
                return true;
            }
            if Instant::now() >= deadline {
                info!(%event_id, "no bracket arrived before timeout");
                return false;
            }
            sleep(self.settings.initial_snapshot_poll()).await;
        }
    }

    async fn mutate_bracket<F>(&self, event_id: &EventId, op: F) -> Result<Mutation, BracketError>
    where
        F: FnOnce(&mut BracketState, &LaneRegistry) -> Result<Mutation, BracketError>,
    {
        let state = {
            let mut guard = self.inner.lock().await;
            let Some(session) = guard.get_mut(event_id) else {
                return Ok(Mutation::Unchanged);
            };
            let Some(state) = session.bracket.as_mut() else {
                return Ok(Mutation::Unchanged);
            };
            if !op(state, &session.lanes)?.is_applied() {
                return Ok(Mutation::Unchanged);
            }
            state.clone()
        };

        self.push_bracket(event_id, &state).await;
        self.emit(CallroomEvent::BracketChanged {
            event_id: event_id.clone(),
            origin: ChangeOrigin::Local,
        });
        Ok(Mutation::Applied)
    }

    async fn mutate_cursor<F>(&self, event_id: &EventId, op: F) -> Mutation
    where
        F: FnOnce(&mut EventSession) -> Option<bool>,
    {
        let cursor = {
            let mut guard = self.inner.lock().await;
            let Some(session) = guard.get_mut(event_id) else {
                return Mutation::Unchanged;
            };
            if op(session) != Some(true) {
                return Mutation::Unchanged;
            }
            session.cursor
        };

        self.push_cursor(event_id, &cursor).await;
        self.emit(CallroomEvent::CursorChanged {
            event_id: event_id.clone(),
            origin: ChangeOrigin::Local,
        });
        Mutation::Applied
    }

    /// Replaces one document of an open event from a serialized body.
    /// Returns whether local state changed.
    async fn apply_document(&self, event_id: &EventId, kind: DocumentKind, body: &str) -> bool {
        let event = match kind {
            DocumentKind::Bracket => {
                let Some(state) = self.decode::<BracketState>(event_id, kind, body) else {
                    return false;
                };
                if state.rounds.len() != state.total_rounds || state.rounds.is_empty() {
                    self.reject_snapshot(event_id, kind, "round count does not match total_rounds");
                    return false;
                }
                let applied = self
                    .with_open_session(event_id, |session| {
                        if session.bracket.as_ref() == Some(&state) {
                            return false;
                        }
                        session.bracket = Some(state);
                        session.clamp_cursor();
                        true
                    })
                    .await;
                applied.then(|| CallroomEvent::BracketChanged {
                    event_id: event_id.clone(),
                    origin: ChangeOrigin::Remote,
                })
            }
            DocumentKind::Attendance => {
                let Some(attendance) = self.decode::<AttendanceMap>(event_id, kind, body) else {
                    return false;
                };
                let applied = self
                    .with_open_session(event_id, |session| {
                        if session.attendance == attendance {
                            return false;
                        }
                        session.attendance = attendance;
                        true
                    })
                    .await;
                applied.then(|| CallroomEvent::AttendanceChanged {
                    event_id: event_id.clone(),
                    origin: ChangeOrigin::Remote,
                })
            }
            DocumentKind::LaneSettings => {
                let Some(stored) = self.decode::<LaneSettings>(event_id, kind, body) else {
                    return false;
                };
                let lanes = match LaneRegistry::from_settings(&stored, self.settings.lane_count) {
                    Ok(lanes) => lanes,
                    Err(err) => {
                        self.reject_snapshot(event_id, kind, &err.to_string());
                        return false;
                    }
                };
                let applied = self
                    .with_open_session(event_id, |session| {
                        if session.lanes == lanes {
                            return false;
                        }
                        session.lanes = lanes;
                        true
                    })
                    .await;
                applied.then(|| CallroomEvent::LaneSettingsChanged {
                    event_id: event_id.clone(),
                    origin: ChangeOrigin::Remote,
                })
            }
            DocumentKind::Schedule => {
                let Some(schedule) = self.decode::<Schedule>(event_id, kind, body) else {
                    return false;
                };
                let applied = self
                    .with_open_session(event_id, |session| {
                        if session.schedule == schedule {
                            return false;
                        }
                        session.schedule = schedule;
                        true
                    })
                    .await;
                applied.then(|| CallroomEvent::ScheduleChanged {
                    event_id: event_id.clone(),
                    origin: ChangeOrigin::Remote,
                })
            }
            DocumentKind::Cursor => {
                let Some(cursor) = self.decode::<CallroomCursor>(event_id, kind, body) else {
                    return false;
                };
                let applied = self
                    .with_open_session(event_id, |session| {
                        let before = session.cursor;
                        session.cursor = cursor;
                        session.clamp_cursor();
                        session.cursor != before
                    })
                    .await;
                applied.then(|| CallroomEvent::CursorChanged {
                    event_id: event_id.clone(),
                    origin: ChangeOrigin::Remote,
                })
            }
        };

        match event {
            Some(event) => {
                debug!(%event_id, kind = kind.as_str(), "remote document applied");
                self.emit(event);
                true
            }
            None => false,
        }
    }

    async fn with_open_session(
        &self,
        event_id: &EventId,
        apply: impl FnOnce(&mut EventSession) -> bool,
    ) -> bool {
        let mut guard = self.inner.lock().await;
        guard.get_mut(event_id).is_some_and(apply)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        event_id: &EventId,
        kind: DocumentKind,
        body: &str,
    ) -> Option<T> {
        match serde_json::from_str(body) {
            Ok(value) => Some(value),
            Err(err) => {
                self.reject_snapshot(event_id, kind, &err.to_string());
                None
            }
        }
    }

    fn reject_snapshot(&self, event_id: &EventId, kind: DocumentKind, reason: &str) {
        warn!(%event_id, kind = kind.as_str(), reason, "dropping malformed remote snapshot");
        self.emit(CallroomEvent::SyncFailed {
            event_id: event_id.clone(),
            error: ApiError::new(
                ErrorCode::Malformed,
                format!("malformed {} snapshot: {reason}", kind.as_str()),
            ),
        });
    }

    async fn push_bracket(&self, event_id: &EventId, state: &BracketState) {
        if let Err(err) = self.sync.save_bracket(event_id, state).await {
            self.sync_failed(event_id, ErrorCode::Transport, &err);
        }
    }

    async fn push_attendance(&self, event_id: &EventId, attendance: &AttendanceMap) {
        if let Err(err) = self.sync.save_attendance(event_id, attendance).await {
            self.sync_failed(event_id, ErrorCode::Transport, &err);
        }
    }

    async fn push_cursor(&self, event_id: &EventId, cursor: &CallroomCursor) {
        if let Err(err) = self.sync.save_cursor(event_id, cursor).await {
            self.sync_failed(event_id, ErrorCode::Transport, &err);
        }
    }

    fn sync_failed(&self, event_id: &EventId, code: ErrorCode, err: &anyhow::Error) {
        warn!(%event_id, error = %format!("{err:#}"), "sync channel call failed");
        self.emit(CallroomEvent::SyncFailed {
            event_id: event_id.clone(),
            error: ApiError::new(code, format!("{err:#}")),
        });
    }

    fn emit(&self, event: CallroomEvent) {
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
