use std::{sync::Arc, time::Duration};

use bracket::{RosterIndex, SyncChannelExt};
use callroom_core::{config::Settings, CallroomClient, CallroomEvent, ChangeOrigin};
use shared::domain::{AttendanceStatus, EventId, Fencer, FencerId, Mode, Slot};
use storage::Storage;
use tokio::time::timeout;

fn team_roster() -> (RosterIndex, Vec<FencerId>) {
    let teams: Vec<Fencer> = (1..=16)
        .map(|rank| Fencer::new(format!("team-{rank}"), "Team", format!("Club {rank}"), "SUI"))
        .collect();
    let ids = teams.iter().map(|team| team.id.clone()).collect();
    (RosterIndex::from_records(teams), ids)
}

#[tokio::test]
async fn team_event_survives_reopening_from_sqlite() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("callroom.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));
    let event_id = EventId::new("team-cup");

    {
        let storage = Storage::new(&database_url).await.expect("db");
        let client = CallroomClient::new(Arc::new(storage), Settings::default()).expect("client");
        let (roster, ids) = team_roster();
        client
            .create_bracket(&event_id, Mode::Team, 16, &roster, &ids)
            .await
            .expect("bracket");
        for index in 0..8 {
            let _ = client
                .select_winner(&event_id, 0, index, Slot::One)
                .await
                .expect("first round");
        }
        let _ = client
            .select_winner(&event_id, 1, 0, Slot::Two)
            .await
            .expect("quarterfinal");
        let _ = client
            .toggle_attendance(&event_id, 0, Slot::One)
            .await
            .expect("attendance");
        let _ = client.set_schedule_time(&event_id, 1, 0, "13:20").await;
    }

    let storage = Storage::new(&database_url).await.expect("reopen db");
    let events = storage.list_events().await.expect("list");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_id, event_id);

    let reader = CallroomClient::new(Arc::new(storage.clone()), Settings::default())
        .expect("client");
    reader.open_event(&event_id).await;
    assert!(reader.wait_for_initial_bracket(&event_id).await);

    let state = reader.bracket(&event_id).await.expect("bracket");
    let placement = &state.consolation_rounds[0].matches[0];
    assert_eq!(
        placement.slot1.as_ref().map(|team| team.id.as_str()),
        Some("team-1")
    );
    assert_eq!(
        reader.schedule(&event_id).await.time_for(1, 0),
        Some("13:20")
    );
    let attendance = storage
        .load_attendance(&event_id)
        .await
        .expect("load")
        .expect("attendance stored");
    assert_eq!(
        attendance
            .get(&shared::domain::MatchId::new("round-0-match-0"))
            .slot1,
        AttendanceStatus::Present
    );
}

#[tokio::test]
async fn second_device_follows_changes_through_storage() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let event_id = EventId::new("club-night");
    let writer = CallroomClient::new(Arc::new(storage.clone()), Settings::default())
        .expect("writer");
    let (roster, ids) = team_roster();
    writer
        .create_bracket(&event_id, Mode::Individual, 16, &roster, &ids)
        .await
        .expect("bracket");

    let reader = CallroomClient::new(Arc::new(storage), Settings::default()).expect("reader");
    reader.open_event(&event_id).await;
    let mut events = reader.subscribe_events();
    let listener = reader.spawn_remote_listener();

    assert!(writer
        .select_winner(&event_id, 0, 2, Slot::Two)
        .await
        .expect("select")
        .is_applied());

    timeout(Duration::from_secs(2), async {
        loop {
            if let Ok(CallroomEvent::BracketChanged {
                origin: ChangeOrigin::Remote,
                ..
            }) = events.recv().await
            {
                break;
            }
        }
    })
    .await
    .expect("remote bracket change");

    let state = reader.bracket(&event_id).await.expect("bracket");
    assert_eq!(
        state.rounds[1][1].slot1.as_ref().map(|team| team.id.as_str()),
        Some("team-14")
    );
    listener.abort();
}
