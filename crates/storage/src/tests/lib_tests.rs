use super::*;
use shared::protocol::RemotePayload;

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("nested").join("callroom.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );
}

#[tokio::test]
async fn saving_a_document_replaces_the_previous_body() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let event_id = EventId::new("club-cup");

    storage
        .save_document(&event_id, DocumentKind::Schedule, r#"{"0":{"0":"09:00"}}"#)
        .await
        .expect("first save");
    storage
        .save_document(&event_id, DocumentKind::Schedule, r#"{"0":{"0":"09:30"}}"#)
        .await
        .expect("second save");

    let body = storage
        .load_document(&event_id, DocumentKind::Schedule)
        .await
        .expect("load");
    assert_eq!(body.as_deref(), Some(r#"{"0":{"0":"09:30"}}"#));
    assert_eq!(
        storage
            .load_document(&event_id, DocumentKind::Bracket)
            .await
            .expect("load"),
        None
    );
}

#[tokio::test]
async fn subscribers_see_saves_and_deletes() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let event_id = EventId::new("club-cup");
    let mut changes = storage.subscribe();

    storage
        .save_document(&event_id, DocumentKind::Cursor, "{}")
        .await
        .expect("save");
    let change = changes.recv().await.expect("save change");
    assert_eq!(change.event_id, event_id);
    assert!(matches!(
        change.payload,
        RemotePayload::Document {
            kind: DocumentKind::Cursor,
            ..
        }
    ));

    storage.delete_event(&event_id).await.expect("delete");
    let change = changes.recv().await.expect("delete change");
    assert!(matches!(change.payload, RemotePayload::EventCleared));
}

#[tokio::test]
async fn deleting_an_event_leaves_other_events_alone() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let spring = EventId::new("spring");
    let autumn = EventId::new("autumn");
    for event_id in [&spring, &autumn] {
        storage
            .save_document(event_id, DocumentKind::Attendance, "{}")
            .await
            .expect("save");
    }

    storage.delete_event(&spring).await.expect("delete");
    let events = storage.list_events().await.expect("list");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_id, autumn);
    assert_eq!(events[0].documents, vec![DocumentKind::Attendance]);
}

#[tokio::test]
async fn list_events_groups_documents_per_event() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let event_id = EventId::new("club-cup");
    storage
        .save_document(&event_id, DocumentKind::Bracket, "{}")
        .await
        .expect("save bracket");
    storage
        .save_document(&event_id, DocumentKind::LaneSettings, "{}")
        .await
        .expect("save lanes");

    let events = storage.list_events().await.expect("list");
    assert_eq!(events.len(), 1);
    assert_eq!(
        events[0].documents,
        vec![DocumentKind::Bracket, DocumentKind::LaneSettings]
    );
}

#[test]
fn sqlite_path_ignores_memory_and_foreign_urls() {
    assert_eq!(sqlite_path("sqlite::memory:"), None);
    assert_eq!(sqlite_path("postgres://db"), None);
    assert_eq!(
        sqlite_path("sqlite://./data/callroom.db?mode=rwc"),
        Some(PathBuf::from("./data/callroom.db"))
    );
}
