use anyhow::{Context, Result};
use async_trait::async_trait;
use bracket::SyncChannel;
use chrono::{DateTime, Utc};
use shared::{
    domain::EventId,
    protocol::{DocumentKind, RemoteChange},
};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tokio::sync::broadcast;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
    changes: broadcast::Sender<RemoteChange>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEvent {
    pub event_id: EventId,
    pub documents: Vec<DocumentKind>,
    pub updated_at: DateTime<Utc>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        let (changes, _) = broadcast::channel(1024);
        Ok(Self { pool, changes })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn list_events(&self) -> Result<Vec<StoredEvent>> {
        let rows = sqlx::query(
            "SELECT event_id, kind, updated_at
             FROM event_documents
             ORDER BY event_id ASC, kind ASC",
        )
        .fetch_all(&self.pool)
        .await
        .context("failed to list events")?;

        let mut events: Vec<StoredEvent> = Vec::new();
        for row in rows {
            let event_id = EventId::new(row.get::<String, _>(0));
            let kind_name: String = row.get(1);
            let updated_at: DateTime<Utc> = row.try_get(2)?;
            let Some(kind) = DocumentKind::parse(&kind_name) else {
                warn!(%event_id, kind = %kind_name, "skipping unknown document kind");
                continue;
            };
            match events.last_mut() {
                Some(event) if event.event_id == event_id => {
                    event.documents.push(kind);
                    event.updated_at = event.updated_at.max(updated_at);
                }
                _ => events.push(StoredEvent {
                    event_id,
                    documents: vec![kind],
                    updated_at,
                }),
            }
        }
        Ok(events)
    }

    fn notify(&self, change: RemoteChange) {
        let _ = self.changes.send(change);
    }
}

#[async_trait]
impl SyncChannel for Storage {
    async fn save_document(
        &self,
        event_id: &EventId,
        kind: DocumentKind,
        body: &str,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO event_documents (event_id, kind, body, updated_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(event_id, kind) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
        )
        .bind(event_id.as_str())
        .bind(kind.as_str())
        .bind(body)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to save {} for event {event_id}", kind.as_str()))?;

        debug!(%event_id, kind = kind.as_str(), bytes = body.len(), "document saved");
        self.notify(RemoteChange::document(event_id.clone(), kind, body));
        Ok(())
    }

    async fn load_document(
        &self,
        event_id: &EventId,
        kind: DocumentKind,
    ) -> Result<Option<String>> {
        let row = sqlx::query("SELECT body FROM event_documents WHERE event_id = ? AND kind = ?")
            .bind(event_id.as_str())
            .bind(kind.as_str())
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("failed to load {} for event {event_id}", kind.as_str()))?;
        Ok(row.map(|r| r.get::<String, _>(0)))
    }

    async fn delete_event(&self, event_id: &EventId) -> Result<()> {
        let result = sqlx::query("DELETE FROM event_documents WHERE event_id = ?")
            .bind(event_id.as_str())
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to delete event {event_id}"))?;

        debug!(%event_id, removed = result.rows_affected(), "event deleted");
        self.notify(RemoteChange::cleared(event_id.clone()));
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<RemoteChange> {
        self.changes.subscribe()
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

pub fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
