use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use bracket::{lanes::SUPPORTED_LANE_COUNTS, Windowing};
use shared::domain::Mode;
use tracing::warn;

pub const SETTINGS_FILE: &str = "callroom.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub database_url: String,
    pub lane_count: usize,
    pub windowing: Windowing,
    pub default_mode: Mode,
    pub initial_snapshot_timeout_ms: u64,
    pub initial_snapshot_poll_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: "sqlite://./data/callroom.db".into(),
            lane_count: 4,
            windowing: Windowing::Interleaved,
            default_mode: Mode::Individual,
            initial_snapshot_timeout_ms: 3_000,
            initial_snapshot_poll_ms: 100,
        }
    }
}

impl Settings {
    pub fn initial_snapshot_timeout(&self) -> Duration {
        Duration::from_millis(self.initial_snapshot_timeout_ms)
    }

    pub fn initial_snapshot_poll(&self) -> Duration {
        Duration::from_millis(self.initial_snapshot_poll_ms.max(1))
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(SETTINGS_FILE) {
        apply_file(&mut settings, &raw);
    }
    apply_env(&mut settings, |key| std::env::var(key).ok());

    settings
}

fn apply_file(settings: &mut Settings, raw: &str) {
    let table = match toml::from_str::<toml::Table>(raw) {
        Ok(table) => table,
        Err(err) => {
            warn!(file = SETTINGS_FILE, error = %err, "ignoring unreadable settings file");
            return;
        }
    };

    let text = |key: &str| -> Option<String> {
        match table.get(key)? {
            toml::Value::String(value) => Some(value.clone()),
            toml::Value::Integer(value) => Some(value.to_string()),
            other => Some(other.to_string()),
        }
    };

    if let Some(v) = text("database_url") {
        settings.database_url = v;
    }
    if let Some(v) = text("lane_count") {
        set_lane_count(settings, &v);
    }
    if let Some(v) = text("windowing") {
        set_parsed(&mut settings.windowing, "windowing", &v);
    }
    if let Some(v) = text("default_mode") {
        set_parsed(&mut settings.default_mode, "default_mode", &v);
    }
    if let Some(v) = text("initial_snapshot_timeout_ms") {
        set_parsed(&mut settings.initial_snapshot_timeout_ms, "initial_snapshot_timeout_ms", &v);
    }
    if let Some(v) = text("initial_snapshot_poll_ms") {
        set_parsed(&mut settings.initial_snapshot_poll_ms, "initial_snapshot_poll_ms", &v);
    }
}

fn apply_env(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("DATABASE_URL") {
        settings.database_url = v;
    }
    if let Some(v) = var("CALLROOM_DATABASE_URL") {
        settings.database_url = v;
    }
    if let Some(v) = var("CALLROOM_LANE_COUNT") {
        set_lane_count(settings, &v);
    }
    if let Some(v) = var("CALLROOM_WINDOWING") {
        set_parsed(&mut settings.windowing, "CALLROOM_WINDOWING", &v);
    }
    if let Some(v) = var("CALLROOM_MODE") {
        set_parsed(&mut settings.default_mode, "CALLROOM_MODE", &v);
    }
}

fn set_lane_count(settings: &mut Settings, raw: &str) {
    match raw.trim().parse::<usize>() {
        Ok(count) if SUPPORTED_LANE_COUNTS.contains(&count) => settings.lane_count = count,
        _ => warn!(value = raw, "ignoring unsupported lane count"),
    }
}

fn set_parsed<T: std::str::FromStr>(target: &mut T, key: &str, raw: &str) {
    match raw.trim().parse::<T>() {
        Ok(value) => *target = value,
        Err(_) => warn!(key, value = raw, "ignoring invalid setting"),
    }
}

pub fn prepare_database_url(raw_database_url: &str) -> anyhow::Result<String> {
    let database_url = normalize_database_url(raw_database_url);
    ensure_parent_dir_exists(&database_url)?;
    Ok(database_url)
}

fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:")
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        return format!("sqlite://{path}");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

fn ensure_parent_dir_exists(database_url: &str) -> anyhow::Result<()> {
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

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
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
#[path = "tests/config_tests.rs"]
mod tests;
