use std::collections::HashMap;

use super::*;

fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn defaults_match_the_current_hall_layout() {
    let settings = Settings::default();
    assert_eq!(settings.lane_count, 4);
    assert_eq!(settings.windowing, Windowing::Interleaved);
    assert_eq!(settings.default_mode, Mode::Individual);
    assert_eq!(settings.initial_snapshot_timeout(), Duration::from_secs(3));
    assert_eq!(settings.initial_snapshot_poll(), Duration::from_millis(100));
}

#[test]
fn file_values_override_defaults() {
    let mut settings = Settings::default();
    apply_file(
        &mut settings,
        r#"
        database_url = "sqlite://./hall.db"
        lane_count = 5
        windowing = "contiguous"
        default_mode = "team"
        initial_snapshot_timeout_ms = "1500"
        "#,
    );
    assert_eq!(settings.database_url, "sqlite://./hall.db");
    assert_eq!(settings.lane_count, 5);
    assert_eq!(settings.windowing, Windowing::Contiguous);
    assert_eq!(settings.default_mode, Mode::Team);
    assert_eq!(settings.initial_snapshot_timeout_ms, 1500);
}

#[test]
fn invalid_values_keep_the_previous_layer() {
    let mut settings = Settings::default();
    apply_file(&mut settings, "lane_count = 7\nwindowing = \"diagonal\"");
    assert_eq!(settings.lane_count, 4);
    assert_eq!(settings.windowing, Windowing::Interleaved);

    apply_file(&mut settings, "this is not toml = = =");
    assert_eq!(settings, Settings::default());
}

#[test]
fn environment_overrides_file_values() {
    let mut settings = Settings::default();
    apply_file(&mut settings, "lane_count = 5");
    apply_env(
        &mut settings,
        env_of(&[
            ("DATABASE_URL", "sqlite://./generic.db"),
            ("CALLROOM_DATABASE_URL", "sqlite://./callroom.db"),
            ("CALLROOM_LANE_COUNT", "4"),
            ("CALLROOM_MODE", "Einzel"),
        ]),
    );
    assert_eq!(settings.database_url, "sqlite://./callroom.db");
    assert_eq!(settings.lane_count, 4);
    assert_eq!(settings.default_mode, Mode::Individual);
}

#[test]
fn normalizes_plain_file_path_to_sqlite_url() {
    assert_eq!(
        normalize_database_url("./data/test.db"),
        "sqlite://./data/test.db"
    );
    assert_eq!(normalize_database_url("sqlite:hall.db"), "sqlite://hall.db");
    assert_eq!(normalize_database_url("sqlite::memory:"), "sqlite::memory:");
    assert_eq!(
        normalize_database_url("  "),
        Settings::default().database_url
    );
}

#[test]
fn creates_parent_dir_for_sqlite_url() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("data").join("test.db");

    let prepared = prepare_database_url(db_path.to_string_lossy().as_ref()).expect("prepare db url");
    assert!(prepared.starts_with("sqlite://"));
    assert!(temp_root.path().join("data").exists());
}
