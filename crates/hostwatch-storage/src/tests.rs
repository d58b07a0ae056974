use crate::{PersistedState, StateStore, TrafficState};
use chrono::{Duration, NaiveDate, Utc};
use std::sync::Arc;
use tempfile::TempDir;

fn setup(cooldown_secs: u64) -> (TempDir, StateStore) {
    let dir = TempDir::new().unwrap();
    let store = StateStore::load(dir.path().join("state.json"), cooldown_secs);
    (dir, store)
}

#[test]
fn cooldown_fires_once_then_suppresses_until_window_elapses() {
    let (_dir, store) = setup(600);
    let t0 = Utc::now();

    assert!(!store.cooldown_at("mem_low", t0));
    assert!(store.cooldown_at("mem_low", t0 + Duration::seconds(1)));
    assert!(store.cooldown_at("mem_low", t0 + Duration::seconds(599)));
    assert!(!store.cooldown_at("mem_low", t0 + Duration::seconds(600)));
    // The re-fire resets the window
    assert!(store.cooldown_at("mem_low", t0 + Duration::seconds(700)));
}

#[test]
fn reports_location_and_cooldown() {
    let (dir, store) = setup(1800);
    assert_eq!(store.path(), dir.path().join("state.json"));
    assert_eq!(store.cooldown_secs(), 1800);
}

#[test]
fn cooldown_keys_are_independent() {
    let (_dir, store) = setup(600);
    let now = Utc::now();
    assert!(!store.cooldown_at("proc:nginx", now));
    assert!(!store.cooldown_at("proc:docker", now));
    assert!(store.cooldown_at("proc:nginx", now));
}

#[test]
fn cooldown_survives_restart() {
    let (dir, store) = setup(600);
    let now = Utc::now();
    assert!(!store.cooldown_at("startup", now));
    drop(store);

    let reloaded = StateStore::load(dir.path().join("state.json"), 600);
    assert!(reloaded.cooldown_at("startup", now + Duration::seconds(5)));
}

#[test]
fn missing_file_loads_defaults() {
    let (_dir, store) = setup(60);
    assert_eq!(store.snapshot(), PersistedState::default());
}

#[test]
fn corrupt_file_loads_defaults_and_is_replaced_on_write() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(&path, b"{ not json").unwrap();

    let store = StateStore::load(&path, 60);
    assert_eq!(store.snapshot(), PersistedState::default());

    assert!(!store.cooldown_at("k", Utc::now()));
    let content = std::fs::read_to_string(&path).unwrap();
    let parsed: PersistedState = serde_json::from_str(&content).unwrap();
    assert!(parsed.last_alert.contains_key("k"));
}

#[test]
fn writes_leave_no_temp_file_behind() {
    let (dir, store) = setup(60);
    store.update(|s| s.last_beat = Some(Utc::now()));
    let names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(names, vec!["state.json".to_string()]);
}

#[test]
fn update_persists_traffic_baseline() {
    let (dir, store) = setup(60);
    store.update(|s| {
        s.traffic = Some(TrafficState {
            month: "2025-01".into(),
            start_rx: 100,
            start_tx: 200,
            last_report_day: NaiveDate::from_ymd_opt(2025, 1, 10),
        })
    });

    let reloaded = StateStore::load(dir.path().join("state.json"), 60);
    let traffic = reloaded.read(|s| s.traffic.clone()).unwrap();
    assert_eq!(traffic.month, "2025-01");
    assert_eq!(traffic.start_rx, 100);
    assert_eq!(traffic.start_tx, 200);
    assert_eq!(traffic.last_report_day, NaiveDate::from_ymd_opt(2025, 1, 10));
}

#[test]
fn get_and_set_top_level_fields() {
    let (dir, store) = setup(60);
    assert!(store.get("last_daily").is_none());

    store
        .set("last_daily", serde_json::json!("2025-03-04"))
        .unwrap();
    assert_eq!(
        store.read(|s| s.last_daily),
        NaiveDate::from_ymd_opt(2025, 3, 4)
    );
    assert_eq!(store.get("last_daily").unwrap(), "2025-03-04");

    // Arbitrary markers round-trip through the document
    store
        .set("last_route", serde_json::json!({"dev": "eth0"}))
        .unwrap();
    let reloaded = StateStore::load(dir.path().join("state.json"), 60);
    assert_eq!(reloaded.get("last_route").unwrap()["dev"], "eth0");
}

#[test]
fn set_rejects_invalid_value_for_known_field() {
    let (_dir, store) = setup(60);
    let err = store
        .set("last_daily", serde_json::json!(42))
        .expect_err("number is not a date");
    assert!(err.to_string().contains("last_daily"));
    assert!(store.read(|s| s.last_daily.is_none()));
}

#[test]
fn concurrent_cooldown_checks_fire_exactly_once() {
    let (_dir, store) = setup(600);
    let store = Arc::new(store);
    let now = Utc::now();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();
            std::thread::spawn(move || store.cooldown_at("net_down", now))
        })
        .collect();

    let fired = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|suppressed| !suppressed)
        .count();
    assert_eq!(fired, 1);
}

#[test]
fn persist_failure_keeps_memory_authoritative() {
    let dir = TempDir::new().unwrap();
    // A directory where the file should be makes the rename fail
    let path = dir.path().join("state.json");
    std::fs::create_dir(&path).unwrap();
    std::fs::write(path.join("occupied"), b"x").unwrap();

    let store = StateStore::load(&path, 600);
    let now = Utc::now();
    assert!(!store.cooldown_at("k", now));
    assert!(store.cooldown_at("k", now));
    assert!(store.persist_now().is_err());
}
