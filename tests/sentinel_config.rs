use std::sync::Mutex;
use std::time::Duration;

use tempfile::{Builder, NamedTempFile};

use nursery_sentinel::config::SentinelConfig;
use nursery_sentinel::SourceId;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "SENTINEL_CONFIG",
        "SENTINEL_DB_PATH",
        "SENTINEL_ALERT_ADDR",
        "SENTINEL_SOURCES",
        "SENTINEL_COOLDOWN_SECS",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_json_config_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "db_path": "nursery_prod.db",
        "alerts": { "addr": "0.0.0.0:9100", "queue_capacity": 64, "cooldown_secs": 3 },
        "worker": { "loop_interval_ms": 50, "no_face_danger_secs": 20, "fall_margin": 0.1 },
        "tracker": { "max_age": 5, "report_unconfirmed": false },
        "sources": [
            { "id": "crib", "url": "stub://crib" },
            { "id": "playroom", "url": "stub://playroom" }
        ]
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("SENTINEL_CONFIG", file.path());
    std::env::set_var("SENTINEL_DB_PATH", "override.db");
    std::env::set_var("SENTINEL_COOLDOWN_SECS", "7.5");

    let cfg = SentinelConfig::load().expect("load config");

    assert_eq!(cfg.db_path, "override.db");
    assert_eq!(cfg.alert_addr, "0.0.0.0:9100");
    assert_eq!(cfg.queue_capacity, 64);
    assert_eq!(cfg.cooldown, Duration::from_millis(7_500));
    assert_eq!(cfg.loop_interval, Duration::from_millis(50));
    assert_eq!(cfg.no_face_danger_after, Duration::from_secs(20));
    assert_eq!(cfg.tracker.max_age, 5);
    assert_eq!(cfg.tracker.min_hits, 3);
    assert!(!cfg.tracker.report_unconfirmed);
    let ids: Vec<&str> = cfg.sources.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["crib", "playroom"]);

    let settings = cfg.worker_settings();
    assert_eq!(settings.pipeline.cooldown, Duration::from_millis(7_500));
    assert_eq!(settings.loop_interval, Duration::from_millis(50));

    clear_env();
}

#[test]
fn loads_toml_config() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = Builder::new().suffix(".toml").tempfile().expect("temp config");
    let raw = r#"
db_path = "sentinel_toml.db"

[alerts]
addr = "127.0.0.1:9200"

[[sources]]
id = "nursery"
url = "stub://nursery-cam"
"#;
    std::io::Write::write_all(&mut file, raw.as_bytes()).expect("write config");
    std::env::set_var("SENTINEL_CONFIG", file.path());

    let cfg = SentinelConfig::load().expect("load toml config");
    assert_eq!(cfg.db_path, "sentinel_toml.db");
    assert_eq!(cfg.alert_addr, "127.0.0.1:9200");
    assert_eq!(cfg.sources.len(), 1);
    assert_eq!(cfg.sources[0].id, SourceId::from("nursery"));
    assert_eq!(cfg.cooldown, Duration::from_secs(5));

    clear_env();
}

#[test]
fn env_sources_replace_defaults() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("SENTINEL_SOURCES", "crib=stub://a, hall=stub://b");
    let cfg = SentinelConfig::load().expect("load env config");
    let urls = cfg.source_urls();
    assert_eq!(urls.get(&SourceId::from("crib")).unwrap(), "stub://a");
    assert_eq!(urls.get(&SourceId::from("hall")).unwrap(), "stub://b");

    clear_env();
}

#[test]
fn rejects_invalid_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("SENTINEL_COOLDOWN_SECS", "soon");
    assert!(SentinelConfig::load().is_err());
    clear_env();

    std::env::set_var("SENTINEL_ALERT_ADDR", "not-an-address");
    assert!(SentinelConfig::load().is_err());
    clear_env();

    std::env::set_var("SENTINEL_SOURCES", "crib=stub://a,crib=stub://b");
    assert!(SentinelConfig::load().is_err());
    clear_env();

    std::env::set_var("SENTINEL_SOURCES", "crib");
    assert!(SentinelConfig::load().is_err());
    clear_env();
}
