//! Tests for configuration modules

use std::collections::HashMap;
use std::time::Duration;

use chrono::{NaiveTime, Weekday};
use prometheus_sla_engine::config::{EngineConfig, StoreBackendConfig};
use prometheus_sla_engine::core::EngineError;

use super::sample_config;

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    move |name| map.get(name).cloned()
}

#[test]
fn test_calendar_config_to_policy() {
    let policy = sample_config().calendar.to_policy().unwrap();
    assert_eq!(policy.timezone(), chrono_tz::America::Sao_Paulo);
    assert_eq!(policy.start(), NaiveTime::from_hms_opt(9, 0, 0).unwrap());
    assert_eq!(policy.end(), NaiveTime::from_hms_opt(18, 0, 0).unwrap());
    assert!(policy.is_business_weekday(Weekday::Fri));
    assert!(!policy.is_business_weekday(Weekday::Sat));
    assert!(!policy.is_business_weekday(Weekday::Sun));
}

#[test]
fn test_calendar_config_rejects_bad_values() {
    let mut cfg = sample_config();
    cfg.calendar.timezone = "Mars/Olympus_Mons".into();
    assert!(matches!(
        cfg.calendar.to_policy(),
        Err(EngineError::PolicyMisconfigured(_))
    ));

    let mut cfg = sample_config();
    cfg.calendar.start = "18:00".into();
    cfg.calendar.end = "09:00".into();
    assert!(matches!(
        cfg.calendar.to_policy(),
        Err(EngineError::PolicyMisconfigured(_))
    ));

    let mut cfg = sample_config();
    cfg.calendar.business_days.clear();
    assert!(matches!(
        cfg.calendar.to_policy(),
        Err(EngineError::PolicyMisconfigured(_))
    ));

    let mut cfg = sample_config();
    cfg.calendar.business_days.push("funday".into());
    assert!(cfg.calendar.to_policy().is_err());

    let mut cfg = sample_config();
    cfg.calendar.start = "9am".into();
    assert!(cfg.calendar.to_policy().is_err());
}

#[test]
fn test_engine_config_validate() {
    assert!(sample_config().validate().is_ok());

    let mut cfg = sample_config();
    cfg.storage_timeout_ms = 0;
    assert!(cfg.validate().is_err());

    let mut cfg = sample_config();
    cfg.max_active_per_queue = 0;
    assert!(cfg.validate().is_err());

    let mut cfg = sample_config();
    cfg.store = StoreBackendConfig::File {
        dir: " ".into(),
        name: "journal".into(),
    };
    assert!(cfg.validate().is_err());
}

#[test]
fn test_engine_config_from_json_defaults() {
    let json = r#"{
        "calendar": {
            "timezone": "America/Sao_Paulo",
            "business_days": ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat"],
            "start": "08:30",
            "end": "17:30"
        }
    }"#;
    let cfg = EngineConfig::from_json_str(json).unwrap();
    assert_eq!(cfg.store, StoreBackendConfig::InMemory);
    assert_eq!(cfg.storage_timeout_ms, 5_000);
    assert_eq!(cfg.max_active_per_queue, 1);
    assert!(cfg.auto_promote);
    assert!(cfg.calendar.to_policy().unwrap().is_business_weekday(Weekday::Sat));
}

#[test]
fn test_engine_config_from_json_file_store() {
    let json = r#"{
        "calendar": {
            "timezone": "Europe/Lisbon",
            "business_days": ["monday", "friday"],
            "start": "10:00",
            "end": "16:00"
        },
        "store": { "kind": "file", "dir": "/var/lib/sla" },
        "storage_timeout_ms": 250,
        "max_active_per_queue": 3,
        "auto_promote": false
    }"#;
    let cfg = EngineConfig::from_json_str(json).unwrap();
    assert_eq!(
        cfg.store,
        StoreBackendConfig::File {
            dir: "/var/lib/sla".into(),
            name: "sla_engine".into(),
        }
    );
    let settings = cfg.settings();
    assert_eq!(settings.storage_timeout, Duration::from_millis(250));
    assert_eq!(settings.max_active_per_queue, 3);
    assert!(!settings.auto_promote);
}

#[test]
fn test_engine_config_from_json_rejects_invalid() {
    assert!(EngineConfig::from_json_str("{").is_err());
    let json = r#"{
        "calendar": {
            "timezone": "UTC",
            "business_days": ["mon"],
            "start": "12:00",
            "end": "12:00"
        }
    }"#;
    let err = EngineConfig::from_json_str(json).unwrap_err();
    assert!(err.contains("calendar invalid"), "{err}");
}

#[test]
fn test_engine_config_from_lookup() {
    let cfg = EngineConfig::from_lookup(lookup(&[
        ("SLA_TIMEZONE", "America/Sao_Paulo"),
        ("SLA_BUSINESS_DAYS", "mon, tue,wed,thu,fri,"),
        ("SLA_START", "08:30"),
        ("SLA_END", "17:30"),
        ("SLA_STORE", "file"),
        ("SLA_STORE_DIR", "/tmp/sla"),
        ("SLA_STORAGE_TIMEOUT_MS", "750"),
        ("SLA_MAX_ACTIVE_PER_QUEUE", "2"),
        ("SLA_AUTO_PROMOTE", "false"),
    ]))
    .unwrap();
    assert_eq!(cfg.calendar.business_days.len(), 5);
    assert_eq!(
        cfg.store,
        StoreBackendConfig::File {
            dir: "/tmp/sla".into(),
            name: "sla_engine".into(),
        }
    );
    assert_eq!(cfg.storage_timeout_ms, 750);
    assert_eq!(cfg.max_active_per_queue, 2);
    assert!(!cfg.auto_promote);
}

#[test]
fn test_engine_config_from_lookup_errors() {
    let missing = EngineConfig::from_lookup(lookup(&[("SLA_TIMEZONE", "UTC")])).unwrap_err();
    assert!(missing.to_string().contains("SLA_BUSINESS_DAYS"));

    let bad_store = EngineConfig::from_lookup(lookup(&[
        ("SLA_TIMEZONE", "UTC"),
        ("SLA_BUSINESS_DAYS", "mon"),
        ("SLA_START", "09:00"),
        ("SLA_END", "17:00"),
        ("SLA_STORE", "redis"),
    ]))
    .unwrap_err();
    assert!(bad_store.to_string().contains("redis"));

    let bad_number = EngineConfig::from_lookup(lookup(&[
        ("SLA_TIMEZONE", "UTC"),
        ("SLA_BUSINESS_DAYS", "mon"),
        ("SLA_START", "09:00"),
        ("SLA_END", "17:00"),
        ("SLA_STORAGE_TIMEOUT_MS", "soon"),
    ]))
    .unwrap_err();
    assert!(bad_number.to_string().contains("SLA_STORAGE_TIMEOUT_MS"));
}
