//! Unit tests for individual components

mod api_test;
mod builders_test;
mod config_test;
mod events_test;
mod util_test;

use prometheus_sla_engine::config::{CalendarConfig, EngineConfig, StoreBackendConfig};

/// Mon-Fri 09:00-18:00 in São Paulo, in-memory store.
pub(crate) fn sample_config() -> EngineConfig {
    EngineConfig {
        calendar: CalendarConfig {
            timezone: "America/Sao_Paulo".into(),
            business_days: ["mon", "tue", "wed", "thu", "fri"]
                .iter()
                .map(|d| (*d).to_string())
                .collect(),
            start: "09:00".into(),
            end: "18:00".into(),
        },
        store: StoreBackendConfig::InMemory,
        storage_timeout_ms: 1_000,
        max_active_per_queue: 1,
        auto_promote: true,
    }
}
