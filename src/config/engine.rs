//! Engine configuration structures.
//!
//! Configuration is read once per deployment (JSON or environment) and is
//! read-only at runtime.

use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use chrono::{NaiveTime, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::core::calendar::BusinessCalendarPolicy;
use crate::core::error::{AppResult, EngineError};
use crate::core::orchestrator::OrchestratorSettings;

/// Business calendar as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarConfig {
    /// IANA timezone, e.g. `America/Sao_Paulo`.
    pub timezone: String,
    /// Business weekday names (`monday` or `mon`, case-insensitive).
    pub business_days: Vec<String>,
    /// Opening time, `HH:MM`.
    pub start: String,
    /// Closing time, `HH:MM`.
    pub end: String,
}

/// Storage backend selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum StoreBackendConfig {
    /// In-memory store for development/testing.
    InMemory,
    /// JSON lines journal on local disk.
    File {
        /// Directory holding the journal.
        dir: String,
        /// Journal name without extension.
        #[serde(default = "default_journal_name")]
        name: String,
    },
}

fn default_journal_name() -> String {
    "sla_engine".into()
}

const fn default_storage_timeout_ms() -> u64 {
    5_000
}

const fn default_max_active() -> usize {
    1
}

const fn default_auto_promote() -> bool {
    true
}

fn default_store() -> StoreBackendConfig {
    StoreBackendConfig::InMemory
}

/// Root engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Business calendar policy.
    pub calendar: CalendarConfig,
    /// Storage backend.
    #[serde(default = "default_store")]
    pub store: StoreBackendConfig,
    /// Bound on each storage call, milliseconds.
    #[serde(default = "default_storage_timeout_ms")]
    pub storage_timeout_ms: u64,
    /// Concurrent active assignments per queue key.
    #[serde(default = "default_max_active")]
    pub max_active_per_queue: usize,
    /// Promote queue heads automatically when capacity frees up.
    #[serde(default = "default_auto_promote")]
    pub auto_promote: bool,
}

fn parse_time(field: &str, value: &str) -> Result<NaiveTime, EngineError> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").map_err(|e| {
        EngineError::PolicyMisconfigured(format!("{field} `{value}` is not HH:MM: {e}"))
    })
}

fn parse_weekday(value: &str) -> Result<Weekday, EngineError> {
    Weekday::from_str(value.trim())
        .map_err(|_| EngineError::PolicyMisconfigured(format!("unknown weekday `{value}`")))
}

impl TryFrom<&CalendarConfig> for BusinessCalendarPolicy {
    type Error = EngineError;

    fn try_from(cfg: &CalendarConfig) -> Result<Self, Self::Error> {
        let timezone: Tz = cfg.timezone.trim().parse().map_err(|e| {
            EngineError::PolicyMisconfigured(format!("unknown timezone `{}`: {e}", cfg.timezone))
        })?;
        let days = cfg
            .business_days
            .iter()
            .map(|d| parse_weekday(d))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(
            timezone,
            days,
            parse_time("start", &cfg.start)?,
            parse_time("end", &cfg.end)?,
        )
    }
}

impl CalendarConfig {
    /// Validate and convert into a policy.
    pub fn to_policy(&self) -> Result<BusinessCalendarPolicy, EngineError> {
        BusinessCalendarPolicy::try_from(self)
    }
}

impl EngineConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        self.calendar
            .to_policy()
            .map_err(|e| format!("calendar invalid: {e}"))?;
        if self.storage_timeout_ms == 0 {
            return Err("storage_timeout_ms must be greater than 0".into());
        }
        if self.max_active_per_queue == 0 {
            return Err("max_active_per_queue must be greater than 0".into());
        }
        if let StoreBackendConfig::File { dir, name } = &self.store {
            if dir.trim().is_empty() || name.trim().is_empty() {
                return Err("file store needs a dir and a name".into());
            }
        }
        Ok(())
    }

    /// Parse engine configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load configuration from `SLA_*` environment variables, reading a
    /// `.env` file first when present.
    pub fn from_env() -> AppResult<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// Required: `SLA_TIMEZONE`, `SLA_BUSINESS_DAYS` (comma separated),
    /// `SLA_START`, `SLA_END`. Optional: `SLA_STORE` (`in_memory` or
    /// `file`), `SLA_STORE_DIR`, `SLA_STORE_NAME`, `SLA_STORAGE_TIMEOUT_MS`,
    /// `SLA_MAX_ACTIVE_PER_QUEUE`, `SLA_AUTO_PROMOTE`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let required = |name: &str| lookup(name).with_context(|| format!("{name} is not set"));

        let calendar = CalendarConfig {
            timezone: required("SLA_TIMEZONE")?,
            business_days: required("SLA_BUSINESS_DAYS")?
                .split(',')
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_owned)
                .collect(),
            start: required("SLA_START")?,
            end: required("SLA_END")?,
        };

        let store = match lookup("SLA_STORE").as_deref().map(str::trim) {
            None | Some("" | "in_memory") => StoreBackendConfig::InMemory,
            Some("file") => StoreBackendConfig::File {
                dir: required("SLA_STORE_DIR")?,
                name: lookup("SLA_STORE_NAME").unwrap_or_else(default_journal_name),
            },
            Some(other) => anyhow::bail!("SLA_STORE `{other}` is not in_memory or file"),
        };

        let storage_timeout_ms = match lookup("SLA_STORAGE_TIMEOUT_MS") {
            Some(v) => v
                .trim()
                .parse()
                .with_context(|| format!("SLA_STORAGE_TIMEOUT_MS `{v}` is not a number"))?,
            None => default_storage_timeout_ms(),
        };
        let max_active_per_queue = match lookup("SLA_MAX_ACTIVE_PER_QUEUE") {
            Some(v) => v
                .trim()
                .parse()
                .with_context(|| format!("SLA_MAX_ACTIVE_PER_QUEUE `{v}` is not a number"))?,
            None => default_max_active(),
        };
        let auto_promote = match lookup("SLA_AUTO_PROMOTE") {
            Some(v) => v
                .trim()
                .parse()
                .with_context(|| format!("SLA_AUTO_PROMOTE `{v}` is not true/false"))?,
            None => default_auto_promote(),
        };

        let cfg = Self {
            calendar,
            store,
            storage_timeout_ms,
            max_active_per_queue,
            auto_promote,
        };
        cfg.validate().map_err(anyhow::Error::msg)?;
        Ok(cfg)
    }

    /// Orchestrator settings derived from this configuration.
    pub const fn settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            storage_timeout: Duration::from_millis(self.storage_timeout_ms),
            max_active_per_queue: self.max_active_per_queue,
            auto_promote: self.auto_promote,
        }
    }
}
