// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration: a single TOML file whose keys are exactly those
//! enumerated for engine start, plus the paths the daemon derives from
//! its state directory.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// A startup cleanup category, drawn from `delete_on_startup`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteCategory {
    Settings,
    Jobs,
    Queue,
    Documents,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Root state directory; every other path is derived from this unless
    /// given explicitly.
    pub state_dir: PathBuf,

    #[serde(with = "duration_serde")]
    pub queue_visibility_timeout: Duration,
    pub queue_max_receive: u32,
    pub queue_concurrency: usize,

    #[serde(with = "duration_serde")]
    pub worker_heartbeat_interval: Duration,

    #[serde(with = "duration_serde")]
    pub stale_threshold: Duration,
    #[serde(with = "duration_serde")]
    pub stale_reap_interval: Duration,

    #[serde(with = "duration_serde")]
    pub engine_default_timeout: Duration,

    #[serde(with = "duration_serde")]
    pub scheduler_tick: Duration,
    #[serde(with = "duration_serde")]
    pub scheduler_cooldown: Duration,

    pub eventbus_subscriber_buffer: usize,

    pub definitions_dir: PathBuf,
    pub connectors_dir: PathBuf,
    pub variables_dir: PathBuf,

    /// Processed in order; each category's failure is logged and does not
    /// block the others (spec §6).
    pub delete_on_startup: Vec<DeleteCategory>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        let state_dir = default_state_dir();
        Self {
            definitions_dir: state_dir.join("definitions"),
            connectors_dir: state_dir.join("connectors"),
            variables_dir: state_dir.join("variables"),
            state_dir,
            queue_visibility_timeout: Duration::from_secs(5 * 60),
            queue_max_receive: 5,
            queue_concurrency: 8,
            worker_heartbeat_interval: Duration::from_secs(30),
            stale_threshold: Duration::from_secs(15 * 60),
            stale_reap_interval: Duration::from_secs(5 * 60),
            engine_default_timeout: Duration::from_secs(30 * 60),
            scheduler_tick: Duration::from_secs(60),
            scheduler_cooldown: Duration::from_secs(60),
            eventbus_subscriber_buffer: 256,
            delete_on_startup: Vec::new(),
        }
    }
}

fn default_state_dir() -> PathBuf {
    dirs::state_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("jobweave")
}

impl DaemonConfig {
    /// Load from `path`, falling back to every unset key's default.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Read { path: path.to_path_buf(), source: e })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse { path: path.to_path_buf(), source: e })
    }

    pub fn socket_path(&self) -> PathBuf {
        self.state_dir.join("jobweave.sock")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.state_dir.join("jobweave.pid")
    }

    pub fn jobs_wal_path(&self) -> PathBuf {
        self.state_dir.join("jobs.wal")
    }

    pub fn queue_wal_path(&self) -> PathBuf {
        self.state_dir.join("queue.wal")
    }

    pub fn log_path(&self) -> PathBuf {
        self.state_dir.join("jobweave.log")
    }
}

/// Deserializes compact duration strings (`"5m"`, `"30s"`, `"1h"`) and
/// serializes back to the same form.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format(*duration))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(d)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }

    fn format(duration: Duration) -> String {
        let secs = duration.as_secs();
        if secs % 3600 == 0 && secs > 0 {
            format!("{}h", secs / 3600)
        } else if secs % 60 == 0 && secs > 0 {
            format!("{}m", secs / 60)
        } else {
            format!("{secs}s")
        }
    }

    fn parse(raw: &str) -> Result<Duration, String> {
        let raw = raw.trim();
        let (digits, unit) = raw.split_at(raw.find(|c: char| !c.is_ascii_digit()).unwrap_or(raw.len()));
        let value: u64 = digits.parse().map_err(|_| format!("not a duration: '{raw}'"))?;
        let secs = match unit {
            "s" | "" => value,
            "m" => value * 60,
            "h" => value * 3600,
            other => return Err(format!("unknown duration unit '{other}' in '{raw}'")),
        };
        Ok(Duration::from_secs(secs))
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn parses_seconds_minutes_and_hours() {
            assert_eq!(parse("30s").unwrap(), Duration::from_secs(30));
            assert_eq!(parse("5m").unwrap(), Duration::from_secs(300));
            assert_eq!(parse("1h").unwrap(), Duration::from_secs(3600));
        }

        #[test]
        fn a_bare_number_is_treated_as_seconds() {
            assert_eq!(parse("45").unwrap(), Duration::from_secs(45));
        }

        #[test]
        fn an_unknown_unit_is_rejected() {
            assert!(parse("5x").is_err());
        }

        #[test]
        fn formatting_prefers_the_coarsest_exact_unit() {
            assert_eq!(format(Duration::from_secs(3600)), "1h");
            assert_eq!(format(Duration::from_secs(300)), "5m");
            assert_eq!(format(Duration::from_secs(90)), "90s");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_configuration_keys() {
        let config = DaemonConfig::default();
        assert_eq!(config.queue_visibility_timeout, Duration::from_secs(5 * 60));
        assert_eq!(config.queue_max_receive, 5);
        assert_eq!(config.queue_concurrency, 8);
        assert_eq!(config.worker_heartbeat_interval, Duration::from_secs(30));
        assert_eq!(config.stale_threshold, Duration::from_secs(15 * 60));
        assert_eq!(config.stale_reap_interval, Duration::from_secs(5 * 60));
        assert_eq!(config.engine_default_timeout, Duration::from_secs(30 * 60));
        assert_eq!(config.scheduler_tick, Duration::from_secs(60));
        assert_eq!(config.scheduler_cooldown, Duration::from_secs(60));
        assert_eq!(config.eventbus_subscriber_buffer, 256);
        assert!(config.delete_on_startup.is_empty());
    }

    #[test]
    fn loading_a_partial_file_fills_in_the_rest_from_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobweave.toml");
        std::fs::write(&path, "state_dir = \"/tmp/jobweave-test\"\nqueue_max_receive = 9\n").unwrap();

        let config = DaemonConfig::load(&path).unwrap();
        assert_eq!(config.state_dir, PathBuf::from("/tmp/jobweave-test"));
        assert_eq!(config.queue_max_receive, 9);
        assert_eq!(config.queue_concurrency, 8);
    }

    #[test]
    fn delete_on_startup_parses_the_documented_categories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobweave.toml");
        std::fs::write(&path, "delete_on_startup = [\"jobs\", \"queue\"]\n").unwrap();

        let config = DaemonConfig::load(&path).unwrap();
        assert_eq!(config.delete_on_startup, vec![DeleteCategory::Jobs, DeleteCategory::Queue]);
    }

    #[test]
    fn a_missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = DaemonConfig::load(&dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn derived_paths_live_under_the_state_dir() {
        let config = DaemonConfig { state_dir: PathBuf::from("/var/lib/jobweave"), ..Default::default() };
        assert_eq!(config.socket_path(), PathBuf::from("/var/lib/jobweave/jobweave.sock"));
        assert_eq!(config.jobs_wal_path(), PathBuf::from("/var/lib/jobweave/jobs.wal"));
    }
}
