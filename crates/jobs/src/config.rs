//! Job subsystem configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Environment variable overriding [`JobsConfig::retention`], in seconds.
pub const RETENTION_ENV: &str = "ASYNCOPS_JOB_RETENTION_SECS";
/// Environment variable overriding [`JobsConfig::sweep_interval`], in seconds.
pub const SWEEP_INTERVAL_ENV: &str = "ASYNCOPS_SWEEP_INTERVAL_SECS";

/// Retention and sweeping configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobsConfig {
    /// How long terminal jobs are kept before the sweeper may remove them
    pub retention: Duration,
    /// How often the sweeper runs
    pub sweep_interval: Duration,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            retention: Duration::from_secs(60 * 60),
            sweep_interval: Duration::from_secs(5 * 60),
        }
    }
}

impl JobsConfig {
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Load overrides from the process environment.
    ///
    /// Missing variables keep their defaults; invalid ones are logged and
    /// ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`JobsConfig::from_env`] with an explicit variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            retention: seconds_var(&lookup, RETENTION_ENV, defaults.retention),
            sweep_interval: seconds_var(&lookup, SWEEP_INTERVAL_ENV, defaults.sweep_interval),
        }
    }
}

/// Upper bound for any configured duration (roughly 100 years).
pub const MAX_DURATION_SECS: u64 = 100 * 365 * 24 * 60 * 60;

fn seconds_var(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> Duration {
    let Some(raw) = lookup(key) else {
        return default;
    };

    match raw.trim().parse::<u64>() {
        Ok(secs) if (1..=MAX_DURATION_SECS).contains(&secs) => Duration::from_secs(secs),
        _ => {
            warn!(
                key,
                value = %raw,
                default_secs = default.as_secs(),
                "invalid duration in environment; using default"
            );
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_are_one_hour_and_five_minutes() {
        let config = JobsConfig::default();
        assert_eq!(config.retention, Duration::from_secs(3600));
        assert_eq!(config.sweep_interval, Duration::from_secs(300));
        assert_eq!(JobsConfig::from_lookup(lookup(&[])), config);
    }

    #[test]
    fn environment_overrides_apply() {
        let config = JobsConfig::from_lookup(lookup(&[
            (RETENTION_ENV, "120"),
            (SWEEP_INTERVAL_ENV, " 15 "),
        ]));
        assert_eq!(config.retention, Duration::from_secs(120));
        assert_eq!(config.sweep_interval, Duration::from_secs(15));
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let config = JobsConfig::from_lookup(lookup(&[
            (RETENTION_ENV, "soon"),
            (SWEEP_INTERVAL_ENV, "0"),
        ]));
        assert_eq!(config, JobsConfig::default());
    }

    #[test]
    fn out_of_range_values_fall_back_to_defaults() {
        let config = JobsConfig::from_lookup(lookup(&[
            (RETENTION_ENV, "10000000000000"),
            (SWEEP_INTERVAL_ENV, "18446744073709551615"),
        ]));
        assert_eq!(config, JobsConfig::default());

        let max = MAX_DURATION_SECS.to_string();
        let config = JobsConfig::from_lookup(lookup(&[(RETENTION_ENV, max.as_str())]));
        assert_eq!(config.retention, Duration::from_secs(MAX_DURATION_SECS));
    }
}
