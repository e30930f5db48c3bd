//! Scheduler configuration parser.
//!
//! Reads the `[scheduler]` table of a `stowage.toml` file. Every key is
//! optional; [`StowageConfig::scheduler_config`] fills in defaults and
//! validates durations.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{SchedulerError, SchedulerResult};
use crate::filters::{AvailabilityZoneFilter, CapabilitiesFilter, CapacityFilter};

/// Raw `stowage.toml` contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StowageConfig {
    #[serde(default)]
    pub scheduler: SchedulerSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerSection {
    pub volume_topic: Option<String>,
    pub default_filters: Option<Vec<String>>,
    pub service_down_time: Option<String>,
    pub refresh_timeout: Option<String>,
    pub refresh_interval: Option<String>,
}

/// Resolved scheduler settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    /// Topic whose services host volumes.
    pub volume_topic: String,
    /// Filter chain used when a request names none.
    pub default_filters: Vec<String>,
    /// Maximum heartbeat age for a service to count as up.
    pub service_down_time: Duration,
    /// Upper bound on one service registry query.
    pub refresh_timeout: Duration,
    /// Period of the background refresh loop.
    pub refresh_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            volume_topic: "volume".to_string(),
            default_filters: vec![
                AvailabilityZoneFilter::NAME.to_string(),
                CapacityFilter::NAME.to_string(),
                CapabilitiesFilter::NAME.to_string(),
            ],
            service_down_time: Duration::from_secs(60),
            refresh_timeout: Duration::from_secs(10),
            refresh_interval: Duration::from_secs(60),
        }
    }
}

impl StowageConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: StowageConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Apply defaults and parse durations.
    ///
    /// A zero `refresh_interval` is rejected since the refresh loop would
    /// never wait between cycles.
    pub fn scheduler_config(&self) -> SchedulerResult<SchedulerConfig> {
        let defaults = SchedulerConfig::default();
        let section = &self.scheduler;
        let config = SchedulerConfig {
            volume_topic: section
                .volume_topic
                .clone()
                .unwrap_or(defaults.volume_topic),
            default_filters: section
                .default_filters
                .clone()
                .unwrap_or(defaults.default_filters),
            service_down_time: duration_or(
                "service_down_time",
                section.service_down_time.as_deref(),
                defaults.service_down_time,
            )?,
            refresh_timeout: duration_or(
                "refresh_timeout",
                section.refresh_timeout.as_deref(),
                defaults.refresh_timeout,
            )?,
            refresh_interval: duration_or(
                "refresh_interval",
                section.refresh_interval.as_deref(),
                defaults.refresh_interval,
            )?,
        };
        if config.refresh_interval.is_zero() {
            return Err(SchedulerError::Config(
                "refresh_interval: must be greater than zero".to_string(),
            ));
        }
        Ok(config)
    }
}

fn duration_or(key: &str, raw: Option<&str>, default: Duration) -> SchedulerResult<Duration> {
    match raw {
        None => Ok(default),
        Some(s) => parse_duration(s)
            .ok_or_else(|| SchedulerError::Config(format!("{key}: invalid duration {s:?}"))),
    }
}

/// Parse `"500ms"`, `"5s"`, `"2m"`, or a bare number of seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(secs) = s.strip_suffix('s') {
        if let Some(ms) = secs.strip_suffix('m') {
            ms.parse::<u64>().ok().map(Duration::from_millis)
        } else {
            secs.parse::<u64>().ok().map(Duration::from_secs)
        }
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}
