use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{MonitorError, MonitorResult};
use crate::top::Placement;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_monitor")]
    pub monitor: MonitorConfig,

    #[serde(default)]
    pub tail: TailConfig,

    #[serde(default)]
    pub report: ReportConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_log_path")]
    pub log_path: PathBuf,

    #[serde(default = "default_alert_threshold")]
    pub alert_threshold: u64,

    #[serde(default = "default_sample_interval")]
    pub sample_interval_secs: u64,

    #[serde(default = "default_window_slots")]
    pub window_slots: usize,

    #[serde(default = "default_report_interval")]
    pub report_interval_secs: u64,

    #[serde(default = "default_alert_interval")]
    pub alert_interval_secs: u64,

    #[serde(default)]
    pub top_placement: Placement,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TailConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Read the existing contents before following new lines
    #[serde(default = "default_from_start")]
    pub from_start: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default)]
    pub format: ReportFormat,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Prometheus textfile collector target, rewritten on every report
    #[serde(default)]
    pub textfile: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json_format: bool,
}

// Default value functions
fn default_monitor() -> MonitorConfig {
    MonitorConfig {
        log_path: default_log_path(),
        alert_threshold: default_alert_threshold(),
        sample_interval_secs: default_sample_interval(),
        window_slots: default_window_slots(),
        report_interval_secs: default_report_interval(),
        alert_interval_secs: default_alert_interval(),
        top_placement: Placement::default(),
    }
}

fn default_log_path() -> PathBuf {
    PathBuf::from("access_log")
}

fn default_alert_threshold() -> u64 {
    100
}

fn default_sample_interval() -> u64 {
    2
}

fn default_window_slots() -> usize {
    60 // 60 x 2s = 2 minutes
}

fn default_report_interval() -> u64 {
    10
}

fn default_alert_interval() -> u64 {
    120
}

fn default_poll_interval() -> u64 {
    250
}

fn default_from_start() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            monitor: default_monitor(),
            tail: TailConfig::default(),
            report: ReportConfig::default(),
            metrics: MetricsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        default_monitor()
    }
}

impl Default for TailConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            from_start: default_from_start(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> MonitorResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MonitorError::ConfigError(format!("Failed to read config file: {}", e))
        })?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> MonitorResult<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| MonitorError::ConfigError(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> MonitorResult<()> {
        let m = &self.monitor;
        if m.window_slots == 0 {
            return Err(MonitorError::ConfigError(
                "window_slots must be at least 1".to_string(),
            ));
        }

        for (name, secs) in [
            ("sample_interval_secs", m.sample_interval_secs),
            ("report_interval_secs", m.report_interval_secs),
            ("alert_interval_secs", m.alert_interval_secs),
        ] {
            if secs == 0 {
                return Err(MonitorError::ConfigError(format!(
                    "{} must be greater than zero",
                    name
                )));
            }
        }

        m.window_span()?;

        if self.tail.poll_interval_ms == 0 {
            return Err(MonitorError::ConfigError(
                "poll_interval_ms must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

impl MonitorConfig {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_secs(self.sample_interval_secs)
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs)
    }

    pub fn alert_interval(&self) -> Duration {
        Duration::from_secs(self.alert_interval_secs)
    }

    /// Time span covered by the sample window. Fails when the span does
    /// not fit in a `Duration`.
    pub fn window_span(&self) -> MonitorResult<Duration> {
        u32::try_from(self.window_slots)
            .ok()
            .and_then(|slots| self.sample_interval().checked_mul(slots))
            .ok_or_else(|| {
                MonitorError::ConfigError(format!(
                    "window of {} x {}s samples is too long",
                    self.window_slots, self.sample_interval_secs
                ))
            })
    }
}

impl TailConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
