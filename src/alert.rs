//! High traffic alerting
//!
//! A two-state hysteresis machine over the rolling window average. Every
//! transition appends a record to the alert log, which is kept for the whole
//! run so past alerts stay visible in the report.

use chrono::{DateTime, Local};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Same layout as `date(1)` output, e.g. `Wed Feb 24 21:41:00 +01:00 2016`
pub const TIMESTAMP_FORMAT: &str = "%a %b %e %H:%M:%S %Z %Y";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    /// Traffic at or below the threshold
    Normal,
    /// Traffic above the threshold, waiting for recovery
    Alerting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Triggered,
    Recovered,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::Triggered => "triggered",
            AlertKind::Recovered => "recovered",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AlertRecord {
    pub kind: AlertKind,
    pub average: f64,
    pub at: DateTime<Local>,
    pub message: String,
}

impl AlertRecord {
    pub fn triggered(average: f64, at: DateTime<Local>) -> Self {
        Self {
            kind: AlertKind::Triggered,
            average,
            at,
            message: format!(
                "High traffic generated an alert - hits = {:.2}, triggered at {}",
                average,
                at.format(TIMESTAMP_FORMAT)
            ),
        }
    }

    pub fn recovered(average: f64, at: DateTime<Local>) -> Self {
        Self {
            kind: AlertKind::Recovered,
            average,
            at,
            message: format!(
                "High traffic alert recovered, triggered at {}",
                at.format(TIMESTAMP_FORMAT)
            ),
        }
    }
}

impl fmt::Display for AlertRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Append-only history of alert transitions
#[derive(Debug, Default)]
pub struct AlertLog {
    records: RwLock<Vec<AlertRecord>>,
}

impl AlertLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn append(&self, record: AlertRecord) {
        self.records.write().push(record);
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Messages in the order they were raised
    pub fn messages(&self) -> Vec<String> {
        self.records
            .read()
            .iter()
            .map(|record| record.message.clone())
            .collect()
    }

    pub fn records(&self) -> Vec<AlertRecord> {
        self.records.read().clone()
    }
}

pub struct AlertEvaluator {
    threshold: u64,
    status: Mutex<AlertStatus>,
    log: Arc<AlertLog>,
}

impl AlertEvaluator {
    pub fn new(threshold: u64, log: Arc<AlertLog>) -> Self {
        Self {
            threshold,
            status: Mutex::new(AlertStatus::Normal),
            log,
        }
    }

    pub fn status(&self) -> AlertStatus {
        *self.status.lock()
    }

    pub fn log(&self) -> &Arc<AlertLog> {
        &self.log
    }

    /// Evaluates the window average now. See [`AlertEvaluator::evaluate_at`].
    pub fn evaluate(&self, average: f64) -> Option<AlertRecord> {
        self.evaluate_at(average, Local::now())
    }

    /// Compares the truncated average against the threshold and returns the
    /// record appended on a transition. Re-evaluating in the same condition
    /// appends nothing.
    pub fn evaluate_at(&self, average: f64, at: DateTime<Local>) -> Option<AlertRecord> {
        // Truncates toward zero; averages are never negative
        let above = average as u64 > self.threshold;

        let record = {
            let mut status = self.status.lock();
            let record = match (*status, above) {
                (AlertStatus::Normal, true) => {
                    *status = AlertStatus::Alerting;
                    AlertRecord::triggered(average, at)
                }
                (AlertStatus::Alerting, false) => {
                    *status = AlertStatus::Normal;
                    AlertRecord::recovered(average, at)
                }
                _ => return None,
            };
            // History order must match transition order
            self.log.append(record.clone());
            record
        };

        match record.kind {
            AlertKind::Triggered => warn!(
                average = average,
                threshold = self.threshold,
                "High traffic alert triggered"
            ),
            AlertKind::Recovered => info!(
                average = average,
                threshold = self.threshold,
                "High traffic alert recovered"
            ),
        }
        Some(record)
    }
}
