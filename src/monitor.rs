//! Traffic monitor orchestration
//!
//! Owns the shared state and drives it from two directions: the ingestion
//! loop feeding log lines in arrival order, and three independent periodic
//! tasks (sampling, reporting and alert evaluation).

use chrono::Local;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::alert::{AlertEvaluator, AlertLog, AlertRecord};
use crate::classifier::Classifier;
use crate::config::MonitorConfig;
use crate::error::{MonitorError, MonitorResult};
use crate::hits::SectionHits;
use crate::metrics::Metrics;
use crate::report::{ReportSink, ReportSnapshot};
use crate::stats::TrafficStats;

pub struct Monitor {
    classifier: Classifier,
    hits: SectionHits,
    stats: TrafficStats,
    alerts: AlertEvaluator,
    metrics: Metrics,
    window_span: Duration,
}

impl Monitor {
    /// Fails on a window configuration that `Config::validate` would reject
    pub fn new(config: &MonitorConfig) -> MonitorResult<Self> {
        if config.window_slots == 0 {
            return Err(MonitorError::ConfigError(
                "window_slots must be at least 1".to_string(),
            ));
        }
        let window_span = config.window_span()?;

        Ok(Self {
            classifier: Classifier::new(),
            hits: SectionHits::new(),
            stats: TrafficStats::new(config.window_slots, config.top_placement),
            alerts: AlertEvaluator::new(config.alert_threshold, Arc::new(AlertLog::new())),
            metrics: Metrics::new()?,
            window_span,
        })
    }

    /// Classifies one raw line and updates the counters. Returns the new hit
    /// count of the line's section, or `None` for skipped lines.
    pub fn ingest(&self, line: &str) -> Option<u64> {
        let Some(section) = self.classifier.classify(line) else {
            self.metrics.record_line(false);
            return None;
        };

        let section_hits = self.hits.increment(section);
        self.stats.record_hit(section, section_hits);
        self.metrics.record_line(true);
        Some(section_hits)
    }

    /// Folds the hits of the elapsed interval into the sample window
    pub fn sample(&self) -> u64 {
        let interval_hits = self.stats.sample();
        self.metrics.set_window_average(self.stats.window_average());
        interval_hits
    }

    pub fn evaluate_alerts(&self) -> Option<AlertRecord> {
        let average = self.stats.window_average();
        let record = self.alerts.evaluate(average)?;
        self.metrics.record_alert(record.kind);
        Some(record)
    }

    pub fn snapshot(&self) -> ReportSnapshot {
        let counters = self.stats.snapshot();
        let sections = self.hits.len();
        self.metrics.set_sections(sections);

        ReportSnapshot {
            total_hits: counters.total_hits,
            window_average: self.stats.window_average(),
            top: counters.top.to_vec(),
            alerts: self.alerts.log().messages(),
            sections,
            window_span_secs: self.window_span.as_secs(),
            generated_at: Local::now(),
        }
    }

    pub fn hits(&self) -> &SectionHits {
        &self.hits
    }

    pub fn stats(&self) -> &TrafficStats {
        &self.stats
    }

    pub fn alerts(&self) -> &AlertEvaluator {
        &self.alerts
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}

/// Consumes lines in arrival order until the stream ends
pub async fn run_ingest(monitor: Arc<Monitor>, mut lines: mpsc::Receiver<String>) -> u64 {
    let mut processed = 0u64;
    while let Some(line) = lines.recv().await {
        monitor.ingest(&line);
        processed += 1;
    }

    info!(lines = processed, "Log stream ended");
    processed
}

/// Report destinations for the reporting task
pub struct ReportOutputs {
    pub sink: Arc<dyn ReportSink>,
    pub metrics_textfile: Option<PathBuf>,
}

/// Spawns the sampling, reporting and alert evaluation tasks.
///
/// Reporting and alert evaluation run once immediately; sampling first runs
/// after one full interval. All tasks stop when `shutdown` turns true.
pub fn spawn_periodic_tasks(
    monitor: Arc<Monitor>,
    config: &MonitorConfig,
    outputs: ReportOutputs,
    shutdown: watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    let sampler = {
        let monitor = Arc::clone(&monitor);
        spawn_periodic(
            "sample",
            config.sample_interval(),
            false,
            shutdown.clone(),
            move || {
                let interval_hits = monitor.sample();
                debug!(interval_hits, "Sampled traffic");
                async {}
            },
        )
    };

    let reporter = {
        let monitor = Arc::clone(&monitor);
        let sink = outputs.sink;
        let textfile = outputs.metrics_textfile;
        spawn_periodic(
            "report",
            config.report_interval(),
            true,
            shutdown.clone(),
            move || {
                let monitor = Arc::clone(&monitor);
                let sink = Arc::clone(&sink);
                let textfile = textfile.clone();
                async move {
                    // The snapshot copies everything out before any I/O
                    let report = monitor.snapshot();
                    sink.emit(&report);

                    if let Some(path) = textfile {
                        if let Err(e) = monitor.metrics().write_textfile(&path).await {
                            warn!(path = %path.display(), error = %e, "Failed to write metrics textfile");
                        }
                    }
                }
            },
        )
    };

    let alerter = {
        let monitor = Arc::clone(&monitor);
        spawn_periodic(
            "alert",
            config.alert_interval(),
            true,
            shutdown,
            move || {
                monitor.evaluate_alerts();
                async {}
            },
        )
    };

    vec![sampler, reporter, alerter]
}

fn spawn_periodic<F, Fut>(
    task: &'static str,
    period: Duration,
    run_immediately: bool,
    mut shutdown: watch::Receiver<bool>,
    mut run: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        info!(task, period_ms = period.as_millis() as u64, "Starting periodic task");

        let start = if run_immediately {
            Instant::now()
        } else {
            Instant::now() + period
        };
        let mut timer = tokio::time::interval_at(start, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = timer.tick() => run().await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!(task, "Stopping periodic task");
                        break;
                    }
                }
            }
        }
    })
}
