use prometheus::{CounterVec, Encoder, Gauge, IntGauge, Opts, Registry, TextEncoder};
use std::path::Path;

use crate::alert::AlertKind;
use crate::error::MonitorResult;

pub struct Metrics {
    registry: Registry,
    lines_total: CounterVec,
    alerts_total: CounterVec,
    window_average: Gauge,
    sections: IntGauge,
}

impl Metrics {
    pub fn new() -> MonitorResult<Self> {
        let registry = Registry::new();

        // Lines read from the log, by classification outcome
        let lines_total = CounterVec::new(
            Opts::new("monitor_lines_total", "Total log lines processed"),
            &["outcome"],
        )?;

        let alerts_total = CounterVec::new(
            Opts::new("monitor_alerts_total", "Total high traffic alert transitions"),
            &["kind"],
        )?;

        let window_average = Gauge::new(
            "monitor_window_average",
            "Average hits per sample over the rolling window",
        )?;

        let sections = IntGauge::new("monitor_sections", "Distinct sections seen")?;

        registry.register(Box::new(lines_total.clone()))?;
        registry.register(Box::new(alerts_total.clone()))?;
        registry.register(Box::new(window_average.clone()))?;
        registry.register(Box::new(sections.clone()))?;

        Ok(Self {
            registry,
            lines_total,
            alerts_total,
            window_average,
            sections,
        })
    }

    pub fn record_line(&self, classified: bool) {
        let outcome = if classified { "classified" } else { "skipped" };
        self.lines_total.with_label_values(&[outcome]).inc();
    }

    pub fn record_alert(&self, kind: AlertKind) {
        self.alerts_total.with_label_values(&[kind.as_str()]).inc();
    }

    pub fn set_window_average(&self, average: f64) {
        self.window_average.set(average);
    }

    pub fn set_sections(&self, sections: usize) {
        self.sections.set(sections as i64);
    }

    pub fn lines(&self, classified: bool) -> u64 {
        let outcome = if classified { "classified" } else { "skipped" };
        self.lines_total.with_label_values(&[outcome]).get() as u64
    }

    pub fn gather(&self) -> MonitorResult<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    /// Writes the exposition for a textfile collector. The file is replaced
    /// atomically so scrapers never read a partial write.
    pub async fn write_textfile(&self, path: &Path) -> MonitorResult<()> {
        let body = self.gather()?;
        let tmp = path.with_extension("prom.tmp");
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}
