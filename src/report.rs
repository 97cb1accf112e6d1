use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt::Write as _;
use std::io::Write as _;
use tokio::sync::mpsc;

use crate::config::ReportFormat;
use crate::top::HitRecord;

/// Periodic view of the monitor handed to the presentation layer
#[derive(Debug, Clone, Serialize)]
pub struct ReportSnapshot {
    pub total_hits: u64,
    pub window_average: f64,
    /// Top slots in slot order, unfilled slots included
    pub top: Vec<HitRecord>,
    /// Full alert history, oldest first
    pub alerts: Vec<String>,
    pub sections: usize,
    pub window_span_secs: u64,
    pub generated_at: DateTime<Local>,
}

impl ReportSnapshot {
    pub fn render(&self, format: ReportFormat) -> String {
        match format {
            ReportFormat::Text => self.render_text(),
            ReportFormat::Json => self.render_json(),
        }
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Total hits: {}, Avg hits over last {}: {:.2}",
            self.total_hits,
            format_span(self.window_span_secs),
            self.window_average
        );

        for (i, record) in self.top.iter().enumerate() {
            let section = if record.section.is_empty() {
                "-"
            } else {
                record.section.as_str()
            };
            let _ = writeln!(out, "Top {} hit: {}, {} hits", i + 1, section, record.hits);
        }

        out.push_str("Alerts:\n");
        for alert in &self.alerts {
            out.push_str(alert);
            out.push('\n');
        }
        out
    }

    pub fn render_json(&self) -> String {
        // Plain data, serialization cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Presentation layer receiving each periodic report
pub trait ReportSink: Send + Sync {
    fn emit(&self, report: &ReportSnapshot);
}

/// Prints reports to stdout
pub struct ConsoleSink {
    format: ReportFormat,
}

impl ConsoleSink {
    pub fn new(format: ReportFormat) -> Self {
        Self { format }
    }
}

impl ReportSink for ConsoleSink {
    fn emit(&self, report: &ReportSnapshot) {
        let mut stdout = std::io::stdout().lock();
        let _ = writeln!(stdout, "{}", report.render(self.format));
        let _ = stdout.flush();
    }
}

impl ReportSink for mpsc::UnboundedSender<ReportSnapshot> {
    fn emit(&self, report: &ReportSnapshot) {
        let _ = self.send(report.clone());
    }
}

fn format_span(secs: u64) -> String {
    if secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}
