//! Run summary output: one JSON line for runners, one markdown section for
//! humans.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use serde::Serialize;
use tracing::warn;

use crate::metrics::{
    MetricsSink, SeriesSummary, CACHE_HITS, ERRORS, MS_CACHE, MS_CACHE_RATIO, RESPONSE_CACHED,
};

/// Section title in the results markdown
pub const RESULTS_SECTION: &str = "Checkout Funnel";

/// JSON result of one load-test run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub test: String,
    pub users: usize,
    pub iterations: usize,
    pub orders: usize,
    pub errors: usize,
    /// Completed iterations per second
    pub throughput: f64,
    #[serde(rename = "errorRate")]
    pub error_rate: f64,
    #[serde(rename = "cacheHitRate")]
    pub cache_hit_rate: f64,
    #[serde(rename = "durationSecs")]
    pub duration_secs: f64,
    pub metrics: Vec<SeriesSummary>,
    pub summary: String,
}

impl RunReport {
    pub fn from_sink(test: &str, users: usize, duration_secs: f64, sink: &MetricsSink) -> Self {
        let iterations = sink.count(ERRORS);
        let errors = sink.sum(ERRORS) as usize;
        let orders = iterations.saturating_sub(errors);
        let rate = |name: &str| sink.summary(name).and_then(|s| s.rate).unwrap_or(0.0);
        let error_rate = rate(ERRORS);
        let cache_hit_rate = rate(RESPONSE_CACHED);
        let throughput = if duration_secs > 0.0 {
            orders as f64 / duration_secs
        } else {
            0.0
        };

        let summary = format!(
            "{orders} orders / {iterations} iterations ({throughput:.2}/s), errors={:.1}%, cached={:.1}%",
            error_rate * 100.0,
            cache_hit_rate * 100.0
        );

        Self {
            test: test.to_string(),
            users,
            iterations,
            orders,
            errors,
            throughput,
            error_rate,
            cache_hit_rate,
            duration_secs,
            metrics: sink.summaries(),
            summary,
        }
    }

    /// Print the JSON line and copy it to `result_file` when given.
    pub fn emit(&self, result_file: Option<&Path>) {
        let json = match serde_json::to_string(self) {
            Ok(json) => json,
            Err(error) => {
                warn!(%error, "failed to serialize run report");
                return;
            }
        };
        // Runners read the file; stdout may be interleaved with Goose output
        if let Some(path) = result_file {
            if let Err(error) = fs::write(path, &json) {
                warn!(path = %path.display(), %error, "failed to write result file");
            }
        }
        println!("{json}");
    }

    /// Markdown body for the results section.
    pub fn markdown(&self) -> String {
        let mut out = format!(
            "\n**Users**: {} | **Iterations**: {} | **Duration**: {:.1}s\n\n\
             | Orders | Errors | Error rate | Cached responses |\n\
             |--------|--------|------------|------------------|\n\
             | {} | {} | {:.1}% | {:.1}% |\n\n",
            self.users,
            self.iterations,
            self.duration_secs,
            self.orders,
            self.errors,
            self.error_rate * 100.0,
            self.cache_hit_rate * 100.0,
        );

        let cache_rows: Vec<&SeriesSummary> = self
            .metrics
            .iter()
            .filter(|s| [CACHE_HITS, MS_CACHE, MS_CACHE_RATIO].contains(&s.name.as_str()))
            .filter(|s| s.count > 0)
            .collect();
        if !cache_rows.is_empty() {
            out.push_str("| Metric | avg | p50 | p95 | max |\n|--------|-----|-----|-----|-----|\n");
            for series in cache_rows {
                out.push_str(&format!(
                    "| {} | {:.2} | {:.2} | {:.2} | {:.2} |\n",
                    series.name,
                    series.avg.unwrap_or_default(),
                    series.p50.unwrap_or_default(),
                    series.p95.unwrap_or_default(),
                    series.max.unwrap_or_default(),
                ));
            }
            out.push('\n');
        }
        out
    }
}

/// Replace the `## {title}` section of a markdown file, or append it.
/// Creates the file with a header when missing.
pub fn update_section(path: &Path, title: &str, content: &str) -> io::Result<()> {
    if !path.exists() {
        let header = format!(
            "# Checkout Load Test Results\n\n\
             **Test Date**: {}\n\
             **Load Tester**: Goose (Rust-based)\n\n\
             ---\n\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M")
        );
        fs::write(path, header)?;
    }

    let existing = fs::read_to_string(path)?;
    let marker = format!("## {title}");

    let Some(start) = find_heading(&existing, &marker) else {
        let mut file = OpenOptions::new().append(true).open(path)?;
        writeln!(file, "{marker}")?;
        writeln!(file, "{content}")?;
        return Ok(());
    };

    let after = start + marker.len();
    let end = existing[after..]
        .find("\n## ")
        .map_or(existing.len(), |next| after + next);

    let mut updated = String::with_capacity(existing.len() + content.len());
    updated.push_str(&existing[..start]);
    updated.push_str(&marker);
    updated.push('\n');
    updated.push_str(content);
    updated.push_str(&existing[end..]);
    fs::write(path, updated)
}

/// Byte offset of `heading` when it stands alone on a line.
fn find_heading(text: &str, heading: &str) -> Option<usize> {
    text.match_indices(heading).map(|(at, _)| at).find(|&at| {
        let rest = &text[at + heading.len()..];
        (at == 0 || text[..at].ends_with('\n'))
            && (rest.is_empty() || rest.starts_with('\n') || rest.starts_with("\r\n"))
    })
}
