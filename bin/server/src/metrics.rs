//! Request counters and their text exposition.

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::state::AppState;

const CLASSES: [&str; 5] = ["1xx", "2xx", "3xx", "4xx", "5xx"];

/// Counters updated by the request logging layer.
#[derive(Debug, Default)]
pub struct RequestMetrics {
    by_class: [AtomicU64; 5],
    duration_micros: AtomicU64,
}

impl RequestMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one completed request.
    pub fn record(&self, status: StatusCode, elapsed: Duration) {
        let class = usize::from(status.as_u16() / 100).clamp(1, 5) - 1;
        self.by_class[class].fetch_add(1, Ordering::Relaxed);
        self.duration_micros
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    /// Requests recorded for a status class such as `"2xx"`.
    #[must_use]
    pub fn count(&self, class: &str) -> u64 {
        CLASSES
            .iter()
            .position(|c| *c == class)
            .map_or(0, |i| self.by_class[i].load(Ordering::Relaxed))
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.by_class
            .iter()
            .map(|c| c.load(Ordering::Relaxed))
            .sum()
    }

    /// Renders the counters in the Prometheus text format.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "# HELP frontgate_http_requests_total Functional requests served, by status class."
        );
        let _ = writeln!(out, "# TYPE frontgate_http_requests_total counter");
        for (class, counter) in CLASSES.iter().zip(&self.by_class) {
            let _ = writeln!(
                out,
                "frontgate_http_requests_total{{class=\"{class}\"}} {}",
                counter.load(Ordering::Relaxed)
            );
        }
        let seconds = self.duration_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0;
        let _ = writeln!(
            out,
            "# HELP frontgate_http_request_duration_seconds Time spent serving functional requests."
        );
        let _ = writeln!(out, "# TYPE frontgate_http_request_duration_seconds summary");
        let _ = writeln!(out, "frontgate_http_request_duration_seconds_sum {seconds}");
        let _ = writeln!(
            out,
            "frontgate_http_request_duration_seconds_count {}",
            self.total()
        );
        out
    }
}

/// `GET {non_functional_root}/metrics`
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_by_status_class() {
        let metrics = RequestMetrics::new();
        metrics.record(StatusCode::OK, Duration::from_millis(10));
        metrics.record(StatusCode::CREATED, Duration::from_millis(10));
        metrics.record(StatusCode::NOT_FOUND, Duration::from_millis(5));
        metrics.record(StatusCode::INTERNAL_SERVER_ERROR, Duration::from_millis(5));

        assert_eq!(metrics.count("2xx"), 2);
        assert_eq!(metrics.count("4xx"), 1);
        assert_eq!(metrics.count("5xx"), 1);
        assert_eq!(metrics.count("bogus"), 0);
        assert_eq!(metrics.total(), 4);
    }

    #[test]
    fn renders_text_exposition() {
        let metrics = RequestMetrics::new();
        metrics.record(StatusCode::FOUND, Duration::from_millis(500));

        let text = metrics.render();
        assert!(text.contains("# TYPE frontgate_http_requests_total counter"));
        assert!(text.contains("frontgate_http_requests_total{class=\"3xx\"} 1"));
        assert!(text.contains("frontgate_http_requests_total{class=\"2xx\"} 0"));
        assert!(text.contains("frontgate_http_request_duration_seconds_sum 0.5"));
        assert!(text.contains("frontgate_http_request_duration_seconds_count 1"));
    }
}
