//! Live throughput and usage for one turn.

use std::time::Instant;

use inference_api::Usage;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub tokens_per_second: f64,
}

/// Derives [`Metrics`] from the events of a single turn.
///
/// Content deltas count as one token each until the server reports usage;
/// a meaningful usage frame then becomes authoritative for the rest of the
/// turn. `total_tokens` never decreases.
#[derive(Debug, Clone)]
pub struct MetricsAggregator {
    started: Instant,
    local_tokens: u64,
    server_reported: bool,
    metrics: Metrics,
}

impl MetricsAggregator {
    /// `baseline_total` is the context usage carried in from earlier turns.
    pub fn start(started: Instant, baseline_total: u64) -> Self {
        Self {
            started,
            local_tokens: 0,
            server_reported: false,
            metrics: Metrics {
                total_tokens: baseline_total,
                ..Metrics::default()
            },
        }
    }

    pub fn metrics(&self) -> Metrics {
        self.metrics
    }

    pub fn record_delta(&mut self, now: Instant) -> Metrics {
        self.local_tokens += 1;
        if self.server_reported {
            return self.metrics;
        }

        self.metrics.completion_tokens = self.local_tokens;
        self.metrics.total_tokens = self.metrics.total_tokens.saturating_add(1);
        self.metrics.tokens_per_second = self.rate(self.local_tokens, now);
        self.metrics
    }

    /// Returns true when the frame carried meaningful counts.
    pub fn record_usage(&mut self, usage: &Usage, now: Instant) -> bool {
        if !usage.is_meaningful() {
            self.metrics.total_tokens = self.metrics.total_tokens.saturating_add(1);
            return false;
        }

        self.server_reported = true;
        self.metrics.prompt_tokens = usage.prompt_tokens;
        self.metrics.completion_tokens = usage.completion_tokens;
        self.metrics.total_tokens = self.metrics.total_tokens.max(usage.total_tokens);
        self.metrics.tokens_per_second = match usage.tokens_per_second {
            Some(rate) if rate.is_finite() && rate > 0.0 => round2(rate),
            _ => self.rate(usage.completion_tokens, now),
        };
        true
    }

    fn rate(&self, tokens: u64, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(self.started).as_secs_f64();
        if elapsed <= 0.0 {
            return 0.0;
        }
        round2(tokens as f64 / elapsed)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
