//! Metrics service for performance monitoring

use crate::types::Termination;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

pub struct MetricsService {
    tokens_generated: AtomicUsize,
    requests_processed: AtomicUsize,
    requests_failed: AtomicUsize,
    requests_cancelled: AtomicUsize,
    requests_abandoned: AtomicUsize,
    total_latency_ms: AtomicU64,
    start_time: Instant,
}

impl Default for MetricsService {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsService {
    pub fn new() -> Self {
        Self {
            tokens_generated: AtomicUsize::new(0),
            requests_processed: AtomicUsize::new(0),
            requests_failed: AtomicUsize::new(0),
            requests_cancelled: AtomicUsize::new(0),
            requests_abandoned: AtomicUsize::new(0),
            total_latency_ms: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_tokens(&self, count: usize) {
        self.tokens_generated.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_request(&self, latency_ms: u64, termination: Option<&Termination>) {
        self.requests_processed.fetch_add(1, Ordering::Relaxed);
        self.total_latency_ms.fetch_add(latency_ms, Ordering::Relaxed);
        match termination {
            Some(Termination::Failed(_)) => {
                self.requests_failed.fetch_add(1, Ordering::Relaxed);
            }
            Some(Termination::Cancelled) => {
                self.requests_cancelled.fetch_add(1, Ordering::Relaxed);
            }
            // no termination seen: the client went away first
            None => {
                self.requests_abandoned.fetch_add(1, Ordering::Relaxed);
            }
            Some(Termination::Completed) => {}
        }
    }

    pub fn get_stats(&self) -> MetricsStats {
        let tokens = self.tokens_generated.load(Ordering::Relaxed);
        let requests = self.requests_processed.load(Ordering::Relaxed);
        let total_latency = self.total_latency_ms.load(Ordering::Relaxed);
        let uptime_secs = self.start_time.elapsed().as_secs();

        MetricsStats {
            tokens_generated: tokens,
            requests_processed: requests,
            requests_failed: self.requests_failed.load(Ordering::Relaxed),
            requests_cancelled: self.requests_cancelled.load(Ordering::Relaxed),
            requests_abandoned: self.requests_abandoned.load(Ordering::Relaxed),
            avg_latency_ms: if requests > 0 { total_latency / requests as u64 } else { 0 },
            tokens_per_second: if uptime_secs > 0 { tokens as f64 / uptime_secs as f64 } else { 0.0 },
            uptime_seconds: uptime_secs,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsStats {
    pub tokens_generated: usize,
    pub requests_processed: usize,
    pub requests_failed: usize,
    pub requests_cancelled: usize,
    pub requests_abandoned: usize,
    pub avg_latency_ms: u64,
    pub tokens_per_second: f64,
    pub uptime_seconds: u64,
}
