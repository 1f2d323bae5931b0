//! Request/error counters backing the aggregate health metrics

use std::sync::atomic::{AtomicU64, Ordering};

/// Running request statistics recorded by the host
///
/// The health aggregator derives its error-rate and average-response-time
/// metrics from these counters. Both derivations return 0.0 when nothing has
/// been recorded yet.
#[derive(Debug, Default)]
pub struct RequestStats {
    requests: AtomicU64,
    errors: AtomicU64,
    total_response_ms: AtomicU64,
}

impl RequestStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed request
    pub fn record_request(&self, response_time_ms: u64, is_error: bool) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.total_response_ms
            .fetch_add(response_time_ms, Ordering::Relaxed);
        if is_error {
            self.errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Errors observed / requests observed
    pub fn error_rate(&self) -> f64 {
        let requests = self.requests.load(Ordering::Relaxed);
        if requests == 0 {
            return 0.0;
        }
        self.errors.load(Ordering::Relaxed) as f64 / requests as f64
    }

    /// Running average response time in milliseconds
    pub fn avg_response_time_ms(&self) -> f64 {
        let requests = self.requests.load(Ordering::Relaxed);
        if requests == 0 {
            return 0.0;
        }
        self.total_response_ms.load(Ordering::Relaxed) as f64 / requests as f64
    }

    /// Total requests recorded (for monitoring)
    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_stats_are_zero() {
        let stats = RequestStats::new();
        assert_eq!(stats.error_rate(), 0.0);
        assert_eq!(stats.avg_response_time_ms(), 0.0);
        assert_eq!(stats.request_count(), 0);
    }

    #[test]
    fn test_error_rate() {
        let stats = RequestStats::new();
        stats.record_request(100, false);
        stats.record_request(200, true);
        stats.record_request(300, false);
        stats.record_request(400, true);

        assert_eq!(stats.error_rate(), 0.5);
        assert_eq!(stats.avg_response_time_ms(), 250.0);
        assert_eq!(stats.request_count(), 4);
    }
}
