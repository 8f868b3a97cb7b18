

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;


const WINDOW_SIZE: usize = 100;

const P95_MIN_SAMPLES: usize = 20;


#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PerformanceSnapshot {
    pub total_requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_hit_rate: f64,
    pub avg_search_time_ms: f64,
    pub avg_llm_time_ms: f64,
    pub p95_search_time_ms: f64,
    pub p95_llm_time_ms: f64,
    pub started_at: DateTime<Utc>,
}


/// Request counters and rolling latency windows, shared by handle.
pub struct PerformanceTracker {
    search_times: Mutex<VecDeque<f64>>,
    llm_times: Mutex<VecDeque<f64>>,
    total_requests: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    started_at: DateTime<Utc>,
}

impl PerformanceTracker {
    pub fn new() -> Self {
        Self {
            search_times: Mutex::new(VecDeque::with_capacity(WINDOW_SIZE)),
            llm_times: Mutex::new(VecDeque::with_capacity(WINDOW_SIZE)),
            total_requests: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            started_at: Utc::now(),
        }
    }

    fn push(window: &Mutex<VecDeque<f64>>, elapsed: Duration) {
        let mut window = window.lock();
        window.push_back(elapsed.as_secs_f64());
        if window.len() > WINDOW_SIZE {
            window.pop_front();
        }
    }

    pub fn record_search_time(&self, elapsed: Duration) {
        Self::push(&self.search_times, elapsed);
    }

    pub fn record_llm_time(&self, elapsed: Duration) {
        Self::push(&self.llm_times, elapsed);
    }

    pub fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    fn average_ms(window: &VecDeque<f64>) -> f64 {
        if window.is_empty() {
            return 0.0;
        }
        window.iter().sum::<f64>() / window.len() as f64 * 1000.0
    }

    fn p95_ms(window: &VecDeque<f64>) -> f64 {
        if window.len() <= P95_MIN_SAMPLES {
            return 0.0;
        }
        let mut sorted: Vec<f64> = window.iter().copied().collect();
        sorted.sort_by(f64::total_cmp);
        let index = ((sorted.len() as f64) * 0.95) as usize;
        sorted[index.min(sorted.len() - 1)] * 1000.0
    }


    pub fn snapshot(&self) -> PerformanceSnapshot {
        let hits = self.cache_hits.load(Ordering::Relaxed);
        let misses = self.cache_misses.load(Ordering::Relaxed);
        let lookups = hits + misses;

        let search_times = self.search_times.lock();
        let llm_times = self.llm_times.lock();

        PerformanceSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            cache_hits: hits,
            cache_misses: misses,
            cache_hit_rate: if lookups > 0 { hits as f64 / lookups as f64 } else { 0.0 },
            avg_search_time_ms: Self::average_ms(&search_times),
            avg_llm_time_ms: Self::average_ms(&llm_times),
            p95_search_time_ms: Self::p95_ms(&search_times),
            p95_llm_time_ms: Self::p95_ms(&llm_times),
            started_at: self.started_at,
        }
    }
}

impl Default for PerformanceTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_snapshot() {
        let tracker = PerformanceTracker::new();
        let snap = tracker.snapshot();
        assert_eq!(snap.total_requests, 0);
        assert_eq!(snap.cache_hit_rate, 0.0);
        assert_eq!(snap.avg_search_time_ms, 0.0);
        assert_eq!(snap.p95_search_time_ms, 0.0);
    }

    #[test]
    fn test_hit_rate() {
        let tracker = PerformanceTracker::new();
        tracker.record_cache_hit();
        tracker.record_cache_miss();
        tracker.record_cache_miss();
        tracker.record_cache_miss();
        assert!((tracker.snapshot().cache_hit_rate - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_window_is_bounded() {
        let tracker = PerformanceTracker::new();
        for _ in 0..150 {
            tracker.record_search_time(Duration::from_millis(10));
        }
        assert_eq!(tracker.search_times.lock().len(), WINDOW_SIZE);
    }

    #[test]
    fn test_p95_needs_enough_samples() {
        let tracker = PerformanceTracker::new();
        for ms in 1..=20 {
            tracker.record_llm_time(Duration::from_millis(ms));
        }
        assert_eq!(tracker.snapshot().p95_llm_time_ms, 0.0);

        tracker.record_llm_time(Duration::from_millis(21));
        let snap = tracker.snapshot();
        // 21 samples: index floor(21 * 0.95) = 19 -> 20ms
        assert!((snap.p95_llm_time_ms - 20.0).abs() < 1e-6);
        assert!((snap.avg_llm_time_ms - 11.0).abs() < 1e-6);
    }
}
