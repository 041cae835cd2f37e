//! # Statistics Module
//!
//! Collects and stores metrics about an engine's crawl activity.
//!
//! ## Overview
//!
//! `EngineStats` tracks the counters that matter for monitoring a spider:
//! crawl ticks, dispatched and settled requests, pruned seeds, stored
//! records, and served exports. Updates use atomic operations so request
//! tasks and the engine loop can report concurrently; reads never block.
//!
//! A handle to the collector is available from `Engine::stats` for the
//! whole life of the engine, including after it has stopped.
//!
//! ## Example
//!
//! ```rust,ignore
//! let stats = engine.stats();
//! println!("{}", stats);
//! println!("{}", stats.to_json_string_pretty()?);
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crate::error::ScrapexError;

// A consistent point-in-time view, shared by the presentation methods.
struct StatsSnapshot {
    crawls_started: usize,
    requests_dispatched: usize,
    requests_completed: usize,
    requests_failed: usize,
    urls_pruned: usize,
    records_stored: usize,
    exports_served: usize,
    elapsed: Duration,
}

impl StatsSnapshot {
    fn requests_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.requests_dispatched as f64 / secs
        } else {
            0.0
        }
    }
}

/// Atomic counters describing an engine's activity.
#[derive(Debug, serde::Serialize)]
pub struct EngineStats {
    #[serde(skip)]
    start_time: Instant,

    /// Crawl ticks that began dispatching requests.
    pub crawls_started: AtomicUsize,
    /// Top-level requests handed to the fetcher.
    pub requests_dispatched: AtomicUsize,
    /// Top-level completions merged into the result table.
    pub requests_completed: AtomicUsize,
    /// Requests degraded to an empty result after an error.
    pub requests_failed: AtomicUsize,
    /// Seeds removed after a 404.
    pub urls_pruned: AtomicUsize,
    /// Records written into result slots, cumulative.
    pub records_stored: AtomicUsize,
    /// Export RPCs answered.
    pub exports_served: AtomicUsize,
}

impl EngineStats {
    pub(crate) fn new() -> Self {
        EngineStats {
            start_time: Instant::now(),
            crawls_started: AtomicUsize::new(0),
            requests_dispatched: AtomicUsize::new(0),
            requests_completed: AtomicUsize::new(0),
            requests_failed: AtomicUsize::new(0),
            urls_pruned: AtomicUsize::new(0),
            records_stored: AtomicUsize::new(0),
            exports_served: AtomicUsize::new(0),
        }
    }

    fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            crawls_started: self.crawls_started.load(Ordering::SeqCst),
            requests_dispatched: self.requests_dispatched.load(Ordering::SeqCst),
            requests_completed: self.requests_completed.load(Ordering::SeqCst),
            requests_failed: self.requests_failed.load(Ordering::SeqCst),
            urls_pruned: self.urls_pruned.load(Ordering::SeqCst),
            records_stored: self.records_stored.load(Ordering::SeqCst),
            exports_served: self.exports_served.load(Ordering::SeqCst),
            elapsed: self.start_time.elapsed(),
        }
    }

    pub(crate) fn increment_crawls_started(&self) {
        self.crawls_started.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn increment_requests_dispatched(&self) {
        self.requests_dispatched.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn increment_requests_completed(&self) {
        self.requests_completed.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn increment_requests_failed(&self) {
        self.requests_failed.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn increment_urls_pruned(&self) {
        self.urls_pruned.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn add_records_stored(&self, count: usize) {
        self.records_stored.fetch_add(count, Ordering::SeqCst);
    }

    pub(crate) fn increment_exports_served(&self) {
        self.exports_served.fetch_add(1, Ordering::SeqCst);
    }

    /// Renders the counters as a JSON object.
    pub fn to_json_string(&self) -> Result<String, ScrapexError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Renders the counters as pretty-printed JSON.
    pub fn to_json_string_pretty(&self) -> Result<String, ScrapexError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Default for EngineStats {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EngineStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.snapshot();

        writeln!(f, "\nCrawl Statistics")?;
        writeln!(f, "----------------")?;
        writeln!(f, "  duration : {:?}", snapshot.elapsed)?;
        writeln!(f, "  speed    : {:.2} req/s", snapshot.requests_per_second())?;
        writeln!(f, "  crawls   : {}", snapshot.crawls_started)?;
        writeln!(
            f,
            "  requests : dispatched: {}, completed: {}, failed: {}",
            snapshot.requests_dispatched, snapshot.requests_completed, snapshot.requests_failed
        )?;
        writeln!(
            f,
            "  results  : records: {}, pruned seeds: {}, exports: {}",
            snapshot.records_stored, snapshot.urls_pruned, snapshot.exports_served
        )
    }
}
