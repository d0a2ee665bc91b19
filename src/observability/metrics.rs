//! Validation performance counters
//!
//! Per-schema running totals of call count and elapsed time. A collector is owned by
//! each [`crate::validation::ValidationContext`]; there is no process-wide instance.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;

/// Thread-safe per-schema timing collector
#[derive(Debug, Default)]
pub struct ValidationMetrics {
    schema_stats: Mutex<HashMap<String, SchemaTimingStats>>,
}

impl ValidationMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or retrieve a stats entry (pure function)
    fn get_or_create_stats<'a>(
        stats: &'a mut HashMap<String, SchemaTimingStats>,
        schema: &str,
    ) -> &'a mut SchemaTimingStats {
        stats.entry(schema.to_string()).or_default()
    }

    /// Record one validation call
    pub fn record(&self, schema: &str, duration: Duration, success: bool) {
        let mut stats = self
            .schema_stats
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let entry = Self::get_or_create_stats(&mut stats, schema);
        entry.calls += 1;
        entry.total_time += duration;
        if !success {
            entry.failures += 1;
        }
    }

    /// Average time and call count for every schema seen since the last reset
    pub fn summary(&self) -> BTreeMap<String, SchemaTimingSnapshot> {
        let stats = self
            .schema_stats
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        stats
            .iter()
            .map(|(name, stats)| (name.clone(), Self::create_snapshot(stats)))
            .collect()
    }

    /// Build a snapshot from raw stats (pure function)
    fn create_snapshot(stats: &SchemaTimingStats) -> SchemaTimingSnapshot {
        let total_time_ms = stats.total_time.as_secs_f64() * 1000.0;
        let avg_time_ms = if stats.calls == 0 {
            0.0
        } else {
            total_time_ms / stats.calls as f64
        };

        SchemaTimingSnapshot {
            calls: stats.calls,
            failures: stats.failures,
            total_time_ms,
            avg_time_ms,
        }
    }

    pub fn reset(&self) {
        let mut stats = self
            .schema_stats
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        stats.clear();
    }
}

// Internal running totals
#[derive(Debug, Default)]
struct SchemaTimingStats {
    calls: u64,
    failures: u64,
    total_time: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaTimingSnapshot {
    pub calls: u64,
    pub failures: u64,
    pub total_time_ms: f64,
    pub avg_time_ms: f64,
}
