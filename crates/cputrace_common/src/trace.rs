//! Trace data model.
//!
//! A trace is one uploaded capture of a single process: identifying
//! metadata plus the ordered sequence of resource samples the agent
//! recorded. The stored form (`TraceRecord`) carries the ingestion-time
//! summary so list views never recompute it.

use serde::{Deserialize, Serialize};

use crate::stats::TraceSummary;

/// One timestamped resource-usage observation.
///
/// `t` is elapsed seconds since trace start. Ordering across a trace is
/// whatever the agent wrote; the ingestor preserves it without sorting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub t: f64,
    pub cpu_pct: f64,
    pub rss_kb: u64,
    pub threads: u32,
}

/// Process metadata carried in an uploaded payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceMeta {
    pub process_name: String,
    pub pid: u32,
}

/// A fully parsed upload: identity, metadata, and the validated samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TracePayload {
    pub session_id: String,
    pub meta: TraceMeta,
    pub duration_sec: u64,
    pub start_time: String,
    pub samples: Vec<Sample>,
}

/// A stored trace row: identity, metadata, and the summary computed when
/// the trace was ingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRecord {
    pub id: i64,
    pub session_id: String,
    pub process_name: String,
    pub pid: u32,
    pub duration_sec: u64,
    pub start_time: String,
    pub cpu_avg: f64,
    pub cpu_max: f64,
    pub sample_count: usize,
    pub created_at: String,
}

impl TraceRecord {
    /// The summary as computed at ingestion time.
    pub fn summary(&self) -> TraceSummary {
        TraceSummary {
            cpu_avg: self.cpu_avg,
            cpu_max: self.cpu_max,
            sample_count: self.sample_count,
        }
    }
}
