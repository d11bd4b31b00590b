//! CPUTrace Common Library
//!
//! Shared data model, trace analytics, and wire protocol for the CPUTrace
//! components (cputraced, cputracectl). The analytics are pure functions of
//! a trace's sample sequence: the same input always produces the same
//! summary and detailed statistics, and nothing is shared between calls, so
//! different traces may be processed concurrently.

pub mod ingest;
pub mod rpc;
pub mod stats;
pub mod trace;

pub use ingest::{ingest_samples, parse_payload, parse_sample, IngestError, SampleParse};
pub use stats::{DetailedStats, Severity, StatsConfig, TraceSummary};
pub use trace::{Sample, TraceMeta, TracePayload, TraceRecord};
