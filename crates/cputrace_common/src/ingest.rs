//! Sample Ingestor: turns an untrusted decoded upload into a validated
//! `TracePayload`.
//!
//! Validation happens at two levels. The payload itself must be a JSON
//! object carrying a `session_id` and a `metadata` block; anything else is
//! a structural failure and the whole trace is rejected. Individual sample
//! records are parsed into an explicit `Valid`/`Invalid` outcome, and
//! invalid ones are dropped with a debug log line so a few corrupt rows
//! never sink an upload.

use std::fmt;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::trace::{Sample, TraceMeta, TracePayload};

/// Structural failures that reject the whole trace.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IngestError {
    #[error("trace payload is not a JSON object")]
    NotAnObject,
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("field `{0}` has the wrong type")]
    WrongType(&'static str),
}

/// Why a single sample record was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    NotAnObject,
    MissingField(&'static str),
    NonNumeric(&'static str),
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAnObject => write!(f, "record is not an object"),
            Self::MissingField(name) => write!(f, "missing field `{}`", name),
            Self::NonNumeric(name) => write!(f, "field `{}` is not a valid number", name),
        }
    }
}

/// Parse outcome for one sample record.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleParse {
    Valid(Sample),
    Invalid(InvalidReason),
}

/// Parse one sample-like record.
///
/// All four fields must be present and numeric. `rss_kb` and `threads`
/// must be non-negative integers; `t` and `cpu_pct` accept any JSON
/// number. `cpu_pct` is not clamped: multi-core processes legitimately
/// exceed 100.
pub fn parse_sample(value: &Value) -> SampleParse {
    let obj = match value.as_object() {
        Some(obj) => obj,
        None => return SampleParse::Invalid(InvalidReason::NotAnObject),
    };

    match parse_fields(obj) {
        Ok(sample) => SampleParse::Valid(sample),
        Err(reason) => SampleParse::Invalid(reason),
    }
}

fn parse_fields(obj: &Map<String, Value>) -> Result<Sample, InvalidReason> {
    let t = numeric_f64(obj, "t")?;
    let cpu_pct = numeric_f64(obj, "cpu_pct")?;
    let rss_kb = numeric_u64(obj, "rss_kb")?;
    let threads = numeric_u64(obj, "threads")?;

    Ok(Sample {
        t,
        cpu_pct,
        rss_kb,
        threads: threads as u32,
    })
}

fn numeric_f64(obj: &Map<String, Value>, name: &'static str) -> Result<f64, InvalidReason> {
    obj.get(name)
        .ok_or(InvalidReason::MissingField(name))?
        .as_f64()
        .ok_or(InvalidReason::NonNumeric(name))
}

fn numeric_u64(obj: &Map<String, Value>, name: &'static str) -> Result<u64, InvalidReason> {
    obj.get(name)
        .ok_or(InvalidReason::MissingField(name))?
        .as_u64()
        .ok_or(InvalidReason::NonNumeric(name))
}

/// Extract and validate the sample sequence from a decoded payload.
///
/// A payload with no `samples` field (or an explicit null) yields an empty
/// sequence: a trace with zero samples is valid, it just has no
/// statistics. A `samples` field of any other non-array type is a
/// structural failure. Input order is preserved; nothing is sorted or
/// deduplicated by `t`.
pub fn ingest_samples(payload: &Value) -> Result<Vec<Sample>, IngestError> {
    let obj = payload.as_object().ok_or(IngestError::NotAnObject)?;

    let records = match obj.get("samples") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(records)) => records,
        Some(_) => return Err(IngestError::WrongType("samples")),
    };

    let mut samples = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        match parse_sample(record) {
            SampleParse::Valid(sample) => samples.push(sample),
            SampleParse::Invalid(reason) => {
                debug!("dropping sample record {}: {}", index, reason);
            }
        }
    }

    Ok(samples)
}

/// Parse a full upload payload.
///
/// `session_id` and `metadata` are required; everything else defaults the
/// way the capture agent leaves optional fields out. Any uploader-supplied
/// summary block is ignored; the stored summary is always recomputed from
/// the parsed samples.
pub fn parse_payload(payload: &Value) -> Result<TracePayload, IngestError> {
    let obj = payload.as_object().ok_or(IngestError::NotAnObject)?;

    let session_id = obj
        .get("session_id")
        .ok_or(IngestError::MissingField("session_id"))?
        .as_str()
        .ok_or(IngestError::WrongType("session_id"))?
        .to_string();

    let metadata = obj
        .get("metadata")
        .ok_or(IngestError::MissingField("metadata"))?
        .as_object()
        .ok_or(IngestError::WrongType("metadata"))?;

    let meta = TraceMeta {
        process_name: metadata
            .get("process_name")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string(),
        pid: metadata.get("pid").and_then(Value::as_u64).unwrap_or(0) as u32,
    };

    let duration_sec = obj
        .get("duration_seconds")
        .and_then(Value::as_u64)
        .unwrap_or(0);

    let start_time = obj
        .get("start_time")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();

    let samples = ingest_samples(payload)?;

    Ok(TracePayload {
        session_id,
        meta,
        duration_sec,
        start_time,
        samples,
    })
}
