//! RPC server: accept loop and request handlers.
//!
//! The protocol is newline-delimited JSON over the Unix socket; request and
//! response types live in `cputrace_common::rpc` so the CLI speaks the same
//! wire format.

use anyhow::Result;
use serde_json::json;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, error, info};

use cputrace_common::ingest;
use cputrace_common::rpc::{Request, Response};
use cputrace_common::stats::{DetailedStats, StatsConfig, TraceSummary};

use crate::store::{TraceStore, DEFAULT_LIST_LIMIT};

/// Shared handler context.
pub struct Daemon {
    pub store: TraceStore,
    pub stats: StatsConfig,
    pub db_path: String,
    pub socket_path: String,
}

pub async fn serve(listener: UnixListener, daemon: Arc<Daemon>) -> Result<()> {
    loop {
        match listener.accept().await {
            Ok((stream, _)) => {
                let daemon = daemon.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, daemon).await {
                        error!("Connection error: {}", e);
                    }
                });
            }
            Err(e) => error!("Accept error: {}", e),
        }
    }
}

async fn handle_connection(stream: UnixStream, daemon: Arc<Daemon>) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    while reader.read_line(&mut line).await? > 0 {
        let request: Request = match serde_json::from_str(&line) {
            Ok(req) => req,
            Err(e) => {
                let response = Response::Error {
                    message: format!("Invalid request: {}", e),
                };
                let json = serde_json::to_string(&response)?;
                writer.write_all(json.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                line.clear();
                continue;
            }
        };

        debug!("Received request: {:?}", request);

        let response = match handle_request(request, &daemon) {
            Ok(resp) => resp,
            Err(e) => Response::Error {
                message: e.to_string(),
            },
        };

        let json = serde_json::to_string(&response)?;
        writer.write_all(json.as_bytes()).await?;
        writer.write_all(b"\n").await?;

        line.clear();
    }

    Ok(())
}

fn handle_request(request: Request, daemon: &Daemon) -> Result<Response> {
    match request {
        Request::Ping => Ok(Response::Success {
            data: json!({ "message": "pong" }),
        }),

        Request::Status => Ok(Response::Success {
            data: json!({
                "version": env!("CARGO_PKG_VERSION"),
                "db_path": daemon.db_path,
                "socket_path": daemon.socket_path,
                "trace_count": daemon.store.count()?,
                "rss_kb": self_rss_kb(),
            }),
        }),

        Request::TraceUpload { payload } => {
            // Structural failures reject the upload; nothing is persisted.
            let trace = ingest::parse_payload(&payload)?;
            let summary = TraceSummary::from_samples(&trace.samples);
            let raw_json = serde_json::to_string(&payload)?;

            let record = daemon.store.insert(&trace, &summary, &raw_json)?;
            info!(
                "Ingested trace {} ({}, {} samples)",
                record.id, record.process_name, record.sample_count
            );

            Ok(Response::Success {
                data: serde_json::to_value(record)?,
            })
        }

        Request::TraceList { offset, limit } => {
            let offset = offset.unwrap_or(0);
            let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT);

            let records = daemon.store.list(offset, limit)?;
            let showing = records.len();

            Ok(Response::Success {
                data: json!({
                    "traces": records,
                    "total": daemon.store.count()?,
                    "showing": showing,
                }),
            })
        }

        Request::TraceShow { id } => {
            let Some((record, raw_json)) = daemon.store.get(id)? else {
                anyhow::bail!("Trace not found: {}", id);
            };

            // Detailed statistics are recomputed on every read; only the
            // O(1) summary is persisted.
            let payload: serde_json::Value = serde_json::from_str(&raw_json)?;
            let samples = ingest::ingest_samples(&payload)?;
            let stats = DetailedStats::compute(&samples, &daemon.stats);

            Ok(Response::Success {
                data: json!({
                    "trace": record,
                    "samples": samples,
                    "stats": stats,
                }),
            })
        }
    }
}

/// Resident memory of the daemon itself, for the status report.
fn self_rss_kb() -> u64 {
    use sysinfo::{Pid, System};

    let pid = Pid::from_u32(std::process::id());
    let mut sys = System::new();
    sys.refresh_process(pid);
    sys.process(pid).map(|p| p.memory() / 1024).unwrap_or(0)
}
