// CPUTrace Control CLI
// Commands: version, status, upload, list, show, analyze

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value as JsonValue;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

use cputrace_common::rpc::{Request, Response, SOCKET_PATH};
use cputrace_common::stats::{DetailedStats, Severity, StatsConfig, TraceSummary};
use cputrace_common::{ingest, TracePayload};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const RESET: &str = "\x1b[0m";

/// Spike rows printed before the list is elided.
const MAX_SPIKE_ROWS: usize = 8;

#[derive(Parser)]
#[command(name = "cputracectl")]
#[command(version, about = "CPUTrace - process resource trace inspection CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version information
    Version,

    /// Show daemon status
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Upload a trace file to the daemon
    Upload {
        /// Path to the trace .json file
        file: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List stored traces
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
        /// Number of traces to show (default: 20)
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Number of traces to skip
        #[arg(short, long, default_value = "0")]
        offset: usize,
    },

    /// Show one trace with detailed statistics
    Show {
        /// Trace id
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Analyze a local trace file without a daemon
    Analyze {
        /// Path to the trace .json file
        file: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Version => {
            println!("CPUTrace v{}", VERSION);
            println!("Build: {} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Status { json } => {
            let data = rpc_call(Request::Status).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&data)?);
            } else {
                print_status(&data);
            }
            Ok(())
        }
        Commands::Upload { file, json } => upload(&file, json).await,
        Commands::List {
            json,
            limit,
            offset,
        } => {
            let data = rpc_call(Request::TraceList {
                offset: Some(offset),
                limit: Some(limit),
            })
            .await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&data)?);
            } else {
                print_list(&data, &StatsConfig::default());
            }
            Ok(())
        }
        Commands::Show { id, json } => show(id, json).await,
        Commands::Analyze { file, json } => analyze(&file, json),
    }
}

async fn upload(file: &str, json: bool) -> Result<()> {
    if !file.ends_with(".json") {
        anyhow::bail!("Only .json files accepted");
    }

    let contents = std::fs::read_to_string(file).context(format!("Failed to read {}", file))?;
    let payload: JsonValue = serde_json::from_str(&contents).context("Invalid JSON")?;

    let data = rpc_call(Request::TraceUpload { payload }).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&data)?);
    } else {
        println!(
            "✓ Uploaded trace {} ({}, {} samples)",
            data["id"].as_i64().unwrap_or(0),
            data["process_name"].as_str().unwrap_or("unknown"),
            data["sample_count"].as_u64().unwrap_or(0)
        );
    }
    Ok(())
}

async fn show(id: i64, json: bool) -> Result<()> {
    let data = rpc_call(Request::TraceShow { id }).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    let config = StatsConfig::default();
    let trace = &data["trace"];
    let stats: Option<DetailedStats> =
        serde_json::from_value(data["stats"].clone()).context("Malformed stats in response")?;

    println!("\n╭─ Trace {} ───────────────────────────────────", id);
    println!("│");
    println!(
        "│  Process:   {} (PID {})",
        trace["process_name"].as_str().unwrap_or("unknown"),
        trace["pid"].as_u64().unwrap_or(0)
    );
    println!(
        "│  Session:   {}",
        trace["session_id"].as_str().unwrap_or("unknown")
    );
    println!(
        "│  Duration:  {}s",
        trace["duration_sec"].as_u64().unwrap_or(0)
    );
    println!(
        "│  Uploaded:  {}",
        trace["created_at"].as_str().unwrap_or("unknown")
    );

    let count = trace["sample_count"].as_u64().unwrap_or(0);
    println!("│  Samples:   {}", count);
    if count > 0 {
        let avg = trace["cpu_avg"].as_f64().unwrap_or(0.0);
        let max = trace["cpu_max"].as_f64().unwrap_or(0.0);
        println!("│  CPU avg:   {}", severity_pct(avg, &config));
        println!("│  CPU max:   {}", severity_pct(max, &config));
    }
    println!("│");

    print_stats(stats.as_ref(), &config);
    println!("╰──────────────────────────────────────────────\n");
    Ok(())
}

fn analyze(file: &str, json: bool) -> Result<()> {
    let contents = std::fs::read_to_string(file).context(format!("Failed to read {}", file))?;
    let payload: JsonValue = serde_json::from_str(&contents).context("Invalid JSON")?;

    let trace: TracePayload = ingest::parse_payload(&payload)?;
    let config = StatsConfig::default();
    let summary = TraceSummary::from_samples(&trace.samples);
    let stats = DetailedStats::compute(&trace.samples, &config);

    if json {
        let out = serde_json::json!({
            "session_id": trace.session_id,
            "process_name": trace.meta.process_name,
            "pid": trace.meta.pid,
            "duration_sec": trace.duration_sec,
            "summary": summary,
            "stats": stats,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("\n╭─ Trace Analysis ─────────────────────────────");
    println!("│");
    println!(
        "│  Process:   {} (PID {})",
        trace.meta.process_name, trace.meta.pid
    );
    println!("│  Session:   {}", trace.session_id);
    println!("│  Duration:  {}s", trace.duration_sec);
    println!("│  Samples:   {}", summary.sample_count);
    if summary.has_data() {
        println!("│  CPU avg:   {}", severity_pct(summary.cpu_avg, &config));
        println!("│  CPU max:   {}", severity_pct(summary.cpu_max, &config));
    }
    println!("│");

    print_stats(stats.as_ref(), &config);
    println!("╰──────────────────────────────────────────────\n");
    Ok(())
}

async fn rpc_call(request: Request) -> Result<JsonValue> {
    use tokio::time::{timeout, Duration};

    const CONNECT_TIMEOUT_SECS: u64 = 2;
    const WRITE_TIMEOUT_SECS: u64 = 2;
    const READ_TIMEOUT_SECS: u64 = 5;

    // Connect with timeout
    let stream = match timeout(
        Duration::from_secs(CONNECT_TIMEOUT_SECS),
        UnixStream::connect(SOCKET_PATH),
    )
    .await
    {
        Ok(Ok(s)) => s,
        Ok(Err(e)) => {
            anyhow::bail!(
                "Failed to connect to cputraced (socket: {})\n\
                 Error: {}\n\
                 Is the daemon running? Try: sudo systemctl status cputraced",
                SOCKET_PATH,
                e
            );
        }
        Err(_) => {
            eprintln!(
                "WARN: timeout (connect) - daemon not responding after {}s",
                CONNECT_TIMEOUT_SECS
            );
            std::process::exit(7);
        }
    };

    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    let json = serde_json::to_string(&request)?;

    // Write with timeout
    match timeout(Duration::from_secs(WRITE_TIMEOUT_SECS), async {
        writer.write_all(json.as_bytes()).await?;
        writer.write_all(b"\n").await
    })
    .await
    {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => anyhow::bail!("Write error: {}", e),
        Err(_) => {
            eprintln!(
                "WARN: timeout (write) - daemon not responding after {}s",
                WRITE_TIMEOUT_SECS
            );
            std::process::exit(7);
        }
    }

    // Read response with timeout
    let mut line = String::new();
    match timeout(
        Duration::from_secs(READ_TIMEOUT_SECS),
        reader.read_line(&mut line),
    )
    .await
    {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => anyhow::bail!("Read error: {}", e),
        Err(_) => {
            eprintln!(
                "WARN: timeout (read) - daemon not responding after {}s",
                READ_TIMEOUT_SECS
            );
            std::process::exit(7);
        }
    }

    let response: Response = serde_json::from_str(&line)?;
    match response {
        Response::Success { data } => Ok(data),
        Response::Error { message } => anyhow::bail!("Daemon error: {}", message),
    }
}

fn print_status(data: &JsonValue) {
    println!("\n╭─ CPUTrace Status ────────────────────────────");
    println!("│");
    println!(
        "│  Version:     {}",
        data["version"].as_str().unwrap_or("unknown")
    );
    println!(
        "│  Socket:      {}",
        data["socket_path"].as_str().unwrap_or("unknown")
    );
    println!(
        "│  DB Path:     {}",
        data["db_path"].as_str().unwrap_or("unknown")
    );
    println!(
        "│  Traces:      {}",
        data["trace_count"].as_u64().unwrap_or(0)
    );
    println!(
        "│  Daemon RSS:  {} KiB",
        data["rss_kb"].as_u64().unwrap_or(0)
    );
    println!("│");
    println!("╰──────────────────────────────────────────────\n");
}

fn print_list(data: &JsonValue, config: &StatsConfig) {
    println!("\n╭─ Traces ─────────────────────────────────────");
    println!("│");

    let empty = Vec::new();
    let traces = data["traces"].as_array().unwrap_or(&empty);
    if traces.is_empty() {
        println!("│  No traces yet");
        println!("│");
    }

    for trace in traces {
        println!(
            "│  [{}] {}  PID {} · {}s",
            trace["id"].as_i64().unwrap_or(0),
            trace["process_name"].as_str().unwrap_or("unknown"),
            trace["pid"].as_u64().unwrap_or(0),
            trace["duration_sec"].as_u64().unwrap_or(0)
        );

        let count = trace["sample_count"].as_u64().unwrap_or(0);
        if count == 0 {
            println!("│      no samples");
        } else {
            let avg = trace["cpu_avg"].as_f64().unwrap_or(0.0);
            let max = trace["cpu_max"].as_f64().unwrap_or(0.0);
            println!(
                "│      avg {}  max {}  ·  {} samples",
                severity_pct(avg, config),
                severity_pct(max, config),
                count
            );
        }
        println!("│");
    }

    let total = data["total"].as_u64().unwrap_or(0);
    let showing = data["showing"].as_u64().unwrap_or(0);
    if total > showing {
        println!("│  Showing {} of {} traces", showing, total);
        println!("│");
    }

    println!("╰──────────────────────────────────────────────\n");
}

fn print_stats(stats: Option<&DetailedStats>, config: &StatsConfig) {
    let Some(stats) = stats else {
        println!("│  No samples - statistics unavailable");
        println!("│");
        return;
    };

    println!("│  P50:       {}", severity_pct(stats.p50, config));
    println!("│  P95:       {}", severity_pct(stats.p95, config));
    println!("│  P99:       {}", severity_pct(stats.p99, config));
    println!("│  Mean:      {:.2}%", stats.mean);
    println!("│  Std Dev:   {:.2}%", stats.stddev);
    println!("│");

    if stats.spikes.is_empty() {
        println!("│  No CPU spikes detected");
    } else {
        println!(
            "│  ⚠ {} CPU spike{} detected (>{:.1}% threshold)",
            stats.spikes.len(),
            if stats.spikes.len() == 1 { "" } else { "s" },
            stats.spike_threshold
        );
        for spike in stats.spikes.iter().take(MAX_SPIKE_ROWS) {
            println!(
                "│    t={:.2}s  cpu={:.1}%  rss={} KiB  threads={}",
                spike.t, spike.cpu_pct, spike.rss_kb, spike.threads
            );
        }
        if stats.spikes.len() > MAX_SPIKE_ROWS {
            println!("│    ... and {} more", stats.spikes.len() - MAX_SPIKE_ROWS);
        }
    }
    println!("│");
}

fn severity_pct(value: f64, config: &StatsConfig) -> String {
    let severity = Severity::classify(value, config);
    format!("{}{:.1}%{}", severity.color(), value, RESET)
}
