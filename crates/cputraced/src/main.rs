use anyhow::{Context, Result};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;
use tokio::net::UnixListener;
use tracing::{error, info, warn};

mod config;
mod rpc;
mod store;

const SOCKET_DIR: &str = "/run/cputrace";
const STATE_DIR: &str = "/var/lib/cputrace";

#[tokio::main]
async fn main() -> Result<()> {
    // Config first so the log level fallback comes from it; RUST_LOG wins.
    let config = config::load_config().context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .init();

    info!("[BOOT] cputraced v{} starting...", env!("CARGO_PKG_VERSION"));
    info!("[BOOT] Config loaded");

    // Verify required directories exist (created by systemd or installer)
    if let Err(e) = verify_directories() {
        error!("[FATAL] Required directories missing: {}", e);
        error!("[FATAL] Run the installer or ensure systemd RuntimeDirectory/StateDirectory are configured");
        std::process::exit(1);
    }

    let store = store::TraceStore::open(&config.daemon.db_path)
        .context("Failed to open trace store")?;
    info!("[BOOT] Trace store ready ({})", config.daemon.db_path);

    // Clean up old socket if it exists
    let socket_path = config.daemon.socket_path.clone();
    if Path::new(&socket_path).exists() {
        std::fs::remove_file(&socket_path).context("Failed to remove old socket")?;
    }

    let listener = UnixListener::bind(&socket_path)
        .context(format!("Failed to bind socket at {}", socket_path))?;

    // 0660 so the cputrace group can reach the daemon
    std::fs::set_permissions(&socket_path, std::fs::Permissions::from_mode(0o660))
        .context("Failed to set socket permissions")?;

    info!("[BOOT] RPC online ({}, permissions: 0660)", socket_path);

    let daemon = Arc::new(rpc::Daemon {
        store,
        stats: config.stats,
        db_path: config.daemon.db_path.clone(),
        socket_path,
    });

    start_cpu_watchdog();

    info!("[READY] cputraced operational");

    rpc::serve(listener, daemon).await.context("RPC server error")?;

    Ok(())
}

/// CPU watchdog: monitors the daemon's own CPU usage when idle.
/// Logs a warning if idle CPU > 5% for 3 consecutive samples.
fn start_cpu_watchdog() {
    tokio::spawn(async {
        use sysinfo::{Pid, System};
        use tokio::time::{interval, Duration};

        let mut interval = interval(Duration::from_secs(300)); // 5 minutes
        let pid = Pid::from_u32(std::process::id());
        let mut high_cpu_count = 0;

        loop {
            interval.tick().await;

            let mut sys = System::new();
            sys.refresh_process(pid);

            if let Some(process) = sys.process(pid) {
                let cpu_usage = process.cpu_usage();

                if cpu_usage > 5.0 {
                    high_cpu_count += 1;
                    warn!(
                        "[WATCHDOG] Idle CPU usage: {:.1}% (sample {}/3)",
                        cpu_usage, high_cpu_count
                    );

                    if high_cpu_count >= 3 {
                        error!(
                            "[WATCHDOG] High idle CPU detected! Daemon using {:.1}% CPU \
                            while only serving uploads and list queries",
                            cpu_usage
                        );
                        high_cpu_count = 0;
                    }
                } else if high_cpu_count > 0 {
                    info!("[WATCHDOG] CPU usage normalized: {:.1}%", cpu_usage);
                    high_cpu_count = 0;
                }
            }
        }
    });
}

/// Verify all required directories exist (created by systemd or installer)
fn verify_directories() -> Result<()> {
    let required = vec![
        (SOCKET_DIR, "socket directory"),
        (STATE_DIR, "state directory"),
    ];

    for (path, name) in required {
        if !Path::new(path).exists() {
            anyhow::bail!("{} missing: {}", name, path);
        }
    }

    info!("[BOOT] All required directories present");
    Ok(())
}
