// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! camsink daemon (camsinkd)
//!
//! Presents the cam disk to the vehicle over USB mass-storage gadget mode
//! and archives dashcam clips to the configured remote whenever it is
//! reachable, one crash-consistent reflink snapshot per cycle.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use camsink_adapters::archive::{NoopArchiver, RcloneArchiver};
use camsink_adapters::idle::MtimeIdleDetector;
use camsink_adapters::led::{spawn_blinker, LedPattern, StatusLed};
use camsink_adapters::mount::LoopMount;
use camsink_adapters::temperature::{CpuTempSampler, DEFAULT_THERMAL_ZONE};
use camsink_adapters::TracedArchive;
use camsink_core::Shutdown;
use camsink_daemon::config::ArchiveSystem;
use camsink_daemon::coordinator::{Coordinator, CoordinatorError, CoordinatorOptions};
use camsink_daemon::{lifecycle, Config};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tracing::{error, info};

/// Exit code for configuration and startup failures.
const EXIT_CONFIG: u8 = 2;
/// Exit code for a fatal archive failure.
const EXIT_ARCHIVE: u8 = 3;

/// Interval between CPU temperature log lines.
const TEMP_SAMPLE_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> ExitCode {
    // Handle info flags before any config/lock acquisition
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("camsinkd {}", env!("CARGO_PKG_VERSION"));
                return ExitCode::SUCCESS;
            }
            "--help" | "-h" | "help" => {
                println!("camsinkd {}", env!("CARGO_PKG_VERSION"));
                println!("camsink daemon - vehicle dashcam USB gadget and cloud archiver");
                println!();
                println!("USAGE:");
                println!("    camsinkd");
                println!();
                println!("Reads /etc/camsink.toml (override with CAMSINK_CONFIG) and runs");
                println!("until SIGTERM/SIGINT. Typically supervised by systemd.");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help       Print help information");
                println!("    -v, --version    Print version information");
                return ExitCode::SUCCESS;
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: camsinkd [--help | --version]");
                return ExitCode::from(EXIT_CONFIG);
            }
        }
    }

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("camsinkd: configuration error: {e}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    rotate_log_if_needed(&config.log_path());
    let _log_guard = match setup_logging(&config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("camsinkd: failed to set up logging: {e}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    info!(version = env!("CARGO_PKG_VERSION"), "starting camsinkd");

    let mounts = LoopMount::new();
    let started = match lifecycle::startup(&config, &mounts).await {
        Ok(started) => started,
        Err(e) => {
            error!("failed to start daemon: {}", e);
            eprintln!("camsinkd: startup failed: {e}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let shutdown = Shutdown::new();
    spawn_signal_handlers(shutdown.clone());

    // Background collaborators: LED and thermal telemetry.
    let (led_tx, led_rx) = watch::channel(LedPattern::Idle);
    if let Some(name) = &config.led.name {
        let _ = spawn_blinker(StatusLed::by_name(name), led_rx, shutdown.clone());
    }
    let _ = CpuTempSampler::new(Path::new(DEFAULT_THERMAL_ZONE).to_path_buf(), TEMP_SAMPLE_INTERVAL)
        .spawn(shutdown.clone());

    let opts = CoordinatorOptions {
        cam_disk: config.cam_disk_path(),
        cam_bytes: started.layout.cam_bytes,
        view_mount: config.view_mount(),
        settle_delay: config.settle_delay(),
        poll: config.reachability_poll(),
        archiving_enabled: config.archive.system != ArchiveSystem::None,
    };

    let idle = config.idle.enabled.then(|| {
        MtimeIdleDetector::new(config.mount_point.clone(), config.idle_window(), config.idle_poll())
    });

    // The coordinator is generic over the archive backend; pick it here.
    let result = match config.archive.system {
        ArchiveSystem::Rclone => {
            let archiver = TracedArchive::new(RcloneArchiver::new(
                config.archive.remote.clone(),
                config.archive.path.clone(),
                config.clip_roots(),
            ));
            Coordinator::new(started.manager.clone(), archiver, mounts, idle, shutdown.clone(), opts)
                .with_led(led_tx)
                .run()
                .await
        }
        ArchiveSystem::None => {
            Coordinator::new(
                started.manager.clone(),
                NoopArchiver::new(),
                mounts,
                idle,
                shutdown.clone(),
                opts,
            )
            .with_led(led_tx)
            .run()
            .await
        }
    };

    // Wake any remaining background tasks so they exit promptly.
    shutdown.trigger();
    lifecycle::teardown(&config, &mounts, started.gadget.as_ref()).await;

    match result {
        Ok(()) => {
            info!("daemon stopped");
            ExitCode::SUCCESS
        }
        Err(CoordinatorError::FatalArchive(msg)) => {
            error!("exiting on fatal archive failure: {}", msg);
            ExitCode::from(EXIT_ARCHIVE)
        }
    }
}

/// Trigger shutdown on SIGTERM or SIGINT.
fn spawn_signal_handlers(shutdown: Shutdown) {
    tokio::spawn(async move {
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                error!("failed to install SIGTERM handler: {}", e);
                return;
            }
        };
        let mut sigint = match signal(SignalKind::interrupt()) {
            Ok(s) => s,
            Err(e) => {
                error!("failed to install SIGINT handler: {}", e);
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => info!("received SIGTERM, shutting down..."),
            _ = sigint.recv() => info!("received SIGINT, shutting down..."),
        }
        shutdown.trigger();
    });
}

/// Maximum log file size before rotation (10 MB).
const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Number of rotated log files to keep.
const MAX_ROTATED_LOGS: u32 = 3;

/// Rotate the daemon log file if it exceeds [`MAX_LOG_SIZE`].
///
/// Shifts `camsinkd.log` → `.1` → `.2` → `.3`, deleting the oldest.
/// Best-effort: rotation failures are silently ignored so the daemon still
/// starts.
fn rotate_log_if_needed(log_path: &Path) {
    let size = match std::fs::metadata(log_path) {
        Ok(m) => m.len(),
        Err(_) => return,
    };

    if size < MAX_LOG_SIZE {
        return;
    }

    let log_str = log_path.display().to_string();

    for i in (1..MAX_ROTATED_LOGS).rev() {
        let from = format!("{log_str}.{i}");
        let to = format!("{log_str}.{}", i + 1);
        let _ = std::fs::rename(&from, &to);
    }

    let _ = std::fs::rename(log_path, format!("{log_str}.1"));
}

fn setup_logging(
    config: &Config,
) -> Result<tracing_appender::non_blocking::WorkerGuard, std::io::Error> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let log_path = config.log_path();
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file_appender = tracing_appender::rolling::never(
        log_path.parent().unwrap_or_else(|| Path::new(".")),
        log_path
            .file_name()
            .unwrap_or_else(|| std::ffi::OsStr::new("camsinkd.log")),
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
