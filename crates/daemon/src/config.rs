// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration.
//!
//! One TOML file, `/etc/camsink.toml` by default, overridable with
//! `CAMSINK_CONFIG`. A missing file means all defaults (archiving off), so a
//! freshly imaged device boots into a plain USB drive. `CAMSINK_STATE_DIR`
//! overrides the state directory for test isolation.

use camsink_adapters::archive::ClipRoots;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("archive.system is \"rclone\" but archive.remote is empty")]
    MissingRemote,
    #[error("archive.system is \"rclone\" but no clip roots are enabled")]
    NoClipRoots,
}

/// Which archive backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveSystem {
    /// Archiving disabled; the daemon only serves the USB gadget.
    #[default]
    None,
    Rclone,
}

/// `[archive]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    pub system: ArchiveSystem,
    /// rclone remote name (before the colon).
    pub remote: String,
    /// Path under the remote receiving the clip roots.
    pub path: String,
    pub saved_clips: bool,
    pub sentry_clips: bool,
    pub recent_clips: bool,
    pub track_mode_clips: bool,
    /// Settle delay after reachability when no idle detector is configured.
    pub delay_secs: u64,
    /// Reachability poll interval.
    pub poll_secs: u64,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            system: ArchiveSystem::None,
            remote: String::new(),
            path: "TeslaCam".to_string(),
            saved_clips: true,
            sentry_clips: true,
            recent_clips: false,
            track_mode_clips: false,
            delay_secs: 20,
            poll_secs: 10,
        }
    }
}

/// `[idle]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct IdleConfig {
    pub enabled: bool,
    /// Quiet window before the source counts as idle.
    pub window_secs: u64,
    pub poll_secs: u64,
}

impl Default for IdleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            window_secs: 600,
            poll_secs: 30,
        }
    }
}

/// `[gadget]` section. No UDC means the gadget is never touched (useful on
/// development hosts).
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct GadgetConfig {
    pub dir: Option<PathBuf>,
    pub udc: Option<String>,
}

impl GadgetConfig {
    pub fn configfs_dir(&self) -> PathBuf {
        self.dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("/sys/kernel/config/usb_gadget/camsink"))
    }
}

/// `[led]` section.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct LedConfig {
    /// sysfs LED name; absent disables the blinker.
    pub name: Option<String>,
}

/// Top-level daemon configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Daemon state: PID file, logs, the snapshot view mountpoint.
    pub state_dir: PathBuf,
    /// The sparse XFS image hosting the cam disk and snapshots.
    pub backing_image: PathBuf,
    /// Where the backing image is loop-mounted.
    pub mount_point: PathBuf,
    /// Host bytes withheld from the backing image.
    pub reserve_bytes: u64,
    pub archive: ArchiveConfig,
    pub idle: IdleConfig,
    pub gadget: GadgetConfig,
    pub led: LedConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from("/var/lib/camsink"),
            backing_image: PathBuf::from("/var/lib/camsink/backing.img"),
            mount_point: PathBuf::from("/mnt/camsink"),
            reserve_bytes: 8 * 1024 * 1024 * 1024,
            archive: ArchiveConfig::default(),
            idle: IdleConfig::default(),
            gadget: GadgetConfig::default(),
            led: LedConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from `CAMSINK_CONFIG` or `/etc/camsink.toml`.
    /// A missing file yields defaults; a present but invalid file is fatal.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("CAMSINK_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/etc/camsink.toml"));

        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            })?;
            Self::parse(&raw)?
        } else {
            info!(path = %path.display(), "no config file, using defaults");
            Self::default()
        };

        if let Ok(dir) = std::env::var("CAMSINK_STATE_DIR") {
            config.state_dir = PathBuf::from(dir);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.archive.system == ArchiveSystem::Rclone {
            if self.archive.remote.is_empty() {
                return Err(ConfigError::MissingRemote);
            }
            if self.clip_roots().none() {
                return Err(ConfigError::NoClipRoots);
            }
        }
        Ok(())
    }

    // Derived paths. The cam disk and snapshots live inside the backing
    // mount; the view mountpoint must be outside it.

    pub fn cam_disk_path(&self) -> PathBuf {
        self.mount_point.join("cam_disk.bin")
    }

    pub fn snapshots_dir(&self) -> PathBuf {
        self.mount_point.join("snapshots")
    }

    pub fn view_mount(&self) -> PathBuf {
        self.state_dir.join("snapshot-view")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.state_dir.join("camsinkd.pid")
    }

    pub fn log_path(&self) -> PathBuf {
        self.state_dir.join("camsinkd.log")
    }

    pub fn clip_roots(&self) -> ClipRoots {
        ClipRoots {
            saved: self.archive.saved_clips,
            sentry: self.archive.sentry_clips,
            recent: self.archive.recent_clips,
            track_mode: self.archive.track_mode_clips,
        }
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.archive.delay_secs)
    }

    pub fn reachability_poll(&self) -> Duration {
        Duration::from_secs(self.archive.poll_secs)
    }

    pub fn idle_window(&self) -> Duration {
        Duration::from_secs(self.idle.window_secs)
    }

    pub fn idle_poll(&self) -> Duration {
        Duration::from_secs(self.idle.poll_secs)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
