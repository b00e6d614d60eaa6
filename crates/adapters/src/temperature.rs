// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CPU temperature sampler.
//!
//! The daemon lives in a glovebox or behind a dash panel; a periodic
//! temperature line in the log is the cheapest thermal telemetry available.

use camsink_core::Shutdown;
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Default thermal zone on the supported boards.
pub const DEFAULT_THERMAL_ZONE: &str = "/sys/class/thermal/thermal_zone0/temp";

/// Periodic reader of a sysfs thermal zone (millidegrees Celsius).
#[derive(Debug, Clone)]
pub struct CpuTempSampler {
    zone: PathBuf,
    interval: Duration,
}

impl CpuTempSampler {
    pub fn new(zone: PathBuf, interval: Duration) -> Self {
        Self { zone, interval }
    }

    /// One reading in degrees Celsius, `None` if the zone is unreadable.
    pub fn read_temp_c(&self) -> Option<f64> {
        let raw = std::fs::read_to_string(&self.zone).ok()?;
        let millideg: i64 = raw.trim().parse().ok()?;
        Some(millideg as f64 / 1000.0)
    }

    /// Spawn the sampling task. A missing sensor disables it silently.
    pub fn spawn(self, shutdown: Shutdown) -> JoinHandle<()> {
        tokio::spawn(async move {
            if !self.zone.exists() {
                info!(zone = %self.zone.display(), "thermal zone absent, sampler disabled");
                return;
            }

            loop {
                match self.read_temp_c() {
                    Some(temp_c) => info!(temp_c, "cpu temperature"),
                    None => debug!(zone = %self.zone.display(), "thermal zone unreadable"),
                }

                tokio::select! {
                    _ = tokio::time::sleep(self.interval) => {}
                    _ = shutdown.wait() => return,
                }
            }
        })
    }
}

#[cfg(test)]
#[path = "temperature_tests.rs"]
mod tests;
