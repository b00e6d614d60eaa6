// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Status LED blinker.
//!
//! Purely cosmetic: a sysfs LED that tells the driver what the daemon is up
//! to from across the cabin. All failures degrade to a single warning.

use camsink_core::Shutdown;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::warn;

/// Named blink patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LedPattern {
    /// Steady off.
    #[default]
    Off,
    /// Short heartbeat: waiting for reachability or idleness.
    Idle,
    /// Even blink: upload in progress.
    Archiving,
    /// Fast blink: the daemon hit a fatal error and is exiting.
    Error,
}

impl LedPattern {
    /// (on, off) durations of one blink phase.
    fn phase(self) -> (Duration, Duration) {
        match self {
            Self::Off => (Duration::ZERO, Duration::from_secs(1)),
            Self::Idle => (Duration::from_millis(100), Duration::from_millis(2900)),
            Self::Archiving => (Duration::from_millis(500), Duration::from_millis(500)),
            Self::Error => (Duration::from_millis(100), Duration::from_millis(100)),
        }
    }
}

/// A sysfs LED, addressed through its `brightness` file.
#[derive(Debug, Clone)]
pub struct StatusLed {
    brightness: PathBuf,
}

impl StatusLed {
    /// LED by sysfs name, e.g. `led0` → `/sys/class/leds/led0/brightness`.
    pub fn by_name(name: &str) -> Self {
        Self {
            brightness: PathBuf::from("/sys/class/leds")
                .join(name)
                .join("brightness"),
        }
    }

    pub fn at_path(brightness: PathBuf) -> Self {
        Self { brightness }
    }

    fn set(&self, on: bool) -> std::io::Result<()> {
        std::fs::write(&self.brightness, if on { "1" } else { "0" })
    }
}

/// Spawn the background blink task. The pattern is switched through the
/// watch channel; the task exits (LED off) on shutdown.
pub fn spawn_blinker(
    led: StatusLed,
    patterns: watch::Receiver<LedPattern>,
    shutdown: Shutdown,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut warned = false;
        let mut set = |on: bool| {
            if let Err(e) = led.set(on) {
                if !warned {
                    warn!(path = %led.brightness.display(), error = %e, "LED unavailable");
                    warned = true;
                }
            }
        };

        loop {
            if shutdown.is_triggered() {
                set(false);
                return;
            }

            let (on_d, off_d) = patterns.borrow().phase();

            if !on_d.is_zero() {
                set(true);
                tokio::select! {
                    _ = tokio::time::sleep(on_d) => {}
                    _ = shutdown.wait() => continue,
                }
            }

            set(false);
            tokio::select! {
                _ = tokio::time::sleep(off_d) => {}
                _ = shutdown.wait() => continue,
            }
        }
    })
}

#[cfg(test)]
#[path = "led_tests.rs"]
mod tests;
