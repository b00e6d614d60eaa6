// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! USB mass-storage gadget collaborator.
//!
//! The gadget is assumed to be pre-created in configfs (by the image build or
//! an init script); camsink only points its single LUN at the cam disk image
//! and binds/unbinds the UDC. Both operations are idempotent.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Errors from gadget operations
#[derive(Debug, Error)]
pub enum GadgetError {
    #[error("gadget write failed at {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Handle on a configfs USB gadget with one mass-storage function.
#[derive(Debug, Clone)]
pub struct UsbGadget {
    /// Gadget directory, e.g. `/sys/kernel/config/usb_gadget/camsink`.
    gadget_dir: PathBuf,
    /// UDC name to bind, e.g. `fe980000.usb`.
    udc_name: String,
}

impl UsbGadget {
    pub fn new(gadget_dir: PathBuf, udc_name: String) -> Self {
        Self {
            gadget_dir,
            udc_name,
        }
    }

    fn lun_file(&self) -> PathBuf {
        self.gadget_dir
            .join("functions")
            .join("mass_storage.0")
            .join("lun.0")
            .join("file")
    }

    fn udc_file(&self) -> PathBuf {
        self.gadget_dir.join("UDC")
    }

    fn write(path: &Path, contents: &str) -> Result<(), GadgetError> {
        std::fs::write(path, contents).map_err(|source| GadgetError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Point the LUN at `backing` and bind the UDC, exposing the cam disk to
    /// the vehicle. Unbinds first so a re-attach after restart succeeds.
    pub fn attach(&self, backing: &Path) -> Result<(), GadgetError> {
        // Already-unbound UDC rejects the empty write; that is fine.
        let _ = std::fs::write(self.udc_file(), "\n");

        Self::write(&self.lun_file(), &format!("{}\n", backing.display()))?;
        Self::write(&self.udc_file(), &format!("{}\n", self.udc_name))?;
        info!(backing = %backing.display(), udc = %self.udc_name, "usb gadget attached");
        Ok(())
    }

    /// Unbind the UDC and clear the LUN.
    pub fn detach(&self) -> Result<(), GadgetError> {
        Self::write(&self.udc_file(), "\n")?;
        let _ = std::fs::write(self.lun_file(), "\n");
        info!("usb gadget detached");
        Ok(())
    }
}

#[cfg(test)]
#[path = "gadget_tests.rs"]
mod tests;
