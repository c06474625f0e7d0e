//! Linux sysfs GPIO backend.
//!
//! Lines are addressed by GPIO number; the sysfs number is `base + gpio`. A line that is
//! not yet visible under `gpio<N>/` is exported and set to input during
//! [`claim`](LineSampler::claim); only lines exported here are unexported on release.

use crate::error::{ConfigurationError, ReadError};
use crate::event::LineId;
use crate::sampler::LineSampler;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub struct SysfsSampler {
    root: PathBuf,
    base: u32,
    exported: Vec<u32>,
}

impl SysfsSampler {
    pub fn new(root: impl Into<PathBuf>, base: u32) -> Self {
        Self {
            root: root.into(),
            base,
            exported: Vec::new(),
        }
    }

    #[inline]
    fn sysfs_number(&self, line: LineId) -> u32 {
        self.base + line.0
    }

    fn line_dir(&self, number: u32) -> PathBuf {
        self.root.join(format!("gpio{number}"))
    }

    fn write_attr(path: &Path, value: &str) -> std::io::Result<()> {
        fs::write(path, value)
    }
}

impl LineSampler for SysfsSampler {
    fn claim(&mut self, line: LineId) -> Result<(), ConfigurationError> {
        let number = self.sysfs_number(line);
        let dir = self.line_dir(number);
        if dir.join("value").exists() {
            debug!("{line} (sysfs {number}) already exported");
            return Ok(());
        }

        let claim_err = |reason: String| ConfigurationError::Claim { line, reason };

        Self::write_attr(&self.root.join("export"), &number.to_string())
            .map_err(|e| claim_err(format!("export {number}: {e}")))?;
        self.exported.push(number);

        Self::write_attr(&dir.join("direction"), "in")
            .map_err(|e| claim_err(format!("set direction of {number}: {e}")))?;

        info!("Exported {line} (sysfs {number}) as input");
        Ok(())
    }

    fn read(&mut self, line: LineId) -> Result<bool, ReadError> {
        let path = self.line_dir(self.sysfs_number(line)).join("value");
        let raw = fs::read_to_string(&path).map_err(|e| ReadError::new(line, e.to_string()))?;
        match raw.trim() {
            "1" => Ok(true),
            "0" => Ok(false),
            other => Err(ReadError::new(line, format!("unexpected value {other:?}"))),
        }
    }

    fn release_all(&mut self) {
        let unexport = self.root.join("unexport");
        for number in self.exported.drain(..) {
            if let Err(e) = Self::write_attr(&unexport, &number.to_string()) {
                warn!("Failed to unexport sysfs {number}: {e}");
            }
        }
    }

    fn name(&self) -> &str {
        "sysfs"
    }
}
