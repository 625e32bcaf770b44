//! Block-device node enumeration
//!
//! The device cache holds the ordered list of directories the tool is allowed
//! to scan for device nodes, and walks them on demand. Visibility decisions
//! are delegated to the filter chain.

use crate::error::{Result, VolmanError};
use crate::filter::DeviceFilter;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A block device found under one of the registered directories.
///
/// The identity (canonical path string) is the stable key used by the
/// persistent filter across invocations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    path: PathBuf,
    major: u32,
    minor: u32,
}

impl Device {
    pub fn new<P: Into<PathBuf>>(path: P, major: u32, minor: u32) -> Self {
        Device {
            path: path.into(),
            major,
            minor,
        }
    }

    /// Build a device from a filesystem node; `None` if the node is not a
    /// block device.
    #[cfg(unix)]
    pub fn from_node(path: &Path) -> Option<Device> {
        use std::os::unix::fs::{FileTypeExt, MetadataExt};

        let meta = fs::metadata(path).ok()?;
        if !meta.file_type().is_block_device() {
            return None;
        }
        let rdev = meta.rdev();
        Some(Device {
            path: path.to_path_buf(),
            major: libc::major(rdev),
            minor: libc::minor(rdev),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stable identity key for this device.
    pub fn identity(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    pub fn major(&self) -> u32 {
        self.major
    }

    pub fn minor(&self) -> u32 {
        self.minor
    }
}

/// Ordered index of directories to scan for device nodes.
pub struct DeviceCache {
    dirs: Vec<PathBuf>,
}

impl DeviceCache {
    pub fn new() -> Self {
        DeviceCache { dirs: Vec::new() }
    }

    /// Register a directory to scan. Directories are scanned in registration
    /// order.
    pub fn add_dir<P: AsRef<Path>>(&mut self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        if dir.as_os_str().is_empty() {
            return Err(VolmanError::DeviceCache(
                "cannot register an empty scan directory".to_string(),
            ));
        }
        debug!(dir = %dir.display(), "registered device scan directory");
        self.dirs.push(dir.to_path_buf());
        Ok(())
    }

    /// Registered scan directories, in order.
    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Walk every registered directory and return the block devices the
    /// filter lets through. Unreadable directories are skipped.
    #[cfg(unix)]
    pub fn scan(&self, filter: &mut dyn DeviceFilter) -> Vec<Device> {
        let mut devices = Vec::new();
        let mut pending: Vec<PathBuf> = self.dirs.clone();

        while let Some(dir) = pending.pop() {
            let entries = match fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) => {
                    debug!(dir = %dir.display(), "skipping unreadable scan directory: {}", e);
                    continue;
                }
            };
            for entry in entries.flatten() {
                let path = entry.path();
                let Ok(file_type) = entry.file_type() else {
                    continue;
                };
                if file_type.is_dir() {
                    pending.push(path);
                    continue;
                }
                if let Some(device) = Device::from_node(&path) {
                    if filter.passes(&device) {
                        devices.push(device);
                    }
                }
            }
        }

        devices
    }
}

impl Default for DeviceCache {
    fn default() -> Self {
        Self::new()
    }
}
