//! Device-type allow-list filter

use super::DeviceFilter;
use crate::devcache::Device;
use crate::error::{Result, VolmanError};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use toml::Value;
use tracing::{debug, warn};

/// Device-type names recognised when `devices/types` is absent, with the
/// maximum number of partitions tracked per device.
const DEFAULT_TYPES: &[(&str, u32)] = &[
    ("sd", 16),
    ("ide", 64),
    ("hd", 64),
    ("md", 1),
    ("loop", 1),
    ("dasd", 4),
    ("dac960", 8),
    ("nbd", 16),
    ("ataraid", 16),
    ("i2o_block", 16),
    ("xvd", 16),
    ("vd", 16),
    ("nvme", 64),
    ("mmcblk", 8),
    ("device-mapper", 1),
];

/// Filters devices by kind: only majors whose driver name appears in the
/// allow-list pass. The mapping from driver name to major number comes from
/// the `devices` listing under the proc directory.
pub struct TypeFilter {
    /// major number -> max partition count
    allowed: HashMap<u32, u32>,
}

impl TypeFilter {
    /// Build the allow-list.
    ///
    /// `types` is the optional `devices/types` config array of alternating
    /// name / max-partition-count pairs; when absent the built-in list is
    /// used. Fails only on malformed config entries; an unreadable proc
    /// listing leaves the allow-list empty.
    pub fn create(proc_dir: &Path, types: Option<&[Value]>) -> Result<Self> {
        let names = match types {
            None => DEFAULT_TYPES
                .iter()
                .map(|(name, parts)| (name.to_string(), *parts))
                .collect(),
            Some(values) => Self::parse_types(values)?,
        };

        let listing = proc_dir.join("devices");
        let allowed = match fs::read_to_string(&listing) {
            Ok(text) => Self::match_majors(&text, &names),
            Err(e) => {
                warn!(path = %listing.display(), "cannot read device listing, no device types allowed: {}", e);
                HashMap::new()
            }
        };

        debug!(majors = allowed.len(), "device type filter initialised");
        Ok(TypeFilter { allowed })
    }

    fn parse_types(values: &[Value]) -> Result<Vec<(String, u32)>> {
        if values.len() % 2 != 0 {
            return Err(VolmanError::FilterConstruction(
                "devices/types expects name and partition-count pairs".to_string(),
            ));
        }

        let mut names = Vec::with_capacity(values.len() / 2);
        for pair in values.chunks(2) {
            let name = pair[0].as_str().ok_or_else(|| {
                VolmanError::FilterConstruction(
                    "devices/types: type name must be a string".to_string(),
                )
            })?;
            let parts = pair[1].as_integer().filter(|n| *n > 0).ok_or_else(|| {
                VolmanError::FilterConstruction(format!(
                    "devices/types: partition count for '{}' must be a positive integer",
                    name
                ))
            })?;
            names.push((name.to_string(), parts as u32));
        }
        Ok(names)
    }

    /// Parse the "Block devices:" section of a proc `devices` listing and
    /// keep the majors whose driver name starts with an allowed type name.
    fn match_majors(listing: &str, names: &[(String, u32)]) -> HashMap<u32, u32> {
        let mut allowed = HashMap::new();
        let mut in_block_section = false;

        for line in listing.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line.starts_with("Character devices") {
                in_block_section = false;
                continue;
            }
            if line.starts_with("Block devices") {
                in_block_section = true;
                continue;
            }
            if !in_block_section {
                continue;
            }

            let mut fields = line.split_whitespace();
            let (Some(major), Some(driver)) = (fields.next(), fields.next()) else {
                continue;
            };
            let Ok(major) = major.parse::<u32>() else {
                continue;
            };

            if let Some((_, parts)) = names.iter().find(|(name, _)| driver.starts_with(name)) {
                allowed.insert(major, *parts);
            }
        }

        allowed
    }

    /// Maximum partitions tracked for a major, if the major is allowed.
    pub fn max_partitions(&self, major: u32) -> Option<u32> {
        self.allowed.get(&major).copied()
    }
}

impl DeviceFilter for TypeFilter {
    fn passes(&mut self, device: &Device) -> bool {
        let allowed = self.allowed.contains_key(&device.major());
        if !allowed {
            debug!(device = %device.path().display(), major = device.major(), "device type not in allow-list");
        }
        allowed
    }

    fn name(&self) -> &str {
        "type"
    }
}
