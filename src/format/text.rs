//! Native text metadata format

use super::{FormatCapabilities, FormatHandler};

/// Canonical name of the native format.
pub const FORMAT_NAME: &str = "text";

/// Secondary name accepted by `global/format`.
pub const FORMAT_ALIAS: &str = "volman2";

/// The built-in text representation of volume-group metadata.
///
/// Always registered, always last in the registry, and therefore the
/// guaranteed fallback when no other format claims the configured default.
/// The actual metadata encode/decode lives with the metadata subsystem; this
/// handler advertises the format and its capabilities to the registry.
pub struct TextFormat;

impl TextFormat {
    pub fn new() -> Self {
        TextFormat
    }
}

impl Default for TextFormat {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatHandler for TextFormat {
    fn name(&self) -> &str {
        FORMAT_NAME
    }

    fn alias(&self) -> Option<&str> {
        Some(FORMAT_ALIAS)
    }

    fn capabilities(&self) -> FormatCapabilities {
        FormatCapabilities {
            create_vg: true,
            read_metadata: true,
            write_metadata: true,
        }
    }
}
