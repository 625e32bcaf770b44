//! Legacy built-in metadata format (compiled in on demand)

use super::{FormatCapabilities, FormatHandler};

/// First-generation on-disk metadata representation.
///
/// Kept for reading and migrating old volume groups; new volume groups are
/// created with the text format.
pub struct LegacyFormat;

impl FormatHandler for LegacyFormat {
    fn name(&self) -> &str {
        "legacy"
    }

    fn alias(&self) -> Option<&str> {
        Some("volman1")
    }

    fn capabilities(&self) -> FormatCapabilities {
        FormatCapabilities {
            create_vg: false,
            read_metadata: true,
            write_metadata: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_format_cannot_create() {
        let fmt = LegacyFormat;
        assert_eq!(fmt.name(), "legacy");
        assert!(!fmt.capabilities().create_vg);
        assert!(fmt.capabilities().read_metadata);
    }
}
