//! Metadata format handlers and their registry
//!
//! A format handler knows how to read and write one on-disk metadata
//! representation for volume groups. The registry keeps handlers in a fixed
//! order: the optional legacy built-in, then any configured plugins, then the
//! native text format, which is always present and always last so it can
//! serve as the guaranteed fallback and backup target.

#[cfg(feature = "format-legacy")]
mod legacy;
mod text;

#[cfg(feature = "format-legacy")]
pub use self::legacy::LegacyFormat;
pub use self::text::TextFormat;

use crate::config::ConfigTree;
use crate::error::{Result, VolmanError};
use tracing::{debug, info};

/// What a format handler is able to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatCapabilities {
    pub create_vg: bool,
    pub read_metadata: bool,
    pub write_metadata: bool,
}

/// One pluggable on-disk metadata representation.
///
/// Handlers that originate from a dynamically loaded module keep the module
/// alive for as long as the handler exists; dropping the handler releases it.
pub trait FormatHandler {
    /// Canonical format name, matched case-insensitively by
    /// [`FormatRegistry::select_default`].
    fn name(&self) -> &str;

    /// Optional secondary name, also matched during default selection.
    fn alias(&self) -> Option<&str> {
        None
    }

    fn capabilities(&self) -> FormatCapabilities;
}

/// Capability for loading format plugins from the platform's module loader.
///
/// The registry never performs platform-specific loading itself; it only
/// invokes this injected capability, so the core stays platform-agnostic and
/// tests can supply a fake.
pub trait PluginLoader {
    /// Load the format plugin at `path` and return its constructed handler.
    fn load(&self, path: &str) -> Result<Box<dyn FormatHandler>>;
}

/// Loader for builds that carry no dynamic-module support. Any configured
/// `global/format_libraries` entry is then a fatal configuration problem.
pub struct UnsupportedLoader;

impl PluginLoader for UnsupportedLoader {
    fn load(&self, path: &str) -> Result<Box<dyn FormatHandler>> {
        Err(VolmanError::FormatLoad(format!(
            "dynamic format modules are not supported in this build: {}",
            path
        )))
    }
}

/// Ordered collection of format handlers plus default-selection state.
pub struct FormatRegistry {
    handlers: Vec<Box<dyn FormatHandler>>,
    default_idx: usize,
}

impl FormatRegistry {
    /// Build the registry in its fixed order: legacy built-in (when compiled
    /// in), plugins listed under `global/format_libraries`, native text
    /// format last. Any plugin failure aborts construction.
    pub fn build(config: &ConfigTree, loader: &dyn PluginLoader) -> Result<Self> {
        let mut handlers: Vec<Box<dyn FormatHandler>> = Vec::new();

        #[cfg(feature = "format-legacy")]
        handlers.push(Box::new(LegacyFormat));

        if let Some(libraries) = config.find_list("global/format_libraries") {
            for value in libraries {
                let path = value.as_str().ok_or_else(|| {
                    VolmanError::Config(
                        "global/format_libraries entries must be strings".to_string(),
                    )
                })?;
                let handler = loader.load(path)?;
                info!(path, format = handler.name(), "loaded format plugin");
                handlers.push(handler);
            }
        }

        handlers.push(Box::new(TextFormat::new()));

        Self::from_handlers(handlers)
    }

    /// Assemble a registry from an explicit handler list. The last handler
    /// plays the backup role, so the list must not be empty.
    pub fn from_handlers(handlers: Vec<Box<dyn FormatHandler>>) -> Result<Self> {
        if handlers.is_empty() {
            return Err(VolmanError::FormatLoad(
                "format registry cannot be empty".to_string(),
            ));
        }
        let default_idx = handlers.len() - 1;
        Ok(FormatRegistry {
            handlers,
            default_idx,
        })
    }

    /// Resolve the configured default format by name or alias,
    /// case-insensitively. The first registered match wins. No match leaves
    /// the registry unusable and is a fatal configuration error.
    pub fn select_default(&mut self, name: &str) -> Result<()> {
        let found = self.handlers.iter().position(|handler| {
            handler.name().eq_ignore_ascii_case(name)
                || handler
                    .alias()
                    .is_some_and(|alias| alias.eq_ignore_ascii_case(name))
        });

        match found {
            Some(idx) => {
                debug!(format = self.handlers[idx].name(), "selected default format");
                self.default_idx = idx;
                Ok(())
            }
            None => Err(VolmanError::FormatSelection(name.to_string())),
        }
    }

    /// The currently selected default handler.
    pub fn default_format(&self) -> &dyn FormatHandler {
        self.handlers[self.default_idx].as_ref()
    }

    /// The always-present built-in fallback, by construction the last entry.
    pub fn backup_format(&self) -> &dyn FormatHandler {
        self.handlers
            .last()
            .expect("registry is never empty")
            .as_ref()
    }

    /// Registered handlers in insertion order.
    pub fn handlers(&self) -> impl Iterator<Item = &dyn FormatHandler> {
        self.handlers.iter().map(|h| h.as_ref())
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
