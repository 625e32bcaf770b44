//! # volman — volume manager bootstrap core
//!
//! `volman` is the bootstrap and resource-composition core of a block-storage
//! volume-management tool. Before any volume operation runs it decides which
//! block devices are visible at all (a composable filter pipeline), caches
//! that decision durably across invocations, and loads the set of on-disk
//! metadata format handlers that know how to read and write volume-group
//! metadata.
//!
//! Everything hangs off one [`CommandContext`], constructed once per command
//! invocation by a strictly ordered, fail-fast sequence and torn down exactly
//! once:
//!
//! ```rust,no_run
//! use volman::{CommandContext, Result};
//!
//! # fn main() -> Result<()> {
//! let mut ctx = CommandContext::create()?;
//!
//! println!("default format: {}", ctx.formats().default_format().name());
//!
//! // Scan the registered device directories through the filter chain.
//! for device in ctx.scan_devices() {
//!     println!("visible: {}", device.path().display());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Pieces
//!
//! - [`config`] — TOML-backed configuration tree with slash-path lookups
//! - [`filter`] — device visibility: type, regex, composite and persistent
//!   filter layers
//! - [`format`] — metadata format handlers, plugin loading and the registry
//! - [`devcache`] — registered device directories and block-device scanning
//! - [`context`] — construction order, settings snapshot, teardown path
//!
//! The crate is synchronous and single-threaded: one context per process,
//! no locking protocol for the shared cache file beyond the
//! modification-time staleness rule.

pub mod arena;
pub mod config;
pub mod context;
pub mod devcache;
pub mod error;
pub mod filter;
pub mod format;
pub mod logging;
pub mod settings;

pub use arena::Arena;
pub use config::ConfigTree;
pub use context::{CommandContext, ContextBuilder, SYSTEM_DIR_ENV};
pub use devcache::{Device, DeviceCache};
pub use error::{Result, VolmanError};
pub use filter::{CompositeFilter, DeviceFilter, PersistentFilter, RegexFilter, TypeFilter};
pub use format::{
    FormatCapabilities, FormatHandler, FormatRegistry, PluginLoader, TextFormat, UnsupportedLoader,
};
pub use logging::Logger;
pub use settings::Settings;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
