//! Settings snapshot and built-in defaults
//!
//! The context captures one `Settings` from configuration at construction and
//! keeps two copies: `default` (the config-derived baseline) and `current`
//! (adjustable per sub-command).

use crate::error::{Result, VolmanError};

pub const DEFAULT_SYS_DIR: &str = "/etc/volman";
pub const DEFAULT_DEV_DIR: &str = "/dev/";
pub const DEFAULT_PROC_DIR: &str = "/proc";
pub const DEFAULT_UMASK: u32 = 0o077;
pub const DEFAULT_UNITS: &str = "h";
pub const DEFAULT_FORMAT: &str = "text";
pub const DEFAULT_MSG_PREFIX: &str = "  ";
pub const DEFAULT_SYSLOG: i64 = 1;
pub const DEFAULT_LOG_LEVEL: i64 = 0;
pub const DEFAULT_VERBOSE: i64 = 0;
pub const DEFAULT_INDENT: i64 = 1;

/// Global settings captured once per invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Syslog facility level; values above 1 raise the severity floor.
    pub syslog: i64,
    /// Debug level for log file output.
    pub debug: i64,
    /// Verbose level for console output.
    pub verbose: i64,
    /// Indent width for log message formatting.
    pub indent: i64,
    /// Prefix prepended to every log message.
    pub msg_prefix: String,
    /// Include the command name in log messages.
    pub cmd_name: bool,
    /// Test mode: no on-disk metadata is modified.
    pub test: bool,
    /// Process umask applied at startup.
    pub umask: u32,
    /// Volume activation enabled.
    pub activation: bool,
    /// Append a unit suffix when displaying sizes.
    pub suffix: bool,
    /// Byte factor of the configured display unit.
    pub unit_factor: u64,
    /// Canonical character of the configured display unit.
    pub unit_type: char,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            syslog: DEFAULT_SYSLOG,
            debug: DEFAULT_LOG_LEVEL,
            verbose: DEFAULT_VERBOSE,
            indent: DEFAULT_INDENT,
            msg_prefix: DEFAULT_MSG_PREFIX.to_string(),
            cmd_name: false,
            test: false,
            umask: DEFAULT_UMASK,
            activation: true,
            suffix: true,
            unit_factor: 1024,
            unit_type: 'h',
        }
    }
}

/// Parse a display-unit specification into a byte factor and canonical type.
///
/// Lowercase units are binary (KiB-based), uppercase are SI (1000-based).
/// `h`/`H` select human-readable output; the factor then only seeds the
/// renderer's starting scale.
pub fn units_to_bytes(spec: &str) -> Result<(u64, char)> {
    let mut chars = spec.chars();
    let unit = chars
        .next()
        .ok_or_else(|| VolmanError::InvalidUnits("empty units specification".to_string()))?;
    if chars.next().is_some() {
        return Err(VolmanError::InvalidUnits(spec.to_string()));
    }

    let factor: u64 = match unit {
        'h' | 'H' => 1024,
        'b' | 'B' => 1,
        's' | 'S' => 512,
        'k' => 1024,
        'm' => 1024 * 1024,
        'g' => 1024 * 1024 * 1024,
        't' => 1024u64.pow(4),
        'p' => 1024u64.pow(5),
        'e' => 1024u64.pow(6),
        'K' => 1000,
        'M' => 1000 * 1000,
        'G' => 1000 * 1000 * 1000,
        'T' => 1000u64.pow(4),
        'P' => 1000u64.pow(5),
        'E' => 1000u64.pow(6),
        _ => return Err(VolmanError::InvalidUnits(spec.to_string())),
    };

    Ok((factor, unit))
}
