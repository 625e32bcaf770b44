//! Configuration tree with slash-path typed accessors
//!
//! Wraps a parsed TOML table and exposes the `section/key` lookup style the
//! rest of the crate uses (`log/level`, `devices/scan`, ...). Every typed
//! accessor takes a default so callers never have to special-case an absent
//! key; a key that is present with the wrong type logs a warning and falls
//! back to the default.

use crate::error::{Result, VolmanError};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use toml::Value;
use tracing::{debug, warn};

/// Hierarchical key/value configuration source.
///
/// An empty tree (no backing file) is valid and answers every lookup with the
/// supplied default. The modification time of the backing file is captured at
/// load time; the persistent filter cache is validated against it.
pub struct ConfigTree {
    root: toml::Table,
    source: Option<PathBuf>,
    timestamp: Option<SystemTime>,
}

impl ConfigTree {
    /// Create an empty in-memory tree.
    pub fn new() -> Self {
        ConfigTree {
            root: toml::Table::new(),
            source: None,
            timestamp: None,
        }
    }

    /// Load and parse a configuration file.
    ///
    /// An unreadable or malformed file is an error; callers decide whether a
    /// missing file is acceptable before calling this.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            VolmanError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;

        let root: toml::Table = text.parse().map_err(|e| {
            VolmanError::Config(format!("malformed config file {}: {}", path.display(), e))
        })?;

        let timestamp = fs::metadata(path).and_then(|m| m.modified()).ok();
        debug!(path = %path.display(), "loaded configuration file");

        Ok(ConfigTree {
            root,
            source: Some(path.to_path_buf()),
            timestamp,
        })
    }

    /// Path of the backing file, if this tree was loaded from one.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Modification time of the backing file at load time.
    pub fn timestamp(&self) -> Option<SystemTime> {
        self.timestamp
    }

    /// Look up a raw value by slash-separated path.
    pub fn find(&self, key: &str) -> Option<&Value> {
        let mut parts = key.split('/');
        let first = parts.next()?;
        let mut current = self.root.get(first)?;
        for part in parts {
            current = current.as_table()?.get(part)?;
        }
        Some(current)
    }

    /// Integer lookup with default. Booleans are accepted as 0/1.
    pub fn find_int(&self, key: &str, default: i64) -> i64 {
        match self.find(key) {
            Some(Value::Integer(n)) => *n,
            Some(Value::Boolean(b)) => *b as i64,
            Some(_) => {
                warn!(key, "config value is not an integer, using default");
                default
            }
            None => default,
        }
    }

    /// Boolean lookup with default. Integers are accepted, zero meaning false.
    pub fn find_bool(&self, key: &str, default: bool) -> bool {
        match self.find(key) {
            Some(Value::Boolean(b)) => *b,
            Some(Value::Integer(n)) => *n != 0,
            Some(_) => {
                warn!(key, "config value is not a boolean, using default");
                default
            }
            None => default,
        }
    }

    /// String lookup; `None` when the key is absent or not a string.
    pub fn find_str(&self, key: &str) -> Option<&str> {
        match self.find(key) {
            Some(Value::String(s)) => Some(s.as_str()),
            Some(_) => {
                warn!(key, "config value is not a string, ignoring");
                None
            }
            None => None,
        }
    }

    /// String lookup with default.
    pub fn find_str_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.find_str(key).unwrap_or(default)
    }

    /// List lookup; `None` when the key is absent or not an array.
    pub fn find_list(&self, key: &str) -> Option<&[Value]> {
        match self.find(key) {
            Some(Value::Array(values)) => Some(values.as_slice()),
            Some(_) => {
                warn!(key, "config value is not a list, ignoring");
                None
            }
            None => None,
        }
    }
}

impl Default for ConfigTree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
        [log]
        level = 7
        verbose = 1
        prefix = ">> "
        command_names = true

        [global]
        test = 1
        units = "m"

        [devices]
        dir = "/dev"
        scan = ["/dev", "/mnt/extra"]
    "#;

    fn sample_tree() -> ConfigTree {
        ConfigTree {
            root: SAMPLE.parse().unwrap(),
            source: None,
            timestamp: None,
        }
    }

    #[test]
    fn test_find_int() {
        let cf = sample_tree();
        assert_eq!(cf.find_int("log/level", 0), 7);
        assert_eq!(cf.find_int("log/missing", 42), 42);
        // booleans coerce to 0/1
        assert_eq!(cf.find_int("log/command_names", 0), 1);
        // wrong type falls back to the default
        assert_eq!(cf.find_int("log/prefix", 9), 9);
    }

    #[test]
    fn test_find_bool() {
        let cf = sample_tree();
        assert!(cf.find_bool("log/command_names", false));
        assert!(cf.find_bool("global/test", false));
        assert!(!cf.find_bool("global/missing", false));
        assert!(cf.find_bool("global/missing", true));
    }

    #[test]
    fn test_find_str() {
        let cf = sample_tree();
        assert_eq!(cf.find_str("devices/dir"), Some("/dev"));
        assert_eq!(cf.find_str("log/level"), None); // wrong type
        assert_eq!(cf.find_str_or("global/units", "h"), "m");
        assert_eq!(cf.find_str_or("global/absent", "h"), "h");
    }

    #[test]
    fn test_find_list() {
        let cf = sample_tree();
        let scan = cf.find_list("devices/scan").unwrap();
        assert_eq!(scan.len(), 2);
        assert_eq!(scan[0].as_str(), Some("/dev"));
        assert_eq!(scan[1].as_str(), Some("/mnt/extra"));
        assert!(cf.find_list("devices/dir").is_none());
        assert!(cf.find_list("devices/absent").is_none());
    }

    #[test]
    fn test_empty_tree_answers_defaults() {
        let cf = ConfigTree::new();
        assert_eq!(cf.find_int("log/level", 3), 3);
        assert_eq!(cf.find_str_or("devices/dir", "/dev/"), "/dev/");
        assert!(cf.find_list("devices/scan").is_none());
        assert!(cf.timestamp().is_none());
        assert!(cf.source().is_none());
    }

    #[test]
    fn test_load_from_file() -> Result<()> {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("volman.conf");
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(SAMPLE.as_bytes()).unwrap();
        drop(f);

        let cf = ConfigTree::load(&path)?;
        assert_eq!(cf.find_int("log/level", 0), 7);
        assert_eq!(cf.source(), Some(path.as_path()));
        assert!(cf.timestamp().is_some());
        Ok(())
    }

    #[test]
    fn test_load_malformed_is_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("volman.conf");
        fs::write(&path, "log = {{{ not toml").unwrap();

        match ConfigTree::load(&path) {
            Err(VolmanError::Config(_)) => {}
            other => panic!("expected Config error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_load_missing_is_error() {
        // Callers skip the load for a missing file; a direct load reports it.
        assert!(ConfigTree::load("/nonexistent/volman.conf").is_err());
    }
}
