//! Persistent decision cache around an inner filter

use super::DeviceFilter;
use crate::devcache::Device;
use crate::error::{Result, VolmanError};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Wraps an inner filter with an on-disk cache of past decisions.
///
/// A cache hit answers without consulting the inner chain; a miss evaluates
/// the inner filter, records the verdict and marks the mapping dirty. The
/// backing file is a JSON object mapping device identity to verdict; its
/// validity against configuration staleness is the orchestrator's concern.
pub struct PersistentFilter {
    inner: Box<dyn DeviceFilter>,
    decisions: HashMap<String, bool>,
    dirty: bool,
    path: PathBuf,
}

impl PersistentFilter {
    pub fn new<P: Into<PathBuf>>(inner: Box<dyn DeviceFilter>, cache_path: P) -> Self {
        PersistentFilter {
            inner,
            decisions: HashMap::new(),
            dirty: false,
            path: cache_path.into(),
        }
    }

    /// Path of the backing file.
    pub fn cache_path(&self) -> &Path {
        &self.path
    }

    /// True when in-memory decisions have not been dumped yet.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Number of cached decisions.
    pub fn len(&self) -> usize {
        self.decisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }

    /// Replace the in-memory mapping with the backing file's contents.
    ///
    /// Callers treat failure as non-fatal: the filter keeps working with a
    /// cold cache.
    pub fn load(&mut self) -> Result<()> {
        let text = fs::read_to_string(&self.path).map_err(|e| {
            VolmanError::CacheLoad(format!("{}: {}", self.path.display(), e))
        })?;
        let decisions: HashMap<String, bool> = serde_json::from_str(&text).map_err(|e| {
            VolmanError::CacheLoad(format!("{}: {}", self.path.display(), e))
        })?;

        debug!(
            path = %self.path.display(),
            entries = decisions.len(),
            "loaded persistent filter cache"
        );
        self.decisions = decisions;
        self.dirty = false;
        Ok(())
    }

    /// Serialize the current mapping to the backing file.
    ///
    /// The write is atomic with respect to readers: a sibling temporary file
    /// is renamed over the target.
    pub fn dump(&mut self) -> Result<()> {
        let tmp = self.path.with_file_name(format!(
            "{}.tmp",
            self.path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "cache".to_string())
        ));

        let text = serde_json::to_string_pretty(&self.decisions)?;
        fs::write(&tmp, text)?;
        fs::rename(&tmp, &self.path)?;

        debug!(
            path = %self.path.display(),
            entries = self.decisions.len(),
            "wrote persistent filter cache"
        );
        self.dirty = false;
        Ok(())
    }
}

impl DeviceFilter for PersistentFilter {
    fn passes(&mut self, device: &Device) -> bool {
        let identity = device.identity();
        if let Some(&verdict) = self.decisions.get(&identity) {
            return verdict;
        }

        let verdict = self.inner.passes(device);
        self.decisions.insert(identity, verdict);
        self.dirty = true;
        verdict
    }

    fn name(&self) -> &str {
        "persistent"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    struct Counting {
        verdict: bool,
        calls: Rc<Cell<usize>>,
    }

    impl Counting {
        fn boxed(verdict: bool) -> (Box<dyn DeviceFilter>, Rc<Cell<usize>>) {
            let calls = Rc::new(Cell::new(0));
            (
                Box::new(Counting {
                    verdict,
                    calls: Rc::clone(&calls),
                }),
                calls,
            )
        }
    }

    impl DeviceFilter for Counting {
        fn passes(&mut self, _device: &Device) -> bool {
            self.calls.set(self.calls.get() + 1);
            self.verdict
        }
        fn name(&self) -> &str {
            "counting"
        }
    }

    fn dev(path: &str) -> Device {
        Device::new(path, 8, 0)
    }

    #[test]
    fn test_cold_cache_defers_to_inner_once() {
        let (inner, calls) = Counting::boxed(true);
        let mut f = PersistentFilter::new(inner, "/unused/.cache");

        // first call consults the inner filter
        assert!(f.passes(&dev("/dev/sda1")));
        assert_eq!(calls.get(), 1);

        // subsequent calls are answered from the cache
        assert!(f.passes(&dev("/dev/sda1")));
        assert!(f.passes(&dev("/dev/sda1")));
        assert_eq!(calls.get(), 1);
        assert!(f.is_dirty());
    }

    #[test]
    fn test_distinct_devices_cached_separately() {
        let (inner, calls) = Counting::boxed(false);
        let mut f = PersistentFilter::new(inner, "/unused/.cache");

        assert!(!f.passes(&dev("/dev/sda1")));
        assert!(!f.passes(&dev("/dev/sdb1")));
        assert_eq!(calls.get(), 2);
        assert_eq!(f.len(), 2);
    }

    #[test]
    fn test_loaded_decision_bypasses_inner() -> Result<()> {
        let dir = tempfile::TempDir::new().unwrap();
        let cache = dir.path().join(".cache");
        fs::write(&cache, r#"{"/dev/sda1": false}"#).unwrap();

        // inner would accept, but the cached rejection wins
        let (inner, calls) = Counting::boxed(true);
        let mut f = PersistentFilter::new(inner, &cache);
        f.load()?;

        assert!(!f.passes(&dev("/dev/sda1")));
        assert_eq!(calls.get(), 0);
        Ok(())
    }

    #[test]
    fn test_dump_then_load_round_trip() -> Result<()> {
        let dir = tempfile::TempDir::new().unwrap();
        let cache = dir.path().join(".cache");

        let (inner, _) = Counting::boxed(true);
        let mut f = PersistentFilter::new(inner, &cache);
        f.passes(&dev("/dev/sda1"));
        f.dump()?;
        assert!(!f.is_dirty());
        assert!(cache.exists());

        let (inner2, calls2) = Counting::boxed(false);
        let mut g = PersistentFilter::new(inner2, &cache);
        g.load()?;
        assert!(g.passes(&dev("/dev/sda1")));
        assert_eq!(calls2.get(), 0);
        Ok(())
    }

    #[test]
    fn test_load_missing_file_is_cache_load_error() {
        let (inner, _) = Counting::boxed(true);
        let mut f = PersistentFilter::new(inner, "/nonexistent/.cache");
        assert!(matches!(f.load(), Err(VolmanError::CacheLoad(_))));
    }

    #[test]
    fn test_load_corrupt_file_is_cache_load_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let cache = dir.path().join(".cache");
        fs::write(&cache, "not json at all").unwrap();

        let (inner, _) = Counting::boxed(true);
        let mut f = PersistentFilter::new(inner, &cache);
        assert!(matches!(f.load(), Err(VolmanError::CacheLoad(_))));

        // filter still works cold after a failed load
        assert!(f.passes(&dev("/dev/sda1")));
    }
}
