//! Command context: construction order and the single teardown path
//!
//! The context is the dependency-injection root for one command invocation.
//! Construction is a strictly ordered sequence of fallible steps; any fatal
//! failure aborts the remaining steps and unwinds whatever was already built,
//! returning no context. Teardown happens exactly once in `Drop`: the
//! persistent filter cache is dumped while the filter is still alive, then
//! fields are released in declaration order, the logger last.

use crate::arena::Arena;
use crate::config::ConfigTree;
use crate::devcache::DeviceCache;
use crate::error::{Result, VolmanError};
use crate::filter::{CompositeFilter, DeviceFilter, PersistentFilter, RegexFilter, TypeFilter};
use crate::format::{FormatRegistry, PluginLoader, UnsupportedLoader};
use crate::logging::Logger;
use crate::settings::{self, Settings};
use std::env;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// Environment variable overriding the system directory. Setting it to an
/// empty value disables the configuration file and the persistent cache.
pub const SYSTEM_DIR_ENV: &str = "VOLMAN_SYSTEM_DIR";

const CONFIG_FILE_NAME: &str = "volman.conf";
const CACHE_FILE_NAME: &str = ".cache";
const ARENA_SIZE: usize = 4 * 1024;

/// Per-invocation root object owning the filter chain, the format registry,
/// the memory arena and the settings snapshot.
///
/// Field order is teardown order.
pub struct CommandContext {
    dump_filter: bool,
    system_dir: Option<PathBuf>,
    dev_dir: PathBuf,
    proc_dir: PathBuf,
    dev_cache: DeviceCache,
    formats: FormatRegistry,
    filter: PersistentFilter,
    arena: Arena,
    config: ConfigTree,
    default_settings: Settings,
    current_settings: Settings,
    logger: Logger,
}

/// Builder for [`CommandContext`].
///
/// The defaults resolve the system directory from the environment and use
/// the loader that rejects dynamic format modules; both can be overridden,
/// which is how tests construct hermetic contexts.
pub struct ContextBuilder {
    command_name: String,
    system_dir: Option<Option<PathBuf>>,
    loader: Box<dyn PluginLoader>,
}

impl ContextBuilder {
    pub fn new() -> Self {
        ContextBuilder {
            command_name: "volman".to_string(),
            system_dir: None,
            loader: Box::new(UnsupportedLoader),
        }
    }

    /// Name of the running sub-command, used in log message formatting.
    pub fn command_name<S: Into<String>>(mut self, name: S) -> Self {
        self.command_name = name.into();
        self
    }

    /// Use an explicit system directory instead of consulting the
    /// environment.
    pub fn system_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.system_dir = Some(Some(dir.into()));
        self
    }

    /// Run without a system directory: no configuration file and no
    /// persistent cache, equivalent to an empty environment override.
    pub fn without_system_dir(mut self) -> Self {
        self.system_dir = Some(None);
        self
    }

    /// Inject the capability used to load format plugins.
    pub fn plugin_loader(mut self, loader: Box<dyn PluginLoader>) -> Self {
        self.loader = loader;
        self
    }

    /// Run the construction sequence.
    pub fn build(self) -> Result<CommandContext> {
        // 1. system directory: explicit override beats the environment
        let system_dir = match self.system_dir {
            Some(dir) => dir,
            None => resolve_system_dir(env::var_os(SYSTEM_DIR_ENV).as_deref())?,
        };

        // 2. the directory must exist before config and cache files can
        if let Some(dir) = &system_dir {
            fs::create_dir_all(dir).map_err(|e| {
                VolmanError::Path(format!(
                    "failed to create system directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        }

        // 3. configuration tree; a missing file is not an error
        let config = match &system_dir {
            Some(dir) => {
                let path = dir.join(CONFIG_FILE_NAME);
                if path.exists() {
                    ConfigTree::load(&path)?
                } else {
                    debug!(path = %path.display(), "no config file, using built-in defaults");
                    ConfigTree::new()
                }
            }
            None => {
                debug!("system directory disabled, using built-in defaults");
                ConfigTree::new()
            }
        };

        // 4. logging policy; never aborts construction
        let mut config_settings = Settings::default();
        let logger = Logger::init(&config, &mut config_settings, &self.command_name);

        // 5. remaining global settings
        process_config(&config, &mut config_settings)?;
        let dev_dir = PathBuf::from(config.find_str_or("devices/dir", settings::DEFAULT_DEV_DIR));
        let proc_dir =
            PathBuf::from(config.find_str_or("global/proc", settings::DEFAULT_PROC_DIR));

        // 6. device cache directory list
        let dev_cache = init_dev_cache(&config)?;

        // 7. filter pipeline and persistent cache
        let (filter, dump_filter) = init_filters(&config, system_dir.as_deref(), &proc_dir)?;

        // 8. memory arena
        let arena = Arena::with_capacity(ARENA_SIZE)?;

        // 9. format registry and default resolution
        let mut formats = FormatRegistry::build(&config, self.loader.as_ref())?;
        let default_format = config
            .find_str_or("global/format", settings::DEFAULT_FORMAT)
            .to_string();
        formats.select_default(&default_format)?;

        // 10. settings snapshot: default and current start identical
        let current_settings = config_settings.clone();

        info!(
            command = %self.command_name,
            system_dir = %system_dir.as_deref().map(|d| d.display().to_string()).unwrap_or_default(),
            formats = formats.len(),
            "command context initialised"
        );

        Ok(CommandContext {
            dump_filter,
            system_dir,
            dev_dir,
            proc_dir,
            dev_cache,
            formats,
            filter,
            arena,
            config,
            default_settings: config_settings,
            current_settings,
            logger,
        })
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CommandContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandContext")
            .field("dump_filter", &self.dump_filter)
            .field("system_dir", &self.system_dir)
            .field("dev_dir", &self.dev_dir)
            .field("proc_dir", &self.proc_dir)
            .finish_non_exhaustive()
    }
}

impl CommandContext {
    /// Construct a context with environment-derived defaults.
    pub fn create() -> Result<Self> {
        ContextBuilder::new().build()
    }

    pub fn system_dir(&self) -> Option<&Path> {
        self.system_dir.as_deref()
    }

    pub fn dev_dir(&self) -> &Path {
        &self.dev_dir
    }

    pub fn proc_dir(&self) -> &Path {
        &self.proc_dir
    }

    pub fn config(&self) -> &ConfigTree {
        &self.config
    }

    pub fn dev_cache(&self) -> &DeviceCache {
        &self.dev_cache
    }

    pub fn filter(&self) -> &PersistentFilter {
        &self.filter
    }

    pub fn filter_mut(&mut self) -> &mut PersistentFilter {
        &mut self.filter
    }

    pub fn formats(&self) -> &FormatRegistry {
        &self.formats
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn arena_mut(&mut self) -> &mut Arena {
        &mut self.arena
    }

    pub fn logger_mut(&mut self) -> &mut Logger {
        &mut self.logger
    }

    /// Walk the registered device directories and return the block devices
    /// the filter chain lets through.
    #[cfg(unix)]
    pub fn scan_devices(&mut self) -> Vec<crate::devcache::Device> {
        self.dev_cache.scan(&mut self.filter)
    }

    /// Whether the persistent filter cache will be written at teardown.
    pub fn dumps_filter_cache(&self) -> bool {
        self.dump_filter
    }

    /// Config-derived baseline settings.
    pub fn default_settings(&self) -> &Settings {
        &self.default_settings
    }

    /// Settings in effect for the running sub-command.
    pub fn current_settings(&self) -> &Settings {
        &self.current_settings
    }

    /// Overlay per-sub-command settings; the baseline is untouched.
    pub fn set_current_settings(&mut self, settings: Settings) {
        self.current_settings = settings;
    }

    /// Restore the current settings to the config-derived baseline.
    pub fn reset_current_settings(&mut self) {
        self.current_settings = self.default_settings.clone();
    }
}

impl Drop for CommandContext {
    fn drop(&mut self) {
        // Dump while the filter chain is still alive; the remaining fields
        // release in declaration order, the logger last.
        if self.dump_filter {
            if let Err(e) = self.filter.dump() {
                warn!(
                    path = %self.filter.cache_path().display(),
                    "failed to write persistent filter cache: {}", e
                );
            }
        }
        self.logger.flush();
    }
}

/// Interpret the system-directory environment override. An unset variable
/// selects the built-in default, an empty value disables the directory, a
/// non-UTF-8 value is a path error.
fn resolve_system_dir(env_value: Option<&OsStr>) -> Result<Option<PathBuf>> {
    match env_value {
        None => Ok(Some(PathBuf::from(settings::DEFAULT_SYS_DIR))),
        Some(value) if value.is_empty() => Ok(None),
        Some(value) => match value.to_str() {
            Some(s) => Ok(Some(PathBuf::from(s))),
            None => Err(VolmanError::Path(format!(
                "{} is not valid UTF-8",
                SYSTEM_DIR_ENV
            ))),
        },
    }
}

fn process_config(config: &ConfigTree, settings: &mut Settings) -> Result<()> {
    settings.umask = config.find_int("global/umask", settings::DEFAULT_UMASK as i64) as u32;
    #[cfg(unix)]
    {
        let old = unsafe { libc::umask(settings.umask as libc::mode_t) };
        if old != settings.umask as libc::mode_t {
            debug!("set umask to {:04o}", settings.umask);
        }
    }

    settings.activation = config.find_bool("global/activation", true);
    settings.suffix = config.find_bool("global/suffix", true);

    let units = config.find_str_or("global/units", settings::DEFAULT_UNITS);
    let (factor, unit_type) = settings::units_to_bytes(units)?;
    settings.unit_factor = factor;
    settings.unit_type = unit_type;

    Ok(())
}

fn init_dev_cache(config: &ConfigTree) -> Result<DeviceCache> {
    let mut cache = DeviceCache::new();

    match config.find_list("devices/scan") {
        None => {
            cache.add_dir("/dev")?;
            debug!("devices/scan not in config file: defaulting to /dev");
        }
        Some(values) => {
            for value in values {
                let dir = value.as_str().ok_or_else(|| {
                    VolmanError::Config("devices/scan entries must be strings".to_string())
                })?;
                cache.add_dir(dir)?;
            }
        }
    }

    Ok(cache)
}

fn init_filters(
    config: &ConfigTree,
    system_dir: Option<&Path>,
    proc_dir: &Path,
) -> Result<(PersistentFilter, bool)> {
    let type_filter = TypeFilter::create(proc_dir, config.find_list("devices/types"))?;

    // Regex composes before Type, so a pattern rejection is reported ahead
    // of a type rejection.
    let inner: Box<dyn DeviceFilter> = match config.find_list("devices/filter") {
        None => {
            debug!("devices/filter not found in config file: no regex filter installed");
            Box::new(type_filter)
        }
        Some(values) => {
            let patterns = values
                .iter()
                .map(|v| {
                    v.as_str().map(str::to_string).ok_or_else(|| {
                        VolmanError::Config("devices/filter entries must be strings".to_string())
                    })
                })
                .collect::<Result<Vec<String>>>()?;
            let regex = RegexFilter::create(&patterns)?;
            Box::new(CompositeFilter::new(vec![
                Box::new(regex),
                Box::new(type_filter),
            ]))
        }
    };

    let cache_path = match config.find_str("devices/cache") {
        Some(path) => PathBuf::from(path),
        None => system_dir
            .map(|dir| dir.join(CACHE_FILE_NAME))
            .unwrap_or_default(),
    };
    let mut filter = PersistentFilter::new(inner, cache_path);

    let mut dump_filter = config.find_bool("devices/write_cache_state", true);
    if system_dir.is_none() {
        dump_filter = false;
    }

    // The cache is valid only if it postdates the last configuration change.
    if cache_is_fresh(filter.cache_path(), config.timestamp()) {
        if let Err(e) = filter.load() {
            info!(
                path = %filter.cache_path().display(),
                "failed to load existing device cache: {}", e
            );
        }
    }

    Ok((filter, dump_filter))
}

/// A backing file qualifies for loading when it exists and its modification
/// time is strictly newer than the configuration source's. A configuration
/// without a backing file never invalidates the cache.
fn cache_is_fresh(cache_path: &Path, config_timestamp: Option<SystemTime>) -> bool {
    if cache_path.as_os_str().is_empty() {
        return false;
    }
    let Ok(modified) = fs::metadata(cache_path).and_then(|m| m.modified()) else {
        return false;
    };
    match config_timestamp {
        None => true,
        Some(config_time) => modified > config_time,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::Duration;

    #[test]
    fn test_resolve_system_dir_default() {
        let dir = resolve_system_dir(None).unwrap();
        assert_eq!(dir, Some(PathBuf::from(settings::DEFAULT_SYS_DIR)));
    }

    #[test]
    fn test_resolve_system_dir_override() {
        let dir = resolve_system_dir(Some(OsStr::new("/tmp/volman-test"))).unwrap();
        assert_eq!(dir, Some(PathBuf::from("/tmp/volman-test")));
    }

    #[test]
    fn test_resolve_system_dir_empty_disables() {
        let dir = resolve_system_dir(Some(OsStr::new(""))).unwrap();
        assert_eq!(dir, None);
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_system_dir_non_utf8_is_error() {
        use std::os::unix::ffi::OsStrExt;
        let bad = OsStr::from_bytes(&[0x2f, 0xff, 0xfe]);
        assert!(matches!(
            resolve_system_dir(Some(bad)),
            Err(VolmanError::Path(_))
        ));
    }

    #[test]
    fn test_cache_is_fresh_rules() {
        let dir = tempfile::TempDir::new().unwrap();
        let cache = dir.path().join(".cache");

        // missing cache file is never fresh
        assert!(!cache_is_fresh(&cache, None));

        fs::write(&cache, "{}").unwrap();

        // no config timestamp: any existing cache qualifies
        assert!(cache_is_fresh(&cache, None));

        // cache older than the config change does not qualify
        let file = File::options().write(true).open(&cache).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(60))
            .unwrap();
        drop(file);
        assert!(!cache_is_fresh(&cache, Some(SystemTime::now())));

        // cache strictly newer than the config change qualifies
        let old_config = SystemTime::now() - Duration::from_secs(3600);
        assert!(cache_is_fresh(&cache, Some(old_config)));

        // empty path (disabled system directory) is never fresh
        assert!(!cache_is_fresh(Path::new(""), None));
    }

    #[test]
    fn test_equal_timestamps_are_stale() {
        let dir = tempfile::TempDir::new().unwrap();
        let cache = dir.path().join(".cache");
        fs::write(&cache, "{}").unwrap();

        let modified = fs::metadata(&cache).unwrap().modified().unwrap();
        // "strictly newer" means an identical timestamp does not qualify
        assert!(!cache_is_fresh(&cache, Some(modified)));
    }
}
