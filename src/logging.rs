//! Logging policy and optional log-file sink
//!
//! The logger is an explicit object owned by the command context and passed by
//! reference to subsystems that log; there is no process-global log state.
//! Console diagnostics go through `tracing`; the optional log file configured
//! via `log/file` receives its own formatted lines.

use crate::config::ConfigTree;
use crate::settings::{self, Settings};
use chrono::Local;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use tracing::{debug, warn};

/// Message severities for the log-file sink, ordered from most to least
/// severe. Messages log when their level is at or below the debug level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error = 3,
    Warn = 4,
    Info = 6,
    Debug = 7,
}

/// Command-scoped logger.
pub struct Logger {
    file: Option<BufWriter<File>>,
    debug_level: i64,
    verbose_level: i64,
    indent: i64,
    prefix: String,
    cmd_name: bool,
    command: String,
}

impl Logger {
    /// Initialize the logging policy from configuration.
    ///
    /// This never fails: a log file that cannot be opened is reported and the
    /// logger degrades to console-only output. The logging-related fields of
    /// `settings` are filled in as a side effect.
    pub fn init(config: &ConfigTree, settings: &mut Settings, command: &str) -> Logger {
        settings.syslog = config.find_int("log/syslog", settings::DEFAULT_SYSLOG);
        settings.debug = config.find_int("log/level", settings::DEFAULT_LOG_LEVEL);
        settings.verbose = config.find_int("log/verbose", settings::DEFAULT_VERBOSE);
        settings.indent = config.find_int("log/indent", settings::DEFAULT_INDENT);
        settings.msg_prefix = config
            .find_str_or("log/prefix", settings::DEFAULT_MSG_PREFIX)
            .to_string();
        settings.cmd_name = config.find_bool("log/command_names", false);
        settings.test = config.find_bool("global/test", false);

        let overwrite = config.find_bool("log/overwrite", false);
        let file = config.find_str("log/file").and_then(|path| {
            let mut options = OpenOptions::new();
            if overwrite {
                options.write(true).truncate(true).create(true);
            } else {
                options.append(true).create(true);
            }
            match options.open(path) {
                Ok(f) => Some(BufWriter::new(f)),
                Err(e) => {
                    warn!(path, "couldn't open log file: {}", e);
                    None
                }
            }
        });

        let logger = Logger {
            file,
            debug_level: settings.debug,
            verbose_level: settings.verbose,
            indent: settings.indent,
            prefix: settings.msg_prefix.clone(),
            cmd_name: settings.cmd_name,
            command: command.to_string(),
        };

        debug!(
            command,
            debug_level = settings.debug,
            verbose_level = settings.verbose,
            "logging initialised"
        );

        logger
    }

    /// Logger with built-in defaults and no file sink.
    pub fn disabled() -> Logger {
        Logger {
            file: None,
            debug_level: settings::DEFAULT_LOG_LEVEL,
            verbose_level: settings::DEFAULT_VERBOSE,
            indent: settings::DEFAULT_INDENT,
            prefix: settings::DEFAULT_MSG_PREFIX.to_string(),
            cmd_name: false,
            command: String::new(),
        }
    }

    /// True when a log file is open.
    pub fn has_file(&self) -> bool {
        self.file.is_some()
    }

    pub fn verbose_level(&self) -> i64 {
        self.verbose_level
    }

    /// Write a message to the log file if one is open and the severity
    /// clears the configured debug level.
    pub fn message(&mut self, severity: Severity, msg: &str) {
        let Some(file) = self.file.as_mut() else {
            return;
        };
        if (severity as i64) > self.debug_level {
            return;
        }

        let indent = if self.indent > 0 { "  " } else { "" };
        let command = if self.cmd_name {
            format!("{}: ", self.command)
        } else {
            String::new()
        };
        let line = format!(
            "{} {}{}{}{}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            self.prefix,
            command,
            indent,
            msg
        );
        if writeln!(file, "{}", line).is_err() {
            // Lost log line; console diagnostics still work.
            self.file = None;
            warn!("log file became unwritable, continuing without file output");
        }
    }

    pub fn error(&mut self, msg: &str) {
        self.message(Severity::Error, msg);
    }

    pub fn info(&mut self, msg: &str) {
        self.message(Severity::Info, msg);
    }

    pub fn debug(&mut self, msg: &str) {
        self.message(Severity::Debug, msg);
    }

    /// Flush any buffered log-file output.
    pub fn flush(&mut self) {
        if let Some(file) = self.file.as_mut() {
            let _ = file.flush();
        }
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn tree(text: &str) -> ConfigTree {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("volman.conf");
        fs::write(&path, text).unwrap();
        ConfigTree::load(&path).unwrap()
    }

    #[test]
    fn test_init_fills_settings() {
        let cf = tree(
            r#"
            [log]
            syslog = 2
            level = 7
            verbose = 1
            prefix = ">> "
            command_names = true

            [global]
            test = true
        "#,
        );
        let mut settings = Settings::default();
        let logger = Logger::init(&cf, &mut settings, "vgscan");

        assert_eq!(settings.syslog, 2);
        assert_eq!(settings.debug, 7);
        assert_eq!(settings.verbose, 1);
        assert_eq!(settings.msg_prefix, ">> ");
        assert!(settings.cmd_name);
        assert!(settings.test);
        assert!(!logger.has_file());
    }

    #[test]
    fn test_log_file_receives_messages() {
        let dir = tempfile::TempDir::new().unwrap();
        let log_path = dir.path().join("volman.log");
        let conf = format!(
            "[log]\nlevel = 7\nfile = \"{}\"\nprefix = \"## \"\n",
            log_path.display()
        );
        let conf_path = dir.path().join("volman.conf");
        fs::write(&conf_path, conf).unwrap();
        let cf = ConfigTree::load(&conf_path).unwrap();

        let mut settings = Settings::default();
        let mut logger = Logger::init(&cf, &mut settings, "vgscan");
        assert!(logger.has_file());

        logger.info("scanning for volume groups");
        logger.flush();

        let text = fs::read_to_string(&log_path).unwrap();
        assert!(text.contains("## "));
        assert!(text.contains("scanning for volume groups"));
    }

    #[test]
    fn test_debug_level_filters_file_output() {
        let dir = tempfile::TempDir::new().unwrap();
        let log_path = dir.path().join("volman.log");
        let conf = format!("[log]\nlevel = 3\nfile = \"{}\"\n", log_path.display());
        let conf_path = dir.path().join("volman.conf");
        fs::write(&conf_path, conf).unwrap();
        let cf = ConfigTree::load(&conf_path).unwrap();

        let mut settings = Settings::default();
        let mut logger = Logger::init(&cf, &mut settings, "vgscan");

        logger.debug("not written at level 3");
        logger.error("written at level 3");
        logger.flush();

        let text = fs::read_to_string(&log_path).unwrap();
        assert!(!text.contains("not written"));
        assert!(text.contains("written at level 3"));
    }

    #[test]
    fn test_unopenable_log_file_degrades() {
        let cf = tree("[log]\nfile = \"/nonexistent-dir/volman.log\"\n");
        let mut settings = Settings::default();
        let logger = Logger::init(&cf, &mut settings, "vgscan");
        // Construction succeeded, just without the file sink.
        assert!(!logger.has_file());
    }

    #[test]
    fn test_overwrite_truncates() {
        let dir = tempfile::TempDir::new().unwrap();
        let log_path = dir.path().join("volman.log");
        fs::write(&log_path, "old contents\n").unwrap();

        let conf = format!(
            "[log]\nlevel = 7\noverwrite = true\nfile = \"{}\"\n",
            log_path.display()
        );
        let conf_path = dir.path().join("volman.conf");
        fs::write(&conf_path, conf).unwrap();
        let cf = ConfigTree::load(&conf_path).unwrap();

        let mut settings = Settings::default();
        let mut logger = Logger::init(&cf, &mut settings, "vgscan");
        logger.info("fresh");
        logger.flush();

        let text = fs::read_to_string(&log_path).unwrap();
        assert!(!text.contains("old contents"));
        assert!(text.contains("fresh"));
    }
}
