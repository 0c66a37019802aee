//! Log configuration consumed by the host's logging setup

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::level_filters::LevelFilter;

/// File name prefix of every log file written by the host
const LOG_PREFIX: &str = "musictech";

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Minimum level: "trace", "debug", "info", "warn" or "error"
    pub level: String,
    /// Write to stderr
    pub console_output: bool,
    /// Write to a file in `log_directory`
    pub file_output: bool,
    /// Where log files go
    pub log_directory: PathBuf,
    /// Log files kept when cleaning up, including the current one
    pub max_log_files: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console_output: true,
            file_output: false,
            log_directory: PathBuf::from("logs"),
            max_log_files: 10,
        }
    }
}

impl LogConfig {
    /// Parsed level, INFO when the string is not recognised
    pub fn parse_level(&self) -> LevelFilter {
        self.level.trim().parse().unwrap_or(LevelFilter::INFO)
    }

    /// Create the log directory when file output is enabled
    pub fn ensure_log_directory(&self) -> io::Result<()> {
        if self.file_output {
            fs::create_dir_all(&self.log_directory)?;
        }
        Ok(())
    }

    /// Path of the log file for this process
    pub fn current_log_path(&self) -> PathBuf {
        self.log_directory
            .join(format!("{}-{}.log", LOG_PREFIX, std::process::id()))
    }

    /// Delete the oldest log files so that a new one fits within
    /// `max_log_files`. Returns how many were removed.
    pub fn cleanup_old_logs(&self) -> io::Result<usize> {
        if !self.file_output || !self.log_directory.is_dir() {
            return Ok(0);
        }

        let mut logs = list_logs(&self.log_directory)?;
        let keep = self.max_log_files.saturating_sub(1);
        if logs.len() <= keep {
            return Ok(0);
        }

        logs.sort_by_key(|(modified, _)| *modified);
        let excess = logs.len() - keep;
        let mut removed = 0;
        for (_, path) in logs.into_iter().take(excess) {
            fs::remove_file(&path)?;
            removed += 1;
        }
        Ok(removed)
    }
}

fn list_logs(dir: &Path) -> io::Result<Vec<(std::time::SystemTime, PathBuf)>> {
    let mut logs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_log = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(LOG_PREFIX) && n.ends_with(".log"));
        if is_log {
            let modified = entry.metadata()?.modified()?;
            logs.push((modified, path));
        }
    }
    Ok(logs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        let mut config = LogConfig::default();
        assert_eq!(config.parse_level(), LevelFilter::INFO);

        config.level = "DEBUG".to_string();
        assert_eq!(config.parse_level(), LevelFilter::DEBUG);

        config.level = "loud".to_string();
        assert_eq!(config.parse_level(), LevelFilter::INFO);
    }

    #[test]
    fn test_log_path_is_stable() {
        let config = LogConfig::default();
        assert_eq!(config.current_log_path(), config.current_log_path());
        assert!(config.current_log_path().starts_with("logs"));
    }

    #[test]
    fn test_cleanup_keeps_newest() {
        let dir = std::env::temp_dir().join(format!("musictech-log-test-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();

        for i in 0..5 {
            fs::write(dir.join(format!("musictech-{}.log", i)), b"x").unwrap();
        }
        fs::write(dir.join("other.txt"), b"keep").unwrap();

        let config = LogConfig {
            file_output: true,
            log_directory: dir.clone(),
            max_log_files: 3,
            ..Default::default()
        };
        assert_eq!(config.cleanup_old_logs().unwrap(), 3);
        assert_eq!(list_logs(&dir).unwrap().len(), 2);
        assert!(dir.join("other.txt").exists());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_disabled_file_output_touches_nothing() {
        let config = LogConfig {
            log_directory: PathBuf::from("/nonexistent/musictech"),
            ..Default::default()
        };
        assert!(config.ensure_log_directory().is_ok());
        assert_eq!(config.cleanup_old_logs().unwrap(), 0);
    }
}
