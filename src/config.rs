//! Configuration loading for trace reconstruction runs.

use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Name of the optional configuration file inside a trace directory.
pub const CONFIG_FILE_NAME: &str = "trace.toml";

/// Settings for one run over a trace directory.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct TraceConfig {
    /// Subdirectory holding the `<id>.log` files
    pub log_dir: PathBuf,
    /// Leader rotation index assumed for view 0
    pub initial_leader: u32,
    /// JSON output file; stdout when unset
    pub output: Option<PathBuf>,
    /// Pretty-print the JSON output
    pub pretty: bool,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("log"),
            initial_leader: 0,
            output: None,
            pretty: true,
        }
    }
}

impl TraceConfig {
    /// Load configuration from a TOML file.
    pub fn load(config_path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file {}", config_path.display()))?;

        toml::from_str(&content).with_context(|| format!("Failed to parse config file {}", config_path.display()))
    }

    /// Load `<trace_dir>/trace.toml` if it exists, defaults otherwise.
    pub fn for_trace_dir(trace_dir: &Path) -> anyhow::Result<Self> {
        let config_path = trace_dir.join(CONFIG_FILE_NAME);
        if config_path.is_file() {
            log::info!("Using config {}", config_path.display());
            Self::load(&config_path)
        } else {
            log::debug!("No {} in {}, using defaults", CONFIG_FILE_NAME, trace_dir.display());
            Ok(Self::default())
        }
    }

    /// Directory holding the node logs. Relative paths resolve against the trace directory.
    pub fn log_path(&self, trace_dir: &Path) -> PathBuf {
        trace_dir.join(&self.log_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: TraceConfig = toml::from_str("initial-leader = 2\noutput = \"trace.json\"").unwrap();
        assert_eq!(config.initial_leader, 2);
        assert_eq!(config.output, Some(PathBuf::from("trace.json")));
        assert_eq!(config.log_dir, PathBuf::from("log"));
        assert!(config.pretty);
    }

    #[test]
    fn test_for_trace_dir_without_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = TraceConfig::for_trace_dir(dir.path()).unwrap();
        assert_eq!(config, TraceConfig::default());
        assert_eq!(config.log_path(dir.path()), dir.path().join("log"));
    }

    #[test]
    fn test_for_trace_dir_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "log-dir = \"logs\"\npretty = false\n").unwrap();

        let config = TraceConfig::for_trace_dir(dir.path()).unwrap();
        assert_eq!(config.log_dir, PathBuf::from("logs"));
        assert!(!config.pretty);
    }

    #[test]
    fn test_invalid_config_is_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "initial-leader = \"first\"").unwrap();
        assert!(TraceConfig::for_trace_dir(dir.path()).is_err());
    }
}
