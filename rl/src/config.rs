//! Configuration for runledger

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Directory holding run records
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

/// Where run records land when nothing else is configured
pub fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("adventbench")
        .join("runs")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
        }
    }
}

impl Config {
    /// Load config from file, or use defaults
    pub fn load(path: Option<&PathBuf>) -> Result<Self> {
        if let Some(config_path) = path {
            return Self::load_from(config_path);
        }

        let default_paths = [
            Some(PathBuf::from("runledger.yml")),
            dirs::config_dir().map(|p| p.join("runledger").join("runledger.yml")),
        ];

        for path in default_paths.iter().flatten() {
            if path.exists() {
                return Self::load_from(path);
            }
        }

        Ok(Config::default())
    }

    fn load_from(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).context(format!("Failed to read config file: {}", path.display()))?;
        let config: Config =
            serde_yaml::from_str(&content).context(format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_explicit_path() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("runledger.yml");
        std::fs::write(&path, "log-dir: /srv/runs\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.log_dir, PathBuf::from("/srv/runs"));
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("runledger.yml");
        std::fs::write(&path, "{}\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.log_dir, default_log_dir());
    }

    #[test]
    fn test_missing_explicit_path_is_error() {
        let missing = PathBuf::from("/nonexistent/runledger.yml");
        assert!(Config::load(Some(&missing)).is_err());
    }
}
