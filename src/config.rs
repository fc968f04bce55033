use crate::celebration::DEFAULT_DELAY;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Overrides the platform data directory location of the events file.
    pub data_file: Option<PathBuf>,
    pub celebration_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_file: None,
            celebration_secs: DEFAULT_DELAY.as_secs(),
        }
    }
}

impl Config {
    pub fn celebration_delay(&self) -> Duration {
        Duration::from_secs(self.celebration_secs)
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let data = fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
    if data.trim().is_empty() {
        return Ok(Config::default());
    }
    let config: Config =
        serde_yaml::from_str(&data).with_context(|| format!("parsing config {:?}", path))?;
    Ok(config)
}

pub fn load_default_config() -> Result<Config> {
    load_config(&config_path()?)
}

fn config_path() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("", "", "daymark").context("locating config directory")?;
    Ok(dirs.config_dir().join("config.yml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = load_config(&dir.path().join("config.yml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.celebration_delay(), Duration::from_secs(3));
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yml");
        fs::write(&path, "data_file: /tmp/cal.json\n").unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.data_file, Some(PathBuf::from("/tmp/cal.json")));
        assert_eq!(config.celebration_secs, 3);
    }

    #[test]
    fn celebration_delay_is_configurable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yml");
        fs::write(&path, "celebration_secs: 5\n").unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.celebration_delay(), Duration::from_secs(5));
        assert_eq!(config.data_file, None);
    }

    #[test]
    fn huge_celebration_delay_does_not_overflow() {
        use crate::celebration::Celebration;
        use crate::projector::DaySummary;
        use std::time::Instant;

        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yml");
        fs::write(&path, "celebration_secs: 18446744073709551615\n").unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.celebration_secs, u64::MAX);

        let mut celebration = Celebration::new(config.celebration_delay());
        let all_done = DaySummary {
            total: 1,
            done: 1,
            active: 0,
            percent: 100,
        };
        let now = Instant::now();
        celebration.arm(&all_done, now);
        assert!(celebration.is_active(now));
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yml");
        fs::write(&path, "celebration_secs: [soon\n").unwrap();
        assert!(load_config(&path).is_err());
    }
}
