use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use serde::Deserialize;

use crate::persist::DEFAULT_QUIET_PERIOD;

static CONFIG: OnceLock<Config> = OnceLock::new();

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Host settings file. Overridden by `--settings`.
    pub settings_path: Option<PathBuf>,
    /// Quiet period before edits are written back.
    pub save_delay_ms: u64,
    /// Directory exported collections are written to.
    pub export_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            settings_path: None,
            save_delay_ms: DEFAULT_QUIET_PERIOD.as_millis() as u64,
            export_dir: PathBuf::from("."),
        }
    }
}

/// `<config dir>/dial/config.toml`
pub fn config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("dial").join("config.toml"))
}

/// Read the config file; a missing file yields defaults.
pub fn load() -> anyhow::Result<Config> {
    match config_file() {
        Some(path) if path.exists() => parse_file(&path),
        _ => Ok(Config::default()),
    }
}

fn parse_file(path: &Path) -> anyhow::Result<Config> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|e| anyhow::anyhow!("{}: {e}", path.display()))
}

pub fn init(config: Config) {
    CONFIG.set(config).ok();
}

pub fn settings_path() -> Option<&'static Path> {
    CONFIG.get().and_then(|c| c.settings_path.as_deref())
}

pub fn save_delay() -> Duration {
    CONFIG
        .get()
        .map_or(DEFAULT_QUIET_PERIOD, |c| Duration::from_millis(c.save_delay_ms))
}

pub fn export_dir() -> &'static Path {
    CONFIG
        .get()
        .map_or(Path::new("."), |c| c.export_dir.as_path())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config: Config = toml::from_str("export_dir = \"/tmp/sliders\"").unwrap();
        assert_eq!(config.export_dir, PathBuf::from("/tmp/sliders"));
        assert_eq!(config.save_delay_ms, 1000);
        assert!(config.settings_path.is_none());
    }

    #[test]
    fn bad_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "save_delay_ms = \"soon\"").unwrap();
        let err = parse_file(&path).unwrap_err();
        assert!(err.to_string().contains("config.toml"));
    }
}
