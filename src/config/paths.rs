//! Where SpeakFlow keeps its settings.
//!
//! `SPEAKFLOW_CONFIG_DIR` overrides the location. Otherwise `dirs` picks the
//! platform config directory:
//!   Windows: %APPDATA%\speakflow\
//!   macOS:   ~/Library/Application Support/speakflow/
//!   Linux:   ~/.config/speakflow/

use std::path::{Path, PathBuf};

pub const CONFIG_DIR_ENV: &str = "SPEAKFLOW_CONFIG_DIR";

#[derive(Debug, Clone, PartialEq)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    /// `<config_dir>/settings.toml`.
    pub settings_file: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "speakflow";

    /// Resolve the config directory from the environment or the platform,
    /// falling back to `./speakflow` when neither is available.
    pub fn new() -> Self {
        match std::env::var_os(CONFIG_DIR_ENV) {
            Some(dir) if !dir.is_empty() => Self::in_dir(dir),
            _ => Self::in_dir(
                dirs::config_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(Self::APP_NAME),
            ),
        }
    }

    /// Paths rooted at an explicit directory.
    pub fn in_dir(config_dir: impl AsRef<Path>) -> Self {
        let config_dir = config_dir.as_ref().to_path_buf();
        Self {
            settings_file: config_dir.join("settings.toml"),
            config_dir,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_live_in_config_dir() {
        let paths = AppPaths::in_dir("/tmp/sf");
        assert_eq!(paths.config_dir, PathBuf::from("/tmp/sf"));
        assert_eq!(paths.settings_file, PathBuf::from("/tmp/sf/settings.toml"));
    }

    #[test]
    fn resolved_paths_are_non_empty() {
        let paths = AppPaths::new();
        assert!(paths.config_dir.to_str().is_some_and(|s| !s.is_empty()));
        assert!(paths
            .settings_file
            .file_name()
            .is_some_and(|n| n == "settings.toml"));
    }
}
