//! Configuration types for the auto-update trigger.

use crate::error::{FreshenError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default freshness threshold: 24 hours.
pub const DEFAULT_THRESHOLD_SECS: u64 = 24 * 60 * 60;

/// Default opt-out environment variable.
pub const DEFAULT_OPT_OUT_VAR: &str = "FRESHEN_NO_AUTOUPDATE";

/// Top-level configuration.
///
/// Every path the orchestrator touches comes from here, so tests can point
/// the whole system at a temporary directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    /// Directory owning the freshness marker. Created on demand.
    pub data_dir: PathBuf,
    /// Marker file name inside [`Self::data_dir`].
    pub marker_file_name: String,
    /// Elapsed seconds after which the marker is considered stale.
    pub threshold_secs: u64,
    /// Environment variable that disables updates when set to `"1"`.
    pub opt_out_var: String,
    /// Optional update lock.
    pub lock: LockConfig,
    /// External program used as the update capability by the CLI.
    pub updater: Option<CommandConfig>,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            data_dir: crate::paths::data_dir(),
            marker_file_name: crate::paths::MARKER_FILE_NAME.to_owned(),
            threshold_secs: DEFAULT_THRESHOLD_SECS,
            opt_out_var: DEFAULT_OPT_OUT_VAR.to_owned(),
            lock: LockConfig::default(),
            updater: None,
        }
    }
}

/// Update lock settings.
///
/// Disabled by default: concurrent invocations may then both observe a stale
/// marker and both run the update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Hold an exclusive lock file while checking and updating.
    pub enabled: bool,
    /// Age in seconds after which a leftover lock file is evicted.
    pub stale_after_secs: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            stale_after_secs: 3600,
        }
    }
}

/// External update command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandConfig {
    /// Program to execute.
    pub program: String,
    /// Arguments passed to the program.
    #[serde(default)]
    pub args: Vec<String>,
}

impl UpdateConfig {
    /// Configuration rooted at `data_dir`, all other fields defaulted.
    #[must_use]
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Full path of the freshness marker.
    #[must_use]
    pub fn marker_path(&self) -> PathBuf {
        self.data_dir.join(&self.marker_file_name)
    }

    /// Path of the update lock file.
    #[must_use]
    pub fn lock_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.lock", self.marker_file_name))
    }

    /// Freshness threshold as a [`Duration`].
    #[must_use]
    pub fn threshold(&self) -> Duration {
        Duration::from_secs(self.threshold_secs)
    }

    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// marker file name is empty.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&content).map_err(|e| FreshenError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise return defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be loaded.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| FreshenError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let name = self.marker_file_name.trim();
        if name.is_empty() || name.contains(['/', '\\']) {
            return Err(FreshenError::Config(format!(
                "marker_file_name must be a bare file name, got {:?}",
                self.marker_file_name
            )));
        }
        if self.opt_out_var.trim().is_empty() {
            return Err(FreshenError::Config(
                "opt_out_var must not be empty".to_owned(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn default_threshold_is_one_day() {
        let config = UpdateConfig::default();
        assert_eq!(config.threshold(), Duration::from_secs(86_400));
        assert_eq!(config.opt_out_var, DEFAULT_OPT_OUT_VAR);
        assert!(!config.lock.enabled);
        assert!(config.updater.is_none());
    }

    #[test]
    fn marker_and_lock_paths_share_data_dir() {
        let config = UpdateConfig::with_data_dir("/srv/cache");
        assert_eq!(config.marker_path(), PathBuf::from("/srv/cache/.lastupdate"));
        assert_eq!(
            config.lock_path(),
            PathBuf::from("/srv/cache/.lastupdate.lock")
        );
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = UpdateConfig::with_data_dir(dir.path().join("data"));
        config.threshold_secs = 3600;
        config.lock.enabled = true;
        config.updater = Some(CommandConfig {
            program: "refresh-data".to_owned(),
            args: vec!["--all".to_owned()],
        });

        config.save_to_file(&path).unwrap();
        let loaded = UpdateConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let toml_str = r#"
threshold_secs = 60

[lock]
enabled = true
"#;
        let config: UpdateConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.threshold_secs, 60);
        assert!(config.lock.enabled);
        assert_eq!(config.lock.stale_after_secs, 3600);
        assert_eq!(config.marker_file_name, ".lastupdate");
    }

    #[test]
    fn updater_args_default_to_empty() {
        let toml_str = r#"
[updater]
program = "make"
"#;
        let config: UpdateConfig = toml::from_str(toml_str).unwrap();
        let updater = config.updater.unwrap();
        assert_eq!(updater.program, "make");
        assert!(updater.args.is_empty());
    }

    #[test]
    fn from_file_nonexistent_returns_error() {
        let result = UpdateConfig::from_file(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn from_file_invalid_toml_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "this is not valid toml {{{").unwrap();

        let result = UpdateConfig::from_file(&path);
        assert!(matches!(result, Err(FreshenError::Config(_))));
    }

    #[test]
    fn from_file_rejects_marker_name_with_separator() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "marker_file_name = \"../escape\"\n").unwrap();

        let result = UpdateConfig::from_file(&path);
        assert!(matches!(result, Err(FreshenError::Config(_))));
    }

    #[test]
    fn load_or_default_without_file_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = UpdateConfig::load_or_default(&dir.path().join("missing.toml")).unwrap();
        assert_eq!(config.threshold_secs, DEFAULT_THRESHOLD_SECS);
    }
}
