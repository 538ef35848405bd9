//! Default filesystem locations for freshen.
//!
//! Uses the [`dirs`] crate for platform-appropriate directory resolution.
//!
//! | Purpose | macOS | Linux |
//! |---------|-------|-------|
//! | Data (marker) | `~/Library/Application Support/freshen/` | `~/.local/share/freshen/` |
//! | Config | `~/Library/Application Support/freshen/` | `~/.config/freshen/` |
//!
//! # Environment Overrides
//!
//! - `FRESHEN_DATA_DIR` overrides [`data_dir`]
//! - `FRESHEN_CONFIG_DIR` overrides [`config_dir`]

use std::path::PathBuf;

/// Environment variable overriding [`data_dir`].
pub const DATA_DIR_ENV: &str = "FRESHEN_DATA_DIR";

/// Environment variable overriding [`config_dir`].
pub const CONFIG_DIR_ENV: &str = "FRESHEN_CONFIG_DIR";

/// File name of the freshness marker inside the data directory.
pub const MARKER_FILE_NAME: &str = ".lastupdate";

/// Directory owning the freshness marker.
///
/// Resolves to `dirs::data_dir()/freshen/` by default.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os(DATA_DIR_ENV) {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join("freshen"))
        .unwrap_or_else(|| PathBuf::from("/tmp/freshen-data"))
}

/// Directory holding `config.toml`.
///
/// Resolves to `dirs::config_dir()/freshen/` by default.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os(CONFIG_DIR_ENV) {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("freshen"))
        .unwrap_or_else(|| PathBuf::from("/tmp/freshen-config"))
}

/// Main config file path (`config_dir()/config.toml`).
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Default marker path (`data_dir()/.lastupdate`).
#[must_use]
pub fn marker_file() -> PathBuf {
    data_dir().join(MARKER_FILE_NAME)
}
