//! Default path resolution for the settings file
//!
//! Uses XDG Base Directory specification when available, with sensible fallbacks.

use std::path::PathBuf;

/// Returns the default path for the settings file.
///
/// Uses XDG config directory if available:
/// - Linux/macOS: `~/.config/sousvide/settings.toml`
/// - Fallback: `/etc/sousvide/settings.toml`
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("/etc"))
        .join("sousvide")
        .join("settings.toml")
}
