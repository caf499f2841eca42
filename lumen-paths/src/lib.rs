//! XDG Base Directory paths for lumen.
//!
//! The connectivity core stores its config under XDG paths for
//! cross-platform consistency, matching tools like gh, docker, kubectl.

use std::path::PathBuf;

/// Get the lumen config directory.
///
/// Returns `$XDG_CONFIG_HOME/lumen` if set, otherwise `~/.config/lumen`.
/// This is where the model configuration file lives.
///
/// # Examples
///
/// ```
/// use lumen_paths::config_dir;
///
/// let config = config_dir();
/// let config_file = config.join("model-config.json");
/// ```
pub fn config_dir() -> PathBuf {
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        PathBuf::from(xdg_config).join("lumen")
    } else if let Some(home) = dirs::home_dir() {
        home.join(".config/lumen")
    } else {
        PathBuf::from(".config/lumen")
    }
}
