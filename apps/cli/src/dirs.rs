use std::path::PathBuf;

const CONFIG_DIR_NAME: &str = "usage-meter";
const CONFIG_FILE_NAME: &str = "config.toml";

/// `$XDG_CONFIG_HOME/usage-meter/config.toml`, falling back to
/// `$HOME/.config`, then the working directory.
pub fn default_config_path() -> PathBuf {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")));
    match base {
        Some(base) => base.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME),
        None => PathBuf::from(CONFIG_FILE_NAME),
    }
}
