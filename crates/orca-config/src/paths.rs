//! Configuration directory resolution.

use std::path::PathBuf;

use directories::ProjectDirs;

/// Environment variable overriding the configuration directory.
pub const CONFIG_DIR_ENV_VAR: &str = "ORCA_CONFIG_DIR";

/// Name of the configuration directory inside the platform config folder.
pub const CONFIG_DIR_NAME: &str = "AMPT_configuration";

const APP_QUALIFIER: &str = "org";
const APP_ORG: &str = "allenai";
const APP_NAME: &str = "ORCA";

/// Default configuration directory.
///
/// Resolution order:
/// 1. `ORCA_CONFIG_DIR` environment variable
/// 2. `AMPT_configuration/` inside the platform config directory
///
/// Returns `None` if neither is available.
pub fn default_config_dir() -> Option<PathBuf> {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV_VAR).filter(|dir| !dir.is_empty()) {
        return Some(PathBuf::from(dir));
    }
    ProjectDirs::from(APP_QUALIFIER, APP_ORG, APP_NAME)
        .map(|dirs| dirs.config_dir().join(CONFIG_DIR_NAME))
}
