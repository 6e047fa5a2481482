//! User configuration, loaded with confy from the platform config directory

use chime_engine::EngineConfig;
use serde::{Deserialize, Serialize};

/// Application name used for the confy config path
pub const APP_NAME: &str = "chime";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Show a desktop notification when an alarm fires
    pub notifications: bool,
    /// Scheduler and audio settings
    pub engine: EngineConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            notifications: true,
            engine: EngineConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, confy::ConfyError> {
        confy::load(APP_NAME, None)
    }

    pub fn path() -> Result<std::path::PathBuf, confy::ConfyError> {
        confy::get_configuration_file_path(APP_NAME, None)
    }
}
