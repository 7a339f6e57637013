pub mod config_cmd;
pub mod run;

use std::path::Path;

use resequencer_config::{ConfigError, ResequencerConfig};

/// Load the config from `path` if given, otherwise from the default location.
pub fn load_config(path: Option<&Path>) -> Result<ResequencerConfig, ConfigError> {
    match path {
        Some(path) => ResequencerConfig::load_with_env(path),
        None => ResequencerConfig::load(),
    }
}
