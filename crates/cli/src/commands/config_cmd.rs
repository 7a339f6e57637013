//! `reseq config` — inspect or create the configuration file.

use std::path::{Path, PathBuf};

use clap::Subcommand;
use resequencer_config::ResequencerConfig;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration (file + environment overrides)
    Show,
    /// Write a default config file if none exists
    Init,
    /// Print the config file path
    Path,
}

pub async fn run(
    action: ConfigAction,
    config: &ResequencerConfig,
    path: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(default_path);

    match action {
        ConfigAction::Show => {
            println!("# {}", path.display());
            print!("{}", config.to_toml());
        }
        ConfigAction::Init => {
            if path.exists() {
                println!("Config already exists at {}", path.display());
                return Ok(());
            }
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, ResequencerConfig::default_toml())?;
            println!("Wrote default config to {}", path.display());
        }
        ConfigAction::Path => {
            println!("{}", path.display());
        }
    }

    Ok(())
}

fn default_path() -> PathBuf {
    ResequencerConfig::config_dir().join("config.toml")
}
