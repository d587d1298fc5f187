use beatlane::app;
use beatlane::config::{Config, DEFAULT_CONFIG_PATH};
use log::{error, info, LevelFilter};
use std::error::Error;
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn Error>> {
    // --- Logging Setup ---
    env_logger::Builder::from_default_env()
        .filter_level(LevelFilter::Info) // Default level
        .filter_module("beatlane::game", LevelFilter::Debug)
        .filter_module("beatlane::core", LevelFilter::Info)
        .init();

    info!("beatlane starting...");

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load config '{}': {}", config_path.display(), e);
            return Err(e.into());
        }
    };

    match app::run(config) {
        Ok(outcome) => {
            info!("Exited gracefully ({:?}).", outcome);
            Ok(())
        }
        Err(e) => {
            error!("Application exited with error: {}", e);
            Err(e)
        }
    }
}
