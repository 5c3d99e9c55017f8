use tracing::{error, info};

use archivist::{Config, Database, Store};

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match Config::load_with_env("config.toml") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config.toml: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    // Initialize logging
    if let Err(e) = archivist::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        let _ = archivist::logging::init_console_only(&config.logging.level);
    }

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {e}");
        std::process::exit(1);
    }

    let db = match Database::open(&config.database.path).await {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to open database {}: {e}", config.database.path);
            std::process::exit(1);
        }
    };

    let store = Store::new(db);
    if let Err(e) = archivist::seed_defaults(&store, &config).await {
        error!("Failed to seed defaults: {e}");
        std::process::exit(1);
    }

    info!("Archivist store ready");
    info!(
        database = %config.database.path,
        storage = %config.storage.root_dir,
        "Configured"
    );
}
