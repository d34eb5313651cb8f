//! `wharfd` — the Wharf warehouse server binary.
//!
//! Usage:
//!   wharfd -c <context-name-or-path> [--listen <addr>]
//!
//! The context name resolves to `/etc/wharf/<name>.toml`.
//! If a path with `/` or `.` is given, it's used directly.

mod config;
mod routes;

use std::sync::Arc;

use clap::Parser;
use tracing::info;
use wharf_core::Module;

use config::ServerConfig;

/// Wharf warehouse server.
#[derive(Parser, Debug)]
#[command(name = "wharfd", about = "Wharf warehouse server")]
struct Cli {
    /// Context name or path to config file.
    #[arg(short = 'c', long = "config", required = true)]
    config: String,

    /// Listen address (overrides the configured one).
    #[arg(long = "listen")]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    // Load server configuration.
    let config_path = ServerConfig::resolve_path(&cli.config);
    info!("Loading configuration from {}", config_path.display());
    let server_config = ServerConfig::load(&config_path)?;
    server_config.verify()?;

    let listen = cli
        .listen
        .unwrap_or_else(|| server_config.server.listen.clone());

    // Initialize storage.
    let core_config = wharf_core::ServiceConfig {
        data_dir: (!server_config.storage.data_dir.is_empty())
            .then(|| std::path::PathBuf::from(&server_config.storage.data_dir)),
        sqlite_path: server_config
            .storage
            .sqlite_path
            .as_ref()
            .map(std::path::PathBuf::from),
        listen: listen.clone(),
    };
    if let Some(data_dir) = &core_config.data_dir {
        std::fs::create_dir_all(data_dir)?;
    }

    let sqlite_path = core_config
        .resolve_sqlite_path()
        .ok_or_else(|| anyhow::anyhow!("no database location configured"))?;
    let sql: Arc<dyn wharf_sql::SQLStore> = Arc::new(
        wharf_sql::SqliteStore::open(&sqlite_path)
            .map_err(|e| anyhow::anyhow!("failed to open SQL store: {}", e))?,
    );
    info!("SQLite store opened at {}", sqlite_path.display());

    // Initialize modules.
    let wms_module = wharf_wms::WmsModule::new(Arc::clone(&sql))
        .map_err(|e| anyhow::anyhow!("failed to initialize WMS module: {}", e))?;
    info!("WMS module initialized");

    let module_routes = vec![(wms_module.name(), wms_module.routes())];

    // Build router.
    let app = routes::build_router(module_routes);

    // Start server.
    let listener = tokio::net::TcpListener::bind(&listen).await?;
    info!("Wharf server listening on {}", listen);
    axum::serve(listener, app).await?;

    Ok(())
}
