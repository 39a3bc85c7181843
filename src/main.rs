use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use linkstash::config::{Cli, Config, Environment, default_config_path};
use linkstash::db::Database;
use linkstash::handler::AppState;
use linkstash::routes;
use tokio::signal;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let args = Cli::parse();
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = dotenv {
        if !e.not_found() {
            tracing::warn!(error = %e, "failed to load .env file");
        }
    }

    tracing::info!("linkstash.svc starting");

    // An explicit --config must exist; the default path is optional.
    let cfg = match args.config_path {
        Some(path) => Config::new(&path).unwrap_or_else(|e| {
            tracing::error!(error = %e, path = %path, "failed to load config file");
            std::process::exit(1);
        }),
        None => {
            let path = default_config_path();
            Config::load_or_default(&path).unwrap_or_else(|e| {
                tracing::error!(error = %e, path = ?path, "failed to load config file");
                std::process::exit(1);
            })
        }
    };

    let db = Arc::new(Database::new(&cfg).await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to setup database");
        std::process::exit(1);
    }));
    tracing::info!(path = %cfg.app.get_db(), "database initialized");

    let env = cfg.app.get_env();
    let static_dir: Option<PathBuf> = match env {
        Environment::Production => Some(PathBuf::from(&cfg.app.static_dir)),
        Environment::Development => None,
    };

    let app = routes::app(AppState::new(db.clone(), &cfg), static_dir.as_deref());

    let address = format!("0.0.0.0:{}", cfg.app.get_port());
    let listener = tokio::net::TcpListener::bind(&address).await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to setup tcp listener");
        std::process::exit(1);
    });

    tracing::info!("linkstash.svc running in {} mode on {}", env.as_str(), &address);
    let server = axum::serve(listener, app).with_graceful_shutdown(async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl+c");
            std::future::pending::<()>().await;
        }
        tracing::info!("ctrl+c signal received, preparing to shutdown");
    });

    if let Err(err) = server.await {
        tracing::error!(error = %err, "server exited with error");
        std::process::exit(1);
    }

    drop(db);
    tracing::info!("linkstash.svc going off, graceful shutdown complete");
}
