//! Arena HTTP server binary

use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use arena_core::{api, Arena, Catalog, Config, SeedOutcome};
use std::sync::Arc;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_target(false)
        .init();

    // Load configuration
    let config = match std::env::var("ARENA_CONFIG") {
        Ok(path) => Config::from_file(&path)
            .with_context(|| format!("Failed to load configuration from {}", path))?,
        Err(_) => Config::from_env().context("Failed to load configuration")?,
    };

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        data_dir = %config.data_dir.display(),
        "Starting arena server"
    );

    let arena = Arena::open(config.clone())
        .await
        .context("Failed to open arena")?;

    if config.seed_on_start {
        match arena.seed_catalog(Catalog::standard(chrono::Utc::now())).await? {
            SeedOutcome::Seeded { games, matches } => {
                tracing::info!(games, matches, "Seeded game catalog")
            }
            SeedOutcome::AlreadySeeded => tracing::info!("Catalog already present"),
        }
    }

    let arena = Arc::new(arena);
    let data = web::Data::new(arena.clone());

    tracing::info!(addr = %config.http_listen_addr, "HTTP server listening");
    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .wrap(middleware::NormalizePath::trim())
            .app_data(data.clone())
            .configure(api::configure_routes)
    })
    .bind(config.http_listen_addr.as_str())?
    .run()
    .await?;

    tracing::info!("Shutting down arena server");
    match Arc::try_unwrap(arena) {
        Ok(arena) => arena.shutdown().await?,
        Err(_) => tracing::warn!("Arena still referenced at shutdown"),
    }
    Ok(())
}
