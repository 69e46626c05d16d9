use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use anyhow::Context;
use std::time::Duration;

mod api;
mod auth;
mod config;
mod dashboard;
mod db;
mod docs;
mod error;
mod model;
mod models;
mod response;
mod routes;
mod utils;

use config::Config;
use auth::password::hash_password;
use db::{init_db, seed_admin};
use error::{json_config, path_config, query_config};

use crate::docs::ApiDoc;
use crate::utils::query_cache::QueryCache;
use tracing::info;
use tracing_appender::rolling;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi; // ← needed for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

#[get("/")]
async fn index() -> impl Responder {
    "Registration desk is running"
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(
            EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!(addr = %config.server_addr, prefix = %config.api_prefix, "Server starting...");

    let pool = init_db(&config.database_url, config.db_max_connections).await?;

    if let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) {
        let hashed = hash_password(password)
            .map_err(|e| anyhow::anyhow!("failed to hash bootstrap admin password: {e}"))?;
        if seed_admin(&pool, email, &hashed).await? {
            info!(%email, "Bootstrap admin created");
        }
    }

    let cache = QueryCache::new(
        config.cache_max_entries,
        Duration::from_secs(config.cache_ttl_secs),
    );

    let server_addr = config.server_addr.clone();
    let pool = Data::new(pool);
    let cache = Data::new(cache);
    let config = Data::new(config);

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // ← wildcard {_:.*} to match JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(pool.clone())
            .app_data(config.clone())
            .app_data(cache.clone())
            .app_data(json_config())
            .app_data(query_config())
            .app_data(path_config())
            .service(index)
            // auth + protected routes with rate limiting
            .configure(|cfg| routes::configure(cfg, &config))
    })
    .bind(&server_addr)
    .with_context(|| format!("failed to bind {server_addr}"))?
    .run()
    .await?;

    Ok(())
}
