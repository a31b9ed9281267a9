use actix_web::middleware::{Logger, NormalizePath};
use actix_web::web::Data;
use actix_web::{App, HttpServer};

mod api;
mod auth;
mod config;
mod db;
mod docs;
mod error;
mod model;
mod models;
mod notify;
mod routes;
mod store;
mod utils;
mod workflow;

use config::Config;
use db::{init_db, run_migrations};

use crate::docs::ApiDoc;
use crate::notify::{Notifier, run_dispatcher};
use crate::utils::leave_type_cache;
use tracing::{error, info, warn};
use tracing_appender::rolling;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Invalid configuration: {e:#}");
            std::process::exit(1);
        }
    };

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(config.log_level)
        .with_ansi(false)
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .init();

    info!(addr = %config.server_addr, prefix = %config.api_prefix, "Server starting...");

    let pool = match init_db(&config.database_url).await {
        Ok(pool) => pool,
        Err(e) => {
            error!(error = %e, "Failed to connect to the database");
            eprintln!("Failed to connect to the database: {e}");
            std::process::exit(1);
        }
    };

    if config.run_migrations {
        if let Err(e) = run_migrations(&pool).await {
            error!(error = %e, "Migrations failed");
            eprintln!("Migrations failed: {e}");
            std::process::exit(1);
        }
    }

    leave_type_cache::init(config.leave_type_cache_ttl_secs);
    let pool_for_cache_warmup = pool.clone();
    actix_web::rt::spawn(async move {
        if let Err(e) = leave_type_cache::warmup_leave_type_cache(&pool_for_cache_warmup, 100).await {
            warn!(error = %e, "Failed to warm up leave type cache");
        }
    });

    let (notifier, rx) = Notifier::channel(config.notification_queue_capacity);
    actix_web::rt::spawn(run_dispatcher(pool.clone(), rx));

    let server_addr = config.server_addr.clone();

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // wildcard serves the JS/CSS assets
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(pool.clone()))
            .app_data(Data::new(config.clone()))
            .app_data(Data::new(notifier.clone()))
            .configure(|cfg| routes::configure(cfg, &config))
    })
    .bind(server_addr)?
    .run()
    .await
}
