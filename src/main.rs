use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};

use opsnotify::config;
use opsnotify::db;
use opsnotify::routes;
use opsnotify::services::NotificationEngine;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = config::Config::from_env().map_err(|e| {
        log::error!("Configuration error: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    log::info!(
        "Starting opsnotify server on {}:{}",
        config.host,
        config.port
    );

    let db_pool = db::create_pool(&config.database).await.map_err(|e| {
        log::error!("Database pool error: {}", e);
        std::io::Error::other(e.to_string())
    })?;

    db::run_migrations(&db_pool).await.map_err(|e| {
        log::error!("Migration error: {}", e);
        std::io::Error::other(e.to_string())
    })?;

    let engine = NotificationEngine::from_pool(db_pool.clone(), &config).map_err(|e| {
        log::error!("Notification engine error: {}", e);
        std::io::Error::other(e.to_string())
    })?;

    log::info!(
        "Registered notification channels: {}",
        engine.channels().join(", ")
    );

    let engine = web::Data::new(engine);
    let host = config.host.clone();
    let port = config.port;

    let server = HttpServer::new(move || {
        let cors = match config.cors_allowed_origin.as_deref() {
            Some(origin) => Cors::default().allowed_origin(origin),
            None => Cors::default().allow_any_origin(),
        }
        .allowed_methods(vec!["GET", "POST", "PATCH", "DELETE", "OPTIONS"])
        .allowed_headers(vec![
            actix_web::http::header::ACCEPT,
            actix_web::http::header::CONTENT_TYPE,
        ])
        .max_age(3600);

        App::new()
            .app_data(web::Data::new(db_pool.clone()))
            .app_data(web::Data::new(config.clone()))
            .app_data(engine.clone())
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .wrap(cors)
            .configure(routes::health::configure)
            .configure(routes::notifications::configure)
            .configure(routes::rules::configure)
    })
    .bind((host.as_str(), port))?
    .shutdown_timeout(30)
    .run();

    let server_handle = server.handle();
    tokio::spawn(async move {
        shutdown_signal().await;
        log::info!("Shutdown signal received, stopping server...");
        server_handle.stop(true).await;
    });

    server.await
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                log::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
