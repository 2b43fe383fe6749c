use actix_web::{middleware, web, App, HttpServer};
use std::env;
use std::path::PathBuf;

use geoguard::{AppState, Config};

/// HTTP server entry point
#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting geoguard server...");

    // Optional TOML config file; environment variables override it
    let config_path = env::args().nth(1).map(PathBuf::from);
    let config = Config::load(config_path.as_deref())?;

    let state = web::Data::new(AppState::from_config(&config)?);
    log::info!(
        "Geolocation provider: {:?}, login threshold: {}",
        config.geolocation.provider,
        state.threshold
    );

    let bind = (config.server.host.clone(), config.server.port);
    log::info!("Server is running on http://{}:{}", bind.0, bind.1);

    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(geoguard::configure)
    })
    .bind(bind)?
    .run()
    .await?;

    log::info!("geoguard server stopped");
    Ok(())
}
