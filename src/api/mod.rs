//! HTTP routes and shared application state

pub mod error;
pub mod handlers;

pub use error::ApiError;

use actix_web::web;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::Config;
use crate::geolocation::{self, GeoLocator, UnavailableLocator};
use crate::model::{LayersModel, RiskModel, UnavailableModel};
use crate::notify::{SmsSender, TwilioClient, UnavailableSms};
use crate::persistence::PersistenceClient;

/// Errors that prevent the application state from being built
#[derive(Error, Debug)]
pub enum StateError {
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Long-lived service handles shared by every request
///
/// Built once at startup and never mutated.
pub struct AppState {
    pub geolocator: Arc<dyn GeoLocator>,
    pub model: Arc<dyn RiskModel>,
    pub sms: Arc<dyn SmsSender>,
    pub persistence: PersistenceClient,
    /// Scores strictly above this allow the login
    pub threshold: f64,
}

impl AppState {
    /// Construct every client from configuration.
    ///
    /// A provider or model that cannot be built does not stop startup; it is
    /// replaced by a stand-in whose calls fail until the configuration is
    /// fixed and the server restarted.
    pub fn from_config(config: &Config) -> Result<Self, StateError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.server.upstream_timeout_secs))
            .build()?;

        let geolocator: Arc<dyn GeoLocator> =
            match geolocation::from_config(&config.geolocation, client.clone()) {
                Ok(geolocator) => geolocator,
                Err(e) => {
                    log::error!(
                        "Failed to set up {:?} geolocation provider: {}",
                        config.geolocation.provider,
                        e
                    );
                    Arc::new(UnavailableLocator::new(e.to_string()))
                }
            };

        let sms: Arc<dyn SmsSender> = match TwilioClient::new(client, &config.sms) {
            Ok(sms) => Arc::new(sms),
            Err(e) => {
                log::error!("Failed to set up SMS provider: {}", e);
                Arc::new(UnavailableSms::new(e.to_string()))
            }
        };

        let persistence = PersistenceClient::new(&config.persistence);

        let model: Arc<dyn RiskModel> = match LayersModel::load(&config.model.path) {
            Ok(model) => {
                log::info!(
                    "Loaded risk model from {:?} ({} inputs)",
                    config.model.path,
                    model.input_width()
                );
                Arc::new(model)
            }
            Err(e) => {
                log::error!("Failed to load risk model from {:?}: {}", config.model.path, e);
                Arc::new(UnavailableModel::new(e.to_string()))
            }
        };

        if !persistence.is_configured() {
            log::warn!("Persistence service not configured (SUPABASE_URL / SUPABASE_KEY)");
        }

        Ok(AppState {
            geolocator,
            model,
            sms,
            persistence,
            threshold: config.model.threshold,
        })
    }
}

/// Register all routes. Request bodies that are not valid JSON are
/// rejected with a 400 before reaching a handler.
pub fn configure(cfg: &mut web::ServiceConfig) {
    let json_config = web::JsonConfig::default().error_handler(|err, _req| {
        log::warn!("Rejected request body: {}", err);
        ApiError::InvalidInput(handlers::INVALID_JSON.to_string()).into()
    });

    cfg.app_data(json_config)
        .route("/", web::get().to(handlers::index))
        .route("/geolocation", web::post().to(handlers::geolocation))
        .route("/adaptive-login", web::post().to(handlers::adaptive_login))
        .route("/notify", web::post().to(handlers::notify));
}
