//! IP geolocation providers
//!
//! Lookups are answered either by the ipstack HTTP API or by a local
//! MaxMind GeoLite2-City database. Both return a JSON payload using the
//! ipstack field names, so callers do not depend on the active backend.

pub mod ipstack;
pub mod maxmind;

pub use ipstack::IpStackClient;
pub use maxmind::MaxMindLocator;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::net::IpAddr;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{GeoProvider, GeolocationConfig};

/// Errors that can occur during geolocation lookups
#[derive(Error, Debug)]
pub enum GeoError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Provider error {code}: {info}")]
    Provider { code: i64, info: String },

    #[error("Invalid provider URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to open database: {0}")]
    Database(#[from] maxminddb::MaxMindDBError),

    #[error("Database file not found: {0}")]
    FileNotFound(String),

    #[error("IP address not found in database")]
    NotFound,

    #[error("Not an IP address: {0:?}")]
    InvalidAddress(String),

    #[error("Requester address unknown")]
    NoRequesterAddress,

    #[error("Location data missing coordinates")]
    MissingCoordinates,

    #[error("Geolocation provider unavailable: {0}")]
    Unavailable(String),
}

impl GeoError {
    /// Whether the provider call ran out of time
    pub fn is_timeout(&self) -> bool {
        matches!(self, GeoError::Http(e) if e.is_timeout())
    }
}

/// What to locate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupTarget {
    /// The caller itself; the peer address is passed along when known
    Requester(Option<IpAddr>),
    /// An explicit address, not validated before it reaches the provider
    Address(String),
}

/// A geolocation backend
#[async_trait]
pub trait GeoLocator: Send + Sync {
    /// Resolve `target` to the provider's location payload
    async fn lookup(&self, target: &LookupTarget) -> Result<Value, GeoError>;
}

/// Stand-in used when the configured backend could not be built at startup
///
/// Every lookup fails with the original startup error.
pub struct UnavailableLocator {
    reason: String,
}

impl UnavailableLocator {
    pub fn new(reason: impl Into<String>) -> Self {
        UnavailableLocator {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl GeoLocator for UnavailableLocator {
    async fn lookup(&self, _target: &LookupTarget) -> Result<Value, GeoError> {
        Err(GeoError::Unavailable(self.reason.clone()))
    }
}

/// Build the configured backend
pub fn from_config(
    config: &GeolocationConfig,
    client: Client,
) -> Result<Arc<dyn GeoLocator>, GeoError> {
    match config.provider {
        GeoProvider::Ipstack => {
            let locator = IpStackClient::new(client, &config.base_url, &config.access_key)?;
            Ok(Arc::new(locator))
        }
        GeoProvider::Maxmind => Ok(Arc::new(MaxMindLocator::new(&config.database_path)?)),
    }
}
