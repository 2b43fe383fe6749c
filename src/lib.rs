pub mod api;
pub mod config;
pub mod geolocation;
pub mod model;
pub mod models;
pub mod notify;
pub mod persistence;

// Re-export commonly used types
pub use api::{configure, ApiError, AppState};
pub use config::Config;
pub use geolocation::{
    GeoError, GeoLocator, IpStackClient, LookupTarget, MaxMindLocator, UnavailableLocator,
};
pub use model::{Decision, LayersModel, ModelError, RiskModel};
pub use notify::{SmsError, SmsSender, TwilioClient, UnavailableSms};
pub use persistence::PersistenceClient;
