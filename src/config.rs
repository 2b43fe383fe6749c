use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
}

/// Configuration for the geoguard server
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP listener configuration
    pub server: ServerConfig,
    /// Geolocation provider configuration
    pub geolocation: GeolocationConfig,
    /// Login risk model configuration
    pub model: ModelConfig,
    /// SMS provider configuration
    pub sms: SmsConfig,
    /// Persistence service configuration
    pub persistence: PersistenceConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,
    /// Listen port
    pub port: u16,
    /// Timeout applied to every outbound provider call, in seconds
    pub upstream_timeout_secs: u64,
}

/// Which geolocation backend answers lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeoProvider {
    /// ipstack HTTP API
    Ipstack,
    /// Local MaxMind GeoLite2-City database
    Maxmind,
}

impl FromStr for GeoProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ipstack" => Ok(GeoProvider::Ipstack),
            "maxmind" => Ok(GeoProvider::Maxmind),
            _ => Err(ConfigError::InvalidValue {
                key: "GEO_PROVIDER".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Geolocation provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeolocationConfig {
    /// Active backend
    pub provider: GeoProvider,
    /// ipstack API base URL
    pub base_url: String,
    /// ipstack access key
    pub access_key: String,
    /// Path to GeoLite2-City.mmdb (maxmind provider only)
    pub database_path: PathBuf,
}

/// Login risk model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Path to the TensorFlow.js model.json
    pub path: PathBuf,
    /// Scores strictly above this value allow the login
    pub threshold: f64,
}

/// SMS provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmsConfig {
    /// Twilio API base URL
    pub base_url: String,
    pub account_sid: String,
    pub auth_token: String,
    /// Sender number used for every message
    pub from_number: String,
}

/// Persistence service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Supabase project URL
    pub url: String,
    /// Supabase service key
    pub key: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 3000,
            upstream_timeout_secs: 30,
        }
    }
}

impl Default for GeolocationConfig {
    fn default() -> Self {
        GeolocationConfig {
            provider: GeoProvider::Ipstack,
            base_url: "http://api.ipstack.com".to_string(),
            access_key: String::new(),
            database_path: PathBuf::from("GeoLite2-City.mmdb"),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            path: PathBuf::from("model.json"),
            threshold: 0.5,
        }
    }
}

impl Default for SmsConfig {
    fn default() -> Self {
        SmsConfig {
            base_url: "https://api.twilio.com".to_string(),
            account_sid: String::new(),
            auth_token: String::new(),
            from_number: String::new(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Build the runtime configuration: file (if it exists) or defaults,
    /// then `.env` and process environment on top.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) if p.exists() => Config::from_file(p)?,
            Some(p) => {
                log::warn!("Config file {:?} not found, using defaults", p);
                Config::default()
            }
            None => Config::default(),
        };

        dotenv::dotenv().ok();
        config.apply_env_from(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Override fields from environment-style variables.
    ///
    /// `lookup` returns the value for a variable name, or `None` when it is
    /// unset. Empty values count as unset.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("HOST") {
            self.server.host = v;
        }
        if let Some(v) = get("PORT") {
            self.server.port = parse_var("PORT", &v)?;
        }
        if let Some(v) = get("UPSTREAM_TIMEOUT_SECS") {
            self.server.upstream_timeout_secs = parse_var("UPSTREAM_TIMEOUT_SECS", &v)?;
        }

        if let Some(v) = get("GEO_PROVIDER") {
            self.geolocation.provider = v.parse()?;
        }
        if let Some(v) = get("IPSTACK_API_KEY") {
            self.geolocation.access_key = v;
        }
        if let Some(v) = get("IPSTACK_BASE_URL") {
            self.geolocation.base_url = v;
        }
        if let Some(v) = get("GEOIP_DATABASE") {
            self.geolocation.database_path = PathBuf::from(v);
        }

        if let Some(v) = get("MODEL_PATH") {
            self.model.path = PathBuf::from(v);
        }
        if let Some(v) = get("LOGIN_THRESHOLD") {
            self.model.threshold = parse_var("LOGIN_THRESHOLD", &v)?;
        }

        if let Some(v) = get("TWILIO_ACCOUNT_SID") {
            self.sms.account_sid = v;
        }
        if let Some(v) = get("TWILIO_AUTH_TOKEN") {
            self.sms.auth_token = v;
        }
        if let Some(v) = get("TWILIO_PHONE_NUMBER") {
            self.sms.from_number = v;
        }
        if let Some(v) = get("TWILIO_BASE_URL") {
            self.sms.base_url = v;
        }

        if let Some(v) = get("SUPABASE_URL") {
            self.persistence.url = v;
        }
        if let Some(v) = get("SUPABASE_KEY") {
            self.persistence.key = v;
        }

        Ok(())
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}
