use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::geolocation::GeoError;
use crate::model::Decision;

/// Body of `POST /adaptive-login`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdaptiveLoginRequest {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
    pub ip: Option<String>,
}

impl AdaptiveLoginRequest {
    /// Both fields, if present and non-blank
    pub fn fields(&self) -> Option<(&str, &str)> {
        let user_id = self.user_id.as_deref().filter(|s| !s.trim().is_empty())?;
        let ip = self.ip.as_deref().filter(|s| !s.trim().is_empty())?;
        Some((user_id, ip.trim()))
    }
}

/// Successful response of `POST /geolocation`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeolocationResult {
    /// Provider payload, passed through untouched
    pub location: Value,
}

/// The subset of a provider payload used for the risk decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSummary {
    pub city: Option<String>,
    pub region_name: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

impl LocationSummary {
    /// Extract city, region and coordinates from a provider payload.
    ///
    /// Coordinates are required; ipstack returns `null` for private or
    /// reserved addresses, which ends up here as an error.
    pub fn from_payload(payload: &Value) -> Result<Self, GeoError> {
        let coordinate = |key: &str| payload.get(key).and_then(Value::as_f64);
        let text = |key: &str| payload.get(key).and_then(Value::as_str).map(String::from);

        let (latitude, longitude) = match (coordinate("latitude"), coordinate("longitude")) {
            (Some(lat), Some(lon)) => (lat, lon),
            _ => return Err(GeoError::MissingCoordinates),
        };

        Ok(LocationSummary {
            city: text("city"),
            region_name: text("region_name"),
            latitude,
            longitude,
        })
    }

    /// Model input features, in training order
    pub fn features(&self) -> [f64; 2] {
        [self.latitude, self.longitude]
    }
}

/// Successful response of `POST /adaptive-login`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptiveLoginResult {
    pub location: LocationSummary,
    pub decision: Decision,
}
