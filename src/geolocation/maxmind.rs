//! Offline geolocation using a MaxMind GeoLite2-City database
//!
//! Users must download the database file separately from MaxMind (free
//! with registration). Results are rendered with ipstack field names.

use async_trait::async_trait;
use maxminddb::{geoip2, MaxMindDBError, Reader};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;

use super::{GeoError, GeoLocator, LookupTarget};

/// GeoIP lookup service backed by a GeoLite2-City database
///
/// # Example
///
/// ```ignore
/// use geoguard::geolocation::MaxMindLocator;
///
/// let locator = MaxMindLocator::new("GeoLite2-City.mmdb")?;
/// let payload = locator.locate(&"8.8.8.8".parse().unwrap())?;
/// println!("{}", payload["country_name"]);
/// ```
#[derive(Clone)]
pub struct MaxMindLocator {
    reader: Arc<Reader<Vec<u8>>>,
}

impl MaxMindLocator {
    /// Open a GeoLite2-City.mmdb database
    ///
    /// # Errors
    ///
    /// Returns an error if the database file cannot be opened or is invalid.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, GeoError> {
        let path = db_path.as_ref();
        if !path.exists() {
            return Err(GeoError::FileNotFound(path.display().to_string()));
        }

        let reader = Reader::open_readfile(path)?;
        Ok(MaxMindLocator {
            reader: Arc::new(reader),
        })
    }

    /// Look up one address and render it as an ipstack-style payload
    pub fn locate(&self, ip: &IpAddr) -> Result<Value, GeoError> {
        let city: geoip2::City = self.reader.lookup(*ip).map_err(|e| match e {
            MaxMindDBError::AddressNotFoundError(_) => GeoError::NotFound,
            other => GeoError::Database(other),
        })?;

        let location = city.location.as_ref();
        let region = city.subdivisions.as_ref().and_then(|s| s.first());

        Ok(json!({
            "ip": ip.to_string(),
            "city": city.city.as_ref().and_then(|c| english(&c.names)),
            "region_name": region.and_then(|r| english(&r.names)),
            "region_code": region.and_then(|r| r.iso_code),
            "country_name": city.country.as_ref().and_then(|c| english(&c.names)),
            "country_code": city.country.as_ref().and_then(|c| c.iso_code),
            "latitude": location.and_then(|l| l.latitude),
            "longitude": location.and_then(|l| l.longitude),
            "time_zone": location.and_then(|l| l.time_zone),
            "accuracy_radius": location.and_then(|l| l.accuracy_radius),
        }))
    }
}

fn english<'a>(names: &Option<BTreeMap<&'a str, &'a str>>) -> Option<&'a str> {
    names.as_ref().and_then(|n| n.get("en").copied())
}

#[async_trait]
impl GeoLocator for MaxMindLocator {
    async fn lookup(&self, target: &LookupTarget) -> Result<Value, GeoError> {
        let ip = match target {
            LookupTarget::Requester(Some(ip)) => *ip,
            LookupTarget::Requester(None) => return Err(GeoError::NoRequesterAddress),
            LookupTarget::Address(raw) => raw
                .trim()
                .parse::<IpAddr>()
                .map_err(|_| GeoError::InvalidAddress(raw.clone()))?,
        };

        self.locate(&ip)
    }
}
