//! ipstack HTTP API client

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::Value;

use super::{GeoError, GeoLocator, LookupTarget};

/// Client for the ipstack lookup API
///
/// `Requester` targets use the `/check` endpoint, which resolves the
/// address the request arrives from (this server's egress address).
#[derive(Clone)]
pub struct IpStackClient {
    client: Client,
    base_url: Url,
    access_key: String,
}

impl IpStackClient {
    pub fn new(client: Client, base_url: &str, access_key: &str) -> Result<Self, GeoError> {
        let base_url =
            Url::parse(base_url).map_err(|e| GeoError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(GeoError::InvalidUrl(base_url.to_string()));
        }

        Ok(IpStackClient {
            client,
            base_url,
            access_key: access_key.to_string(),
        })
    }

    /// URL for a lookup, with the access key attached
    fn lookup_url(&self, target: &LookupTarget) -> Url {
        let segment = match target {
            LookupTarget::Requester(_) => "check",
            LookupTarget::Address(ip) => ip.as_str(),
        };

        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(segment);
        }
        url.query_pairs_mut()
            .append_pair("access_key", &self.access_key);
        url
    }
}

#[async_trait]
impl GeoLocator for IpStackClient {
    async fn lookup(&self, target: &LookupTarget) -> Result<Value, GeoError> {
        let url = self.lookup_url(target);
        log::debug!("ipstack lookup: {:?}", target);

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GeoError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let payload: Value = response.json().await?;

        // ipstack reports key and quota problems with a 200 and `success: false`
        if payload.get("success").and_then(Value::as_bool) == Some(false) {
            let error = payload.get("error");
            return Err(GeoError::Provider {
                code: error
                    .and_then(|e| e.get("code"))
                    .and_then(Value::as_i64)
                    .unwrap_or_default(),
                info: error
                    .and_then(|e| e.get("info").or_else(|| e.get("type")))
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_string(),
            });
        }

        Ok(payload)
    }
}
