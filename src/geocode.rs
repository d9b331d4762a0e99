use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::config::GeocoderConfig;
use crate::error::{IngestError, Result};

/// A resolved latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// External coordinate lookup, injected so tests can run without network
/// access. One operation, one attempt per call; retry policy lives with
/// the caller (there is none).
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, address: &str) -> Result<Option<Coordinates>>;
}

const KAKAO_ADDRESS_URL: &str = "https://dapi.kakao.com/v2/local/search/address.json";

/// Kakao local address search.
pub struct KakaoGeocoder {
    client: reqwest::Client,
    api_key: String,
    delay: Duration,
}

#[derive(Debug, Deserialize)]
struct AddressSearchResponse {
    documents: Vec<AddressDocument>,
}

#[derive(Debug, Deserialize)]
struct AddressDocument {
    /// Longitude, as a decimal string.
    x: String,
    /// Latitude, as a decimal string.
    y: String,
}

impl KakaoGeocoder {
    pub fn new(api_key: String, config: &GeocoderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            api_key,
            delay: Duration::from_millis(config.delay_ms),
        })
    }
}

#[async_trait]
impl Geocoder for KakaoGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<Coordinates>> {
        // Fixed inter-request delay per the service's acceptable-use limits.
        tokio::time::sleep(self.delay).await;

        let response = self
            .client
            .get(KAKAO_ADDRESS_URL)
            .header("Authorization", format!("KakaoAK {}", self.api_key))
            .query(&[("query", address)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(IngestError::Geocode(format!(
                "address search returned HTTP {}",
                response.status().as_u16()
            )));
        }

        let body: AddressSearchResponse = response.json().await?;
        let Some(document) = body.documents.first() else {
            debug!("No geocoding result for '{address}'");
            return Ok(None);
        };

        match (document.y.parse::<f64>(), document.x.parse::<f64>()) {
            (Ok(latitude), Ok(longitude)) => Ok(Some(Coordinates {
                latitude,
                longitude,
            })),
            _ => Err(IngestError::Geocode(format!(
                "malformed coordinates in response for '{address}'"
            ))),
        }
    }
}

/// Used when no API key is configured; every lookup comes back empty, so
/// rows without source coordinates fall through to rejection.
pub struct NullGeocoder;

#[async_trait]
impl Geocoder for NullGeocoder {
    async fn geocode(&self, _address: &str) -> Result<Option<Coordinates>> {
        Ok(None)
    }
}
