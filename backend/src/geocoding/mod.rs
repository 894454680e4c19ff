use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::AppConfig;

#[derive(Debug, thiserror::Error)]
pub enum GeocodingError {
    #[error("geocoding is not configured")]
    NotConfigured,
    #[error("address must not be empty")]
    EmptyAddress,
    #[error("no results for {0:?}")]
    NoResults(String),
    #[error("geocoding service returned status {0}")]
    Status(String),
    #[error("geocoding request failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeocodedLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub formatted_address: String,
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    formatted_address: String,
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

/// Client for a Google-style geocoding JSON endpoint
/// (`GET <url>?address=..&key=..`).
#[derive(Clone)]
pub struct GeocodingClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl GeocodingClient {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self, GeocodingError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        let api_key = api_key.filter(|key| !key.trim().is_empty());
        Ok(Self {
            http,
            base_url: base_url.to_string(),
            api_key,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, GeocodingError> {
        Self::new(&config.geocoding_url, config.geocoding_api_key.clone())
    }

    pub fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    pub async fn geocode(&self, address: &str) -> Result<GeocodedLocation, GeocodingError> {
        let api_key = self.api_key.as_deref().ok_or(GeocodingError::NotConfigured)?;
        let address = address.trim();
        if address.is_empty() {
            return Err(GeocodingError::EmptyAddress);
        }

        log::info!("Geocoding address: {}", address);
        let response: GeocodeResponse = self
            .http
            .get(&self.base_url)
            .query(&[("address", address), ("key", api_key)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        interpret(address, response)
    }
}

fn interpret(address: &str, response: GeocodeResponse) -> Result<GeocodedLocation, GeocodingError> {
    match response.status.as_str() {
        "OK" => response
            .results
            .into_iter()
            .next()
            .map(|result| GeocodedLocation {
                latitude: result.geometry.location.lat,
                longitude: result.geometry.location.lng,
                formatted_address: result.formatted_address,
            })
            .ok_or_else(|| GeocodingError::NoResults(address.to_string())),
        "ZERO_RESULTS" => Err(GeocodingError::NoResults(address.to_string())),
        other => {
            let detail = match response.error_message {
                Some(message) => format!("{}: {}", other, message),
                None => other.to_string(),
            };
            Err(GeocodingError::Status(detail))
        }
    }
}
