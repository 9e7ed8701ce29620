//! Geocoding provider boundary
//!
//! The resolver only needs two lookups from the map vendor: a direct
//! address-to-point geocoder and a region-aware multi-candidate place
//! search. Payloads are deserialized into explicit structs at this boundary
//! and coerced to [`GeoPoint`] immediately.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

use super::GeoPoint;

const GEOCODE_URL: &str = "https://api.map.baidu.com/geocoding/v3/";
const REVERSE_GEOCODE_URL: &str = "https://api.map.baidu.com/reverse_geocoding/v3/";
const SEARCH_URL: &str = "https://api.map.baidu.com/place/v2/search";

/// Trait defining the lookups the place resolver depends on
#[async_trait]
pub trait GeocodeProvider: Send + Sync {
    /// Direct address-to-point geocode; Ok(None) is a genuine miss
    async fn geocode(&self, address: &str) -> Result<Option<GeoPoint>>;

    /// Region-aware place search returning candidate points in rank order
    async fn search(&self, address: &str) -> Result<Vec<GeoPoint>>;

    /// Point-to-address reverse geocode
    async fn reverse_geocode(&self, point: GeoPoint) -> Result<Option<String>>;
}

#[derive(Debug, Deserialize)]
struct Location {
    lat: f64,
    lng: f64,
}

impl From<Location> for GeoPoint {
    fn from(loc: Location) -> Self {
        GeoPoint {
            lat: loc.lat,
            lng: loc.lng,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: i64,
    #[serde(default)]
    result: Option<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    location: Location,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    status: i64,
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    location: Option<Location>,
}

#[derive(Debug, Deserialize)]
struct ReverseGeocodeResponse {
    status: i64,
    #[serde(default)]
    result: Option<ReverseGeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct ReverseGeocodeResult {
    #[serde(default)]
    formatted_address: Option<String>,
}

/// Baidu map REST provider (geocoding v3, place search v2)
#[derive(Clone)]
pub struct BaiduProvider {
    http_client: Client,
    api_key: String,
}

impl BaiduProvider {
    /// Create a provider; the key must be non-empty
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(Error::MissingConfig("Baidu map API key is empty".into()));
        }
        Ok(Self {
            http_client: Client::new(),
            api_key,
        })
    }

    /// Create a provider from `BAIDU_MAP_API_KEY`
    pub fn from_env() -> Result<Self> {
        let key = std::env::var("BAIDU_MAP_API_KEY")
            .map_err(|_| Error::MissingConfig("BAIDU_MAP_API_KEY is not set".into()))?;
        Self::new(key)
    }
}

#[async_trait]
impl GeocodeProvider for BaiduProvider {
    async fn geocode(&self, address: &str) -> Result<Option<GeoPoint>> {
        debug!(address, "baidu geocode request");

        let response = self
            .http_client
            .get(GEOCODE_URL)
            .query(&[
                ("address", address),
                ("output", "json"),
                ("ak", &self.api_key),
            ])
            .send()
            .await?
            .error_for_status()?
            .json::<GeocodeResponse>()
            .await?;

        if response.status != 0 {
            debug!(status = response.status, address, "baidu geocode miss");
            return Ok(None);
        }

        Ok(response.result.map(|r| r.location.into()))
    }

    async fn search(&self, address: &str) -> Result<Vec<GeoPoint>> {
        debug!(address, "baidu place search request");

        let response = self
            .http_client
            .get(SEARCH_URL)
            .query(&[
                ("query", address),
                ("region", "全国"),
                ("output", "json"),
                ("ak", &self.api_key),
            ])
            .send()
            .await?
            .error_for_status()?
            .json::<SearchResponse>()
            .await?;

        if response.status != 0 {
            return Err(Error::Provider(format!(
                "baidu place search returned status {}",
                response.status
            )));
        }

        Ok(response
            .results
            .into_iter()
            .filter_map(|r| r.location.map(GeoPoint::from))
            .collect())
    }

    async fn reverse_geocode(&self, point: GeoPoint) -> Result<Option<String>> {
        debug!(lat = point.lat, lng = point.lng, "baidu reverse geocode request");

        let location = format!("{},{}", point.lat, point.lng);
        let response = self
            .http_client
            .get(REVERSE_GEOCODE_URL)
            .query(&[
                ("location", location.as_str()),
                ("output", "json"),
                ("ak", &self.api_key),
            ])
            .send()
            .await?
            .error_for_status()?
            .json::<ReverseGeocodeResponse>()
            .await?;

        if response.status != 0 {
            return Ok(None);
        }

        Ok(response.result.and_then(|r| r.formatted_address))
    }
}
