//! Distance Service with Google Maps API Integration
//!
//! Resolves the driving distance between two postal addresses through the Google
//! Distance Matrix API. The pricing engine only sees the [`DistanceProvider`] trait,
//! so tests and alternative backends (see `geocoding_service`) plug in the same way.
//!
//! ## Setup
//! 1. Get a Google Maps API key from Google Cloud Console
//! 2. Enable the Distance Matrix API
//! 3. Set the environment variable: `GOOGLE_MAPS_API_KEY=your_api_key_here`
//!
//! ## Behaviour
//! - Imperial units; metres are converted to miles and seconds to minutes
//! - Resolved address pairs are cached in memory for 24 hours
//! - Transport failures are retried with a fixed back-off; "no route" answers are not

use log::{debug, warn};
use serde::Deserialize;
use std::{
    collections::HashMap,
    fmt,
    sync::Mutex,
    time::{Duration, Instant},
};

use crate::services::geocoding_service::NominatimDistanceProvider;

const DISTANCE_MATRIX_URL: &str = "https://maps.googleapis.com/maps/api/distancematrix/json";
const METRES_PER_MILE: f64 = 1609.34;

const CACHE_DURATION: Duration = Duration::from_secs(86400); // 24 hours
const MAX_CACHE_ENTRIES: usize = 10_000;
const DEFAULT_MAX_RETRIES: u32 = 2;
const RETRY_BACKOFF: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteDistance {
    pub distance_miles: f64,
    pub duration_minutes: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DistanceError {
    /// Transport-level failure talking to the provider.
    Http(String),
    /// The provider answered with a non-OK status.
    Api(String),
    /// The provider could not find a route between the two points.
    NoRoute(String),
    /// An address could not be turned into coordinates.
    Geocoding(String),
    Parse(String),
}

impl fmt::Display for DistanceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistanceError::Http(err) => write!(f, "Distance provider request failed: {}", err),
            DistanceError::Api(status) => write!(f, "Distance provider error: {}", status),
            DistanceError::NoRoute(status) => write!(f, "No route found: {}", status),
            DistanceError::Geocoding(err) => write!(f, "Unable to geocode address: {}", err),
            DistanceError::Parse(err) => write!(f, "Failed to parse distance response: {}", err),
        }
    }
}

impl std::error::Error for DistanceError {}

impl From<reqwest::Error> for DistanceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            DistanceError::Parse(err.to_string())
        } else {
            DistanceError::Http(err.to_string())
        }
    }
}

/// Map a provider's HTTP status onto the error taxonomy. Throttling and server
/// errors are transport failures and may be retried; other client errors are not.
pub(crate) fn check_status(status: reqwest::StatusCode) -> Result<(), DistanceError> {
    if status.is_success() {
        Ok(())
    } else if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        Err(DistanceError::Http(format!("HTTP {}", status)))
    } else {
        Err(DistanceError::Api(format!("HTTP {}", status)))
    }
}

/// Driving distance between two free-form postal addresses.
pub trait DistanceProvider {
    async fn resolve_distance(
        &self,
        origin: &str,
        destination: &str,
    ) -> Result<RouteDistance, DistanceError>;
}

#[derive(Debug, Deserialize)]
pub(crate) struct GoogleMapsResponse {
    status: String,
    #[serde(default)]
    rows: Vec<GoogleMapsRow>,
}

#[derive(Debug, Deserialize)]
struct GoogleMapsRow {
    elements: Vec<GoogleMapsElement>,
}

#[derive(Debug, Deserialize)]
struct GoogleMapsElement {
    status: String,
    distance: Option<GoogleMapsValue>,
    duration: Option<GoogleMapsValue>,
}

#[derive(Debug, Deserialize)]
struct GoogleMapsValue {
    value: f64, // metres or seconds
}

/// Extract the single origin/destination element of a matrix response.
pub(crate) fn parse_matrix_response(
    response: &GoogleMapsResponse,
) -> Result<RouteDistance, DistanceError> {
    if response.status != "OK" {
        return Err(DistanceError::Api(response.status.clone()));
    }

    let element = response
        .rows
        .first()
        .and_then(|row| row.elements.first())
        .ok_or_else(|| DistanceError::NoRoute("empty distance matrix".to_string()))?;

    if element.status != "OK" {
        return Err(DistanceError::NoRoute(element.status.clone()));
    }

    let distance = element
        .distance
        .as_ref()
        .ok_or_else(|| DistanceError::Parse("distance not available".to_string()))?;
    let duration = element
        .duration
        .as_ref()
        .ok_or_else(|| DistanceError::Parse("duration not available".to_string()))?;

    Ok(RouteDistance {
        distance_miles: distance.value / METRES_PER_MILE,
        duration_minutes: duration.value / 60.0,
    })
}

struct CachedDistance {
    distance: RouteDistance,
    expires_at: Instant,
}

pub struct GoogleDistanceProvider {
    http_client: reqwest::Client,
    api_key: String,
    max_retries: u32,
    cache_capacity: usize,
    cache: Mutex<HashMap<(String, String), CachedDistance>>,
}

impl GoogleDistanceProvider {
    pub fn new(api_key: impl Into<String>) -> Result<Self, DistanceError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http_client,
            api_key: api_key.into(),
            max_retries: DEFAULT_MAX_RETRIES,
            cache_capacity: MAX_CACHE_ENTRIES,
            cache: Mutex::new(HashMap::new()),
        })
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity.max(1);
        self
    }

    fn cached(&self, key: &(String, String)) -> Option<RouteDistance> {
        let cache = self.cache.lock().ok()?;
        cache
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.distance)
    }

    fn store(&self, key: (String, String), distance: RouteDistance) {
        if let Ok(mut cache) = self.cache.lock() {
            let now = Instant::now();
            cache.retain(|_, entry| entry.expires_at > now);
            if cache.len() >= self.cache_capacity && !cache.contains_key(&key) {
                let oldest = cache
                    .iter()
                    .min_by_key(|(_, entry)| entry.expires_at)
                    .map(|(key, _)| key.clone());
                if let Some(oldest) = oldest {
                    cache.remove(&oldest);
                }
            }
            cache.insert(
                key,
                CachedDistance {
                    distance,
                    expires_at: now + CACHE_DURATION,
                },
            );
        }
    }

    async fn fetch_from_google_maps(
        &self,
        origin: &str,
        destination: &str,
    ) -> Result<RouteDistance, DistanceError> {
        let response = self
            .http_client
            .get(DISTANCE_MATRIX_URL)
            .query(&[
                ("units", "imperial"),
                ("origins", origin),
                ("destinations", destination),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?;
        check_status(response.status())?;

        let google_response: GoogleMapsResponse = response.json().await?;
        parse_matrix_response(&google_response)
    }
}

impl DistanceProvider for GoogleDistanceProvider {
    async fn resolve_distance(
        &self,
        origin: &str,
        destination: &str,
    ) -> Result<RouteDistance, DistanceError> {
        let key = (origin.to_string(), destination.to_string());
        if let Some(distance) = self.cached(&key) {
            debug!("Using cached distance for {} -> {}", origin, destination);
            return Ok(distance);
        }

        let mut attempt = 0;
        let distance = loop {
            match self.fetch_from_google_maps(origin, destination).await {
                Ok(distance) => break distance,
                Err(DistanceError::Http(err)) if attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        "Distance lookup {} -> {} failed ({}), retry {}/{}",
                        origin, destination, err, attempt, self.max_retries
                    );
                    tokio::time::sleep(RETRY_BACKOFF).await;
                }
                Err(err) => return Err(err),
            }
        };

        self.store(key, distance);
        Ok(distance)
    }
}

/// The provider chosen at startup through `DISTANCE_PROVIDER`.
pub enum ConfiguredProvider {
    Google(GoogleDistanceProvider),
    Nominatim(NominatimDistanceProvider),
}

impl DistanceProvider for ConfiguredProvider {
    async fn resolve_distance(
        &self,
        origin: &str,
        destination: &str,
    ) -> Result<RouteDistance, DistanceError> {
        match self {
            ConfiguredProvider::Google(provider) => {
                provider.resolve_distance(origin, destination).await
            }
            ConfiguredProvider::Nominatim(provider) => {
                provider.resolve_distance(origin, destination).await
            }
        }
    }
}
