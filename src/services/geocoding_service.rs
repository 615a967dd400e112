//! Straight-line distances from OpenStreetMap Nominatim geocodes.
//!
//! Each address is geocoded independently and the legs are measured with the
//! haversine formula. Cheaper than the Distance Matrix API but blind to the road
//! network, so it underestimates driving miles.

use log::debug;
use serde::Deserialize;
use std::time::Duration;

use crate::services::distance_service::{
    check_status, DistanceError, DistanceProvider, RouteDistance,
};

const NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org/search";
const USER_AGENT: &str = "courier-pricing-api";

const EARTH_RADIUS_KM: f64 = 6371.0;
const MILES_PER_KM: f64 = 0.621371;
const DEFAULT_AVERAGE_SPEED_MPH: f64 = 15.0;

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
}

/// Great-circle distance in miles between two `(lat, lng)` pairs, to 3 decimals.
pub fn haversine_miles(origin: (f64, f64), destination: (f64, f64)) -> f64 {
    let (lat1, lon1) = (origin.0.to_radians(), origin.1.to_radians());
    let (lat2, lon2) = (destination.0.to_radians(), destination.1.to_radians());

    let d_lat = lat2 - lat1;
    let d_lon = lon2 - lon1;
    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    let miles = EARTH_RADIUS_KM * c * MILES_PER_KM;
    (miles * 1000.0).round() / 1000.0
}

pub struct NominatimDistanceProvider {
    http_client: reqwest::Client,
    average_speed_mph: f64,
}

impl NominatimDistanceProvider {
    pub fn new() -> Result<Self, DistanceError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            http_client,
            average_speed_mph: DEFAULT_AVERAGE_SPEED_MPH,
        })
    }

    pub fn with_average_speed(mut self, mph: f64) -> Self {
        self.average_speed_mph = mph;
        self
    }

    async fn geocode(&self, address: &str) -> Result<(f64, f64), DistanceError> {
        let response = self
            .http_client
            .get(NOMINATIM_URL)
            .query(&[("format", "json"), ("q", address)])
            .send()
            .await?;
        check_status(response.status())?;
        let places: Vec<NominatimPlace> = response.json().await?;

        let place = places
            .first()
            .ok_or_else(|| DistanceError::Geocoding(format!("no locations found for {}", address)))?;

        let lat = place
            .lat
            .parse::<f64>()
            .map_err(|e| DistanceError::Parse(format!("latitude {:?}: {}", place.lat, e)))?;
        let lon = place
            .lon
            .parse::<f64>()
            .map_err(|e| DistanceError::Parse(format!("longitude {:?}: {}", place.lon, e)))?;

        debug!("Geocoded {} to ({:.4}, {:.4})", address, lat, lon);
        Ok((lat, lon))
    }
}

impl DistanceProvider for NominatimDistanceProvider {
    async fn resolve_distance(
        &self,
        origin: &str,
        destination: &str,
    ) -> Result<RouteDistance, DistanceError> {
        let from = self.geocode(origin).await?;
        let to = self.geocode(destination).await?;

        let distance_miles = haversine_miles(from, to);
        Ok(RouteDistance {
            distance_miles,
            duration_minutes: distance_miles / self.average_speed_mph * 60.0,
        })
    }
}
