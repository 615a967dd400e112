use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use courier_pricing_api::config::PricingConfig;
use courier_pricing_api::services::distance_service::{
    DistanceError, DistanceProvider, RouteDistance,
};
use courier_pricing_api::services::pricing_service::PricingEngine;

pub const COUNTRY: &str = "UK";

/// Deterministic provider answering from a fixed table and recording every lookup.
#[derive(Default)]
pub struct StubDistanceProvider {
    routes: HashMap<(String, String), f64>,
    failing: HashSet<(String, String)>,
    delay: Option<Duration>,
    calls: Mutex<Vec<(String, String)>>,
}

fn qualified(address: &str) -> String {
    format!("{} {}", address, COUNTRY)
}

impl StubDistanceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, from: &str, to: &str, miles: f64) -> Self {
        self.routes.insert((qualified(from), qualified(to)), miles);
        self
    }

    pub fn failing(mut self, from: &str, to: &str) -> Self {
        self.failing.insert((qualified(from), qualified(to)));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

impl DistanceProvider for StubDistanceProvider {
    async fn resolve_distance(
        &self,
        origin: &str,
        destination: &str,
    ) -> Result<RouteDistance, DistanceError> {
        let key = (origin.to_string(), destination.to_string());
        self.calls.lock().unwrap().push(key.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.contains(&key) {
            return Err(DistanceError::NoRoute("ZERO_RESULTS".to_string()));
        }

        self.routes
            .get(&key)
            .map(|miles| RouteDistance {
                distance_miles: *miles,
                duration_minutes: miles * 3.0,
            })
            .ok_or_else(|| DistanceError::NoRoute(format!("{} -> {}", origin, destination)))
    }
}

pub fn engine(provider: StubDistanceProvider) -> PricingEngine<StubDistanceProvider> {
    PricingEngine::new(provider, PricingConfig::default())
}

pub fn assert_price(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 0.005,
        "expected price {}, got {}",
        expected,
        actual
    );
}
