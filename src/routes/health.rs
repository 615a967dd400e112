use actix_web::{web, HttpResponse, Responder};
use serde::Serialize;
use std::collections::HashMap;
use std::env;

use crate::config::{AppConfig, ProviderKind};

#[derive(Serialize)]
struct HealthStatus {
    status: String,
    services: HashMap<String, ServiceStatus>,
    environment: String,
    version: String,
}

#[derive(Serialize, Clone)]
struct ServiceStatus {
    status: String,
    details: Option<String>,
}

/// The distance provider the server was started with.
#[derive(Debug, Clone)]
pub struct ProviderStatus {
    kind: ProviderKind,
    google_maps_api_key: Option<String>,
}

impl ProviderStatus {
    pub fn new(kind: ProviderKind, google_maps_api_key: Option<String>) -> Self {
        Self {
            kind,
            google_maps_api_key,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.provider, config.google_maps_api_key.clone())
    }
}

pub async fn health_check(provider: web::Data<ProviderStatus>) -> impl Responder {
    let mut health = HealthStatus {
        status: "OK".to_string(),
        services: HashMap::new(),
        environment: env::var("RUST_ENV").unwrap_or("development".to_string()),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    let provider_result = check_distance_provider(&provider);
    health
        .services
        .insert("distance_provider".to_string(), provider_result.clone());

    if provider_result.status != "ok" {
        health.status = "degraded".to_string();
    }

    HttpResponse::Ok().json(health)
}

fn check_distance_provider(provider: &ProviderStatus) -> ServiceStatus {
    if provider.kind == ProviderKind::Nominatim {
        return ServiceStatus {
            status: "ok".to_string(),
            details: Some("Using OpenStreetMap Nominatim geocoding".to_string()),
        };
    }

    // Only the key's presence is checked; a lookup would cost an API call
    match provider.google_maps_api_key.as_deref() {
        Some(key) if !key.is_empty() => ServiceStatus {
            status: "ok".to_string(),
            details: Some(format!("Google Maps API key configured ({})", mask_key(key))),
        },
        _ => ServiceStatus {
            status: "error".to_string(),
            details: Some("GOOGLE_MAPS_API_KEY not configured".to_string()),
        },
    }
}

fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}***{}", head, tail)
    } else {
        "***".to_string()
    }
}
