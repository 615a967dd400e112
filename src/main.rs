use std::io;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use env_logger::Env;
use log::info;

use courier_pricing_api::config::{AppConfig, ProviderKind};
use courier_pricing_api::routes;
use courier_pricing_api::routes::health::ProviderStatus;
use courier_pricing_api::services::distance_service::{ConfiguredProvider, GoogleDistanceProvider};
use courier_pricing_api::services::geocoding_service::NominatimDistanceProvider;
use courier_pricing_api::services::pricing_service::PricingEngine;

fn build_provider(config: &AppConfig) -> io::Result<ConfiguredProvider> {
    let provider = match config.provider {
        ProviderKind::Google => {
            let api_key = config.google_maps_api_key.clone().unwrap_or_default();
            GoogleDistanceProvider::new(api_key).map(ConfiguredProvider::Google)
        }
        ProviderKind::Nominatim => NominatimDistanceProvider::new().map(ConfiguredProvider::Nominatim),
    };
    provider.map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    if cfg!(debug_assertions) {
        dotenv::dotenv().ok();
    }

    env_logger::init_from_env(Env::default().default_filter_or("info"));
    info!("Application starting...");

    let config = AppConfig::from_env()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
    info!(
        "Using {:?} distance provider, quote timeout {}s",
        config.provider,
        config.quote_timeout.as_secs()
    );

    let provider_status = web::Data::new(ProviderStatus::from_config(&config));
    let provider = build_provider(&config)?;
    let engine = web::Data::new(
        PricingEngine::new(provider, config.pricing.clone()).with_quote_timeout(config.quote_timeout),
    );

    info!("Binding to {}:{}", config.host, config.port);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600),
            )
            .app_data(engine.clone())
            .app_data(provider_status.clone())
            .route("/health", web::get().to(routes::health::health_check))
            .service(
                web::scope("/api").configure(routes::pricing::configure::<ConfiguredProvider>),
            )
    })
    .bind((config.host.clone(), config.port))?
    .run()
    .await
}
