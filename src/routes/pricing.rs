use actix_web::{http::StatusCode, web, HttpResponse, ResponseError};
use log::warn;
use serde_json::json;

use crate::models::trip::TripSpecification;
use crate::services::distance_service::DistanceProvider;
use crate::services::pricing_service::{PricingEngine, PricingError};

impl ResponseError for PricingError {
    fn status_code(&self) -> StatusCode {
        match self {
            PricingError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            PricingError::UnsupportedVehicleForWeight { .. } => StatusCode::NOT_ACCEPTABLE,
            PricingError::RouteResolutionFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            PricingError::Cancelled(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            PricingError::InvalidInput(_) => json!({
                "error": "InvalidInput",
                "message": self.to_string(),
            }),
            PricingError::UnsupportedVehicleForWeight { .. } => json!({
                "error": "UnsupportedVehicleForWeight",
                "message": self.to_string(),
            }),
            PricingError::RouteResolutionFailed {
                leg_index,
                origin,
                destination,
                ..
            } => json!({
                "error": "RouteResolutionFailed",
                "message": self.to_string(),
                "legIndex": leg_index,
                "origin": origin,
                "destination": destination,
            }),
            PricingError::Cancelled(_) => json!({
                "error": "Cancelled",
                "message": self.to_string(),
            }),
        };

        HttpResponse::build(self.status_code()).json(body)
    }
}

/*
    /api/pricing/quote
*/
pub async fn quote<P: DistanceProvider + 'static>(
    engine: web::Data<PricingEngine<P>>,
    input: web::Json<TripSpecification>,
) -> Result<HttpResponse, PricingError> {
    let spec = input.into_inner();
    match engine.price_trip(&spec).await {
        Ok(result) => Ok(HttpResponse::Ok().json(result)),
        Err(err) => {
            warn!("Failed to price trip from {}: {}", spec.pickup, err);
            Err(err)
        }
    }
}

/// Register the pricing routes for an engine backed by `P`.
pub fn configure<P: DistanceProvider + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/pricing").route("/quote", web::post().to(quote::<P>)));
}
