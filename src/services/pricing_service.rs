//! Multi-stop delivery pricing.
//!
//! A quote walks the route pickup -> drop 1 -> ... -> drop n one leg at a time,
//! asking the [`DistanceProvider`] for each leg's driving distance, then prices the
//! legs with the tariffs in [`PricingConfig`]:
//!
//! - first leg pays the vehicle's base charge, later legs the extra-stop fee
//! - every leg pays `miles * rate`, with the rush rate inside the rush windows
//! - every leg ending in the congestion zone pays the zone fee while the zone is active
//! - weight surcharge and waiting charge are added once per trip
//! - a return to the same location costs a fixed share of the outbound price; a
//!   return elsewhere is resolved and priced as one more leg
//!
//! Motorbike jobs over the weight cap are refused before any lookup. Motorbike jobs
//! whose route turns out longer than the distance cap are repriced as a car.

use log::{debug, info};
use std::{fmt, time::Duration};

use crate::config::PricingConfig;
use crate::models::{
    quote::{round2, PricingResult},
    trip::{Leg, TripSpecification},
    vehicle::VehicleClass,
};
use crate::services::distance_service::{DistanceError, DistanceProvider};
use crate::services::postcode_zone::is_congestion_zone;
use crate::services::pricing_policy::{
    base_charge, exceeded_weight_cap, parse_clock_minutes, rate_for, select_effective_vehicle,
    waiting_charge, weight_surcharge,
};

#[derive(Debug)]
pub enum PricingError {
    InvalidInput(String),
    UnsupportedVehicleForWeight {
        vehicle: VehicleClass,
        weight_kg: f64,
        max_weight_kg: f64,
    },
    RouteResolutionFailed {
        leg_index: usize,
        origin: String,
        destination: String,
        reason: DistanceError,
    },
    Cancelled(Duration),
}

impl fmt::Display for PricingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PricingError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            PricingError::UnsupportedVehicleForWeight {
                vehicle,
                weight_kg,
                max_weight_kg,
            } => write!(
                f,
                "{} service does not support deliveries over {}kg (requested {}kg). Please choose a different vehicle type.",
                vehicle, max_weight_kg, weight_kg
            ),
            PricingError::RouteResolutionFailed {
                leg_index,
                origin,
                destination,
                reason,
            } => write!(
                f,
                "Unable to resolve leg {} from {} to {}: {}",
                leg_index, origin, destination, reason
            ),
            PricingError::Cancelled(limit) => {
                write!(f, "Quote was not completed within {}s", limit.as_secs_f64())
            }
        }
    }
}

impl std::error::Error for PricingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PricingError::RouteResolutionFailed { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

/// A trip whose raw fields have been checked and coerced.
#[derive(Debug, Clone)]
pub struct ValidatedTrip<'a> {
    pub requested: VehicleClass,
    pub pickup: &'a str,
    pub drops: &'a [String],
    pub country: &'a str,
    pub weight_kg: f64,
    pub booking_minutes: u32,
    pub waiting_minutes: f64,
    pub return_trip: bool,
    pub return_to_same_location: bool,
}

impl<'a> ValidatedTrip<'a> {
    pub fn from_spec(spec: &'a TripSpecification) -> Result<Self, PricingError> {
        if spec.delivery.is_empty() {
            return Err(PricingError::InvalidInput(
                "at least one delivery address is required".to_string(),
            ));
        }
        if spec.pickup.trim().is_empty() {
            return Err(PricingError::InvalidInput(
                "pickup address is required".to_string(),
            ));
        }
        if let Some(index) = spec.delivery.iter().position(|d| d.trim().is_empty()) {
            return Err(PricingError::InvalidInput(format!(
                "delivery address {} is empty",
                index
            )));
        }

        let booking_minutes = parse_clock_minutes(&spec.time).map_err(PricingError::InvalidInput)?;
        let weight_kg = spec
            .weight
            .to_non_negative("weight")
            .map_err(PricingError::InvalidInput)?;
        let waiting_minutes = spec
            .waiting_time
            .to_non_negative("waitingTime")
            .map_err(PricingError::InvalidInput)?;

        Ok(Self {
            requested: spec.service,
            pickup: &spec.pickup,
            drops: &spec.delivery,
            country: &spec.country,
            weight_kg,
            booking_minutes,
            waiting_minutes,
            return_trip: spec.return_trip,
            return_to_same_location: spec.return_to_same_location,
        })
    }
}

/// How the way back is priced, if there is one.
#[derive(Debug, Clone, PartialEq)]
pub enum ReturnFare {
    None,
    /// Fixed share of the outbound price; no extra distance is resolved.
    SameLocation,
    /// Separately resolved leg from the last drop.
    ViaLeg(Leg),
}

fn qualify(address: &str, country: &str) -> String {
    let country = country.trim();
    if country.is_empty() {
        address.trim().to_string()
    } else {
        format!("{} {}", address.trim(), country)
    }
}

/// Price the resolved legs. Pure; rounding happens only on the returned figures.
pub fn compose_fare(
    config: &PricingConfig,
    trip: &ValidatedTrip<'_>,
    legs: Vec<Leg>,
    effective: VehicleClass,
    return_fare: ReturnFare,
) -> PricingResult {
    let rate = rate_for(config, effective, trip.booking_minutes);
    let zone = &config.congestion_zone;
    let zone_active = zone.active.contains(trip.booking_minutes);
    let zone_fee = |leg: &Leg| {
        if zone_active && leg.in_congestion_zone {
            zone.fee
        } else {
            0.0
        }
    };
    let pickup_in_zone = is_congestion_zone(trip.pickup, &zone.postcode_prefixes);
    let surcharge = weight_surcharge(config, effective, trip.weight_kg);

    let mut outbound = 0.0;
    let mut total_miles = 0.0;
    for (i, leg) in legs.iter().enumerate() {
        outbound += if i == 0 {
            base_charge(config, effective, pickup_in_zone)
        } else {
            config.extra_stop_fee
        };
        outbound += leg.miles * rate;
        outbound += zone_fee(leg);
        total_miles += leg.miles;
    }
    outbound += surcharge;
    outbound += waiting_charge(config, trip.waiting_minutes);

    let mut total_price = outbound;
    let return_leg = match return_fare {
        ReturnFare::None => None,
        ReturnFare::SameLocation => {
            total_price += outbound * config.same_location_return_factor;
            None
        }
        ReturnFare::ViaLeg(leg) => {
            let origin_in_zone = is_congestion_zone(&leg.from, &zone.postcode_prefixes);
            total_price += base_charge(config, effective, origin_in_zone);
            total_price += leg.miles * rate;
            total_price += zone_fee(&leg);
            total_price += surcharge;
            total_miles += leg.miles;
            Some(leg)
        }
    };

    PricingResult {
        total_price: round2(total_price),
        total_distance: round2(total_miles),
        requested_vehicle: trip.requested,
        effective_vehicle: effective,
        vehicle_upgraded: effective != trip.requested,
        legs,
        return_leg,
    }
}

pub struct PricingEngine<P> {
    provider: P,
    config: PricingConfig,
    quote_timeout: Option<Duration>,
}

impl<P: DistanceProvider> PricingEngine<P> {
    pub fn new(provider: P, config: PricingConfig) -> Self {
        Self {
            provider,
            config,
            quote_timeout: None,
        }
    }

    /// Abandon route resolution once `limit` has elapsed.
    pub fn with_quote_timeout(mut self, limit: Duration) -> Self {
        self.quote_timeout = Some(limit);
        self
    }

    pub fn config(&self) -> &PricingConfig {
        &self.config
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Quote a trip. Input problems and the motorbike weight cap are reported
    /// before the distance provider is called.
    pub async fn price_trip(&self, spec: &TripSpecification) -> Result<PricingResult, PricingError> {
        let trip = ValidatedTrip::from_spec(spec)?;

        if let Some(max_weight_kg) = exceeded_weight_cap(&self.config, trip.requested, trip.weight_kg)
        {
            return Err(PricingError::UnsupportedVehicleForWeight {
                vehicle: trip.requested,
                weight_kg: trip.weight_kg,
                max_weight_kg,
            });
        }

        let result = match self.quote_timeout {
            Some(limit) => tokio::time::timeout(limit, self.price_validated(&trip))
                .await
                .map_err(|_| PricingError::Cancelled(limit))?,
            None => self.price_validated(&trip).await,
        }?;

        info!(
            "Quoted {} with {} drop(s): {:.2} for {:.2} miles",
            result.effective_vehicle,
            trip.drops.len(),
            result.total_price,
            result.total_distance
        );
        Ok(result)
    }

    async fn price_validated(&self, trip: &ValidatedTrip<'_>) -> Result<PricingResult, PricingError> {
        let (legs, outbound_miles) = self
            .accumulate_legs(trip.pickup, trip.drops, trip.country)
            .await?;

        let effective = select_effective_vehicle(&self.config, trip.requested, outbound_miles);
        if effective != trip.requested {
            info!(
                "Upgrading {} to {}: route of {:.2} miles exceeds the {} distance cap",
                trip.requested, effective, outbound_miles, trip.requested
            );
        }

        let return_fare = match (trip.return_trip, trip.return_to_same_location) {
            (false, _) => ReturnFare::None,
            (true, true) => ReturnFare::SameLocation,
            (true, false) => {
                let last = trip.drops.last().map(String::as_str).unwrap_or(trip.pickup);
                let leg = self
                    .resolve_leg(trip.drops.len(), last, trip.pickup, trip.country)
                    .await?;
                ReturnFare::ViaLeg(leg)
            }
        };

        Ok(compose_fare(&self.config, trip, legs, effective, return_fare))
    }

    /// Resolve pickup -> drops[0] -> drops[1] -> ... in order. Each leg starts where
    /// the previous one ended, so the lookups cannot run concurrently.
    pub async fn accumulate_legs(
        &self,
        pickup: &str,
        drops: &[String],
        country: &str,
    ) -> Result<(Vec<Leg>, f64), PricingError> {
        let mut legs = Vec::with_capacity(drops.len());
        let mut total_miles = 0.0;
        let mut current = pickup;

        for (index, drop) in drops.iter().enumerate() {
            let leg = self.resolve_leg(index, current, drop, country).await?;
            total_miles += leg.miles;
            legs.push(leg);
            current = drop.as_str();
        }

        Ok((legs, total_miles))
    }

    async fn resolve_leg(
        &self,
        leg_index: usize,
        origin: &str,
        destination: &str,
        country: &str,
    ) -> Result<Leg, PricingError> {
        let route = self
            .provider
            .resolve_distance(&qualify(origin, country), &qualify(destination, country))
            .await
            .map_err(|reason| PricingError::RouteResolutionFailed {
                leg_index,
                origin: origin.to_string(),
                destination: destination.to_string(),
                reason,
            })?;

        let in_congestion_zone =
            is_congestion_zone(destination, &self.config.congestion_zone.postcode_prefixes);
        debug!(
            "Leg {}: {} -> {} = {:.3} miles (congestion zone: {})",
            leg_index, origin, destination, route.distance_miles, in_congestion_zone
        );

        Ok(Leg {
            from: origin.to_string(),
            to: destination.to_string(),
            miles: route.distance_miles,
            duration_minutes: route.duration_minutes,
            in_congestion_zone,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::trip::NumericInput;

    fn trip_spec() -> TripSpecification {
        TripSpecification::new(
            VehicleClass::Car,
            "SE1 7PB",
            vec!["N1 9GU".to_string(), "E14 5AB".to_string()],
            "UK",
            12.0,
            "08:00",
        )
    }

    fn leg(from: &str, to: &str, miles: f64, in_zone: bool) -> Leg {
        Leg {
            from: from.to_string(),
            to: to.to_string(),
            miles,
            duration_minutes: 0.0,
            in_congestion_zone: in_zone,
        }
    }

    #[test]
    fn test_validation_coerces_inputs() {
        let spec = trip_spec().with_waiting_time("25");
        let trip = ValidatedTrip::from_spec(&spec).unwrap();
        assert_eq!(trip.booking_minutes, 480);
        assert_eq!(trip.weight_kg, 12.0);
        assert_eq!(trip.waiting_minutes, 25.0);
    }

    #[test]
    fn test_validation_rejects_bad_inputs() {
        let mut no_drops = trip_spec();
        no_drops.delivery.clear();

        let mut bad_time = trip_spec();
        bad_time.time = "8 o'clock".to_string();

        let mut bad_weight = trip_spec();
        bad_weight.weight = NumericInput::Text("heavy".to_string());

        let mut blank_drop = trip_spec();
        blank_drop.delivery.push("  ".to_string());

        for spec in [no_drops, bad_time, bad_weight, blank_drop] {
            assert!(matches!(
                ValidatedTrip::from_spec(&spec),
                Err(PricingError::InvalidInput(_))
            ));
        }
    }

    #[test]
    fn test_compose_fare_multi_drop_in_rush_hour() {
        let config = PricingConfig::default();
        let spec = trip_spec();
        let trip = ValidatedTrip::from_spec(&spec).unwrap();
        let legs = vec![
            leg("SE1 7PB", "N1 9GU", 4.0, false),
            leg("N1 9GU", "E14 5AB", 6.0, false),
        ];

        let result = compose_fare(&config, &trip, legs, VehicleClass::Car, ReturnFare::None);

        // base 30 + extra stop 3 + 10 miles at 1.70 + weight 10
        assert_eq!(result.total_price, 60.0);
        assert_eq!(result.total_distance, 10.0);
        assert!(!result.vehicle_upgraded);
    }

    #[test]
    fn test_compose_fare_zone_fee_per_leg_inside_window_only() {
        let config = PricingConfig::default();
        let mut spec = trip_spec();
        spec.delivery = vec!["EC1A 1BB".to_string(), "W1D 3QF".to_string()];
        spec.weight = NumericInput::Number(5.0);
        let legs = || {
            vec![
                leg("SE1 7PB", "EC1A 1BB", 0.0, true),
                leg("EC1A 1BB", "W1D 3QF", 0.0, true),
            ]
        };

        let trip = ValidatedTrip::from_spec(&spec).unwrap();
        let inside = compose_fare(&config, &trip, legs(), VehicleClass::Car, ReturnFare::None);
        assert_eq!(inside.total_price, 30.0 + 3.0 + 17.0 * 2.0);

        spec.time = "19:30".to_string();
        let trip = ValidatedTrip::from_spec(&spec).unwrap();
        let outside = compose_fare(&config, &trip, legs(), VehicleClass::Car, ReturnFare::None);
        assert_eq!(outside.total_price, 33.0);
    }

    #[test]
    fn test_compose_fare_same_location_return() {
        let config = PricingConfig::default();
        let mut spec = trip_spec();
        spec.delivery.truncate(1);
        let trip = ValidatedTrip::from_spec(&spec).unwrap();
        let legs = vec![leg("SE1 7PB", "N1 9GU", 4.0, false)];

        let result = compose_fare(&config, &trip, legs, VehicleClass::Car, ReturnFare::SameLocation);

        // outbound 30 + 6.8 + 10 = 46.8, plus 60% of it
        assert_eq!(result.total_price, 74.88);
        assert_eq!(result.total_distance, 4.0);
        assert_eq!(result.return_leg, None);
    }

    #[test]
    fn test_compose_fare_return_via_leg() {
        let config = PricingConfig::default();
        let mut spec = trip_spec();
        spec.delivery.truncate(1);
        spec.pickup = "N7 6PA".to_string();
        let trip = ValidatedTrip::from_spec(&spec).unwrap();
        let legs = vec![leg("N7 6PA", "N1 9GU", 4.0, false)];
        let back = leg("N1 9GU", "N7 6PA", 2.0, false);

        let result = compose_fare(
            &config,
            &trip,
            legs,
            VehicleClass::Car,
            ReturnFare::ViaLeg(back.clone()),
        );

        // outbound 25 + 6.8 + 10, return 25 + 3.4 + 10
        assert_eq!(result.total_price, 80.2);
        assert_eq!(result.total_distance, 6.0);
        assert_eq!(result.return_leg, Some(back));
    }

    #[test]
    fn test_qualify_appends_country() {
        assert_eq!(qualify(" SE1 7PB ", "UK"), "SE1 7PB UK");
        assert_eq!(qualify("SE1 7PB", ""), "SE1 7PB");
    }
}
