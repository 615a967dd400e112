//! Pure tariff lookups: booking-time parsing, per-mile rates, weight surcharges,
//! waiting charges and the vehicle selection rules.

use chrono::{NaiveTime, Timelike};
use regex::Regex;
use std::sync::OnceLock;

use crate::config::PricingConfig;
use crate::models::vehicle::VehicleClass;

fn clock_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\d{1,2}):(\d{2})$").expect("valid clock regex"))
}

/// Parse `HH:MM` (24h) into minutes since midnight.
pub fn parse_clock_minutes(raw: &str) -> Result<u32, String> {
    let invalid = || format!("Invalid booking time {:?}, expected HH:MM", raw);

    let captures = clock_pattern().captures(raw.trim()).ok_or_else(invalid)?;
    let hour: u32 = captures[1].parse().map_err(|_| invalid())?;
    let minute: u32 = captures[2].parse().map_err(|_| invalid())?;
    let time = NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(invalid)?;

    Ok(time.hour() * 60 + time.minute())
}

pub fn is_rush_hour(config: &PricingConfig, minutes: u32) -> bool {
    config.rush_windows.iter().any(|w| w.contains(minutes))
}

/// Per-mile rate for the vehicle at the given minute of the day.
pub fn rate_for(config: &PricingConfig, vehicle: VehicleClass, minutes: u32) -> f64 {
    let rates = config.rates(vehicle);
    if is_rush_hour(config, minutes) {
        rates.rush_rate
    } else {
        rates.rate
    }
}

/// Flat trip-level surcharge for the parcel weight. Motorbikes are weight-capped
/// instead and never pay one.
pub fn weight_surcharge(config: &PricingConfig, vehicle: VehicleClass, weight_kg: f64) -> f64 {
    if vehicle == VehicleClass::Motorbike {
        return 0.0;
    }

    config
        .weight_tiers
        .iter()
        .find(|tier| weight_kg <= tier.up_to_kg)
        .map(|tier| tier.surcharge)
        .unwrap_or(config.overweight_surcharge)
}

/// First-leg charge, which depends on whether the pickup is inside the zone.
pub fn base_charge(config: &PricingConfig, vehicle: VehicleClass, pickup_in_zone: bool) -> f64 {
    let rates = config.rates(vehicle);
    if pickup_in_zone {
        rates.base
    } else {
        rates.outside_zone_base.unwrap_or(rates.base)
    }
}

pub fn waiting_charge(config: &PricingConfig, waiting_minutes: f64) -> f64 {
    let billable = waiting_minutes - config.free_waiting_minutes;
    if billable > 0.0 {
        billable * config.waiting_rate_per_minute
    } else {
        0.0
    }
}

/// Weight cap of the requested class, if the weight exceeds it.
pub fn exceeded_weight_cap(
    config: &PricingConfig,
    requested: VehicleClass,
    weight_kg: f64,
) -> Option<f64> {
    config
        .rates(requested)
        .max_weight_kg
        .filter(|cap| weight_kg > *cap)
}

/// Class to price with once the outbound distance is known.
pub fn select_effective_vehicle(
    config: &PricingConfig,
    requested: VehicleClass,
    total_miles: f64,
) -> VehicleClass {
    match config.rates(requested).max_miles {
        Some(cap) if total_miles > cap => config.distance_upgrade_vehicle,
        _ => requested,
    }
}
