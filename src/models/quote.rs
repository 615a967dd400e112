use serde::Serialize;

use crate::models::{trip::Leg, vehicle::VehicleClass};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingResult {
    pub total_price: f64,
    pub total_distance: f64,
    pub requested_vehicle: VehicleClass,
    /// Class actually priced; differs from `requested_vehicle` after an upgrade.
    pub effective_vehicle: VehicleClass,
    pub vehicle_upgraded: bool,
    pub legs: Vec<Leg>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_leg: Option<Leg>,
}

/// Round a currency or distance figure to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
