use serde::{Deserialize, Serialize};

use crate::models::vehicle::VehicleClass;

/// A numeric field that quoting clients send either as a JSON number or as a
/// numeric string (`"12.5"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumericInput {
    Number(f64),
    Text(String),
}

impl NumericInput {
    /// Coerce to a finite, non-negative number. `field` names the input in the error.
    pub fn to_non_negative(&self, field: &str) -> Result<f64, String> {
        let value = match self {
            NumericInput::Number(n) => *n,
            NumericInput::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| format!("{} must be numeric, got {:?}", field, s))?,
        };

        if !value.is_finite() || value < 0.0 {
            return Err(format!("{} must be a non-negative number, got {}", field, value));
        }
        Ok(value)
    }
}

impl Default for NumericInput {
    fn default() -> Self {
        NumericInput::Number(0.0)
    }
}

impl From<f64> for NumericInput {
    fn from(value: f64) -> Self {
        NumericInput::Number(value)
    }
}

impl From<&str> for NumericInput {
    fn from(value: &str) -> Self {
        NumericInput::Text(value.to_string())
    }
}

fn default_return_to_same_location() -> bool {
    true
}

/// One quote request: who carries it, where from, where to and when.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripSpecification {
    pub service: VehicleClass,
    pub pickup: String,
    pub delivery: Vec<String>,
    pub country: String,
    pub weight: NumericInput,
    /// Booking time, `HH:MM` on a 24h clock.
    pub time: String,
    #[serde(default)]
    pub waiting_time: NumericInput,
    #[serde(default)]
    pub return_trip: bool,
    #[serde(default = "default_return_to_same_location")]
    pub return_to_same_location: bool,
}

impl TripSpecification {
    /// Single-drop trip with no waiting and no return leg.
    pub fn new(
        service: VehicleClass,
        pickup: impl Into<String>,
        delivery: Vec<String>,
        country: impl Into<String>,
        weight: impl Into<NumericInput>,
        time: impl Into<String>,
    ) -> Self {
        Self {
            service,
            pickup: pickup.into(),
            delivery,
            country: country.into(),
            weight: weight.into(),
            time: time.into(),
            waiting_time: NumericInput::default(),
            return_trip: false,
            return_to_same_location: true,
        }
    }

    pub fn with_waiting_time(mut self, minutes: impl Into<NumericInput>) -> Self {
        self.waiting_time = minutes.into();
        self
    }

    pub fn with_return(mut self, to_same_location: bool) -> Self {
        self.return_trip = true;
        self.return_to_same_location = to_same_location;
        self
    }
}

/// A resolved hop between two consecutive stops.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Leg {
    pub from: String,
    pub to: String,
    pub miles: f64,
    #[serde(skip)]
    pub duration_minutes: f64,
    pub in_congestion_zone: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_input_accepts_numbers_and_strings() {
        assert_eq!(NumericInput::from(12.5).to_non_negative("weight"), Ok(12.5));
        assert_eq!(NumericInput::from(" 7 ").to_non_negative("weight"), Ok(7.0));
    }

    #[test]
    fn test_numeric_input_rejects_garbage() {
        assert!(NumericInput::from("heavy").to_non_negative("weight").is_err());
        assert!(NumericInput::from(-1.0).to_non_negative("weight").is_err());
        assert!(NumericInput::from(f64::NAN).to_non_negative("weight").is_err());
    }

    #[test]
    fn test_trip_specification_deserializes_defaults() {
        let spec: TripSpecification = serde_json::from_value(serde_json::json!({
            "service": "car",
            "pickup": "SE1 7PB",
            "delivery": ["N1 9GU"],
            "country": "UK",
            "weight": "5",
            "time": "08:00"
        }))
        .unwrap();

        assert_eq!(spec.service, VehicleClass::Car);
        assert_eq!(spec.weight, NumericInput::Text("5".to_string()));
        assert_eq!(spec.waiting_time, NumericInput::Number(0.0));
        assert!(!spec.return_trip);
        assert!(spec.return_to_same_location);
    }
}
