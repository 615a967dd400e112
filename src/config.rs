//! Runtime configuration.
//!
//! `AppConfig` is read from the process environment (a `.env` file is loaded in
//! debug builds). `PricingConfig` holds every tariff the pricing engine uses; the
//! defaults are the current London tariff and any subset can be overridden from a
//! JSON file named by `PRICING_CONFIG_PATH`.

use serde::{Deserialize, Serialize};
use std::{env, fmt, fs, path::Path, time::Duration};

use crate::models::vehicle::VehicleClass;
use crate::services::pricing_policy::parse_clock_minutes;

const HOST: &str = "0.0.0.0";
const PORT: u16 = 8080;
const QUOTE_TIMEOUT_SECS: u64 = 30;

#[derive(Debug)]
pub enum ConfigError {
    MissingVar(String),
    InvalidVar(String, String),
    Io(String),
    Parse(String),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingVar(name) => write!(f, "{} environment variable not set", name),
            ConfigError::InvalidVar(name, value) => {
                write!(f, "{} has an invalid value: {}", name, value)
            }
            ConfigError::Io(err) => write!(f, "Failed to read pricing config: {}", err),
            ConfigError::Parse(err) => write!(f, "Failed to parse pricing config: {}", err),
            ConfigError::Invalid(err) => write!(f, "Invalid pricing config: {}", err),
        }
    }
}

impl std::error::Error for ConfigError {}

/// `HH:MM` strings on the wire, minutes since midnight in memory.
mod clock {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    use super::parse_clock_minutes;

    pub fn serialize<S: Serializer>(minutes: &u32, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{:02}:{:02}", minutes / 60, minutes % 60))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        let raw = String::deserialize(deserializer)?;
        // "24:00" closes a window at midnight
        if raw.trim() == "24:00" {
            return Ok(24 * 60);
        }
        parse_clock_minutes(&raw).map_err(D::Error::custom)
    }
}

/// Half-open `[start, end)` interval of the day, in minutes since midnight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    #[serde(with = "clock")]
    pub start: u32,
    #[serde(with = "clock")]
    pub end: u32,
}

impl TimeWindow {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, minutes: u32) -> bool {
        minutes >= self.start && minutes < self.end
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleRates {
    /// First-leg charge when the pickup is inside the congestion zone.
    pub base: f64,
    /// First-leg charge when the pickup is outside the zone; `base` if unset.
    #[serde(default)]
    pub outside_zone_base: Option<f64>,
    pub rate: f64,
    pub rush_rate: f64,
    #[serde(default)]
    pub max_weight_kg: Option<f64>,
    #[serde(default)]
    pub max_miles: Option<f64>,
}

impl VehicleRates {
    fn priced(base: f64, outside_zone_base: Option<f64>, rate: f64, rush_rate: f64) -> Self {
        Self {
            base,
            outside_zone_base,
            rate,
            rush_rate,
            max_weight_kg: None,
            max_miles: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CongestionZoneConfig {
    pub fee: f64,
    pub active: TimeWindow,
    pub postcode_prefixes: Vec<String>,
}

impl Default for CongestionZoneConfig {
    fn default() -> Self {
        Self {
            fee: 17.0,
            active: TimeWindow::new(6 * 60, 18 * 60),
            postcode_prefixes: ["EC1", "EC2", "EC3", "EC4", "W1", "WC1", "WC2", "SW1", "SE1", "NW1"]
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

/// Upper bound (inclusive) of a weight band and the surcharge inside it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightTier {
    pub up_to_kg: f64,
    pub surcharge: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PricingConfig {
    pub motorbike: VehicleRates,
    pub car: VehicleRates,
    pub small_van: VehicleRates,
    pub medium_van: VehicleRates,
    /// Class a motorbike job is repriced as when it exceeds `motorbike.max_miles`.
    pub distance_upgrade_vehicle: VehicleClass,
    pub rush_windows: Vec<TimeWindow>,
    pub congestion_zone: CongestionZoneConfig,
    pub extra_stop_fee: f64,
    /// Ascending tiers; weights above the last tier pay `overweight_surcharge`.
    pub weight_tiers: Vec<WeightTier>,
    pub overweight_surcharge: f64,
    pub free_waiting_minutes: f64,
    pub waiting_rate_per_minute: f64,
    pub same_location_return_factor: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            motorbike: VehicleRates {
                max_weight_kg: Some(10.0),
                max_miles: Some(10.0),
                ..VehicleRates::priced(5.0, None, 1.20, 1.50)
            },
            car: VehicleRates::priced(30.0, Some(25.0), 1.20, 1.70),
            small_van: VehicleRates::priced(35.0, Some(25.0), 1.30, 1.80),
            medium_van: VehicleRates::priced(40.0, Some(25.0), 1.40, 1.90),
            distance_upgrade_vehicle: VehicleClass::Car,
            rush_windows: vec![
                TimeWindow::new(7 * 60, 10 * 60),
                TimeWindow::new(16 * 60, 19 * 60),
            ],
            congestion_zone: CongestionZoneConfig::default(),
            extra_stop_fee: 3.0,
            weight_tiers: vec![
                WeightTier { up_to_kg: 10.0, surcharge: 0.0 },
                WeightTier { up_to_kg: 20.0, surcharge: 10.0 },
                WeightTier { up_to_kg: 30.0, surcharge: 15.0 },
                WeightTier { up_to_kg: 50.0, surcharge: 20.0 },
            ],
            overweight_surcharge: 30.0,
            free_waiting_minutes: 20.0,
            waiting_rate_per_minute: 0.5,
            same_location_return_factor: 0.60,
        }
    }
}

impl PricingConfig {
    pub fn rates(&self, vehicle: VehicleClass) -> &VehicleRates {
        match vehicle {
            VehicleClass::Motorbike => &self.motorbike,
            VehicleClass::Car => &self.car,
            VehicleClass::SmallVan => &self.small_van,
            VehicleClass::MediumVan => &self.medium_van,
        }
    }

    /// Load overrides from a JSON file; missing keys keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.as_ref().display(), e)))?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: PricingConfig =
            serde_json::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let non_negative = |v: f64| v.is_finite() && v >= 0.0;

        for vehicle in VehicleClass::ALL {
            let rates = self.rates(vehicle);
            let amounts = [
                Some(rates.base),
                rates.outside_zone_base,
                Some(rates.rate),
                Some(rates.rush_rate),
                rates.max_weight_kg,
                rates.max_miles,
            ];
            if amounts.iter().flatten().any(|v| !non_negative(*v)) {
                return Err(ConfigError::Invalid(format!(
                    "{} charges and caps must be non-negative numbers",
                    vehicle
                )));
            }
        }

        let windows = self.rush_windows.iter().chain(std::iter::once(&self.congestion_zone.active));
        for window in windows {
            if window.start >= window.end || window.end > 24 * 60 {
                return Err(ConfigError::Invalid(format!(
                    "time window {}..{} is empty or exceeds one day",
                    window.start, window.end
                )));
            }
        }

        if self
            .congestion_zone
            .postcode_prefixes
            .iter()
            .any(|prefix| prefix.trim().is_empty())
        {
            return Err(ConfigError::Invalid(
                "congestion zone postcode prefixes must not be blank".to_string(),
            ));
        }

        let fees = [
            ("congestionZone.fee", self.congestion_zone.fee),
            ("extraStopFee", self.extra_stop_fee),
            ("overweightSurcharge", self.overweight_surcharge),
            ("freeWaitingMinutes", self.free_waiting_minutes),
            ("waitingRatePerMinute", self.waiting_rate_per_minute),
        ];
        if let Some((name, _)) = fees.iter().find(|(_, v)| !non_negative(*v)) {
            return Err(ConfigError::Invalid(format!(
                "{} must be a non-negative number",
                name
            )));
        }

        if self
            .weight_tiers
            .iter()
            .any(|tier| !non_negative(tier.up_to_kg) || !non_negative(tier.surcharge))
        {
            return Err(ConfigError::Invalid(
                "weight tiers must have non-negative bounds and surcharges".to_string(),
            ));
        }

        if self
            .weight_tiers
            .windows(2)
            .any(|pair| pair[0].up_to_kg >= pair[1].up_to_kg)
        {
            return Err(ConfigError::Invalid(
                "weight tiers must be in ascending order".to_string(),
            ));
        }

        let surcharges_decrease = self
            .weight_tiers
            .windows(2)
            .any(|pair| pair[0].surcharge > pair[1].surcharge)
            || self
                .weight_tiers
                .last()
                .is_some_and(|tier| tier.surcharge > self.overweight_surcharge);
        if surcharges_decrease {
            return Err(ConfigError::Invalid(
                "weight surcharges must not decrease as weight rises".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.same_location_return_factor) {
            return Err(ConfigError::Invalid(
                "sameLocationReturnFactor must be between 0 and 1".to_string(),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Google,
    Nominatim,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub provider: ProviderKind,
    pub google_maps_api_key: Option<String>,
    pub quote_timeout: Duration,
    pub pricing: PricingConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = env::var("HOST").unwrap_or_else(|_| HOST.to_string());
        let port = match env::var("PORT") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| ConfigError::InvalidVar("PORT".to_string(), raw))?,
            Err(_) => PORT,
        };

        let provider = match env::var("DISTANCE_PROVIDER") {
            Ok(raw) => match raw.to_lowercase().as_str() {
                "google" => ProviderKind::Google,
                "nominatim" => ProviderKind::Nominatim,
                _ => return Err(ConfigError::InvalidVar("DISTANCE_PROVIDER".to_string(), raw)),
            },
            Err(_) => ProviderKind::Google,
        };

        let google_maps_api_key = env::var("GOOGLE_MAPS_API_KEY").ok();
        if provider == ProviderKind::Google && google_maps_api_key.is_none() {
            return Err(ConfigError::MissingVar("GOOGLE_MAPS_API_KEY".to_string()));
        }

        let quote_timeout = match env::var("QUOTE_TIMEOUT_SECS") {
            Ok(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => return Err(ConfigError::InvalidVar("QUOTE_TIMEOUT_SECS".to_string(), raw)),
            },
            Err(_) => Duration::from_secs(QUOTE_TIMEOUT_SECS),
        };

        let pricing = match env::var("PRICING_CONFIG_PATH") {
            Ok(path) => PricingConfig::from_file(path)?,
            Err(_) => PricingConfig::default(),
        };

        Ok(Self {
            host,
            port,
            provider,
            google_maps_api_key,
            quote_timeout,
            pricing,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for name in [
            "HOST",
            "PORT",
            "DISTANCE_PROVIDER",
            "GOOGLE_MAPS_API_KEY",
            "QUOTE_TIMEOUT_SECS",
            "PRICING_CONFIG_PATH",
        ] {
            env::remove_var(name);
        }
    }

    #[test]
    fn test_default_pricing_config_is_valid() {
        assert!(PricingConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_overrides_keep_defaults() {
        let config = PricingConfig::from_json(
            r#"{
                "extraStopFee": 4.5,
                "rushWindows": [{ "start": "06:30", "end": "09:00" }]
            }"#,
        )
        .unwrap();

        assert_eq!(config.extra_stop_fee, 4.5);
        assert_eq!(config.rush_windows, vec![TimeWindow::new(390, 540)]);
        assert_eq!(config.car, PricingConfig::default().car);
    }

    #[test]
    fn test_invalid_window_is_rejected() {
        let result = PricingConfig::from_json(r#"{ "rushWindows": [{ "start": "10:00", "end": "07:00" }] }"#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_malformed_window_time_is_a_parse_error() {
        let result = PricingConfig::from_json(r#"{ "rushWindows": [{ "start": "7am", "end": "10:00" }] }"#);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_return_factor_out_of_range_is_rejected() {
        let result = PricingConfig::from_json(r#"{ "sameLocationReturnFactor": 1.5 }"#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_blank_zone_prefix_is_rejected() {
        let result = PricingConfig::from_json(
            r#"{ "congestionZone": {
                "fee": 17,
                "active": { "start": "06:00", "end": "18:00" },
                "postcodePrefixes": ["EC1", " "]
            } }"#,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_negative_fees_are_rejected() {
        for json in [
            r#"{ "extraStopFee": -100 }"#,
            r#"{ "congestionZone": { "fee": -1, "active": { "start": "06:00", "end": "18:00" }, "postcodePrefixes": ["EC1"] } }"#,
            r#"{ "overweightSurcharge": -5 }"#,
            r#"{ "waitingRatePerMinute": -0.5 }"#,
            r#"{ "weightTiers": [{ "upToKg": 10, "surcharge": -2 }] }"#,
        ] {
            let result = PricingConfig::from_json(json);
            assert!(matches!(result, Err(ConfigError::Invalid(_))), "{} accepted", json);
        }
    }

    #[test]
    fn test_negative_vehicle_caps_are_rejected() {
        let result = PricingConfig::from_json(
            r#"{ "motorbike": { "base": 5, "rate": 1.2, "rushRate": 1.5, "maxWeightKg": 10, "maxMiles": -1 } }"#,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_overweight_surcharge_below_last_tier_is_rejected() {
        let result = PricingConfig::from_json(r#"{ "overweightSurcharge": 5 }"#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_decreasing_tier_surcharges_are_rejected() {
        let result = PricingConfig::from_json(
            r#"{ "weightTiers": [
                { "upToKg": 10, "surcharge": 12 },
                { "upToKg": 20, "surcharge": 8 }
            ] }"#,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_time_window_is_half_open() {
        let window = TimeWindow::new(420, 600);
        assert!(window.contains(420));
        assert!(window.contains(599));
        assert!(!window.contains(600));
        assert!(!window.contains(419));
    }

    #[test]
    #[serial]
    fn test_app_config_defaults_with_google_key() {
        clear_env();
        env::set_var("GOOGLE_MAPS_API_KEY", "test-key");

        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.provider, ProviderKind::Google);
        assert_eq!(config.quote_timeout, Duration::from_secs(30));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_app_config_requires_google_key() {
        clear_env();

        let result = AppConfig::from_env();
        assert!(matches!(result, Err(ConfigError::MissingVar(_))));
    }

    #[test]
    #[serial]
    fn test_app_config_nominatim_needs_no_key() {
        clear_env();
        env::set_var("DISTANCE_PROVIDER", "nominatim");
        env::set_var("PORT", "9090");

        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.provider, ProviderKind::Nominatim);
        assert_eq!(config.port, 9090);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_app_config_rejects_zero_quote_timeout() {
        clear_env();
        env::set_var("DISTANCE_PROVIDER", "nominatim");
        env::set_var("QUOTE_TIMEOUT_SECS", "0");

        let result = AppConfig::from_env();
        assert!(matches!(result, Err(ConfigError::InvalidVar(_, _))));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_app_config_rejects_bad_port() {
        clear_env();
        env::set_var("DISTANCE_PROVIDER", "nominatim");
        env::set_var("PORT", "eighty");

        let result = AppConfig::from_env();
        assert!(matches!(result, Err(ConfigError::InvalidVar(_, _))));

        clear_env();
    }
}
