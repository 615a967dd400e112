pub mod distance_service;
pub mod geocoding_service;
pub mod postcode_zone;
pub mod pricing_policy;
pub mod pricing_service;
