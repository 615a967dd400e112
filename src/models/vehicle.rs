use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VehicleClass {
    Motorbike,
    Car,
    SmallVan,
    MediumVan,
}

impl VehicleClass {
    pub const ALL: [VehicleClass; 4] = [
        VehicleClass::Motorbike,
        VehicleClass::Car,
        VehicleClass::SmallVan,
        VehicleClass::MediumVan,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            VehicleClass::Motorbike => "motorbike",
            VehicleClass::Car => "car",
            VehicleClass::SmallVan => "smallVan",
            VehicleClass::MediumVan => "mediumVan",
        }
    }
}

impl fmt::Display for VehicleClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VehicleClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VehicleClass::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Invalid vehicle type: {}", s))
    }
}
