use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum WeightUnit {
    Ounce,
    Pound,
    Gram,
    Kilogram,
    /// Left for the rate API to accept or reject.
    Other(String),
}

impl WeightUnit {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Ounce => "ounce",
            Self::Pound => "pound",
            Self::Gram => "gram",
            Self::Kilogram => "kilogram",
            Self::Other(raw) => raw,
        }
    }

    pub fn from_abbreviation(unit: &str) -> Self {
        match unit.to_ascii_lowercase().as_str() {
            "oz" | "ounce" => Self::Ounce,
            "lb" | "pound" => Self::Pound,
            "g" | "gram" => Self::Gram,
            "kg" | "kilo" | "kilogram" => Self::Kilogram,
            _ => Self::Other(unit.to_owned()),
        }
    }
}

impl fmt::Display for WeightUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for WeightUnit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for WeightUnit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_abbreviation(&raw))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NormalizedWeight {
    pub value: f64,
    pub unit: WeightUnit,
}

pub fn normalize_weight(value: f64, unit: &str) -> NormalizedWeight {
    NormalizedWeight { value, unit: WeightUnit::from_abbreviation(unit) }
}
