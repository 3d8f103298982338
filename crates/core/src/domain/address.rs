use serde::{Deserialize, Serialize};

/// Postal address resolved from free text. Unresolved fields are empty strings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedAddress {
    pub name: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub address_line1: String,
    pub address_line2: String,
    pub phone: String,
}

impl NormalizedAddress {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
