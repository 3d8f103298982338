use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One carrier's price offer for a shipment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateQuote {
    pub carrier_id: String,
    pub service_code: String,
    pub service_type: Option<String>,
    pub amount: Decimal,
    pub currency: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyRange {
    pub min_display: String,
    pub max_display: String,
}
