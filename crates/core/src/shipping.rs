use async_trait::async_trait;

use crate::domain::address::NormalizedAddress;
use crate::domain::rate::RateQuote;
use crate::domain::weight::NormalizedWeight;
use crate::errors::IntegrationError;

/// Maps free text such as "Austin, Texas" or "90210" to a postal address.
///
/// Implementations return `NormalizedAddress::default()` when nothing
/// matches; only transport or decoding problems are errors.
#[async_trait]
pub trait AddressResolver: Send + Sync {
    async fn resolve(&self, location: &str) -> Result<NormalizedAddress, IntegrationError>;
}

#[async_trait]
pub trait RateFetcher: Send + Sync {
    async fn fetch_rates(
        &self,
        origin: &NormalizedAddress,
        destination: &NormalizedAddress,
        weight: &NormalizedWeight,
    ) -> Result<Vec<RateQuote>, IntegrationError>;
}

/// Rates as returned by a rate API: services enabled on the account, and
/// services that are not.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RateSet {
    pub rates: Vec<RateQuote>,
    pub invalid_rates: Vec<RateQuote>,
}

impl RateSet {
    /// Enabled services if there are any, otherwise the unconfigured ones.
    pub fn into_quotes(self) -> Vec<RateQuote> {
        if self.rates.is_empty() {
            self.invalid_rates
        } else {
            self.rates
        }
    }
}
