pub mod currency;

use crate::domain::rate::{CurrencyRange, RateQuote};
use crate::errors::DomainError;

pub use currency::format_currency;

/// Reduces quotes to the cheapest and most expensive offer, each formatted in
/// its own currency. Ties keep the first quote seen. Mixed currencies are not
/// converted.
pub fn select_range(rates: &[RateQuote]) -> Result<CurrencyRange, DomainError> {
    let first = rates.first().ok_or(DomainError::EmptyRateSet)?;

    let (min, max) = rates.iter().skip(1).fold((first, first), |(min, max), rate| {
        let min = if rate.amount < min.amount { rate } else { min };
        let max = if rate.amount > max.amount { rate } else { max };
        (min, max)
    });

    Ok(CurrencyRange {
        min_display: format_currency(min.amount, &min.currency)?,
        max_display: format_currency(max.amount, &max.currency)?,
    })
}
