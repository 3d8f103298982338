pub mod config;
pub mod domain;
pub mod errors;
pub mod parser;
pub mod rates;
pub mod response;
pub mod shipping;

pub use domain::address::NormalizedAddress;
pub use domain::query::{CompleteQuery, IncompleteQuery, ShippingQuery};
pub use domain::rate::{CurrencyRange, RateQuote};
pub use domain::weight::{normalize_weight, NormalizedWeight, WeightUnit};
pub use errors::{ApplicationError, Collaborator, DomainError, ErrorKind, IntegrationError};
pub use parser::MessageParser;
pub use rates::select_range;
pub use response::{QuoteReply, ResponseBuilder};
pub use shipping::{AddressResolver, RateFetcher, RateSet};
