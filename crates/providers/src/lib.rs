//! HTTP collaborators behind the core `AddressResolver` and `RateFetcher`
//! traits:
//! - **Yelp Fusion** (`yelp`) - business search used to turn "Austin, Texas"
//!   or "90210" into a postal address
//! - **ShipEngine** (`shipengine`) - carrier listing and rate quotes
//!
//! Both clients make exactly one attempt per call and report failures as
//! `IntegrationError`.

pub mod http;
pub mod shipengine;
pub mod yelp;

pub use http::build_client;
pub use shipengine::ShipEngineRateFetcher;
pub use yelp::YelpAddressResolver;
