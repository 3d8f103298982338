pub mod address;
pub mod query;
pub mod rate;
pub mod weight;
