use std::fmt;

use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("rate selection requires at least one quote")]
    EmptyRateSet,
    #[error("invalid currency code `{0}`")]
    InvalidCurrency(String),
}

/// External service a failure originated from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Collaborator {
    AddressSearch,
    Rates,
}

impl Collaborator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AddressSearch => "address_search",
            Self::Rates => "rates",
        }
    }
}

impl fmt::Display for Collaborator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum IntegrationError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("could not decode response: {0}")]
    Decode(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("{collaborator} integration failure: {source}")]
    Integration { collaborator: Collaborator, source: IntegrationError },
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Integration,
    Configuration,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Integration => "integration",
            Self::Configuration => "configuration",
        }
    }
}

impl ApplicationError {
    pub fn address_search(source: IntegrationError) -> Self {
        Self::Integration { collaborator: Collaborator::AddressSearch, source }
    }

    pub fn rates(source: IntegrationError) -> Self {
        Self::Integration { collaborator: Collaborator::Rates, source }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Domain(_) => ErrorKind::Validation,
            Self::Integration { .. } => ErrorKind::Integration,
            Self::Configuration(_) => ErrorKind::Configuration,
        }
    }
}
