use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use shipbot_core::config::YelpConfig;
use shipbot_core::domain::address::NormalizedAddress;
use shipbot_core::errors::IntegrationError;
use shipbot_core::shipping::AddressResolver;
use tracing::debug;

use crate::http::{decode_json, endpoint, transport_error};

/// Resolves a location by taking the single best business match from the
/// Yelp Fusion search API.
pub struct YelpAddressResolver {
    client: Client,
    base_url: String,
    api_key: SecretString,
}

impl YelpAddressResolver {
    pub fn new(client: Client, base_url: impl Into<String>, api_key: SecretString) -> Self {
        Self { client, base_url: base_url.into(), api_key }
    }

    pub fn from_config(client: Client, config: &YelpConfig) -> Self {
        Self::new(client, config.base_url.clone(), config.api_key.clone())
    }
}

#[async_trait]
impl AddressResolver for YelpAddressResolver {
    async fn resolve(&self, location: &str) -> Result<NormalizedAddress, IntegrationError> {
        let response = self
            .client
            .get(endpoint(&self.base_url, "/v3/businesses/search"))
            .bearer_auth(self.api_key.expose_secret())
            .query(&[("location", location), ("limit", "1")])
            .send()
            .await
            .map_err(transport_error)?;

        let search: SearchResponse = decode_json(response).await?;
        let address = search.businesses.into_iter().next().map(Business::into_address);

        debug!(
            event_name = "providers.yelp.resolved",
            matched = address.is_some(),
            "address search completed"
        );
        Ok(address.unwrap_or_default())
    }
}

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    businesses: Vec<Business>,
}

#[derive(Debug, Default, Deserialize)]
struct Business {
    name: Option<String>,
    phone: Option<String>,
    #[serde(default)]
    location: BusinessLocation,
}

#[derive(Debug, Default, Deserialize)]
struct BusinessLocation {
    city: Option<String>,
    state: Option<String>,
    zip_code: Option<String>,
    country: Option<String>,
    address1: Option<String>,
    address2: Option<String>,
}

impl Business {
    fn into_address(self) -> NormalizedAddress {
        let location = self.location;
        NormalizedAddress {
            name: self.name.unwrap_or_default(),
            city: location.city.unwrap_or_default(),
            state: location.state.unwrap_or_default(),
            postal_code: location.zip_code.unwrap_or_default(),
            country: location.country.unwrap_or_default(),
            address_line1: location.address1.unwrap_or_default(),
            address_line2: location.address2.unwrap_or_default(),
            phone: self.phone.unwrap_or_default(),
        }
    }
}
