use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use shipbot_core::config::ShipEngineConfig;
use shipbot_core::domain::address::NormalizedAddress;
use shipbot_core::domain::rate::RateQuote;
use shipbot_core::domain::weight::NormalizedWeight;
use shipbot_core::errors::IntegrationError;
use shipbot_core::shipping::{RateFetcher, RateSet};
use tracing::debug;

use crate::http::{decode_json, endpoint, transport_error};

const API_KEY_HEADER: &str = "API-Key";
const VALIDATE_AND_CLEAN: &str = "validate_and_clean";

/// Quotes a single-package shipment across every carrier connected to the
/// ShipEngine account.
pub struct ShipEngineRateFetcher {
    client: Client,
    base_url: String,
    api_key: SecretString,
}

impl ShipEngineRateFetcher {
    pub fn new(client: Client, base_url: impl Into<String>, api_key: SecretString) -> Self {
        Self { client, base_url: base_url.into(), api_key }
    }

    pub fn from_config(client: Client, config: &ShipEngineConfig) -> Self {
        Self::new(client, config.base_url.clone(), config.api_key.clone())
    }

    pub async fn carrier_ids(&self) -> Result<Vec<String>, IntegrationError> {
        let response = self
            .client
            .get(endpoint(&self.base_url, "/v1/carriers"))
            .header(API_KEY_HEADER, self.api_key.expose_secret())
            .send()
            .await
            .map_err(transport_error)?;

        let listing: CarrierListing = decode_json(response).await?;
        Ok(listing.carriers.into_iter().map(|carrier| carrier.carrier_id).collect())
    }

    pub async fn rate_set(
        &self,
        origin: &NormalizedAddress,
        destination: &NormalizedAddress,
        weight: &NormalizedWeight,
    ) -> Result<RateSet, IntegrationError> {
        let carrier_ids = self.carrier_ids().await?;
        let request = RateRequest {
            rate_options: RateOptions { carrier_ids: &carrier_ids },
            shipment: Shipment {
                validate_address: VALIDATE_AND_CLEAN,
                ship_from: ShipEngineAddress::from(origin),
                ship_to: ShipEngineAddress::from(destination),
                packages: vec![Package {
                    weight: PackageWeight { value: weight.value, unit: weight.unit.as_str() },
                }],
            },
        };

        let response = self
            .client
            .post(endpoint(&self.base_url, "/v1/rates"))
            .header(API_KEY_HEADER, self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;

        let body: RateResponseBody = decode_json(response).await?;
        let rate_response = body.rate_response;

        debug!(
            event_name = "providers.shipengine.rates_received",
            carrier_count = carrier_ids.len(),
            rate_count = rate_response.rates.len(),
            invalid_rate_count = rate_response.invalid_rates.len(),
            "shipengine rate response received"
        );

        Ok(RateSet {
            rates: rate_response.rates.into_iter().map(Rate::into_quote).collect(),
            invalid_rates: rate_response.invalid_rates.into_iter().map(Rate::into_quote).collect(),
        })
    }
}

#[async_trait]
impl RateFetcher for ShipEngineRateFetcher {
    async fn fetch_rates(
        &self,
        origin: &NormalizedAddress,
        destination: &NormalizedAddress,
        weight: &NormalizedWeight,
    ) -> Result<Vec<RateQuote>, IntegrationError> {
        Ok(self.rate_set(origin, destination, weight).await?.into_quotes())
    }
}

#[derive(Debug, Deserialize)]
struct CarrierListing {
    #[serde(default)]
    carriers: Vec<Carrier>,
}

#[derive(Debug, Deserialize)]
struct Carrier {
    carrier_id: String,
}

#[derive(Debug, Serialize)]
struct RateRequest<'a> {
    rate_options: RateOptions<'a>,
    shipment: Shipment<'a>,
}

#[derive(Debug, Serialize)]
struct RateOptions<'a> {
    carrier_ids: &'a [String],
}

#[derive(Debug, Serialize)]
struct Shipment<'a> {
    validate_address: &'static str,
    ship_from: ShipEngineAddress<'a>,
    ship_to: ShipEngineAddress<'a>,
    packages: Vec<Package<'a>>,
}

#[derive(Debug, Serialize)]
struct ShipEngineAddress<'a> {
    name: &'a str,
    phone: &'a str,
    address_line1: &'a str,
    address_line2: &'a str,
    city_locality: &'a str,
    state_province: &'a str,
    postal_code: &'a str,
    country_code: &'a str,
}

impl<'a> From<&'a NormalizedAddress> for ShipEngineAddress<'a> {
    fn from(address: &'a NormalizedAddress) -> Self {
        Self {
            name: &address.name,
            phone: &address.phone,
            address_line1: &address.address_line1,
            address_line2: &address.address_line2,
            city_locality: &address.city,
            state_province: &address.state,
            postal_code: &address.postal_code,
            country_code: &address.country,
        }
    }
}

#[derive(Debug, Serialize)]
struct Package<'a> {
    weight: PackageWeight<'a>,
}

#[derive(Debug, Serialize)]
struct PackageWeight<'a> {
    value: f64,
    unit: &'a str,
}

#[derive(Debug, Deserialize)]
struct RateResponseBody {
    rate_response: RateResponse,
}

#[derive(Debug, Default, Deserialize)]
struct RateResponse {
    #[serde(default)]
    rates: Vec<Rate>,
    #[serde(default)]
    invalid_rates: Vec<Rate>,
}

#[derive(Debug, Deserialize)]
struct Rate {
    carrier_id: String,
    service_code: String,
    service_type: Option<String>,
    shipping_amount: Money,
}

#[derive(Debug, Deserialize)]
struct Money {
    currency: String,
    amount: Decimal,
}

impl Rate {
    fn into_quote(self) -> RateQuote {
        RateQuote {
            carrier_id: self.carrier_id,
            service_code: self.service_code,
            service_type: self.service_type,
            amount: self.shipping_amount.amount,
            currency: self.shipping_amount.currency,
        }
    }
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;
    use reqwest::Client;
    use rust_decimal::Decimal;
    use serde_json::json;
    use shipbot_core::domain::address::NormalizedAddress;
    use shipbot_core::domain::weight::normalize_weight;
    use shipbot_core::errors::IntegrationError;
    use shipbot_core::shipping::RateFetcher;

    use super::ShipEngineRateFetcher;

    fn fetcher(server: &mockito::Server) -> ShipEngineRateFetcher {
        ShipEngineRateFetcher::new(Client::new(), server.url(), "TEST_key".to_string().into())
    }

    fn address(city: &str, country: &str) -> NormalizedAddress {
        NormalizedAddress {
            city: city.to_owned(),
            country: country.to_owned(),
            ..NormalizedAddress::default()
        }
    }

    fn rate(carrier_id: &str, amount: f64) -> serde_json::Value {
        json!({
            "rate_id": format!("rate-{carrier_id}"),
            "carrier_id": carrier_id,
            "service_code": "usps_priority_mail",
            "service_type": "USPS Priority Mail",
            "shipping_amount": { "currency": "usd", "amount": amount },
            "other_amount": { "currency": "usd", "amount": 0.0 }
        })
    }

    async fn mock_carriers(server: &mut mockito::Server) -> mockito::Mock {
        server
            .mock("GET", "/v1/carriers")
            .match_header("api-key", "TEST_key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({ "carriers": [{ "carrier_id": "se-123" }, { "carrier_id": "se-456" }] })
                    .to_string(),
            )
            .create_async()
            .await
    }

    #[tokio::test]
    async fn requests_rates_for_configured_carriers_with_address_cleaning() {
        let mut server = mockito::Server::new_async().await;
        let carriers = mock_carriers(&mut server).await;
        let rates = server
            .mock("POST", "/v1/rates")
            .match_header("api-key", "TEST_key")
            .match_body(Matcher::PartialJson(json!({
                "rate_options": { "carrier_ids": ["se-123", "se-456"] },
                "shipment": {
                    "validate_address": "validate_and_clean",
                    "ship_from": { "city_locality": "New York", "country_code": "US" },
                    "ship_to": { "city_locality": "London", "country_code": "GB" },
                    "packages": [{ "weight": { "value": 3.0, "unit": "pound" } }]
                }
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "rate_response": {
                        "rates": [rate("se-123", 9.0), rate("se-456", 5.75)],
                        "invalid_rates": [rate("se-789", 1.0)]
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let quotes = fetcher(&server)
            .fetch_rates(
                &address("New York", "US"),
                &address("London", "GB"),
                &normalize_weight(3.0, "lb"),
            )
            .await
            .expect("rates");

        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes[0].carrier_id, "se-123");
        assert_eq!(quotes[0].amount, Decimal::new(9, 0));
        assert_eq!(quotes[1].amount, Decimal::new(575, 2));
        assert_eq!(quotes[1].currency, "usd");
        assert_eq!(quotes[1].service_type.as_deref(), Some("USPS Priority Mail"));
        carriers.assert_async().await;
        rates.assert_async().await;
    }

    #[tokio::test]
    async fn falls_back_to_invalid_rates_when_no_primary_rates() {
        let mut server = mockito::Server::new_async().await;
        let _carriers = mock_carriers(&mut server).await;
        let _rates = server
            .mock("POST", "/v1/rates")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({ "rate_response": { "rates": [], "invalid_rates": [rate("se-789", 42.1)] } })
                    .to_string(),
            )
            .create_async()
            .await;

        let quotes = fetcher(&server)
            .fetch_rates(
                &address("Oslo", "NO"),
                &address("Tokyo", "JP"),
                &normalize_weight(2.0, "kg"),
            )
            .await
            .expect("rates");

        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].carrier_id, "se-789");
        assert_eq!(quotes[0].amount, Decimal::new(421, 1));
    }

    #[tokio::test]
    async fn empty_rate_response_yields_no_quotes() {
        let mut server = mockito::Server::new_async().await;
        let _carriers = mock_carriers(&mut server).await;
        let _rates = server
            .mock("POST", "/v1/rates")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "rate_response": { "rates": [] } }).to_string())
            .create_async()
            .await;

        let quotes = fetcher(&server)
            .fetch_rates(
                &address("Oslo", "NO"),
                &address("Tokyo", "JP"),
                &normalize_weight(2.0, "kg"),
            )
            .await
            .expect("rates");

        assert!(quotes.is_empty());
    }

    #[tokio::test]
    async fn carrier_listing_failure_stops_before_rating() {
        let mut server = mockito::Server::new_async().await;
        let _carriers = server
            .mock("GET", "/v1/carriers")
            .with_status(401)
            .with_body(r#"{"errors":[{"message":"invalid api key"}]}"#)
            .create_async()
            .await;
        let rates = server.mock("POST", "/v1/rates").expect(0).create_async().await;

        let error = fetcher(&server)
            .fetch_rates(
                &address("Oslo", "NO"),
                &address("Tokyo", "JP"),
                &normalize_weight(1.0, "oz"),
            )
            .await
            .expect_err("should fail");

        assert!(matches!(error, IntegrationError::Status { status: 401, .. }));
        rates.assert_async().await;
    }
}
