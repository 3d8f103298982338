use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::domain::address::NormalizedAddress;
use crate::domain::query::{CompleteQuery, IncompleteQuery};
use crate::domain::rate::CurrencyRange;
use crate::domain::weight::normalize_weight;
use crate::errors::ApplicationError;
use crate::parser::MessageParser;
use crate::rates::select_range;
use crate::shipping::{AddressResolver, RateFetcher};

pub const NEED_ROUTE_MESSAGE: &str = "I need to know where you're shipping from and to";
pub const NEED_WEIGHT_MESSAGE: &str = "I need to know the package weight and unit";

#[derive(Clone, Debug, PartialEq)]
pub enum QuoteReply {
    NeedRoute,
    NeedWeight,
    UnknownCost { query: CompleteQuery },
    Quoted { query: CompleteQuery, range: CurrencyRange },
}

impl fmt::Display for QuoteReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NeedRoute => f.write_str(NEED_ROUTE_MESSAGE),
            Self::NeedWeight => f.write_str(NEED_WEIGHT_MESSAGE),
            Self::UnknownCost { query } => write!(
                f,
                "Sorry, but I don't know how much it'll cost to ship your {} {} package from {} to {}",
                query.weight_value, query.weight_unit, query.origin, query.destination
            ),
            Self::Quoted { query, range } => write!(
                f,
                "It'll cost between {} and {} to ship your {} {} package from {} to {}",
                range.min_display,
                range.max_display,
                query.weight_value,
                query.weight_unit,
                query.origin,
                query.destination
            ),
        }
    }
}

/// Turns an inbound message into reply text: parse, resolve both addresses,
/// normalize the weight, fetch rates, and summarise them as a price range.
///
/// Collaborator failures are returned to the caller untouched; nothing is
/// retried here.
pub struct ResponseBuilder {
    parser: MessageParser,
    resolver: Arc<dyn AddressResolver>,
    fetcher: Arc<dyn RateFetcher>,
}

impl ResponseBuilder {
    pub fn new(resolver: Arc<dyn AddressResolver>, fetcher: Arc<dyn RateFetcher>) -> Self {
        Self { parser: MessageParser::new(), resolver, fetcher }
    }

    pub async fn build_response(&self, message: &str) -> Result<String, ApplicationError> {
        Ok(self.reply_to(message).await?.to_string())
    }

    pub async fn reply_to(&self, message: &str) -> Result<QuoteReply, ApplicationError> {
        let query = match self.parser.parse(message).into_complete() {
            Ok(query) => query,
            Err(IncompleteQuery::MissingRoute) => return Ok(QuoteReply::NeedRoute),
            Err(IncompleteQuery::MissingWeight) => return Ok(QuoteReply::NeedWeight),
        };

        let (origin, destination) =
            tokio::try_join!(self.resolve(&query.origin), self.resolve(&query.destination))?;
        let weight = normalize_weight(query.weight_value, &query.weight_unit);

        let rates = self
            .fetcher
            .fetch_rates(&origin, &destination, &weight)
            .await
            .map_err(ApplicationError::rates)?;

        debug!(
            event_name = "core.response.rates_fetched",
            rate_count = rates.len(),
            weight_unit = %weight.unit,
            "rates fetched for shipping query"
        );

        if rates.is_empty() {
            return Ok(QuoteReply::UnknownCost { query });
        }

        let range = select_range(&rates)?;
        Ok(QuoteReply::Quoted { query, range })
    }

    async fn resolve(&self, location: &str) -> Result<NormalizedAddress, ApplicationError> {
        self.resolver.resolve(location).await.map_err(ApplicationError::address_search)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use tokio::sync::{Barrier, Mutex};

    use super::{QuoteReply, ResponseBuilder, NEED_ROUTE_MESSAGE, NEED_WEIGHT_MESSAGE};
    use crate::domain::address::NormalizedAddress;
    use crate::domain::rate::RateQuote;
    use crate::domain::weight::{NormalizedWeight, WeightUnit};
    use crate::errors::{ApplicationError, Collaborator, IntegrationError};
    use crate::shipping::{AddressResolver, RateFetcher};

    #[derive(Default)]
    struct EchoResolver {
        lookups: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl AddressResolver for EchoResolver {
        async fn resolve(&self, location: &str) -> Result<NormalizedAddress, IntegrationError> {
            self.lookups.lock().await.push(location.to_owned());
            Ok(NormalizedAddress { city: location.to_owned(), ..NormalizedAddress::default() })
        }
    }

    struct FailingResolver;

    #[async_trait]
    impl AddressResolver for FailingResolver {
        async fn resolve(&self, _location: &str) -> Result<NormalizedAddress, IntegrationError> {
            Err(IntegrationError::Transport("connection refused".to_owned()))
        }
    }

    /// Only completes once both lookups are in flight at the same time.
    struct RendezvousResolver {
        barrier: Barrier,
    }

    #[async_trait]
    impl AddressResolver for RendezvousResolver {
        async fn resolve(&self, location: &str) -> Result<NormalizedAddress, IntegrationError> {
            self.barrier.wait().await;
            Ok(NormalizedAddress { city: location.to_owned(), ..NormalizedAddress::default() })
        }
    }

    #[derive(Default)]
    struct ScriptedFetcher {
        rates: Vec<RateQuote>,
        failure: Option<IntegrationError>,
        calls: Mutex<Vec<(NormalizedAddress, NormalizedAddress, NormalizedWeight)>>,
    }

    impl ScriptedFetcher {
        fn with_amounts(amounts: &[&str]) -> Self {
            Self {
                rates: amounts
                    .iter()
                    .enumerate()
                    .map(|(index, amount)| RateQuote {
                        carrier_id: format!("se-{index}"),
                        service_code: "usps_priority_mail".to_owned(),
                        service_type: None,
                        amount: Decimal::from_str(amount).expect("decimal literal"),
                        currency: "USD".to_owned(),
                    })
                    .collect(),
                ..Self::default()
            }
        }

        async fn call_count(&self) -> usize {
            self.calls.lock().await.len()
        }
    }

    #[async_trait]
    impl RateFetcher for ScriptedFetcher {
        async fn fetch_rates(
            &self,
            origin: &NormalizedAddress,
            destination: &NormalizedAddress,
            weight: &NormalizedWeight,
        ) -> Result<Vec<RateQuote>, IntegrationError> {
            self.calls.lock().await.push((origin.clone(), destination.clone(), weight.clone()));
            match &self.failure {
                Some(error) => Err(error.clone()),
                None => Ok(self.rates.clone()),
            }
        }
    }

    fn builder(fetcher: Arc<ScriptedFetcher>) -> ResponseBuilder {
        ResponseBuilder::new(Arc::new(EchoResolver::default()), fetcher)
    }

    #[tokio::test]
    async fn quotes_the_rate_range_end_to_end() {
        let fetcher = Arc::new(ScriptedFetcher::with_amounts(&["5.75", "9.00"]));

        let response = builder(fetcher.clone())
            .build_response("How much to send a 3lb package from New York to London?")
            .await
            .expect("response");

        assert_eq!(
            response,
            "It'll cost between $5.75 and $9.00 to ship your 3 lb package from New York to London"
        );

        let calls = fetcher.calls.lock().await;
        let (origin, destination, weight) = &calls[0];
        assert_eq!(origin.city, "New York");
        assert_eq!(destination.city, "London");
        assert_eq!(weight, &NormalizedWeight { value: 3.0, unit: WeightUnit::Pound });
    }

    #[tokio::test]
    async fn asks_for_route_when_from_to_is_missing() {
        let fetcher = Arc::new(ScriptedFetcher::with_amounts(&["1.00"]));
        let builder = builder(fetcher.clone());

        for message in ["How much for a 3lb package?", "ship 2 kg to London", "hello"] {
            let response = builder.build_response(message).await.expect("response");
            assert_eq!(response, NEED_ROUTE_MESSAGE);
        }
        assert_eq!(fetcher.call_count().await, 0);
    }

    #[tokio::test]
    async fn asks_for_weight_when_unit_is_missing() {
        let fetcher = Arc::new(ScriptedFetcher::with_amounts(&["1.00"]));

        let reply = builder(fetcher.clone())
            .reply_to("send 3 boxes from Denver to Boise")
            .await
            .expect("reply");

        assert_eq!(reply, QuoteReply::NeedWeight);
        assert_eq!(reply.to_string(), NEED_WEIGHT_MESSAGE);
        assert_eq!(fetcher.call_count().await, 0);
    }

    #[tokio::test]
    async fn empty_rates_echo_the_original_query_without_currency() {
        let fetcher = Arc::new(ScriptedFetcher::default());

        let response = builder(fetcher)
            .build_response("price for 2.5 KG from Austin, Texas to 90210")
            .await
            .expect("response");

        assert_eq!(
            response,
            "Sorry, but I don't know how much it'll cost to ship your 2.5 KG package from Austin, Texas to 90210"
        );
        assert!(!response.contains('$'));
    }

    #[tokio::test]
    async fn resolver_failures_propagate_as_address_search_errors() {
        let fetcher = Arc::new(ScriptedFetcher::with_amounts(&["1.00"]));
        let builder = ResponseBuilder::new(Arc::new(FailingResolver), fetcher.clone());

        let error = builder
            .build_response("3 lb from Boston to Chicago")
            .await
            .expect_err("resolver failure should propagate");

        assert!(matches!(
            error,
            ApplicationError::Integration { collaborator: Collaborator::AddressSearch, .. }
        ));
        assert_eq!(fetcher.call_count().await, 0);
    }

    #[tokio::test]
    async fn fetcher_failures_propagate_as_rate_errors() {
        let fetcher = Arc::new(ScriptedFetcher {
            failure: Some(IntegrationError::Status { status: 500, body: "boom".to_owned() }),
            ..ScriptedFetcher::default()
        });

        let error = builder(fetcher)
            .build_response("3 lb from Boston to Chicago")
            .await
            .expect_err("fetcher failure should propagate");

        assert!(matches!(
            error,
            ApplicationError::Integration { collaborator: Collaborator::Rates, .. }
        ));
    }

    #[tokio::test]
    async fn origin_and_destination_are_resolved_concurrently() {
        let fetcher = Arc::new(ScriptedFetcher::with_amounts(&["4.10"]));
        let builder = ResponseBuilder::new(
            Arc::new(RendezvousResolver { barrier: Barrier::new(2) }),
            fetcher,
        );

        let reply = tokio::time::timeout(
            Duration::from_secs(5),
            builder.build_response("1 oz from Reno to Fresno"),
        )
        .await
        .expect("lookups should not run one after the other")
        .expect("response");

        assert_eq!(
            reply,
            "It'll cost between $4.10 and $4.10 to ship your 1 oz package from Reno to Fresno"
        );
    }
}
