use std::sync::Arc;

use shipbot_core::config::{AppConfig, ConfigError};
use shipbot_core::response::ResponseBuilder;
use shipbot_providers::{build_client, ShipEngineRateFetcher, YelpAddressResolver};
use shipbot_twitter::events::MentionHandler;
use shipbot_twitter::http::{build_stream_client, HttpReplyPublisher, HttpStreamTransport};
use shipbot_twitter::stream::{ReconnectPolicy, StreamRunner};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub stream_runner: StreamRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("http client construction failed: {0}")]
    HttpClient(#[source] reqwest::Error),
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let api_client = build_client(config.http.timeout_secs).map_err(BootstrapError::HttpClient)?;
    let stream_client =
        build_stream_client(config.http.timeout_secs).map_err(BootstrapError::HttpClient)?;

    let responder = ResponseBuilder::new(
        Arc::new(YelpAddressResolver::from_config(api_client.clone(), &config.yelp)),
        Arc::new(ShipEngineRateFetcher::from_config(api_client.clone(), &config.shipengine)),
    );
    let handler = MentionHandler::new(
        config.twitter.account_id.trim(),
        Arc::new(responder),
        Arc::new(HttpReplyPublisher::from_config(api_client, &config.twitter)),
    );
    let stream_runner = StreamRunner::new(
        Arc::new(HttpStreamTransport::from_config(stream_client, &config.twitter)),
        Arc::new(handler),
        ReconnectPolicy::default(),
    );

    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        account_id = %config.twitter.account_id,
        "collaborators wired"
    );

    Ok(Application { config, stream_runner })
}
