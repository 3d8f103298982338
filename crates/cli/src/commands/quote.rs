use std::sync::Arc;

use serde_json::json;
use shipbot_core::config::{AppConfig, LoadOptions};
use shipbot_core::response::{QuoteReply, ResponseBuilder};
use shipbot_providers::{build_client, ShipEngineRateFetcher, YelpAddressResolver};

use crate::commands::CommandResult;

pub fn run(message: &str) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "quote",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "quote",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let client = match build_client(config.http.timeout_secs) {
        Ok(client) => client,
        Err(error) => {
            return CommandResult::failure(
                "quote",
                "http_client",
                format!("failed to build http client: {error}"),
                4,
            );
        }
    };

    let builder = ResponseBuilder::new(
        Arc::new(YelpAddressResolver::from_config(client.clone(), &config.yelp)),
        Arc::new(ShipEngineRateFetcher::from_config(client, &config.shipengine)),
    );

    match runtime.block_on(builder.reply_to(message)) {
        Ok(reply) => {
            let data = json!({ "reply_kind": reply_kind(&reply) });
            CommandResult::success("quote", reply.to_string(), Some(data))
        }
        Err(error) => CommandResult::failure("quote", error.kind().as_str(), error.to_string(), 5),
    }
}

fn reply_kind(reply: &QuoteReply) -> &'static str {
    match reply {
        QuoteReply::NeedRoute => "need_route",
        QuoteReply::NeedWeight => "need_weight",
        QuoteReply::UnknownCost { .. } => "unknown_cost",
        QuoteReply::Quoted { .. } => "quoted",
    }
}
