use shipbot_core::domain::query::IncompleteQuery;
use shipbot_core::parser::MessageParser;

use crate::commands::CommandResult;

pub fn run(message: &str) -> CommandResult {
    let query = MessageParser::new().parse(message);

    let data = match serde_json::to_value(&query) {
        Ok(data) => data,
        Err(error) => {
            return CommandResult::failure(
                "parse",
                "serialization",
                format!("could not encode parsed query: {error}"),
                3,
            );
        }
    };

    let summary = match query.into_complete() {
        Ok(_) => "complete shipping query",
        Err(IncompleteQuery::MissingRoute) => "missing origin or destination",
        Err(IncompleteQuery::MissingWeight) => "missing package weight or unit",
    };

    CommandResult::success("parse", summary, Some(data))
}
