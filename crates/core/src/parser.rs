use std::sync::OnceLock;

use regex::Regex;

use crate::domain::query::ShippingQuery;

static ROUTE_PATTERN: OnceLock<Regex> = OnceLock::new();
static WEIGHT_PATTERN: OnceLock<Regex> = OnceLock::new();

// Locations may carry postal codes, so digits are part of the class.
fn route_pattern() -> &'static Regex {
    ROUTE_PATTERN.get_or_init(|| {
        Regex::new(r"(?i)from ([a-z0-9 ,-]+?) to ([a-z0-9 ,-]+)").expect("valid route pattern")
    })
}

fn weight_pattern() -> &'static Regex {
    WEIGHT_PATTERN.get_or_init(|| {
        Regex::new(r"(?i)([0-9]+(?:\.[0-9]+)?) ?(lb|oz|g|kg|pound|ounce|gram|kilo)")
            .expect("valid weight pattern")
    })
}

/// Pulls a route and a package weight out of messages such as
/// "How much to send a 3lb package from New York to London?".
///
/// Only the first route and the first weight are used. Absence of either is
/// reported through `None` fields, never as an error.
#[derive(Clone, Debug, Default)]
pub struct MessageParser;

impl MessageParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, message: &str) -> ShippingQuery {
        let (origin, destination) = extract_route(message);
        let (weight_value, weight_unit) = extract_weight(message);

        ShippingQuery { origin, destination, weight_value, weight_unit }
    }
}

fn extract_route(message: &str) -> (Option<String>, Option<String>) {
    let Some(captures) = route_pattern().captures(message) else {
        return (None, None);
    };

    let location = |index: usize| {
        captures
            .get(index)
            .map(|found| found.as_str().trim())
            .filter(|text| !text.is_empty())
            .map(str::to_owned)
    };

    match (location(1), location(2)) {
        (Some(origin), Some(destination)) => (Some(origin), Some(destination)),
        _ => (None, None),
    }
}

fn extract_weight(message: &str) -> (Option<f64>, Option<String>) {
    let Some(captures) = weight_pattern().captures(message) else {
        return (None, None);
    };

    let value = captures.get(1).and_then(|found| found.as_str().parse::<f64>().ok());
    let unit = captures.get(2).map(|found| found.as_str().to_owned());

    match (value, unit) {
        (Some(value), Some(unit)) => (Some(value), Some(unit)),
        _ => (None, None),
    }
}
