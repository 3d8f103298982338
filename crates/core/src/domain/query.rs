use serde::{Deserialize, Serialize};

/// Fields pulled out of a free-text message. Any of them may be missing.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ShippingQuery {
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub weight_value: Option<f64>,
    pub weight_unit: Option<String>,
}

/// A query with every field present; the only shape handed to rate lookup.
#[derive(Clone, Debug, PartialEq)]
pub struct CompleteQuery {
    pub origin: String,
    pub destination: String,
    pub weight_value: f64,
    pub weight_unit: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IncompleteQuery {
    MissingRoute,
    MissingWeight,
}

impl ShippingQuery {
    pub fn is_complete(&self) -> bool {
        self.origin.is_some()
            && self.destination.is_some()
            && self.weight_value.is_some()
            && self.weight_unit.is_some()
    }

    /// Route is checked before weight.
    pub fn into_complete(self) -> Result<CompleteQuery, IncompleteQuery> {
        let (Some(origin), Some(destination)) = (self.origin, self.destination) else {
            return Err(IncompleteQuery::MissingRoute);
        };
        let (Some(weight_value), Some(weight_unit)) = (self.weight_value, self.weight_unit) else {
            return Err(IncompleteQuery::MissingWeight);
        };

        Ok(CompleteQuery { origin, destination, weight_value, weight_unit })
    }
}
