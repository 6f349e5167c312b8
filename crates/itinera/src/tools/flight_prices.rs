use std::future::ready;

use itinera_core::tool::{Tool, ToolOutput};
use schemars::{JsonSchema, schema_for};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::to_output;

#[derive(Deserialize, JsonSchema)]
pub struct FlightPriceParameters {
    #[schemars(description = "Departure airport or city.")]
    origin: String,
    #[schemars(description = "Arrival airport or city.")]
    destination: String,
    #[schemars(
        description = "Travel window, e.g. \"2025-06-01 to 2025-06-07\"."
    )]
    date_range: String,
}

/// Recent and forecast fares for a route, oldest first.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PriceTrend {
    /// Fares seen over the last days, in USD.
    pub price_history: Vec<f64>,
    /// Expected fares for the coming days, in USD.
    pub price_forecast: Vec<f64>,
}

/// A tool for tracking the fare trend of a route.
pub struct FlightPriceTool {
    parameter_schema: Value,
}

impl FlightPriceTool {
    /// Creates a new price tracking tool.
    #[inline]
    pub fn new() -> Self {
        FlightPriceTool {
            parameter_schema: schema_for!(FlightPriceParameters).to_value(),
        }
    }
}

impl Default for FlightPriceTool {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

fn track(input: &FlightPriceParameters) -> PriceTrend {
    trace!(
        "tracking prices {} -> {} ({})",
        input.origin, input.destination, input.date_range
    );
    PriceTrend {
        price_history: vec![320.0, 310.0, 299.99],
        price_forecast: vec![305.0, 315.0, 325.0],
    }
}

impl Tool for FlightPriceTool {
    type Input = FlightPriceParameters;

    fn name(&self) -> &str {
        "track_flight_prices"
    }

    fn description(&self) -> &str {
        "Tracks fares between two places: recent price history and a short forecast."
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    fn execute(
        &self,
        input: FlightPriceParameters,
    ) -> impl Future<Output = ToolOutput> + Send + 'static {
        ready(to_output(Ok(track(&input))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_same_route_same_prices() {
        let tool = FlightPriceTool::new();
        let input = || FlightPriceParameters {
            origin: "JFK".to_owned(),
            destination: "CDG".to_owned(),
            date_range: "2025-06-01 to 2025-06-07".to_owned(),
        };
        let first = tool.execute(input()).await.unwrap();
        let second = tool.execute(input()).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(
            first,
            serde_json::json!({
                "price_history": [320.0, 310.0, 299.99],
                "price_forecast": [305.0, 315.0, 325.0],
            })
        );
    }
}
