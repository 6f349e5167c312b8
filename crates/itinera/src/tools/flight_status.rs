use std::future::ready;

use chrono::{NaiveDate, TimeDelta};
use itinera_core::tool::{Tool, ToolOutput};
use schemars::{JsonSchema, schema_for};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{at_time, format_date_time, parse_date, to_output};

const FLIGHT_DURATION_HOURS: i64 = 2;

#[derive(Deserialize, JsonSchema)]
pub struct FlightStatusParameters {
    #[schemars(description = "Carrier code and flight number, e.g. AA100.")]
    flight_number: String,
    #[schemars(description = "Departure date as YYYY-MM-DD, default to today.")]
    date: Option<String>,
}

/// Status of a single flight.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FlightDetails {
    /// Normalized flight number.
    pub flight_number: String,
    /// Current status, such as "On Time".
    pub status: String,
    /// Scheduled departure, local time.
    pub departure: String,
    /// Scheduled arrival, local time.
    pub arrival: String,
    /// Cheapest fare in USD.
    pub price: f64,
    /// Seats left for sale.
    pub seats_available: u32,
}

/// A tool for looking up the status of a flight.
pub struct FlightStatusTool {
    today: NaiveDate,
    parameter_schema: Value,
}

impl FlightStatusTool {
    /// Creates a new flight status tool answering relative to `today`.
    #[inline]
    pub fn new(today: NaiveDate) -> Self {
        FlightStatusTool {
            today,
            parameter_schema: schema_for!(FlightStatusParameters).to_value(),
        }
    }

    fn lookup(
        &self,
        input: FlightStatusParameters,
    ) -> Result<FlightDetails, itinera_core::tool::Error> {
        let date = match input.date.as_deref() {
            Some(date) => parse_date("date", date)?,
            None => self.today,
        };
        let departure = at_time(date, 9, 0)?;
        let arrival = departure + TimeDelta::hours(FLIGHT_DURATION_HOURS);
        Ok(FlightDetails {
            flight_number: input.flight_number.trim().to_uppercase(),
            status: "On Time".to_owned(),
            departure: format_date_time(departure),
            arrival: format_date_time(arrival),
            price: 299.99,
            seats_available: 15,
        })
    }
}

impl Tool for FlightStatusTool {
    type Input = FlightStatusParameters;

    fn name(&self) -> &str {
        "get_flight_status"
    }

    fn description(&self) -> &str {
        r#"
Gets the current status of a flight: departure and arrival times, price and
the number of seats still available."#
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    fn execute(
        &self,
        input: FlightStatusParameters,
    ) -> impl Future<Output = ToolOutput> + Send + 'static {
        ready(to_output(self.lookup(input)))
    }
}
