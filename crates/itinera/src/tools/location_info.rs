use std::future::ready;

use chrono::NaiveDate;
use itinera_core::tool::{Error as ToolError, Tool, ToolOutput};
use schemars::{JsonSchema, schema_for};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{at_time, format_date_time, parse_date, to_output};

#[derive(Deserialize, JsonSchema)]
pub struct LocationInfoParameters {
    #[schemars(description = "City or region to describe.")]
    location: String,
    #[schemars(description = "Day of interest as YYYY-MM-DD, default to today.")]
    date: Option<String>,
}

/// What a traveller should know about a place on a given day.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LocationInfo {
    /// Where this information applies.
    pub location: String,
    /// Weather summary.
    pub weather: String,
    /// Events happening that day.
    pub events: Vec<String>,
    /// Travel advisories.
    pub safety_alerts: Vec<String>,
    /// Local time at noon of the requested day.
    pub local_time: String,
}

/// A tool for describing weather, events and advisories of a location.
pub struct LocationInfoTool {
    today: NaiveDate,
    parameter_schema: Value,
}

impl LocationInfoTool {
    /// Creates a new location info tool answering relative to `today`.
    #[inline]
    pub fn new(today: NaiveDate) -> Self {
        LocationInfoTool {
            today,
            parameter_schema: schema_for!(LocationInfoParameters).to_value(),
        }
    }

    fn describe(
        &self,
        input: LocationInfoParameters,
    ) -> Result<LocationInfo, ToolError> {
        let date = match input.date.as_deref() {
            Some(date) => parse_date("date", date)?,
            None => self.today,
        };
        Ok(LocationInfo {
            location: input.location,
            weather: "Sunny, 75°F".to_owned(),
            events: vec!["Local Festival".to_owned(), "Art Exhibition".to_owned()],
            safety_alerts: vec!["No current alerts".to_owned()],
            local_time: format_date_time(at_time(date, 12, 0)?),
        })
    }
}

impl Tool for LocationInfoTool {
    type Input = LocationInfoParameters;

    fn name(&self) -> &str {
        "get_location_info"
    }

    fn description(&self) -> &str {
        "Gets the weather, local events and safety alerts of a location."
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    fn execute(
        &self,
        input: LocationInfoParameters,
    ) -> impl Future<Output = ToolOutput> + Send + 'static {
        ready(to_output(self.describe(input)))
    }
}
