use std::future::ready;

use chrono::NaiveDate;
use itinera_core::tool::{Error as ToolError, Tool, ToolOutput};
use schemars::{JsonSchema, schema_for};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{parse_date, to_output};

#[derive(Deserialize, JsonSchema)]
pub struct HotelDetailsParameters {
    #[schemars(description = "City or neighbourhood to stay in.")]
    location: String,
    #[schemars(description = "Check-in date as YYYY-MM-DD.")]
    check_in: String,
    #[schemars(description = "Check-out date as YYYY-MM-DD.")]
    check_out: String,
}

/// Availability and reviews of a hotel.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HotelDetails {
    /// Hotel name.
    pub name: String,
    /// Where the hotel is.
    pub location: String,
    /// Nightly rate in USD.
    pub price: f64,
    /// Average guest rating out of 5.
    pub rating: f64,
    /// Recent guest reviews.
    pub reviews: Vec<String>,
    /// Rooms free for the whole stay.
    pub available_rooms: u32,
}

/// A tool for looking up hotel availability.
pub struct HotelDetailsTool {
    parameter_schema: Value,
}

impl HotelDetailsTool {
    /// Creates a new hotel details tool.
    #[inline]
    pub fn new() -> Self {
        HotelDetailsTool {
            parameter_schema: schema_for!(HotelDetailsParameters).to_value(),
        }
    }
}

impl Default for HotelDetailsTool {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

fn check_stay(
    check_in: NaiveDate,
    check_out: NaiveDate,
) -> Result<(), ToolError> {
    if check_out <= check_in {
        return Err(ToolError::execution_error().with_reason(format!(
            "`check_out` ({check_out}) must be after `check_in` ({check_in})"
        )));
    }
    Ok(())
}

fn lookup(input: HotelDetailsParameters) -> Result<HotelDetails, ToolError> {
    let check_in = parse_date("check_in", &input.check_in)?;
    let check_out = parse_date("check_out", &input.check_out)?;
    check_stay(check_in, check_out)?;
    Ok(HotelDetails {
        name: "Grand Hotel".to_owned(),
        location: input.location,
        price: 199.99,
        rating: 4.5,
        reviews: vec![
            "Great location".to_owned(),
            "Excellent service".to_owned(),
        ],
        available_rooms: 5,
    })
}

impl Tool for HotelDetailsTool {
    type Input = HotelDetailsParameters;

    fn name(&self) -> &str {
        "get_hotel_details"
    }

    fn description(&self) -> &str {
        r#"
Gets hotel availability for a stay: nightly price, rating, recent reviews and
the number of rooms left."#
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    fn execute(
        &self,
        input: HotelDetailsParameters,
    ) -> impl Future<Output = ToolOutput> + Send + 'static {
        ready(to_output(lookup(input)))
    }
}

#[cfg(test)]
mod tests {
    use itinera_core::tool::ErrorKind;

    use super::*;

    fn stay(check_in: &str, check_out: &str) -> HotelDetailsParameters {
        HotelDetailsParameters {
            location: "Paris".to_owned(),
            check_in: check_in.to_owned(),
            check_out: check_out.to_owned(),
        }
    }

    #[test]
    fn test_lookup() {
        let details = lookup(stay("2025-06-01", "2025-06-04")).unwrap();
        assert_eq!(details.name, "Grand Hotel");
        assert_eq!(details.location, "Paris");
        assert_eq!(details.available_rooms, 5);
        assert_eq!(details.reviews.len(), 2);
    }

    #[test]
    fn test_invalid_stays() {
        let err = lookup(stay("2025-06-04", "2025-06-01")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExecutionError);
        assert!(err.reason().contains("must be after"));

        let err = lookup(stay("2025-06-01", "2025-06-01")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExecutionError);

        let err = lookup(stay("2025-13-01", "2025-06-01")).unwrap_err();
        assert!(err.reason().starts_with("`check_in` must be a date"));
    }
}
