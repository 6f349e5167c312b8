//! Mocked travel lookups the assistant can call.
//!
//! Every tool is a pure function of its arguments and the date it was
//! created with, so identical calls always give identical answers.

mod flight_prices;
mod flight_status;
mod hotel_details;
mod location_info;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use itinera_core::tool::{Error as ToolError, ToolOutput};
use serde::Serialize;

pub use flight_prices::{FlightPriceTool, PriceTrend};
pub use flight_status::{FlightDetails, FlightStatusTool};
pub use hotel_details::{HotelDetails, HotelDetailsTool};
pub use location_info::{LocationInfo, LocationInfoTool};

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

fn parse_date(field: &str, value: &str) -> Result<NaiveDate, ToolError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|err| {
        ToolError::execution_error().with_reason(format!(
            "`{field}` must be a date like 2025-06-01, got {value:?}: {err}"
        ))
    })
}

fn at_time(
    date: NaiveDate,
    hour: u32,
    minute: u32,
) -> Result<NaiveDateTime, ToolError> {
    NaiveTime::from_hms_opt(hour, minute, 0)
        .map(|time| date.and_time(time))
        .ok_or_else(|| {
            ToolError::execution_error()
                .with_reason(format!("invalid time {hour:02}:{minute:02}"))
        })
}

fn format_date_time(value: NaiveDateTime) -> String {
    value.format(DATE_TIME_FORMAT).to_string()
}

fn to_output<T: Serialize>(value: Result<T, ToolError>) -> ToolOutput {
    serde_json::to_value(value?).map_err(|err| {
        ToolError::execution_error().with_reason(format!("{err}"))
    })
}

#[cfg(test)]
mod tests {
    use itinera_core::tool::ErrorKind;

    use super::*;

    #[test]
    fn test_parse_date() {
        let date = parse_date("date", " 2025-06-01 ").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());

        let err = parse_date("check_in", "June 1st").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExecutionError);
        assert!(err.reason().starts_with("`check_in` must be a date"));
    }

    #[test]
    fn test_format_date_time() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        assert_eq!(
            format_date_time(at_time(date, 9, 0).unwrap()),
            "2025-06-01T09:00:00"
        );
        assert!(at_time(date, 25, 0).is_err());
    }
}
