use chrono::NaiveDate;
use itinera::SessionBuilder;
use itinera::core::TerminationReason;
use itinera::core::conversation::Role;
use itinera::core::tool::ErrorKind;
use itinera_model::ToolCallRequest;
use itinera_test_model::{PresetEvent, PresetResponse, TestModelProvider};
use serde_json::json;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
}

fn tool_call_step(name: &str, arguments: serde_json::Value) -> PresetResponse {
    PresetResponse::with_events([PresetEvent::ToolCall(ToolCallRequest {
        id: format!("call_{name}"),
        name: name.to_owned(),
        arguments,
    })])
}

#[tokio::test]
async fn test_flight_status_query() {
    let mut model_provider = TestModelProvider::default();
    model_provider.add_user_input_step();
    model_provider.add_assistant_response_step(tool_call_step(
        "get_flight_status",
        json!({ "flight_number": "AA100" }),
    ));
    model_provider.add_tool_output_step();
    model_provider.add_assistant_response_step(PresetResponse::text(
        "Flight AA100 departs at 09:00 and is on time. TERMINATE",
    ));

    let mut session = SessionBuilder::with_model_provider(model_provider)
        .with_today(today())
        .build()
        .unwrap();
    assert_eq!(session.agent().registry().len(), 4);

    let outcome = session
        .send_message("Get flight status for AA100")
        .await
        .unwrap();
    assert_eq!(outcome.reason, TerminationReason::Detected);
    assert_eq!(
        outcome.summary,
        "Flight AA100 departs at 09:00 and is on time."
    );

    let tool_msg = &outcome.transcript.messages()[2];
    assert_eq!(tool_msg.role(), Role::Tool);
    let result = tool_msg.tool_result().unwrap();
    assert!(result.is_success());
    assert_eq!(
        result.value(),
        &json!({
            "flight_number": "AA100",
            "status": "On Time",
            "departure": "2025-06-01T09:00:00",
            "arrival": "2025-06-01T11:00:00",
            "price": 299.99,
            "seats_available": 15,
        })
    );
}

#[tokio::test]
async fn test_invalid_hotel_stay_is_reported() {
    let mut model_provider = TestModelProvider::default();
    model_provider.add_user_input_step();
    model_provider.add_assistant_response_step(tool_call_step(
        "get_hotel_details",
        json!({
            "location": "Paris",
            "check_in": "2025-06-05",
            "check_out": "2025-06-02",
        }),
    ));
    model_provider.add_tool_output_step();
    model_provider.add_assistant_response_step(PresetResponse::text(
        "Those dates do not work, please check them. TERMINATE",
    ));

    let mut session = SessionBuilder::with_model_provider(model_provider)
        .with_today(today())
        .build()
        .unwrap();
    let outcome = session.send_message("Find me a hotel in Paris").await.unwrap();

    let result = outcome.transcript.messages()[2].tool_result().unwrap();
    assert_eq!(result.error().unwrap().kind(), ErrorKind::ExecutionError);
    assert!(result.error_message().unwrap().contains("must be after"));
    assert_eq!(outcome.transcript.len(), 4);
}

#[tokio::test]
async fn test_missing_argument_is_rejected() {
    let mut model_provider = TestModelProvider::default();
    model_provider.add_user_input_step();
    model_provider.add_assistant_response_step(tool_call_step(
        "get_location_info",
        json!({ "date": "2025-06-02" }),
    ));
    model_provider.set_fallback_response(PresetResponse::text(
        "Which city are you interested in?",
    ));

    let mut session = SessionBuilder::with_model_provider(model_provider)
        .with_today(today())
        .with_max_turns(2)
        .build()
        .unwrap();
    let outcome = session.send_message("What's on tomorrow?").await.unwrap();

    assert_eq!(
        outcome.reason,
        TerminationReason::TurnLimitExceeded { limit: 2 }
    );
    let result = outcome.transcript.messages()[2].tool_result().unwrap();
    assert_eq!(result.error().unwrap().kind(), ErrorKind::InvalidInput);
    assert_eq!(outcome.summary, "Which city are you interested in?");
}
