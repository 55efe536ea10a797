//! Unit tests for decoding start arguments and encoding results.

use serde_json::json;
use workout_session::sensors::types::{ExerciseKind, SensorError, SensorRecord, SensorType};
use workout_session::session::{SessionError, SessionRequest, SessionStartOutcome, StartArguments};

#[test]
fn test_decode_start_arguments() {
    let request = SessionRequest::from_wire(json!({
        "exerciseType": 3,
        "sensors": ["speed", "distance"],
        "enableGps": false,
    }))
    .unwrap();

    assert_eq!(
        request,
        SessionRequest::new(
            ExerciseKind::Biking,
            [SensorType::Speed, SensorType::Distance],
            false
        )
    );
}

#[test]
fn test_unknown_sensor_tag_rejected() {
    let result = SessionRequest::from_wire(json!({
        "exerciseType": 2,
        "sensors": ["heartRate", "power"],
        "enableGps": true,
    }));

    assert_eq!(
        result,
        Err(SessionError::Sensor(SensorError::UnknownSensorType(
            "power".to_string()
        )))
    );
}

#[test]
fn test_invalid_exercise_selector_rejected() {
    let arguments = StartArguments {
        exercise_type: 42,
        sensors: Vec::new(),
        enable_gps: false,
    };

    assert_eq!(
        arguments.into_request(),
        Err(SensorError::InvalidExerciseKind(42))
    );
}

#[test]
fn test_missing_field_is_invalid_arguments() {
    let result = SessionRequest::from_wire(json!({ "exerciseType": 2 }));
    assert!(matches!(result, Err(SessionError::InvalidArguments(_))));
}

#[test]
fn test_full_support_outcome_is_empty_list() {
    assert_eq!(
        serde_json::to_value(SessionStartOutcome::default()).unwrap(),
        json!({ "unsupportedFeatures": [] })
    );
}

#[test]
fn test_record_wire_shape() {
    let record = SensorRecord {
        sensor_type: "location",
        value: "1.5/-2.25".to_string(),
        timestamp_millis: 1_700_000_000_123,
    };

    assert_eq!(
        record.to_wire(),
        json!(["location", "1.5/-2.25", 1_700_000_000_123i64])
    );
}
