//! Unit tests for the sensor tag mapping.

use workout_session::sensors::codec::{sensor_type_of, to_platform_type, to_wire_tag, UNKNOWN_TAG};
use workout_session::sensors::types::{PlatformDataType, SensorError, SensorType};

#[test]
fn test_known_tags() {
    let expected = [
        ("heartRate", PlatformDataType::HEART_RATE_BPM),
        ("calories", PlatformDataType::CALORIES_TOTAL),
        ("steps", PlatformDataType::STEPS_TOTAL),
        ("distance", PlatformDataType::DISTANCE_TOTAL),
        ("speed", PlatformDataType::SPEED),
        ("location", PlatformDataType::LOCATION),
    ];

    for (tag, platform) in expected {
        assert_eq!(to_platform_type(tag), Ok(platform));
        assert_eq!(to_wire_tag(platform), tag);
    }
}

#[test]
fn test_every_sensor_type_has_distinct_tag() {
    let mut tags: Vec<_> = SensorType::ALL.iter().map(|s| s.wire_tag()).collect();
    tags.sort_unstable();
    tags.dedup();

    assert_eq!(tags.len(), SensorType::ALL.len());
    assert!(!tags.contains(&UNKNOWN_TAG));
}

#[test]
fn test_tags_are_case_sensitive() {
    assert_eq!(
        to_platform_type("HeartRate"),
        Err(SensorError::UnknownSensorType("HeartRate".to_string()))
    );
    assert!(SensorType::from_wire_tag("").is_err());
    assert!(SensorType::from_wire_tag("power").is_err());
}

#[test]
fn test_unrecognized_platform_type_maps_to_unknown() {
    let vo2 = PlatformDataType(0x0042);

    assert_eq!(to_wire_tag(vo2), "unknown");
    assert_eq!(sensor_type_of(vo2), None);
}

#[test]
fn test_sensor_type_serde_uses_wire_tags() {
    for sensor in SensorType::ALL {
        let json = serde_json::to_value(sensor).unwrap();
        assert_eq!(json, serde_json::Value::String(sensor.wire_tag().to_string()));
    }
}
