//! Mapping between platform data type identifiers and wire tags.

use crate::sensors::types::{PlatformDataType, SensorError, SensorType};

/// Tag emitted for platform types outside the known set.
pub const UNKNOWN_TAG: &str = "unknown";

/// Known sensor types, their platform identifiers and wire tags.
const SENSOR_TABLE: [(SensorType, PlatformDataType, &str); 6] = [
    (SensorType::HeartRate, PlatformDataType::HEART_RATE_BPM, "heartRate"),
    (SensorType::Calories, PlatformDataType::CALORIES_TOTAL, "calories"),
    (SensorType::Steps, PlatformDataType::STEPS_TOTAL, "steps"),
    (SensorType::Distance, PlatformDataType::DISTANCE_TOTAL, "distance"),
    (SensorType::Speed, PlatformDataType::SPEED, "speed"),
    (SensorType::Location, PlatformDataType::LOCATION, "location"),
];

/// Wire tag for a platform data type. Never fails.
pub fn to_wire_tag(data_type: PlatformDataType) -> &'static str {
    SENSOR_TABLE
        .iter()
        .find(|(_, platform, _)| *platform == data_type)
        .map(|(_, _, tag)| *tag)
        .unwrap_or(UNKNOWN_TAG)
}

/// Platform data type for a wire tag.
pub fn to_platform_type(tag: &str) -> Result<PlatformDataType, SensorError> {
    SENSOR_TABLE
        .iter()
        .find(|(_, _, known)| *known == tag)
        .map(|(_, platform, _)| *platform)
        .ok_or_else(|| SensorError::UnknownSensorType(tag.to_string()))
}

/// Known sensor type for a platform identifier, if any.
pub fn sensor_type_of(data_type: PlatformDataType) -> Option<SensorType> {
    SENSOR_TABLE
        .iter()
        .find(|(_, platform, _)| *platform == data_type)
        .map(|(sensor, _, _)| *sensor)
}

impl SensorType {
    /// Platform identifier for this sensor type.
    pub fn platform_type(&self) -> PlatformDataType {
        SENSOR_TABLE
            .iter()
            .find(|(sensor, _, _)| sensor == self)
            .map(|(_, platform, _)| *platform)
            .unwrap_or(PlatformDataType(0))
    }

    /// Stable wire tag for this sensor type.
    pub fn wire_tag(&self) -> &'static str {
        to_wire_tag(self.platform_type())
    }

    /// Parse a wire tag, rejecting anything outside the known set.
    pub fn from_wire_tag(tag: &str) -> Result<Self, SensorError> {
        to_platform_type(tag).and_then(|platform| {
            sensor_type_of(platform).ok_or_else(|| SensorError::UnknownSensorType(tag.to_string()))
        })
    }
}
