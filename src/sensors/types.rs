//! Sensor and exercise types shared by the session engine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Opaque sensor data type identifier as reported by the platform.
///
/// The platform may report identifiers this crate has never heard of; those are
/// carried through untouched and tagged `"unknown"` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlatformDataType(pub u16);

impl PlatformDataType {
    pub const HEART_RATE_BPM: Self = Self(0x0001);
    pub const CALORIES_TOTAL: Self = Self(0x0002);
    pub const STEPS_TOTAL: Self = Self(0x0003);
    pub const DISTANCE_TOTAL: Self = Self(0x0004);
    pub const SPEED: Self = Self(0x0005);
    pub const LOCATION: Self = Self(0x0006);
}

impl std::fmt::Display for PlatformDataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DataType({:#06x})", self.0)
    }
}

/// Type of measured quantity a session can stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SensorType {
    /// Instantaneous heart rate in BPM
    HeartRate,
    /// Total calories burned
    Calories,
    /// Total step count
    Steps,
    /// Total distance in meters
    Distance,
    /// Instantaneous speed in m/s
    Speed,
    /// GPS position
    Location,
}

impl SensorType {
    /// Every sensor type the codec knows about.
    pub const ALL: [SensorType; 6] = [
        SensorType::HeartRate,
        SensorType::Calories,
        SensorType::Steps,
        SensorType::Distance,
        SensorType::Speed,
        SensorType::Location,
    ];
}

impl std::fmt::Display for SensorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorType::HeartRate => write!(f, "Heart Rate"),
            SensorType::Calories => write!(f, "Calories"),
            SensorType::Steps => write!(f, "Steps"),
            SensorType::Distance => write!(f, "Distance"),
            SensorType::Speed => write!(f, "Speed"),
            SensorType::Location => write!(f, "Location"),
        }
    }
}

/// Category of physical activity tracked by a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseKind {
    Walking,
    Running,
    Biking,
    Hiking,
    Swimming,
    Rowing,
    Elliptical,
    StairClimbing,
}

impl ExerciseKind {
    /// Every exercise kind with a caller-facing selector.
    pub const ALL: [ExerciseKind; 8] = [
        ExerciseKind::Walking,
        ExerciseKind::Running,
        ExerciseKind::Biking,
        ExerciseKind::Hiking,
        ExerciseKind::Swimming,
        ExerciseKind::Rowing,
        ExerciseKind::Elliptical,
        ExerciseKind::StairClimbing,
    ];

    /// Integer selector used by callers.
    pub fn id(&self) -> i32 {
        match self {
            ExerciseKind::Walking => 1,
            ExerciseKind::Running => 2,
            ExerciseKind::Biking => 3,
            ExerciseKind::Hiking => 4,
            ExerciseKind::Swimming => 5,
            ExerciseKind::Rowing => 6,
            ExerciseKind::Elliptical => 7,
            ExerciseKind::StairClimbing => 8,
        }
    }

    /// Resolve a caller selector.
    pub fn from_id(id: i32) -> Result<Self, SensorError> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.id() == id)
            .ok_or(SensorError::InvalidExerciseKind(id))
    }
}

impl std::fmt::Display for ExerciseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExerciseKind::Walking => write!(f, "Walking"),
            ExerciseKind::Running => write!(f, "Running"),
            ExerciseKind::Biking => write!(f, "Biking"),
            ExerciseKind::Hiking => write!(f, "Hiking"),
            ExerciseKind::Swimming => write!(f, "Swimming"),
            ExerciseKind::Rowing => write!(f, "Rowing"),
            ExerciseKind::Elliptical => write!(f, "Elliptical"),
            ExerciseKind::StairClimbing => write!(f, "Stair Climbing"),
        }
    }
}

/// Value carried by an instantaneous sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleValue {
    /// Scalar magnitude (BPM, m/s, ...)
    Scalar(f64),
    /// Geographic position in degrees
    Location { latitude: f64, longitude: f64 },
}

/// A normalized record pushed to the outbound observer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorRecord {
    /// Wire tag of the sensor (`"unknown"` for unrecognized platform types)
    pub sensor_type: &'static str,
    /// Decimal magnitude, or `"<lat>/<lon>"` for location samples
    pub value: String,
    /// Absolute epoch milliseconds
    pub timestamp_millis: i64,
}

impl SensorRecord {
    /// The `[tag, value, timestamp]` triple sent to foreground callers.
    pub fn to_wire(&self) -> serde_json::Value {
        serde_json::json!([self.sensor_type, self.value, self.timestamp_millis])
    }
}

/// Errors raised while resolving caller-supplied sensor and exercise selectors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SensorError {
    /// Wire tag not in the known sensor set
    #[error("Unknown sensor type: {0}")]
    UnknownSensorType(String),

    /// Exercise selector does not name any exercise kind
    #[error("Invalid exercise type id: {0}")]
    InvalidExerciseKind(i32),
}
