//! Sensor types and the wire codec.

pub mod codec;
pub mod types;

pub use codec::{sensor_type_of, to_platform_type, to_wire_tag, UNKNOWN_TAG};
pub use types::{
    ExerciseKind, PlatformDataType, SampleValue, SensorError, SensorRecord, SensorType,
};
