//! Workout Session - background exercise tracking sessions
//!
//! Starts, monitors and stops a real-time exercise tracking session on a
//! long-lived background worker, negotiating sensor support against what the
//! device can provide and streaming normalized sensor records back to the
//! foreground caller until the session is stopped or the worker goes away.

pub mod platform;
pub mod sensors;
pub mod session;
pub mod storage;

// Re-export commonly used types
pub use platform::simulated::SimulatedPlatform;
pub use sensors::types::{ExerciseKind, SensorRecord, SensorType};
pub use session::controller::SessionController;
pub use session::types::{SessionError, SessionRequest, SessionStartOutcome, StopReason};
pub use storage::config::AppConfig;
