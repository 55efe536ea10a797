//! Session requests, outcomes, lifecycle events and errors.

use crate::sensors::types::{ExerciseKind, SensorError, SensorType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;
use uuid::Uuid;

/// Lifecycle state of the session controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No session
    #[default]
    Idle,
    /// Binding the worker and negotiating capabilities
    Starting,
    /// Session running, records streaming
    Active,
    /// Ending the platform session and releasing the worker
    Stopping,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "Idle"),
            SessionState::Starting => write!(f, "Starting..."),
            SessionState::Active => write!(f, "Active"),
            SessionState::Stopping => write!(f, "Stopping..."),
        }
    }
}

/// What the caller asks to track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRequest {
    pub exercise_kind: ExerciseKind,
    pub requested_sensors: BTreeSet<SensorType>,
    pub enable_location: bool,
}

impl SessionRequest {
    pub fn new(
        exercise_kind: ExerciseKind,
        requested_sensors: impl IntoIterator<Item = SensorType>,
        enable_location: bool,
    ) -> Self {
        Self {
            exercise_kind,
            requested_sensors: requested_sensors.into_iter().collect(),
            enable_location,
        }
    }

    /// Build a request from the caller's `start` argument map.
    pub fn from_wire(arguments: serde_json::Value) -> Result<Self, SessionError> {
        let arguments: StartArguments = serde_json::from_value(arguments)
            .map_err(|e| SessionError::InvalidArguments(e.to_string()))?;
        Ok(arguments.into_request()?)
    }
}

/// Raw `start` arguments as sent by foreground callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartArguments {
    /// Exercise selector
    pub exercise_type: i32,
    /// Sensor wire tags
    pub sensors: Vec<String>,
    /// Whether GPS should be enabled
    pub enable_gps: bool,
}

impl StartArguments {
    /// Resolve selectors and tags. Fails on the first invalid one.
    pub fn into_request(self) -> Result<SessionRequest, SensorError> {
        let exercise_kind = ExerciseKind::from_id(self.exercise_type)?;
        let requested_sensors = self
            .sensors
            .iter()
            .map(|tag| SensorType::from_wire_tag(tag))
            .collect::<Result<BTreeSet<_>, _>>()?;

        Ok(SessionRequest {
            exercise_kind,
            requested_sensors,
            enable_location: self.enable_gps,
        })
    }
}

/// Returned by a successful start.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionStartOutcome {
    /// Requested sensors the device cannot provide; dropped from the session
    #[serde(rename = "unsupportedFeatures")]
    pub unsupported_sensors: BTreeSet<SensorType>,
}

/// Why a session (or a stop request) completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The caller stopped the session
    Requested,
    /// Stop was requested with no session running
    NotRunning,
    /// The worker went away
    ConnectionLost,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::Requested => write!(f, "service stopped"),
            StopReason::NotRunning => write!(f, "not running"),
            StopReason::ConnectionLost => write!(f, "lost connection"),
        }
    }
}

/// Lifecycle notifications published by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A session became active
    Started {
        session_id: Uuid,
        exercise_kind: ExerciseKind,
        unsupported_sensors: BTreeSet<SensorType>,
    },
    /// A session ended, or a start was cut short by a lost worker
    Stopped {
        session_id: Option<Uuid>,
        reason: StopReason,
    },
}

/// Errors surfaced by session operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Caller supplied an unknown sensor tag or exercise selector
    #[error(transparent)]
    Sensor(#[from] SensorError),

    /// Caller arguments could not be decoded
    #[error("Invalid start arguments: {0}")]
    InvalidArguments(String),

    /// Device cannot track this exercise kind
    #[error("ExerciseType {0} not supported")]
    UnsupportedExerciseKind(ExerciseKind),

    /// Capability query failed
    #[error("Failed to query capabilities: {0}")]
    CapabilitiesUnavailable(String),

    /// Worker could not be bound
    #[error("Failed to bind worker: {0}")]
    BindFailed(String),

    /// A start is already in flight
    #[error("A session is already starting")]
    AlreadyStarting,

    /// A session is already running
    #[error("A session is already active")]
    AlreadyActive,

    /// Platform refused to begin the session
    #[error("Platform failed to start exercise: {0}")]
    PlatformStartFailed(String),

    /// Platform failed to end the session; the worker was released anyway
    #[error("Platform failed to end exercise: {0}")]
    PlatformEndFailed(String),

    /// Worker went away while the session was starting
    #[error("Lost connection to worker")]
    ConnectionLost,

    /// Background lifecycle task did not complete
    #[error("Session task failed: {0}")]
    TaskFailed(String),
}
