//! Capability negotiation: split a sensor request into what the device can and
//! cannot provide for the requested exercise kind.

use crate::platform::{ExerciseCapabilities, ExerciseClient};
use crate::sensors::types::{ExerciseKind, PlatformDataType, SensorType};
use crate::session::types::SessionError;
use std::collections::BTreeSet;

/// Partition of a sensor request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NegotiationResult {
    /// Sensors that will be activated
    pub supported: BTreeSet<SensorType>,
    /// Sensors dropped from the session
    pub unsupported: BTreeSet<SensorType>,
}

impl NegotiationResult {
    /// Platform identifiers of the supported sensors.
    pub fn platform_data_types(&self) -> BTreeSet<PlatformDataType> {
        self.supported.iter().map(|s| s.platform_type()).collect()
    }
}

/// Query the device and partition the request.
///
/// Capabilities are fetched fresh on every call.
pub async fn negotiate<C: ExerciseClient>(
    client: &C,
    exercise_kind: ExerciseKind,
    requested: &BTreeSet<SensorType>,
) -> Result<NegotiationResult, SessionError> {
    let capabilities = client
        .capabilities()
        .await
        .map_err(|e| SessionError::CapabilitiesUnavailable(e.to_string()))?;

    let result = partition(&capabilities, exercise_kind, requested)?;

    tracing::debug!(
        "Negotiated {}: {} supported, {} unsupported",
        exercise_kind,
        result.supported.len(),
        result.unsupported.len()
    );

    Ok(result)
}

/// Partition a request against a capability snapshot.
pub fn partition(
    capabilities: &ExerciseCapabilities,
    exercise_kind: ExerciseKind,
    requested: &BTreeSet<SensorType>,
) -> Result<NegotiationResult, SessionError> {
    let kind_capabilities = capabilities
        .for_kind(exercise_kind)
        .ok_or(SessionError::UnsupportedExerciseKind(exercise_kind))?;

    let (supported, unsupported): (BTreeSet<_>, BTreeSet<_>) =
        requested.iter().copied().partition(|sensor| {
            kind_capabilities
                .supported_data_types
                .contains(&sensor.platform_type())
        });

    Ok(NegotiationResult {
        supported,
        unsupported,
    })
}
