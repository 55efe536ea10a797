//! Platform collaborator contracts consumed by the session engine.
//!
//! The background worker, its exercise client and the update callback are all
//! external. This module only describes their shapes: capability queries,
//! session control, the tagged update event, and the bind/unbind handoff.

pub mod clock;
pub mod simulated;

use crate::sensors::types::{ExerciseKind, PlatformDataType, SampleValue};
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};

pub use clock::{duration_millis, BootClock, FixedBootClock, SystemBootClock};
pub use simulated::{SimulatedPlatform, SimulatedWorker, SimulatorConfig};

/// Error reported by a platform collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct PlatformError(pub String);

impl PlatformError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Data types the platform supports for one exercise kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExerciseTypeCapabilities {
    pub supported_data_types: BTreeSet<PlatformDataType>,
}

/// Snapshot of what the device can track right now.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExerciseCapabilities {
    pub by_kind: BTreeMap<ExerciseKind, ExerciseTypeCapabilities>,
}

impl ExerciseCapabilities {
    /// Add (or replace) the capabilities of one exercise kind.
    pub fn with_kind(
        mut self,
        kind: ExerciseKind,
        data_types: impl IntoIterator<Item = PlatformDataType>,
    ) -> Self {
        self.by_kind.insert(
            kind,
            ExerciseTypeCapabilities {
                supported_data_types: data_types.into_iter().collect(),
            },
        );
        self
    }

    pub fn supported_exercise_kinds(&self) -> BTreeSet<ExerciseKind> {
        self.by_kind.keys().copied().collect()
    }

    pub fn for_kind(&self, kind: ExerciseKind) -> Option<&ExerciseTypeCapabilities> {
        self.by_kind.get(&kind)
    }
}

/// Configuration handed to the platform when a session begins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExerciseConfig {
    pub exercise_kind: ExerciseKind,
    pub data_types: BTreeSet<PlatformDataType>,
    pub gps_enabled: bool,
    pub auto_pause_and_resume: bool,
}

/// Point-in-time reading. The timestamp is relative to device boot.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleDataPoint {
    pub data_type: PlatformDataType,
    pub value: SampleValue,
    pub time_since_boot: Duration,
}

/// Running aggregate over the session so far.
#[derive(Debug, Clone, PartialEq)]
pub struct CumulativeDataPoint {
    pub data_type: PlatformDataType,
    pub total: f64,
    pub start_epoch_millis: i64,
    pub end_epoch_millis: i64,
}

/// Metrics delivered in one platform update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExerciseUpdate {
    pub samples: Vec<SampleDataPoint>,
    pub cumulative: Vec<CumulativeDataPoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Acquiring,
    Available,
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LapSummary {
    pub lap_count: u32,
    pub start_epoch_millis: i64,
    pub end_epoch_millis: i64,
}

/// Everything the platform update callback can report.
#[derive(Debug, Clone, PartialEq)]
pub enum ExerciseEvent {
    /// New metrics
    Update(ExerciseUpdate),
    /// A data type became (un)available
    AvailabilityChanged {
        data_type: PlatformDataType,
        availability: Availability,
    },
    /// A lap finished
    LapSummary(LapSummary),
    /// The update callback was registered with the platform
    Registered,
    /// The update callback could not be registered
    RegistrationFailed(String),
}

/// Exercise control surface of a bound worker.
pub trait ExerciseClient: Send + Sync + 'static {
    /// Query what the device supports right now.
    fn capabilities(
        &self,
    ) -> impl Future<Output = Result<ExerciseCapabilities, PlatformError>> + Send;

    /// Begin a platform exercise session.
    fn start_exercise(
        &self,
        config: ExerciseConfig,
    ) -> impl Future<Output = Result<(), PlatformError>> + Send;

    /// End the running platform exercise session.
    fn end_exercise(&self) -> impl Future<Output = Result<(), PlatformError>> + Send;
}

/// Raises the disconnect notification for one worker connection.
#[derive(Debug)]
pub struct DisconnectNotifier(watch::Sender<bool>);

impl DisconnectNotifier {
    /// Report that the worker went away.
    pub fn notify(&self) {
        self.0.send_replace(true);
    }
}

/// Receives the disconnect notification for one worker connection.
///
/// Dropping the notifier without calling [`DisconnectNotifier::notify`] closes the
/// signal without reporting a loss; waiters then stay pending forever.
#[derive(Debug, Clone)]
pub struct DisconnectSignal(watch::Receiver<bool>);

impl DisconnectSignal {
    /// Resolves once the worker is reported lost.
    pub async fn lost(&mut self) {
        let lost = self.0.wait_for(|lost| *lost).await.is_ok();
        if !lost {
            std::future::pending::<()>().await;
        }
    }

    pub fn is_lost(&self) -> bool {
        *self.0.borrow()
    }
}

/// Create the notifier/signal pair for a new worker connection.
pub fn disconnect_channel() -> (DisconnectNotifier, DisconnectSignal) {
    let (tx, rx) = watch::channel(false);
    (DisconnectNotifier(tx), DisconnectSignal(rx))
}

/// Everything handed over when a worker connects.
pub struct WorkerConnection<C> {
    /// Control interface of the bound worker
    pub client: Arc<C>,
    /// Update callback events
    pub events: mpsc::UnboundedReceiver<ExerciseEvent>,
    /// Disconnect notification
    pub disconnect: DisconnectSignal,
}

/// Starts the background worker and connects to it.
pub trait WorkerBinder: Send + Sync + 'static {
    type Client: ExerciseClient;

    /// Request a bind. Resolves once the worker is connected.
    fn request_bind(
        &self,
    ) -> impl Future<Output = Result<WorkerConnection<Self::Client>, PlatformError>> + Send;

    /// Release the binding.
    fn unbind(&self);
}
