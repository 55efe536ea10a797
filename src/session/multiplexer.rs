//! Turns platform update events into normalized sensor records.
//!
//! Each update yields its instantaneous samples first, then its cumulative
//! totals, both in delivery order. Records go synchronously to the single
//! registered observer; with no observer they are dropped.

use crate::platform::{duration_millis, BootClock, ExerciseEvent, ExerciseUpdate};
use crate::sensors::codec::to_wire_tag;
use crate::sensors::types::{SampleValue, SensorRecord};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Outbound record observer.
pub type RecordObserver = Arc<dyn Fn(SensorRecord) + Send + Sync>;

/// Plain decimal notation, never exponent form, always with a fractional part.
fn decimal(v: f64) -> String {
    let mut text = format!("{v}");
    if v.is_finite() && !text.contains('.') {
        text.push_str(".0");
    }
    text
}

/// Render a sample value for the wire.
pub fn render_value(value: &SampleValue) -> String {
    match value {
        SampleValue::Scalar(v) => decimal(*v),
        SampleValue::Location {
            latitude,
            longitude,
        } => format!("{}/{}", decimal(*latitude), decimal(*longitude)),
    }
}

/// Render a cumulative total for the wire.
fn render_total(total: f64) -> String {
    decimal(total)
}

pub struct UpdateMultiplexer {
    observer: RwLock<Option<RecordObserver>>,
    clock: Arc<dyn BootClock>,
}

impl UpdateMultiplexer {
    pub fn new(clock: Arc<dyn BootClock>) -> Self {
        Self {
            observer: RwLock::new(None),
            clock,
        }
    }

    /// Register the observer, replacing any previous one.
    pub fn set_observer(&self, observer: RecordObserver) {
        *self.observer.write().unwrap_or_else(PoisonError::into_inner) = Some(observer);
    }

    pub fn clear_observer(&self) {
        *self.observer.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn has_observer(&self) -> bool {
        self.observer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Normalize one update into records.
    pub fn records_for(&self, update: &ExerciseUpdate) -> Vec<SensorRecord> {
        let boot_epoch_millis = self.clock.boot_epoch_millis();
        let mut records = Vec::with_capacity(update.samples.len() + update.cumulative.len());

        for sample in &update.samples {
            records.push(SensorRecord {
                sensor_type: to_wire_tag(sample.data_type),
                value: render_value(&sample.value),
                timestamp_millis: boot_epoch_millis
                    .saturating_add(duration_millis(sample.time_since_boot)),
            });
        }

        for total in &update.cumulative {
            records.push(SensorRecord {
                sensor_type: to_wire_tag(total.data_type),
                value: render_total(total.total),
                timestamp_millis: total.end_epoch_millis,
            });
        }

        records
    }

    /// Handle one platform event. Returns how many records reached the observer.
    pub fn dispatch(&self, event: ExerciseEvent) -> usize {
        let update = match event {
            ExerciseEvent::Update(update) => update,
            ExerciseEvent::AvailabilityChanged {
                data_type,
                availability,
            } => {
                tracing::debug!("{} availability: {:?}", to_wire_tag(data_type), availability);
                return 0;
            }
            ExerciseEvent::LapSummary(lap) => {
                tracing::debug!("Lap {} finished", lap.lap_count);
                return 0;
            }
            ExerciseEvent::Registered => {
                tracing::debug!("Update callback registered");
                return 0;
            }
            ExerciseEvent::RegistrationFailed(reason) => {
                tracing::warn!("Update callback registration failed: {}", reason);
                return 0;
            }
        };

        let records = self.records_for(&update);
        let observer = self
            .observer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let Some(observer) = observer else {
            tracing::trace!("No observer, dropping {} records", records.len());
            return 0;
        };

        let delivered = records.len();
        for record in records {
            observer(record);
        }
        delivered
    }

    /// Drop events left over from before the platform session began.
    ///
    /// Non-update events are still handled. Returns how many updates were dropped.
    pub fn discard_pending(&self, events: &mut mpsc::UnboundedReceiver<ExerciseEvent>) -> usize {
        let mut discarded = 0usize;
        while let Ok(event) = events.try_recv() {
            match event {
                ExerciseEvent::Update(_) => discarded += 1,
                other => {
                    self.dispatch(other);
                }
            }
        }
        if discarded > 0 {
            tracing::warn!("Discarded {} updates received before the session began", discarded);
        }
        discarded
    }

    /// Start delivering events from the platform callback.
    ///
    /// Events are held in the channel until the returned gate is opened (or
    /// dropped), then delivered in arrival order.
    pub fn attach(
        self: &Arc<Self>,
        mut events: mpsc::UnboundedReceiver<ExerciseEvent>,
    ) -> (UpdatePump, UpdateGate) {
        let (gate_tx, gate_rx) = oneshot::channel::<()>();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let multiplexer = Arc::clone(self);

        let task = tokio::spawn(async move {
            let mut delivered = 0usize;
            let mut finishing = tokio::select! {
                biased;

                _ = &mut shutdown_rx => true,
                _ = gate_rx => false,
            };

            while !finishing {
                tokio::select! {
                    biased;

                    _ = &mut shutdown_rx => finishing = true,
                    event = events.recv() => match event {
                        Some(event) => delivered += multiplexer.dispatch(event),
                        None => break,
                    },
                }
            }

            if finishing {
                // Deliver whatever was already in flight
                while let Ok(event) = events.try_recv() {
                    delivered += multiplexer.dispatch(event);
                }
            }
            tracing::debug!("Update pump finished after {} records", delivered);
        });

        let pump = UpdatePump {
            shutdown: Some(shutdown_tx),
            task: Some(task),
        };
        (pump, UpdateGate(gate_tx))
    }
}

/// Releases a pump's held events to the observer. Dropping it releases too.
#[must_use = "records stay queued until the gate is opened or dropped"]
pub struct UpdateGate(oneshot::Sender<()>);

impl UpdateGate {
    pub fn open(self) {
        let _ = self.0.send(());
    }
}

/// Running delivery task for one active session.
///
/// Dropping the pump aborts delivery without draining.
pub struct UpdatePump {
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl UpdatePump {
    /// Deliver already-queued events, then stop.
    pub async fn finish(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    tracing::error!("Update pump failed: {}", e);
                }
            }
        }
    }
}

impl Drop for UpdatePump {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
