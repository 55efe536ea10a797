//! In-process stand-in for the background worker and its exercise client.
//!
//! Produces periodic synthetic updates for the data types a session asked for,
//! and exposes hooks to inject bind/start/end failures and worker death.

use super::{
    disconnect_channel, BootClock, CumulativeDataPoint, DisconnectNotifier, ExerciseCapabilities,
    ExerciseClient, ExerciseConfig, ExerciseEvent, ExerciseUpdate, PlatformError,
    SampleDataPoint, SystemBootClock, WorkerBinder, WorkerConnection,
};
use crate::sensors::types::{ExerciseKind, PlatformDataType, SampleValue, SensorType};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Behaviour of the simulated device.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// What the device reports as supported
    pub capabilities: ExerciseCapabilities,
    /// Cadence of synthetic updates; `None` emits only what tests push
    pub update_interval: Option<Duration>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        let all_sensors = SensorType::ALL.map(|sensor| sensor.platform_type());
        let indoor = [
            PlatformDataType::HEART_RATE_BPM,
            PlatformDataType::CALORIES_TOTAL,
        ];

        let mut capabilities = ExerciseCapabilities::default();
        for kind in ExerciseKind::ALL {
            capabilities = match kind {
                ExerciseKind::Swimming | ExerciseKind::Rowing | ExerciseKind::Elliptical => {
                    capabilities.with_kind(kind, indoor)
                }
                _ => capabilities.with_kind(kind, all_sensors),
            };
        }

        Self {
            capabilities,
            update_interval: Some(Duration::from_secs(1)),
        }
    }
}

/// Live connection to the simulated worker.
struct WorkerSlot {
    generation: u64,
    events_tx: mpsc::UnboundedSender<ExerciseEvent>,
    notifier: DisconnectNotifier,
    ticker: Option<JoinHandle<()>>,
}

impl WorkerSlot {
    fn stop_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

struct SimState {
    config: Mutex<SimulatorConfig>,
    clock: Arc<dyn BootClock>,
    slot: Mutex<Option<WorkerSlot>>,
    next_generation: AtomicU64,
    bind_count: AtomicUsize,
    unbind_count: AtomicUsize,
    end_count: AtomicUsize,
    capability_queries: AtomicUsize,
    fail_next_bind: AtomicBool,
    fail_start: AtomicBool,
    fail_end: AtomicBool,
    die_on_capabilities: AtomicBool,
    capabilities_burst: Mutex<Vec<ExerciseEvent>>,
    start_burst: Mutex<Vec<ExerciseEvent>>,
    started: Mutex<Vec<ExerciseConfig>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SimState {
    fn ensure_connected(&self, generation: u64) -> Result<(), PlatformError> {
        match lock(&self.slot).as_ref() {
            Some(slot) if slot.generation == generation => Ok(()),
            _ => Err(PlatformError::new("worker not connected")),
        }
    }

    /// Push queued events through the given connection's callback.
    fn flush_burst(&self, burst: &Mutex<Vec<ExerciseEvent>>, generation: u64) {
        let events: Vec<_> = lock(burst).drain(..).collect();
        if let Some(slot) = lock(&self.slot).as_ref().filter(|s| s.generation == generation) {
            for event in events {
                let _ = slot.events_tx.send(event);
            }
        }
    }

    fn kill_worker(&self) -> bool {
        let Some(mut slot) = lock(&self.slot).take() else {
            return false;
        };
        tracing::info!("Simulated worker {} died", slot.generation);
        slot.stop_ticker();
        slot.notifier.notify();
        true
    }
}

/// Simulated worker binder. Cheap to clone; clones share one device.
#[derive(Clone)]
pub struct SimulatedPlatform {
    state: Arc<SimState>,
}

impl Default for SimulatedPlatform {
    fn default() -> Self {
        Self::new(SimulatorConfig::default())
    }
}

impl SimulatedPlatform {
    pub fn new(config: SimulatorConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemBootClock::new()))
    }

    pub fn with_clock(config: SimulatorConfig, clock: Arc<dyn BootClock>) -> Self {
        Self {
            state: Arc::new(SimState {
                config: Mutex::new(config),
                clock,
                slot: Mutex::new(None),
                next_generation: AtomicU64::new(1),
                bind_count: AtomicUsize::new(0),
                unbind_count: AtomicUsize::new(0),
                end_count: AtomicUsize::new(0),
                capability_queries: AtomicUsize::new(0),
                fail_next_bind: AtomicBool::new(false),
                fail_start: AtomicBool::new(false),
                fail_end: AtomicBool::new(false),
                die_on_capabilities: AtomicBool::new(false),
                capabilities_burst: Mutex::new(Vec::new()),
                start_burst: Mutex::new(Vec::new()),
                started: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Replace what the device reports from the next capability query on.
    pub fn set_capabilities(&self, capabilities: ExerciseCapabilities) {
        lock(&self.state.config).capabilities = capabilities;
    }

    /// Refuse the next bind request.
    pub fn fail_next_bind(&self) {
        self.state.fail_next_bind.store(true, Ordering::SeqCst);
    }

    /// Make `start_exercise` fail until cleared.
    pub fn set_fail_start(&self, fail: bool) {
        self.state.fail_start.store(fail, Ordering::SeqCst);
    }

    /// Make `end_exercise` fail until cleared.
    pub fn set_fail_end(&self, fail: bool) {
        self.state.fail_end.store(fail, Ordering::SeqCst);
    }

    /// Push an event through the connected worker's update callback.
    ///
    /// Returns false when no worker is connected.
    pub fn emit(&self, event: ExerciseEvent) -> bool {
        lock(&self.state.slot)
            .as_ref()
            .is_some_and(|slot| slot.events_tx.send(event).is_ok())
    }

    /// Kill the worker: raise the disconnect notification and close the callback.
    ///
    /// Returns false when no worker is connected.
    pub fn disconnect(&self) -> bool {
        self.state.kill_worker()
    }

    /// Kill the worker in the middle of the next capability query.
    pub fn die_on_next_capabilities(&self) {
        self.state.die_on_capabilities.store(true, Ordering::SeqCst);
    }

    /// Emit `event` from inside the next capability query.
    pub fn emit_during_capabilities(&self, event: ExerciseEvent) {
        lock(&self.state.capabilities_burst).push(event);
    }

    /// Emit `event` from inside the next `start_exercise`, before it acknowledges.
    pub fn emit_during_start(&self, event: ExerciseEvent) {
        lock(&self.state.start_burst).push(event);
    }

    pub fn is_bound(&self) -> bool {
        lock(&self.state.slot).is_some()
    }

    pub fn bind_count(&self) -> usize {
        self.state.bind_count.load(Ordering::SeqCst)
    }

    pub fn unbind_count(&self) -> usize {
        self.state.unbind_count.load(Ordering::SeqCst)
    }

    pub fn end_count(&self) -> usize {
        self.state.end_count.load(Ordering::SeqCst)
    }

    pub fn capability_queries(&self) -> usize {
        self.state.capability_queries.load(Ordering::SeqCst)
    }

    /// Configs of every platform session started so far.
    pub fn started_configs(&self) -> Vec<ExerciseConfig> {
        lock(&self.state.started).clone()
    }
}

impl WorkerBinder for SimulatedPlatform {
    type Client = SimulatedWorker;

    async fn request_bind(&self) -> Result<WorkerConnection<SimulatedWorker>, PlatformError> {
        // Connect notification arrives asynchronously
        tokio::task::yield_now().await;

        if self.state.fail_next_bind.swap(false, Ordering::SeqCst) {
            return Err(PlatformError::new("worker refused bind"));
        }

        let generation = self.state.next_generation.fetch_add(1, Ordering::SeqCst);
        let (events_tx, events) = mpsc::unbounded_channel();
        let (notifier, disconnect) = disconnect_channel();
        let _ = events_tx.send(ExerciseEvent::Registered);

        let previous = lock(&self.state.slot).replace(WorkerSlot {
            generation,
            events_tx,
            notifier,
            ticker: None,
        });
        if let Some(mut previous) = previous {
            previous.stop_ticker();
        }

        self.state.bind_count.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("Simulated worker {} connected", generation);

        Ok(WorkerConnection {
            client: Arc::new(SimulatedWorker {
                state: self.state.clone(),
                generation,
            }),
            events,
            disconnect,
        })
    }

    fn unbind(&self) {
        self.state.unbind_count.fetch_add(1, Ordering::SeqCst);
        if let Some(mut slot) = lock(&self.state.slot).take() {
            slot.stop_ticker();
            tracing::debug!("Simulated worker {} unbound", slot.generation);
        }
    }
}

/// Exercise client of one simulated worker connection.
pub struct SimulatedWorker {
    state: Arc<SimState>,
    generation: u64,
}

impl ExerciseClient for SimulatedWorker {
    async fn capabilities(&self) -> Result<ExerciseCapabilities, PlatformError> {
        self.state.ensure_connected(self.generation)?;
        self.state.capability_queries.fetch_add(1, Ordering::SeqCst);
        self.state.flush_burst(&self.state.capabilities_burst, self.generation);
        if self.state.die_on_capabilities.swap(false, Ordering::SeqCst) {
            self.state.kill_worker();
            return Err(PlatformError::new("worker died"));
        }
        Ok(lock(&self.state.config).capabilities.clone())
    }

    async fn start_exercise(&self, config: ExerciseConfig) -> Result<(), PlatformError> {
        self.state.ensure_connected(self.generation)?;
        if self.state.fail_start.load(Ordering::SeqCst) {
            return Err(PlatformError::new("exercise already in progress on device"));
        }

        lock(&self.state.started).push(config.clone());
        let interval = lock(&self.state.config).update_interval;
        self.state.flush_burst(&self.state.start_burst, self.generation);

        let mut slot = lock(&self.state.slot);
        let Some(slot) = slot.as_mut().filter(|s| s.generation == self.generation) else {
            return Err(PlatformError::new("worker not connected"));
        };
        slot.stop_ticker();
        if let Some(interval) = interval {
            slot.ticker = Some(spawn_ticker(
                self.state.clock.clone(),
                config,
                interval,
                slot.events_tx.clone(),
            ));
        }

        Ok(())
    }

    async fn end_exercise(&self) -> Result<(), PlatformError> {
        self.state.ensure_connected(self.generation)?;
        self.state.end_count.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_end.load(Ordering::SeqCst) {
            return Err(PlatformError::new("no exercise in progress on device"));
        }

        if let Some(slot) = lock(&self.state.slot)
            .as_mut()
            .filter(|s| s.generation == self.generation)
        {
            slot.stop_ticker();
        }
        Ok(())
    }
}

fn spawn_ticker(
    clock: Arc<dyn BootClock>,
    config: ExerciseConfig,
    interval: Duration,
    events_tx: mpsc::UnboundedSender<ExerciseEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let started_at = clock.now_epoch_millis();
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;

        let mut tick: u64 = 0;
        loop {
            ticker.tick().await;
            tick += 1;
            let update = synthesize_update(&config, tick, started_at, clock.as_ref());
            if events_tx.send(ExerciseEvent::Update(update)).is_err() {
                break;
            }
        }
    })
}

/// Build one synthetic update covering the session's data types.
fn synthesize_update(
    config: &ExerciseConfig,
    tick: u64,
    started_at: i64,
    clock: &dyn BootClock,
) -> ExerciseUpdate {
    let t = tick as f64;
    let time_since_boot = clock.elapsed_since_boot();
    let now = clock.now_epoch_millis();
    let mut update = ExerciseUpdate::default();

    for data_type in &config.data_types {
        let sample = match *data_type {
            PlatformDataType::HEART_RATE_BPM => Some(SampleValue::Scalar(110.0 + (tick % 40) as f64)),
            PlatformDataType::SPEED => Some(SampleValue::Scalar(2.5 + (tick % 10) as f64 * 0.1)),
            PlatformDataType::LOCATION => Some(SampleValue::Location {
                latitude: 47.6062 + t * 0.00001,
                longitude: -122.3321,
            }),
            _ => None,
        };
        if let Some(value) = sample {
            update.samples.push(SampleDataPoint {
                data_type: *data_type,
                value,
                time_since_boot,
            });
            continue;
        }

        let total = match *data_type {
            PlatformDataType::CALORIES_TOTAL => Some(t * 0.2),
            PlatformDataType::STEPS_TOTAL => Some(t * 3.0),
            PlatformDataType::DISTANCE_TOTAL => Some(t * 2.8),
            _ => None,
        };
        if let Some(total) = total {
            update.cumulative.push(CumulativeDataPoint {
                data_type: *data_type,
                total,
                start_epoch_millis: started_at,
                end_epoch_millis: now,
            });
        }
    }

    update
}
