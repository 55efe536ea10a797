//! Session lifecycle state machine.
//!
//! `Idle -> Starting -> Active -> Stopping -> Idle`, with an unsolicited worker
//! disconnect forcing `Idle` from `Starting` or `Active`. Start and stop are
//! serialized through a transition lock and run as spawned tasks, so once issued
//! they complete even if the caller stops waiting.
//!
//! Requires a Tokio runtime.

use crate::platform::{
    BootClock, DisconnectSignal, ExerciseClient, ExerciseConfig, ExerciseEvent, SystemBootClock,
    WorkerBinder,
};
use crate::sensors::types::{ExerciseKind, SensorRecord};
use crate::session::multiplexer::{RecordObserver, UpdateGate, UpdateMultiplexer, UpdatePump};
use crate::session::negotiator::{self, NegotiationResult};
use crate::session::supervisor::{ConnectionId, ConnectionState, ConnectionSupervisor};
use crate::session::types::{
    SessionError, SessionEvent, SessionRequest, SessionStartOutcome, SessionState, StopReason,
};
use crossbeam::channel::Receiver;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Capacity of the lifecycle event channel.
const LIFECYCLE_CHANNEL_CAPACITY: usize = 32;

/// Controller construction options.
#[derive(Clone)]
pub struct ControllerOptions {
    /// Clock used to convert boot-relative sample times
    pub clock: Arc<dyn BootClock>,
    /// Let the platform pause and resume the session automatically
    pub auto_pause_and_resume: bool,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            clock: Arc::new(SystemBootClock::new()),
            auto_pause_and_resume: false,
        }
    }
}

/// The one running session.
struct ActiveSession<C> {
    id: Uuid,
    exercise_kind: ExerciseKind,
    connection_id: ConnectionId,
    client: Arc<C>,
    disconnect: DisconnectSignal,
    pump: Option<UpdatePump>,
    watcher: Option<JoinHandle<()>>,
}

impl<C> ActiveSession<C> {
    /// Stop delivery after draining in-flight events.
    async fn finish_updates(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.finish().await;
        }
    }
}

impl<C> Drop for ActiveSession<C> {
    fn drop(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
    }
}

struct Shared<C> {
    state: SessionState,
    session: Option<ActiveSession<C>>,
}

struct Inner<B: WorkerBinder> {
    supervisor: Arc<ConnectionSupervisor<B>>,
    multiplexer: Arc<UpdateMultiplexer>,
    shared: Mutex<Shared<B::Client>>,
    transitions: tokio::sync::Mutex<()>,
    events_tx: broadcast::Sender<SessionEvent>,
    auto_pause_and_resume: bool,
}

/// Starts, monitors and stops a tracking session on a background worker.
pub struct SessionController<B: WorkerBinder> {
    inner: Arc<Inner<B>>,
}

impl<B: WorkerBinder> SessionController<B> {
    /// Create a controller with default options.
    pub fn new(binder: B) -> Self {
        Self::with_options(binder, ControllerOptions::default())
    }

    pub fn with_options(binder: B, options: ControllerOptions) -> Self {
        let (events_tx, _) = broadcast::channel(LIFECYCLE_CHANNEL_CAPACITY);

        Self {
            inner: Arc::new(Inner {
                supervisor: Arc::new(ConnectionSupervisor::new(Arc::new(binder))),
                multiplexer: Arc::new(UpdateMultiplexer::new(options.clock)),
                shared: Mutex::new(Shared {
                    state: SessionState::Idle,
                    session: None,
                }),
                transitions: tokio::sync::Mutex::new(()),
                events_tx,
                auto_pause_and_resume: options.auto_pause_and_resume,
            }),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.inner.lock_shared().state
    }

    /// Identifier of the running session, if any.
    pub fn session_id(&self) -> Option<Uuid> {
        self.inner.lock_shared().session.as_ref().map(|s| s.id)
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.inner.supervisor.state()
    }

    /// Register the single record observer, replacing any previous one.
    pub fn subscribe(&self, observer: impl Fn(SensorRecord) + Send + Sync + 'static) {
        let observer: RecordObserver = Arc::new(observer);
        self.inner.multiplexer.set_observer(observer);
    }

    pub fn unsubscribe(&self) {
        self.inner.multiplexer.clear_observer();
    }

    /// Register an observer that forwards records into a channel.
    pub fn record_receiver(&self) -> Receiver<SensorRecord> {
        let (tx, rx) = crossbeam::channel::unbounded();
        self.subscribe(move |record| {
            let _ = tx.send(record);
        });
        rx
    }

    /// Lifecycle notifications (session started, stopped or lost).
    pub fn lifecycle_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events_tx.subscribe()
    }

    /// Start a session.
    ///
    /// Resolves once the worker is bound, capabilities are negotiated and the
    /// platform session has begun. Records flow to the observer only after that.
    pub async fn start(
        &self,
        request: SessionRequest,
    ) -> Result<SessionStartOutcome, SessionError> {
        self.inner.reject_if_busy()?;

        let inner = Arc::clone(&self.inner);
        let (outcome, updates) = tokio::spawn(async move { inner.run_start(request).await })
            .await
            .map_err(|e| SessionError::TaskFailed(e.to_string()))??;

        updates.open();
        Ok(outcome)
    }

    /// Stop the session. Resolves exactly once with why it completed.
    pub async fn stop(&self) -> Result<StopReason, SessionError> {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.run_stop().await })
            .await
            .map_err(|e| SessionError::TaskFailed(e.to_string()))?
    }

    /// Stop any running session, logging failures.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down SessionController");

        if let Err(e) = self.stop().await {
            tracing::error!("Error stopping session during shutdown: {}", e);
        }
    }
}

impl<B: WorkerBinder> Inner<B> {
    fn lock_shared(&self) -> MutexGuard<'_, Shared<B::Client>> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, event: SessionEvent) {
        // No receivers is fine
        let _ = self.events_tx.send(event);
    }

    fn reject_if_busy(&self) -> Result<(), SessionError> {
        match self.lock_shared().state {
            SessionState::Starting => Err(SessionError::AlreadyStarting),
            SessionState::Active => Err(SessionError::AlreadyActive),
            SessionState::Idle | SessionState::Stopping => Ok(()),
        }
    }

    async fn run_start(
        self: Arc<Self>,
        request: SessionRequest,
    ) -> Result<(SessionStartOutcome, UpdateGate), SessionError> {
        let _transition = self.transitions.lock().await;

        {
            let mut shared = self.lock_shared();
            match shared.state {
                SessionState::Idle => shared.state = SessionState::Starting,
                SessionState::Starting => return Err(SessionError::AlreadyStarting),
                SessionState::Active | SessionState::Stopping => {
                    return Err(SessionError::AlreadyActive)
                }
            }
        }

        tracing::info!(
            "Starting {} session with {} requested sensors",
            request.exercise_kind,
            request.requested_sensors.len()
        );

        let (connection_id, connection) = match self.supervisor.bind().await {
            Ok(bound) => bound,
            Err(e) => {
                self.lock_shared().state = SessionState::Idle;
                return Err(e);
            }
        };

        let client = connection.client;
        let mut events = connection.events;
        let mut disconnect = connection.disconnect;

        let negotiated = tokio::select! {
            biased;

            _ = disconnect.lost() => Err(SessionError::ConnectionLost),
            result = self.negotiate_and_begin(client.as_ref(), &request, &mut events) => result,
        };

        let negotiation = match negotiated {
            Ok(negotiation) => negotiation,
            // A dying worker fails its calls; report the loss, not the symptom
            Err(_) if disconnect.is_lost() => {
                return self.abort_start(SessionError::ConnectionLost);
            }
            Err(e) => return self.abort_start(e),
        };

        let session_id = Uuid::new_v4();
        let (pump, updates) = self.multiplexer.attach(events);
        let watcher = {
            let weak = Arc::downgrade(&self);
            self.supervisor
                .watch_disconnect(connection_id, disconnect.clone(), move || async move {
                    if let Some(inner) = weak.upgrade() {
                        inner.handle_connection_lost(session_id).await;
                    }
                })
        };

        {
            let mut shared = self.lock_shared();
            shared.state = SessionState::Active;
            shared.session = Some(ActiveSession {
                id: session_id,
                exercise_kind: request.exercise_kind,
                connection_id,
                client,
                disconnect,
                pump: Some(pump),
                watcher: Some(watcher),
            });
        }

        tracing::info!(
            "Session {} active ({} sensors, {} unsupported)",
            session_id,
            negotiation.supported.len(),
            negotiation.unsupported.len()
        );

        self.publish(SessionEvent::Started {
            session_id,
            exercise_kind: request.exercise_kind,
            unsupported_sensors: negotiation.unsupported.clone(),
        });

        let outcome = SessionStartOutcome {
            unsupported_sensors: negotiation.unsupported,
        };
        Ok((outcome, updates))
    }

    /// Unwind a start that got past bind.
    fn abort_start<T>(&self, error: SessionError) -> Result<T, SessionError> {
        {
            let mut shared = self.lock_shared();
            shared.state = SessionState::Idle;
            self.supervisor.unbind();
        }
        tracing::warn!("Session start failed: {}", error);

        if error == SessionError::ConnectionLost {
            self.publish(SessionEvent::Stopped {
                session_id: None,
                reason: StopReason::ConnectionLost,
            });
        }
        Err(error)
    }

    async fn negotiate_and_begin(
        &self,
        client: &B::Client,
        request: &SessionRequest,
        events: &mut mpsc::UnboundedReceiver<ExerciseEvent>,
    ) -> Result<NegotiationResult, SessionError> {
        let negotiation =
            negotiator::negotiate(client, request.exercise_kind, &request.requested_sensors)
                .await?;

        let config = ExerciseConfig {
            exercise_kind: request.exercise_kind,
            data_types: negotiation.platform_data_types(),
            gps_enabled: request.enable_location,
            auto_pause_and_resume: self.auto_pause_and_resume,
        };

        // Anything already queued predates this platform session
        self.multiplexer.discard_pending(events);

        client
            .start_exercise(config)
            .await
            .map_err(|e| SessionError::PlatformStartFailed(e.to_string()))?;

        Ok(negotiation)
    }

    async fn run_stop(self: Arc<Self>) -> Result<StopReason, SessionError> {
        let _transition = self.transitions.lock().await;

        let session = {
            let mut shared = self.lock_shared();
            match shared.session.take() {
                Some(session) => {
                    shared.state = SessionState::Stopping;
                    session
                }
                None => {
                    tracing::debug!("Stop requested with no active session");
                    return Ok(StopReason::NotRunning);
                }
            }
        };

        let mut session = session;
        // This path observes the disconnect itself from here on
        if let Some(watcher) = session.watcher.take() {
            watcher.abort();
        }

        tracing::info!("Stopping {} session {}", session.exercise_kind, session.id);

        // None when the worker went away before acknowledging
        let ended = tokio::select! {
            biased;

            _ = session.disconnect.lost() => None,
            result = session.client.end_exercise() => Some(result),
        };
        let ended = match ended {
            Some(Err(_)) if session.disconnect.is_lost() => None,
            other => other,
        };

        session.finish_updates().await;

        {
            let mut shared = self.lock_shared();
            self.supervisor.unbind();
            shared.state = SessionState::Idle;
        }

        let reason = match ended {
            None => StopReason::ConnectionLost,
            Some(_) => StopReason::Requested,
        };

        self.publish(SessionEvent::Stopped {
            session_id: Some(session.id),
            reason,
        });

        match ended {
            Some(Err(e)) => {
                tracing::warn!(
                    "Platform failed to end session {} ({}); worker released anyway",
                    session.id,
                    e
                );
                Err(SessionError::PlatformEndFailed(e.to_string()))
            }
            _ => {
                tracing::info!(
                    "Session {} stopped on connection #{}: {}",
                    session.id,
                    session.connection_id,
                    reason
                );
                Ok(reason)
            }
        }
    }

    async fn handle_connection_lost(&self, session_id: Uuid) {
        let session = {
            let mut shared = self.lock_shared();
            if shared.session.as_ref().map(|s| s.id) != Some(session_id) {
                return;
            }
            shared.state = SessionState::Idle;
            shared.session.take()
        };

        let Some(mut session) = session else {
            return;
        };
        // Detach rather than abort: this code runs on the watcher task
        drop(session.watcher.take());
        session.finish_updates().await;

        tracing::warn!("Session {} lost its worker connection", session_id);
        self.publish(SessionEvent::Stopped {
            session_id: Some(session_id),
            reason: StopReason::ConnectionLost,
        });
    }
}

impl<B: WorkerBinder> Drop for Inner<B> {
    fn drop(&mut self) {
        let shared = self.shared.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(session) = shared.session.take() {
            tracing::warn!(
                "Controller dropped with session {} still active; releasing worker",
                session.id
            );
        }
    }
}
