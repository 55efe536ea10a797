//! Bind/unbind lifetime of the background worker.
//!
//! Every established bind is matched by exactly one unbind, whichever path ends
//! it: a normal stop, a failed start, a lost worker, or the supervisor being
//! dropped.

use crate::platform::{DisconnectSignal, WorkerBinder, WorkerConnection};
use crate::session::types::SessionError;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::task::JoinHandle;

/// Identifies one established bind.
pub type ConnectionId = u64;

/// Connection state of the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No binding
    #[default]
    Unbound,
    /// Bind requested, waiting for connect
    Binding,
    /// Worker connected
    Bound(ConnectionId),
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Unbound => write!(f, "Unbound"),
            ConnectionState::Binding => write!(f, "Binding..."),
            ConnectionState::Bound(id) => write!(f, "Bound (#{})", id),
        }
    }
}

pub struct ConnectionSupervisor<B: WorkerBinder> {
    binder: Arc<B>,
    state: Mutex<ConnectionState>,
    next_id: AtomicU64,
}

impl<B: WorkerBinder> ConnectionSupervisor<B> {
    pub fn new(binder: Arc<B>) -> Self {
        Self {
            binder,
            state: Mutex::new(ConnectionState::Unbound),
            next_id: AtomicU64::new(1),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, ConnectionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> ConnectionState {
        *self.lock_state()
    }

    /// Start the worker and wait for it to connect.
    pub async fn bind(
        &self,
    ) -> Result<(ConnectionId, WorkerConnection<B::Client>), SessionError> {
        {
            let mut state = self.lock_state();
            if *state != ConnectionState::Unbound {
                return Err(SessionError::BindFailed(format!("worker is {}", *state)));
            }
            *state = ConnectionState::Binding;
        }

        tracing::debug!("Requesting worker bind");

        match self.binder.request_bind().await {
            Ok(connection) => {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                *self.lock_state() = ConnectionState::Bound(id);
                tracing::info!("Worker connected (#{})", id);
                Ok((id, connection))
            }
            Err(e) => {
                *self.lock_state() = ConnectionState::Unbound;
                tracing::warn!("Worker bind failed: {}", e);
                Err(SessionError::BindFailed(e.to_string()))
            }
        }
    }

    /// Release the current binding. Returns false if there was nothing to release.
    pub fn unbind(&self) -> bool {
        let mut state = self.lock_state();
        match *state {
            ConnectionState::Unbound => false,
            ConnectionState::Binding | ConnectionState::Bound(_) => {
                *state = ConnectionState::Unbound;
                self.binder.unbind();
                tracing::info!("Worker unbound");
                true
            }
        }
    }

    /// Release the binding only if it is still the given connection.
    fn release(&self, id: ConnectionId) -> bool {
        let mut state = self.lock_state();
        if *state != ConnectionState::Bound(id) {
            return false;
        }
        *state = ConnectionState::Unbound;
        self.binder.unbind();
        true
    }

    /// Watch a connection for an unsolicited disconnect.
    ///
    /// On disconnect the binding is released and `on_lost` runs. The task holds no
    /// strong reference to the supervisor.
    pub fn watch_disconnect<F, Fut>(
        self: &Arc<Self>,
        id: ConnectionId,
        mut signal: DisconnectSignal,
        on_lost: F,
    ) -> JoinHandle<()>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let supervisor: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            signal.lost().await;
            tracing::warn!("Worker connection #{} lost", id);

            if let Some(supervisor) = supervisor.upgrade() {
                supervisor.release(id);
            }
            on_lost().await;
        })
    }
}

impl<B: WorkerBinder> Drop for ConnectionSupervisor<B> {
    fn drop(&mut self) {
        if self.unbind() {
            tracing::debug!("Released worker binding on teardown");
        }
    }
}
