//! Workout session lifecycle: negotiation, worker supervision, update delivery
//! and the controller state machine that ties them together.

pub mod controller;
pub mod multiplexer;
pub mod negotiator;
pub mod supervisor;
pub mod types;

pub use controller::{ControllerOptions, SessionController};
pub use multiplexer::{render_value, RecordObserver, UpdateGate, UpdateMultiplexer, UpdatePump};
pub use negotiator::{negotiate, partition, NegotiationResult};
pub use supervisor::{ConnectionId, ConnectionState, ConnectionSupervisor};
pub use types::{
    SessionError, SessionEvent, SessionRequest, SessionStartOutcome, SessionState, StartArguments,
    StopReason,
};
