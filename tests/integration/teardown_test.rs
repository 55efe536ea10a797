//! Worker loss and release: every exit path unbinds exactly once.

use crate::harness::{
    collect_records, controller_for, eventually, heart_rate_update, next_event, quiet_platform,
};
use workout_session::platform::ExerciseCapabilities;
use workout_session::sensors::types::{ExerciseKind, PlatformDataType, SensorType};
use workout_session::session::{
    ConnectionState, SessionError, SessionEvent, SessionRequest, SessionState, StopReason,
};

fn heart_rate_run() -> SessionRequest {
    SessionRequest::new(ExerciseKind::Running, [SensorType::HeartRate], false)
}

#[tokio::test]
async fn test_normal_stop_unbinds_once() {
    let platform = quiet_platform();
    let controller = controller_for(&platform);

    controller.start(heart_rate_run()).await.unwrap();
    controller.stop().await.unwrap();
    controller.stop().await.unwrap();

    assert_eq!(platform.unbind_count(), 1);
    assert!(!platform.is_bound());
}

#[tokio::test]
async fn test_failed_start_unbinds_once() {
    let platform = quiet_platform();
    platform.set_capabilities(
        ExerciseCapabilities::default()
            .with_kind(ExerciseKind::Biking, [PlatformDataType::SPEED]),
    );
    let controller = controller_for(&platform);

    let result = controller.start(heart_rate_run()).await;

    assert!(matches!(
        result,
        Err(SessionError::UnsupportedExerciseKind(_))
    ));
    assert_eq!(platform.bind_count(), 1);
    assert_eq!(platform.unbind_count(), 1);
    assert_eq!(controller.connection_state(), ConnectionState::Unbound);
}

#[tokio::test]
async fn test_dropping_controller_releases_worker() {
    let platform = quiet_platform();
    let controller = controller_for(&platform);
    controller.start(heart_rate_run()).await.unwrap();
    assert!(platform.is_bound());

    drop(controller);

    assert_eq!(platform.unbind_count(), 1);
    assert!(!platform.is_bound());
    assert_eq!(platform.end_count(), 0);
}

#[tokio::test]
async fn test_dropping_idle_controller_does_not_unbind() {
    let platform = quiet_platform();
    let controller = controller_for(&platform);

    drop(controller);

    assert_eq!(platform.unbind_count(), 0);
}

#[tokio::test]
async fn test_disconnect_while_active() {
    let platform = quiet_platform();
    let controller = controller_for(&platform);
    let mut events = controller.lifecycle_events();

    controller.start(heart_rate_run()).await.unwrap();
    let session_id = controller.session_id();
    assert!(matches!(
        next_event(&mut events).await,
        SessionEvent::Started { .. }
    ));

    assert!(platform.disconnect());

    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::Stopped {
            session_id,
            reason: StopReason::ConnectionLost,
        }
    );
    assert_eq!(controller.state(), SessionState::Idle);
    assert_eq!(controller.session_id(), None);
    assert_eq!(controller.connection_state(), ConnectionState::Unbound);
    assert_eq!(platform.unbind_count(), 1);

    // Stop after the loss is a no-op
    assert_eq!(controller.stop().await, Ok(StopReason::NotRunning));
    assert_eq!(platform.unbind_count(), 1);

    // A later start binds a fresh worker
    controller.start(heart_rate_run()).await.unwrap();
    assert_eq!(platform.bind_count(), 2);
    assert_eq!(controller.state(), SessionState::Active);
}

#[tokio::test]
async fn test_updates_queued_before_disconnect_are_delivered() {
    let platform = quiet_platform();
    let controller = controller_for(&platform);
    let records = collect_records(&controller);
    let mut events = controller.lifecycle_events();

    controller.start(heart_rate_run()).await.unwrap();
    next_event(&mut events).await;

    assert!(platform.emit(heart_rate_update(160.0, 100)));
    assert!(platform.emit(heart_rate_update(161.0, 200)));
    platform.disconnect();
    next_event(&mut events).await;

    assert_eq!(records.lock().unwrap().len(), 2);
    assert!(!platform.emit(heart_rate_update(162.0, 300)));
}

#[tokio::test]
async fn test_disconnect_during_start() {
    let platform = quiet_platform();
    platform.die_on_next_capabilities();
    let controller = controller_for(&platform);
    let mut events = controller.lifecycle_events();

    let result = controller.start(heart_rate_run()).await;

    assert_eq!(result, Err(SessionError::ConnectionLost));
    assert_eq!(controller.state(), SessionState::Idle);
    assert_eq!(platform.unbind_count(), 1);
    assert!(platform.started_configs().is_empty());
    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::Stopped {
            session_id: None,
            reason: StopReason::ConnectionLost,
        }
    );

    assert!(controller.start(heart_rate_run()).await.is_ok());
}

#[tokio::test]
async fn test_disconnect_during_stop() {
    let platform = quiet_platform();
    let controller = controller_for(&platform);
    controller.start(heart_rate_run()).await.unwrap();

    // The worker is gone by the time stop asks it to end
    platform.disconnect();
    let result = controller.stop().await;

    // Either the watcher or stop observed the loss first
    assert!(matches!(
        result,
        Ok(StopReason::ConnectionLost) | Ok(StopReason::NotRunning)
    ));
    eventually(|| controller.state() == SessionState::Idle).await;
    assert_eq!(platform.unbind_count(), 1);
    assert_eq!(platform.end_count(), 0);
}
