//! Shared setup for session integration tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use workout_session::platform::{
    ExerciseEvent, ExerciseUpdate, FixedBootClock, SampleDataPoint, SimulatedPlatform,
    SimulatorConfig,
};
use workout_session::sensors::types::{PlatformDataType, SampleValue, SensorRecord};
use workout_session::session::{ControllerOptions, SessionController, SessionEvent};

pub const BOOT_EPOCH_MS: i64 = 1_700_000_000_000;

/// Simulated device that only emits what a test pushes.
pub fn quiet_platform() -> SimulatedPlatform {
    SimulatedPlatform::new(SimulatorConfig {
        update_interval: None,
        ..Default::default()
    })
}

pub fn controller_for(platform: &SimulatedPlatform) -> SessionController<SimulatedPlatform> {
    SessionController::with_options(
        platform.clone(),
        ControllerOptions {
            clock: Arc::new(FixedBootClock::new(BOOT_EPOCH_MS, Duration::from_secs(30))),
            auto_pause_and_resume: false,
        },
    )
}

/// Subscribe a collecting observer.
pub fn collect_records(
    controller: &SessionController<SimulatedPlatform>,
) -> Arc<Mutex<Vec<SensorRecord>>> {
    let records = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&records);
    controller.subscribe(move |record| sink.lock().unwrap().push(record));
    records
}

pub fn heart_rate_update(bpm: f64, since_boot_ms: u64) -> ExerciseEvent {
    ExerciseEvent::Update(ExerciseUpdate {
        samples: vec![SampleDataPoint {
            data_type: PlatformDataType::HEART_RATE_BPM,
            value: SampleValue::Scalar(bpm),
            time_since_boot: Duration::from_millis(since_boot_ms),
        }],
        cumulative: Vec::new(),
    })
}

/// Poll until `condition` holds, failing the test after a second.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

/// Next lifecycle event, failing the test after a second.
pub async fn next_event(events: &mut broadcast::Receiver<SessionEvent>) -> SessionEvent {
    tokio::time::timeout(Duration::from_secs(1), events.recv())
        .await
        .expect("timed out waiting for lifecycle event")
        .expect("lifecycle channel closed")
}
