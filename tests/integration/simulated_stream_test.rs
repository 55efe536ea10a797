//! Sessions driven by the simulated device's own update cadence.

use crate::harness::eventually;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use workout_session::platform::{SimulatedPlatform, SimulatorConfig, SystemBootClock};
use workout_session::session::{ControllerOptions, SessionController, SessionRequest};
use workout_session::storage::config::{load_config_from, save_config_to, AppConfig};

#[tokio::test]
async fn test_config_driven_session_streams_requested_sensors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");

    let mut config = AppConfig::default();
    config.session.sensors = vec![
        "heartRate".to_string(),
        "steps".to_string(),
        "location".to_string(),
    ];
    config.simulator.update_interval_ms = 5;
    config.simulator.supported_sensors = vec!["heartRate".to_string(), "steps".to_string()];
    save_config_to(&config, &path).unwrap();

    let config = load_config_from(&path).unwrap();
    let clock = Arc::new(SystemBootClock::new());
    let platform = SimulatedPlatform::with_clock(
        config.simulator.to_simulator_config().unwrap(),
        clock.clone(),
    );
    let controller = SessionController::with_options(
        platform.clone(),
        ControllerOptions {
            clock,
            auto_pause_and_resume: config.session.auto_pause_and_resume,
        },
    );
    let records = controller.record_receiver();

    let request = config.session.start_arguments().into_request().unwrap();
    let outcome = controller.start(request).await.unwrap();
    let unsupported: Vec<_> = outcome
        .unsupported_sensors
        .iter()
        .map(|s| s.wire_tag())
        .collect();
    assert_eq!(unsupported, vec!["location"]);

    let mut tags = BTreeSet::new();
    eventually(|| {
        while let Ok(record) = records.try_recv() {
            assert!(record.timestamp_millis > 0);
            tags.insert(record.sensor_type);
        }
        tags.len() >= 2
    })
    .await;
    assert_eq!(tags, BTreeSet::from(["heartRate", "steps"]));

    controller.stop().await.unwrap();
    assert_eq!(platform.unbind_count(), 1);
}

#[tokio::test]
async fn test_ticker_stops_with_session() {
    let platform = SimulatedPlatform::new(SimulatorConfig {
        update_interval: Some(Duration::from_millis(5)),
        ..Default::default()
    });
    let controller = SessionController::new(platform.clone());
    let records = controller.record_receiver();

    controller
        .start(SessionRequest::from_wire(serde_json::json!({
            "exerciseType": 1,
            "sensors": ["speed"],
            "enableGps": false,
        }))
        .unwrap())
        .await
        .unwrap();

    eventually(|| !records.is_empty()).await;
    controller.stop().await.unwrap();

    // Drain what was delivered before stop returned; nothing follows
    while records.try_recv().is_ok() {}
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(records.try_recv().is_err());
}
