//! Workout Session - demo runner
//!
//! Starts a session against the simulated worker described in the config file,
//! prints every record as a JSON line, and stops after the configured duration.

use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use workout_session::platform::{BootClock, SimulatedPlatform, SystemBootClock};
use workout_session::session::{ControllerOptions, SessionController, SessionEvent};
use workout_session::storage::config::load_config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting workout-session v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config().context("failed to load configuration")?;
    let simulator = config
        .simulator
        .to_simulator_config()
        .context("invalid simulator settings")?;

    // Worker and controller must agree on when the device booted
    let clock: Arc<dyn BootClock> = Arc::new(SystemBootClock::new());
    let platform = SimulatedPlatform::with_clock(simulator, clock.clone());
    let controller = SessionController::with_options(
        platform,
        ControllerOptions {
            clock,
            auto_pause_and_resume: config.session.auto_pause_and_resume,
        },
    );

    let records = controller.record_receiver();
    let printer = tokio::task::spawn_blocking(move || {
        for record in records.iter() {
            println!("{}", record.to_wire());
        }
    });

    let mut lifecycle = controller.lifecycle_events();
    tokio::spawn(async move {
        while let Ok(event) = lifecycle.recv().await {
            match event {
                SessionEvent::Started { session_id, .. } => {
                    tracing::info!("Session {} started", session_id)
                }
                SessionEvent::Stopped { reason, .. } => tracing::info!("Session ended: {}", reason),
            }
        }
    });

    let request = config
        .session
        .start_arguments()
        .into_request()
        .context("invalid session settings")?;

    let outcome = controller.start(request).await?;
    println!("{}", serde_json::to_string(&outcome)?);

    tokio::time::sleep(Duration::from_secs(config.session.duration_secs)).await;

    let reason = controller.stop().await?;
    tracing::info!("Stop completed: {}", reason);

    controller.unsubscribe();
    printer.await?;

    Ok(())
}
