//! Route Tracking Simulator
//!
//! Loads a GPX route, drives a simulated vehicle along every leg and feeds
//! the fixes through a tracking session, reporting each emitted event.

mod logging;
mod report;
mod settings;

use route_tracking_lib::{Location, Route, SimulatedRoute, TrackingError, TrackingSession};
use settings::Settings;
use std::process::ExitCode;
use std::time::SystemTime;

/// Error types for the simulator
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error(transparent)]
    Tracking(#[from] TrackingError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Event reporter failed: {0}")]
    Reporter(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, SimError>;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    let settings = Settings::from_cli();
    let _guard = logging::setup_logging();

    match run(settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Simulated fixes for every leg, each leg starting where the previous one ended in time
fn simulate_legs(route: &Route, start: SystemTime) -> Vec<Vec<Location>> {
    let mut next_start = start;
    route
        .legs()
        .iter()
        .enumerate()
        .map(|(leg_index, leg)| {
            let mut path = Vec::new();
            for coordinate in leg.steps().iter().flat_map(|step| step.coordinates()) {
                if path.last() != Some(coordinate) {
                    path.push(*coordinate);
                }
            }
            let Some(simulated) = SimulatedRoute::new(&path) else {
                tracing::warn!(
                    "Leg {} has fewer than three distinct points; not simulated",
                    leg_index
                );
                return Vec::new();
            };
            let locations = simulated.locations(next_start);
            if let Some(last) = locations.last() {
                next_start = last.timestamp;
            }
            locations
        })
        .collect()
}

async fn run(settings: Settings) -> Result<()> {
    let config = settings.tracker_config()?;

    let file = std::fs::File::open(&settings.gpx_file)?;
    let route = Route::read_gpx(std::io::BufReader::new(file), settings.nominal_speed)?;
    tracing::info!(
        "Loaded {}: {} legs, {:.1} km, {:.0} min expected",
        settings.gpx_file.display(),
        route.legs().len(),
        route.distance() / 1000.0,
        route.expected_travel_time() / 60.0
    );

    let legs = simulate_legs(&route, SystemTime::now());
    let (session, mut events) = TrackingSession::spawn(route, config)?;

    let json = settings.json;
    let reporter = tokio::spawn(async move {
        let mut summary = report::Summary::default();
        while let Some(event) = events.recv().await {
            summary.record(&event);
            report::report(&event, json)?;
        }
        Ok::<_, SimError>(summary)
    });

    let leg_count = legs.len();
    for (leg_index, locations) in legs.into_iter().enumerate() {
        tracing::debug!("Feeding {} fixes for leg {}", locations.len(), leg_index);
        for location in locations {
            session.push_fix(location)?;
        }
        if leg_index + 1 < leg_count {
            session.advance_leg()?;
        }
    }
    session.stop()?;

    let progress = session.join().await?;
    let summary = reporter.await??;

    tracing::info!(
        "Finished on leg {} step {}: {:.0} m traveled ({:.0}%), {} progress updates, {} alerts, {} reroutes",
        progress.leg_index(),
        progress.current_leg_progress().step_index(),
        progress.distance_traveled(),
        progress.fraction_traveled() * 100.0,
        summary.progress_updates,
        summary.alerts,
        summary.reroutes
    );
    if json {
        println!("{}", serde_json::to_string(&summary)?);
    }
    Ok(())
}
