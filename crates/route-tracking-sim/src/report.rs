//! Turns controller events into log lines or JSON records

use route_tracking_lib::{AlertLevel, Location, RouteControllerEvent, RouteProgress};
use serde::Serialize;

/// Flattened view of an event, stable enough for downstream tooling
#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventRecord {
    Progress {
        #[serde(flatten)]
        snapshot: ProgressSnapshot,
        location: Location,
        seconds_remaining_on_step: Option<f64>,
    },
    Alert {
        #[serde(flatten)]
        snapshot: ProgressSnapshot,
        distance_to_end_of_maneuver: f64,
        is_first_alert_for_step: bool,
        instructions: String,
    },
    Reroute {
        location: Location,
    },
}

#[derive(Debug, Serialize)]
pub struct ProgressSnapshot {
    pub leg_index: usize,
    pub step_index: usize,
    pub alert_level: AlertLevel,
    pub distance_traveled: f64,
    pub distance_remaining: f64,
    pub duration_remaining: f64,
    pub fraction_traveled: f64,
}

impl From<&RouteProgress> for ProgressSnapshot {
    fn from(progress: &RouteProgress) -> Self {
        let leg = progress.current_leg_progress();
        Self {
            leg_index: progress.leg_index(),
            step_index: leg.step_index(),
            alert_level: leg.alert_level(),
            distance_traveled: progress.distance_traveled(),
            distance_remaining: progress.distance_remaining(),
            duration_remaining: progress.duration_remaining(),
            fraction_traveled: progress.fraction_traveled(),
        }
    }
}

impl From<&RouteControllerEvent> for EventRecord {
    fn from(event: &RouteControllerEvent) -> Self {
        match event {
            RouteControllerEvent::ProgressChanged {
                progress,
                location,
                seconds_remaining_on_step,
            } => EventRecord::Progress {
                snapshot: progress.into(),
                location: *location,
                seconds_remaining_on_step: *seconds_remaining_on_step,
            },
            RouteControllerEvent::AlertLevelChanged {
                progress,
                distance_to_end_of_maneuver,
                is_first_alert_for_step,
            } => EventRecord::Alert {
                snapshot: progress.into(),
                distance_to_end_of_maneuver: *distance_to_end_of_maneuver,
                is_first_alert_for_step: *is_first_alert_for_step,
                instructions: announcement(progress),
            },
            RouteControllerEvent::ShouldReroute { location } => {
                EventRecord::Reroute { location: *location }
            }
        }
    }
}

/// What a voice prompt would say for the current alert
fn announcement(progress: &RouteProgress) -> String {
    let leg = progress.current_leg_progress();
    match leg.alert_level() {
        AlertLevel::Arrive => "You have arrived".to_string(),
        AlertLevel::Depart | AlertLevel::Low => leg.current_step().instructions().to_string(),
        _ => leg
            .upcoming_step()
            .map(|step| step.instructions().to_string())
            .unwrap_or_default(),
    }
}

/// Event counts printed at the end of a run
#[derive(Debug, Default, Serialize)]
pub struct Summary {
    pub progress_updates: usize,
    pub alerts: usize,
    pub reroutes: usize,
}

impl Summary {
    pub fn record(&mut self, event: &RouteControllerEvent) {
        match event {
            RouteControllerEvent::ProgressChanged { .. } => self.progress_updates += 1,
            RouteControllerEvent::AlertLevelChanged { .. } => self.alerts += 1,
            RouteControllerEvent::ShouldReroute { .. } => self.reroutes += 1,
        }
    }
}

/// Print one event, as a JSON line or as a log line
pub fn report(event: &RouteControllerEvent, json: bool) -> crate::Result<()> {
    let record = EventRecord::from(event);
    if json {
        println!("{}", serde_json::to_string(&record)?);
        return Ok(());
    }
    match record {
        EventRecord::Progress {
            snapshot,
            seconds_remaining_on_step,
            ..
        } => tracing::debug!(
            "leg {} step {}: {:.0} m traveled, {:.0} m left ({:.0}%), {}",
            snapshot.leg_index,
            snapshot.step_index,
            snapshot.distance_traveled,
            snapshot.distance_remaining,
            snapshot.fraction_traveled * 100.0,
            seconds_remaining_on_step
                .map(|s| format!("{s:.0} s to next maneuver"))
                .unwrap_or_else(|| "stationary".to_string())
        ),
        EventRecord::Alert {
            snapshot,
            distance_to_end_of_maneuver,
            instructions,
            ..
        } => tracing::info!(
            "[{:?}] leg {} step {}: {} (in {:.0} m)",
            snapshot.alert_level,
            snapshot.leg_index,
            snapshot.step_index,
            instructions,
            distance_to_end_of_maneuver
        ),
        EventRecord::Reroute { location } => tracing::warn!(
            "Off route at ({:.6}, {:.6}); a new route should be requested",
            location.coordinate.latitude,
            location.coordinate.longitude
        ),
    }
    Ok(())
}
