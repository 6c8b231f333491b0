//! Asynchronous tracking session
//!
//! A [`TrackingSession`] owns a [`RouteController`] on a tokio task. Fixes and
//! control commands go through an unbounded queue and are applied strictly
//! in the order they were sent, so a fix is always processed against the
//! progress left by the previous one. Events come back on a second channel.

use crate::config::TrackerConfig;
use crate::controller::{Location, RouteController, RouteControllerEvent};
use crate::progress::RouteProgress;
use crate::route::Route;
use crate::{Result, TrackingError};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Input accepted by a running session
#[derive(Debug)]
pub enum SessionCommand {
    Fix(Location),
    Reroute(Arc<Route>),
    AdvanceLeg,
    Resume,
    Stop,
}

/// Handle to a controller running on a tokio task
#[derive(Debug)]
pub struct TrackingSession {
    commands: mpsc::UnboundedSender<SessionCommand>,
    task: JoinHandle<Result<RouteProgress>>,
}

impl TrackingSession {
    /// Spawn a session on the current tokio runtime
    ///
    /// Returns the handle together with the receiving end of the event
    /// stream. Dropping the receiver does not stop tracking.
    pub fn spawn(
        route: Arc<Route>,
        config: TrackerConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<RouteControllerEvent>)> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let controller = RouteController::new(route, config, event_tx)?;

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(async move {
            #[cfg(feature = "profiling")]
            profiling::scope!("tracking_session");
            run(controller, command_rx).await
        });

        Ok((
            Self {
                commands: command_tx,
                task,
            },
            event_rx,
        ))
    }

    pub fn push_fix(&self, location: Location) -> Result<()> {
        self.send(SessionCommand::Fix(location))
    }

    pub fn reroute(&self, route: Arc<Route>) -> Result<()> {
        self.send(SessionCommand::Reroute(route))
    }

    pub fn advance_leg(&self) -> Result<()> {
        self.send(SessionCommand::AdvanceLeg)
    }

    pub fn resume(&self) -> Result<()> {
        self.send(SessionCommand::Resume)
    }

    /// Ask the session to stop; fixes queued behind this are discarded
    pub fn stop(&self) -> Result<()> {
        self.send(SessionCommand::Stop)
    }

    pub fn send(&self, command: SessionCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| TrackingError::SessionClosed)
    }

    /// Close the command queue and wait for the task to finish
    ///
    /// Returns the final progress, or the error that halted the session.
    pub async fn join(self) -> Result<RouteProgress> {
        let Self { commands, task } = self;
        drop(commands);
        task.await.map_err(|error| {
            tracing::error!("Tracking task failed: {}", error);
            TrackingError::SessionClosed
        })?
    }
}

async fn run<S>(
    mut controller: RouteController<S>,
    mut commands: mpsc::UnboundedReceiver<SessionCommand>,
) -> Result<RouteProgress>
where
    S: crate::controller::EventSink,
{
    while let Some(command) = commands.recv().await {
        match command {
            SessionCommand::Fix(location) => match controller.update(location) {
                Ok(_) => {}
                Err(TrackingError::InvalidLocation(reason)) => {
                    tracing::warn!("Dropping invalid fix {}", reason);
                }
                Err(error) => {
                    tracing::error!("Halting tracking session: {}", error);
                    return Err(error);
                }
            },
            SessionCommand::Reroute(route) => {
                if let Err(error) = controller.reroute(route) {
                    tracing::error!("Halting tracking session on reroute: {}", error);
                    return Err(error);
                }
            }
            SessionCommand::AdvanceLeg => {
                if let Err(error) = controller.advance_leg() {
                    tracing::warn!("Cannot advance leg: {}", error);
                }
            }
            SessionCommand::Resume => controller.resume(),
            SessionCommand::Stop => {
                controller.stop();
                break;
            }
        }
    }
    tracing::debug!("Tracking session finished");
    Ok(controller.into_progress())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Coordinate;
    use crate::progress::AlertLevel;
    use crate::route::RouteLeg;
    use std::time::{Duration, UNIX_EPOCH};

    fn straight_route() -> Arc<Route> {
        let start = Coordinate::new(40.0, -3.7);
        let end = start.coordinate_at(500.0, 0.0);
        Route::new(vec![RouteLeg::from_coordinates(&[start, end], 10.0)]).unwrap()
    }

    fn fix_at(route: &Route, meters: f64) -> Location {
        let start = route.legs()[0].steps()[0].maneuver_location();
        Location::new(
            start.coordinate_at(meters, 0.0),
            10.0,
            0.0,
            UNIX_EPOCH + Duration::from_secs(meters as u64),
        )
    }

    #[tokio::test]
    async fn test_session_processes_fixes_in_order() {
        let route = straight_route();
        let (session, mut events) =
            TrackingSession::spawn(route.clone(), TrackerConfig::default()).unwrap();

        for meters in [50.0, 100.0, 150.0] {
            session.push_fix(fix_at(&route, meters)).unwrap();
        }
        let progress = session.join().await.unwrap();

        let traveled = progress
            .current_leg_progress()
            .current_step_progress()
            .distance_traveled();
        assert!((traveled - 150.0).abs() < 1.0);

        let mut progress_events = 0;
        while let Ok(event) = events.try_recv() {
            if let RouteControllerEvent::ProgressChanged { progress, .. } = event {
                progress_events += 1;
                let step = progress.current_leg_progress().current_step_progress();
                assert!((step.distance_traveled() - 50.0 * progress_events as f64).abs() < 1.0);
            }
        }
        assert_eq!(progress_events, 3);
    }

    #[tokio::test]
    async fn test_session_stop_discards_queued_fixes() {
        let route = straight_route();
        let (session, mut events) =
            TrackingSession::spawn(route.clone(), TrackerConfig::default()).unwrap();

        session.stop().unwrap();
        // Either queued behind the stop or rejected once the task is gone
        let _ = session.push_fix(fix_at(&route, 100.0));
        let progress = session.join().await.unwrap();

        assert_eq!(progress.distance_traveled(), 0.0);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_session_survives_invalid_fix() {
        let route = straight_route();
        let (session, _events) =
            TrackingSession::spawn(route.clone(), TrackerConfig::default()).unwrap();

        let mut bad = fix_at(&route, 10.0);
        bad.coordinate = Coordinate::new(120.0, 0.0);
        session.push_fix(bad).unwrap();
        session.push_fix(fix_at(&route, 60.0)).unwrap();

        let progress = session.join().await.unwrap();
        assert!((progress.distance_traveled() - 60.0).abs() < 1.0);
    }

    #[tokio::test]
    async fn test_session_arrival_then_reroute() {
        let route = straight_route();
        let (session, _events) =
            TrackingSession::spawn(route.clone(), TrackerConfig::default()).unwrap();

        session.push_fix(fix_at(&route, 490.0)).unwrap();
        session.push_fix(fix_at(&route, 495.0)).unwrap();
        session.reroute(straight_route()).unwrap();
        session.push_fix(fix_at(&route, 20.0)).unwrap();

        let progress = session.join().await.unwrap();
        assert_eq!(progress.current_leg_progress().alert_level(), AlertLevel::Depart);
        assert!((progress.distance_traveled() - 20.0).abs() < 1.0);
    }

    #[tokio::test]
    async fn test_session_halts_on_invalid_reroute() {
        let route = straight_route();
        let (session, _events) =
            TrackingSession::spawn(route.clone(), TrackerConfig::default()).unwrap();

        session.reroute(Route::new_unchecked(Vec::new())).unwrap();
        // The task may already be gone by the time this is sent
        let _ = session.push_fix(fix_at(&route, 20.0));

        assert!(matches!(session.join().await, Err(TrackingError::EmptyRoute)));
    }

    #[tokio::test]
    async fn test_session_rejects_invalid_config() {
        let config = TrackerConfig {
            maximum_distance_before_recalculating: 0.0,
            ..TrackerConfig::default()
        };
        assert!(matches!(
            TrackingSession::spawn(straight_route(), config),
            Err(TrackingError::InvalidConfig(_))
        ));
    }
}
