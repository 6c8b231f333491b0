//! Step tracking state machine
//!
//! [`RouteController`] consumes one location fix at a time, keeps the
//! [`RouteProgress`] up to date and reports what changed through an
//! [`EventSink`] supplied at construction:
//!
//! 1. Off-route check on the fix projected forward along its course.
//! 2. Distance traveled along the current step.
//! 3. Maneuver-zone evaluation (hysteresis latch, arrival, heading-based step completion).
//! 4. Time-based escalation to `medium`/`high`, guarded by the step length.
//! 5. Alert-level change notification.
//! 6. Suspension once the arrival alert has been issued.
//!
//! Fixes must be delivered in timestamp order; the controller does not
//! try to detect stale input.

use crate::config::TrackerConfig;
use crate::geometry::{
    Coordinate, destination, difference_between_angles, haversine_distance, wrap,
};
use crate::polyline::{closest_coordinate, distance_along, is_within};
use crate::progress::{AlertLevel, RouteProgress};
use crate::route::{ManeuverType, Route};
use crate::{Result, TrackingError};
use std::sync::Arc;
use std::time::SystemTime;

/// A single fix from the location provider
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Location {
    pub coordinate: Coordinate,
    /// Meters per second; negative when unknown
    pub speed: f64,
    /// Degrees clockwise from true north; negative when unknown
    pub course: f64,
    pub timestamp: SystemTime,
}

impl Location {
    pub fn new(coordinate: Coordinate, speed: f64, course: f64, timestamp: SystemTime) -> Self {
        Self {
            coordinate,
            speed,
            course,
            timestamp,
        }
    }

    #[inline]
    pub fn has_speed(&self) -> bool {
        self.speed.is_finite() && self.speed > 0.0
    }

    #[inline]
    pub fn has_course(&self) -> bool {
        self.course.is_finite() && self.course >= 0.0
    }

    /// Seconds needed to cover `distance` meters at the current speed
    ///
    /// `None` when the speed is zero, negative or unknown.
    pub fn seconds_to_cover(&self, distance: f64) -> Option<f64> {
        self.has_speed().then(|| distance / self.speed)
    }

    /// Where the user will be after `interval` seconds on the current course
    pub fn projected(&self, interval: f64) -> Coordinate {
        if !self.has_speed() || !self.has_course() {
            return self.coordinate;
        }
        destination(self.coordinate, self.speed * interval, self.course)
    }
}

/// Notifications emitted while tracking, in the order fixes were processed
#[derive(Clone, Debug)]
pub enum RouteControllerEvent {
    /// The distance traveled along the current step changed
    ProgressChanged {
        progress: RouteProgress,
        location: Location,
        /// `None` when the fix carries no usable speed
        seconds_remaining_on_step: Option<f64>,
    },
    /// The alert level changed; time to present guidance
    AlertLevelChanged {
        progress: RouteProgress,
        /// Meters along the (possibly new) current step to its end
        distance_to_end_of_maneuver: f64,
        is_first_alert_for_step: bool,
    },
    /// The user left the route; a new route should be requested
    ShouldReroute { location: Location },
}

/// Receiver of [`RouteControllerEvent`]s
pub trait EventSink {
    fn emit(&mut self, event: RouteControllerEvent);
}

impl<F> EventSink for F
where
    F: FnMut(RouteControllerEvent),
{
    fn emit(&mut self, event: RouteControllerEvent) {
        self(event)
    }
}

impl EventSink for tokio::sync::mpsc::UnboundedSender<RouteControllerEvent> {
    fn emit(&mut self, event: RouteControllerEvent) {
        if self.send(event).is_err() {
            tracing::trace!("Event receiver dropped; discarding event");
        }
    }
}

/// Whether the controller is consuming fixes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControllerState {
    Active,
    /// Fixes are discarded until [`RouteController::resume`] or a new leg/route
    Suspended,
    /// Terminal: every later fix is discarded
    Stopped,
}

/// What processing one fix did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FixOutcome {
    /// The controller is suspended or stopped
    Ignored,
    /// `ShouldReroute` was emitted; nothing else was processed
    OffRoute,
    /// The arrival alert was already active; the controller is now suspended
    Arrived,
    OnRoute {
        step_advanced: bool,
        alert_level_changed: bool,
    },
}

/// Tracks a user along a route, one fix at a time
pub struct RouteController<S> {
    route_progress: RouteProgress,
    config: TrackerConfig,
    sink: S,
    state: ControllerState,
}

impl<S> std::fmt::Debug for RouteController<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteController")
            .field("route_progress", &self.route_progress)
            .field("config", &self.config)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl<S: EventSink> RouteController<S> {
    /// Start tracking `route` from its first step
    ///
    /// Fails when the configuration is invalid or the route violates its
    /// structural preconditions (no legs, empty legs, steps without shape).
    pub fn new(route: Arc<Route>, config: TrackerConfig, sink: S) -> Result<Self> {
        config.validate()?;
        route.validate()?;
        Ok(Self {
            route_progress: RouteProgress::new(route),
            config,
            sink,
            state: ControllerState::Active,
        })
    }

    #[inline]
    pub fn route_progress(&self) -> &RouteProgress {
        &self.route_progress
    }

    #[inline]
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    #[inline]
    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Consume the controller, keeping the final progress
    pub fn into_progress(self) -> RouteProgress {
        self.route_progress
    }

    /// Resume consuming fixes after a suspension. Has no effect once stopped.
    pub fn resume(&mut self) {
        if self.state == ControllerState::Suspended {
            tracing::debug!("Resuming route tracking");
            self.state = ControllerState::Active;
        }
    }

    pub fn suspend(&mut self) {
        if self.state == ControllerState::Active {
            tracing::debug!("Suspending route tracking");
            self.state = ControllerState::Suspended;
        }
    }

    /// Stop for good; every fix delivered afterwards is discarded
    pub fn stop(&mut self) {
        tracing::info!("Route tracking stopped");
        self.state = ControllerState::Stopped;
    }

    /// Replace the route after a reroute and resume tracking from its start
    pub fn reroute(&mut self, route: Arc<Route>) -> Result<()> {
        if self.state == ControllerState::Stopped {
            return Ok(());
        }
        route.validate()?;
        tracing::info!(
            "Rerouted: {} legs, {:.0} m",
            route.legs().len(),
            route.distance()
        );
        self.route_progress = RouteProgress::new(route);
        self.state = ControllerState::Active;
        Ok(())
    }

    /// Continue with the next leg after arriving at an intermediate waypoint
    pub fn advance_leg(&mut self) -> Result<()> {
        if self.state == ControllerState::Stopped {
            return Ok(());
        }
        self.route_progress.advance_leg()?;
        tracing::info!("Starting leg {}", self.route_progress.leg_index());
        self.state = ControllerState::Active;
        Ok(())
    }

    /// Process one location fix
    ///
    /// Returns an error only for a fix whose coordinate is not a valid
    /// latitude/longitude; the progress is left untouched in that case.
    pub fn update(&mut self, location: Location) -> Result<FixOutcome> {
        if self.state != ControllerState::Active {
            tracing::trace!("Discarding fix while {:?}", self.state);
            return Ok(FixOutcome::Ignored);
        }
        if !location.coordinate.is_valid() {
            return Err(TrackingError::InvalidLocation(format!(
                "({}, {})",
                location.coordinate.latitude, location.coordinate.longitude
            )));
        }

        tracing::debug!(
            "Fix ({:.6}, {:.6}) speed {:.1} m/s course {:.0}",
            location.coordinate.latitude,
            location.coordinate.longitude,
            location.speed,
            location.course
        );

        if self.route_progress.current_leg_progress().alert_level() == AlertLevel::Arrive {
            return Ok(self.suspend_on_arrival(location));
        }

        let mut step_advanced = false;
        let mut alert_level_changed = false;

        let projected = location.projected(self.config.dead_reckoning_interval);
        if !self.is_close_to_current_step(projected) {
            if !self.advance_to_upcoming_step(&location, projected) {
                tracing::info!(
                    "User is off route at ({:.6}, {:.6})",
                    location.coordinate.latitude,
                    location.coordinate.longitude
                );
                self.sink.emit(RouteControllerEvent::ShouldReroute { location });
                return Ok(FixOutcome::OffRoute);
            }
            step_advanced = true;
            alert_level_changed = true;
        }

        self.update_distance_traveled(&location);

        let (advanced, changed) = self.monitor_step_progress(&location)?;
        step_advanced |= advanced;
        alert_level_changed |= changed;

        Ok(FixOutcome::OnRoute {
            step_advanced,
            alert_level_changed,
        })
    }

    fn suspend_on_arrival(&mut self, location: Location) -> FixOutcome {
        tracing::info!(
            "Arrived at waypoint of leg {}; suspending",
            self.route_progress.leg_index()
        );
        self.state = ControllerState::Suspended;
        let remaining = self.remaining_on_current_step(location.coordinate);
        self.sink.emit(RouteControllerEvent::ProgressChanged {
            progress: self.route_progress.clone(),
            location,
            seconds_remaining_on_step: location.seconds_to_cover(remaining),
        });
        FixOutcome::Arrived
    }

    fn current_step_shape(&self) -> &[Coordinate] {
        self.route_progress
            .current_leg_progress()
            .current_step()
            .coordinates()
    }

    /// Meters along the current step from the fix's projection to the step end
    fn remaining_on_current_step(&self, coordinate: Coordinate) -> f64 {
        distance_along(self.current_step_shape(), Some(coordinate), None)
    }

    fn is_close_to_current_step(&self, projected: Coordinate) -> bool {
        closest_coordinate(self.current_step_shape(), projected).is_none_or(|closest| {
            closest.distance <= self.config.maximum_distance_before_recalculating
        })
    }

    /// Fallback for a missed heading match: the user already left the current
    /// step but is on the upcoming one, so the maneuver was completed.
    fn advance_to_upcoming_step(&mut self, location: &Location, projected: Coordinate) -> bool {
        let leg = self.route_progress.current_leg_progress();
        let Some(upcoming) = leg.upcoming_step() else {
            return false;
        };
        if upcoming.maneuver_type() == ManeuverType::Arrive
            || !is_within(
                projected,
                self.config.maximum_distance_before_recalculating,
                upcoming.coordinates(),
            )
        {
            return false;
        }

        if self
            .route_progress
            .current_leg_progress_mut()
            .advance_step()
            .is_err()
        {
            return false;
        }
        tracing::info!(
            "Left step onto the upcoming one; advanced to step {}",
            self.route_progress.current_leg_progress().step_index()
        );

        let alert_level = self.alert_level_for_new_step(location);
        self.route_progress
            .current_leg_progress_mut()
            .set_alert_level(alert_level);
        self.emit_alert_level_changed(location.coordinate, true);
        true
    }

    fn update_distance_traveled(&mut self, location: &Location) {
        let shape = self.current_step_shape();
        let Some(closest) = closest_coordinate(shape, location.coordinate) else {
            return;
        };
        let distance_traveled = distance_along(shape, None, Some(closest.coordinate));

        let step_progress = self
            .route_progress
            .current_leg_progress()
            .current_step_progress();
        if distance_traveled == step_progress.distance_traveled() {
            return;
        }

        self.route_progress
            .current_leg_progress_mut()
            .current_step_progress_mut()
            .set_distance_traveled(distance_traveled);

        let remaining = self.remaining_on_current_step(location.coordinate);
        self.sink.emit(RouteControllerEvent::ProgressChanged {
            progress: self.route_progress.clone(),
            location: *location,
            seconds_remaining_on_step: location.seconds_to_cover(remaining),
        });
    }

    /// Alert level right after moving onto a new step
    fn alert_level_for_new_step(&self, location: &Location) -> AlertLevel {
        let remaining = self.remaining_on_current_step(location.coordinate);
        match location.seconds_to_cover(remaining) {
            Some(seconds) if seconds <= self.config.medium_alert_interval => AlertLevel::Medium,
            _ => AlertLevel::Low,
        }
    }

    fn course_matches_upcoming_heading(&self, location: &Location) -> bool {
        if !location.has_course() {
            return false;
        }
        self.route_progress
            .current_leg_progress()
            .upcoming_step()
            .and_then(|step| step.final_heading())
            .is_some_and(|final_heading| {
                let final_heading = wrap(final_heading, 0.0, 360.0);
                let course = wrap(location.course, 0.0, 360.0);
                difference_between_angles(final_heading, course)
                    <= self.config.maximum_allowed_degree_offset_for_turn_completion
            })
    }

    /// Maneuver-zone evaluation and escalation; returns (step advanced, alert changed)
    fn monitor_step_progress(&mut self, location: &Location) -> Result<(bool, bool)> {
        let previous = self.route_progress.current_leg_progress().alert_level();
        // Force an announcement when the user begins a route
        let mut alert_level = if previous == AlertLevel::None {
            AlertLevel::Depart
        } else {
            previous
        };

        let remaining = self.remaining_on_current_step(location.coordinate);
        let seconds_to_end_of_step = location.seconds_to_cover(remaining);
        let course_matches = self.course_matches_upcoming_heading(location);
        let mut step_advanced = false;

        if remaining <= self.config.maneuver_zone_radius {
            let leg = self.route_progress.current_leg_progress();
            let upcoming_type = leg.upcoming_step().map(|step| step.maneuver_type());
            // Without an upcoming step the user is on the final step
            let maneuver_location = leg
                .upcoming_step()
                .unwrap_or_else(|| leg.current_step())
                .maneuver_location();
            let user_absolute_distance = haversine_distance(maneuver_location, location.coordinate);

            let radius = self.config.maneuver_zone_radius;
            self.route_progress
                .current_leg_progress_mut()
                .current_step_progress_mut()
                .maneuver_zone_mut()
                .observe(user_absolute_distance, radius);

            if upcoming_type == Some(ManeuverType::Arrive) {
                alert_level = AlertLevel::Arrive;
            } else if course_matches {
                self.route_progress
                    .current_leg_progress_mut()
                    .advance_step()?;
                tracing::info!(
                    "Maneuver completed; advanced to step {}",
                    self.route_progress.current_leg_progress().step_index()
                );
                alert_level = self.alert_level_for_new_step(location);
                step_advanced = true;
            }
        }

        if !step_advanced && alert_level != AlertLevel::Arrive {
            if let Some(seconds) = seconds_to_end_of_step {
                let step_distance = self
                    .route_progress
                    .current_leg_progress()
                    .current_step()
                    .distance();
                let escalated = if seconds <= self.config.high_alert_interval
                    && step_distance > self.config.minimum_distance_for_high_alert
                {
                    Some(AlertLevel::High)
                } else if seconds <= self.config.medium_alert_interval
                    && step_distance > self.config.minimum_distance_for_medium_alert
                {
                    Some(AlertLevel::Medium)
                } else {
                    None
                };
                // Within a step the level never moves backwards
                if let Some(escalated) = escalated.filter(|level| *level > alert_level) {
                    alert_level = escalated;
                }
            }
        }

        if alert_level == previous {
            return Ok((step_advanced, false));
        }

        tracing::info!("Alert level {:?} -> {:?}", previous, alert_level);
        self.route_progress
            .current_leg_progress_mut()
            .set_alert_level(alert_level);
        self.emit_alert_level_changed(location.coordinate, step_advanced);
        Ok((step_advanced, true))
    }

    fn emit_alert_level_changed(&mut self, coordinate: Coordinate, is_first_alert_for_step: bool) {
        // Recomputed here since the step may have just advanced
        let distance_to_end_of_maneuver = self.remaining_on_current_step(coordinate);
        self.sink.emit(RouteControllerEvent::AlertLevelChanged {
            progress: self.route_progress.clone(),
            distance_to_end_of_maneuver,
            is_first_alert_for_step,
        });
    }
}
