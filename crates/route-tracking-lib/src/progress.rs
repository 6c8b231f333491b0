//! Progress along a route, decomposed into leg progress and step progress
//!
//! A [`RouteProgress`] is owned and mutated by the tracking controller only.
//! Observers receive clones; the route itself is shared, so a snapshot costs
//! a reference-count bump plus a few scalars.

use crate::geometry::Coordinate;
use crate::route::{Route, RouteLeg, RouteStep};
use crate::{Result, TrackingError};
use std::sync::Arc;

/// Guidance urgency for the current step, ordered from least to most urgent
///
/// The level only moves forward while a step is current and goes back to a
/// lower level when the step advances.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum AlertLevel {
    /// Nothing announced yet
    #[default]
    None,
    /// The user has started the route
    Depart,
    /// The user has recently completed a step
    Low,
    /// The user is approaching the maneuver
    Medium,
    /// The user is at or very close to the maneuver point
    High,
    /// The user has reached the end of the leg
    Arrive,
}

/// Hysteresis latch on the straight-line distance to the maneuver location
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum ManeuverZone {
    /// The user has not entered the maneuver zone during this step
    #[default]
    NotEntered,
    /// Closest distance in meters observed since entering the zone
    Latched(f64),
}

impl ManeuverZone {
    /// Feed a new straight-line distance to the maneuver location
    ///
    /// On first entry the latch starts at `radius`. Afterwards it only moves
    /// when the user gets strictly closer; equal or larger distances leave it
    /// untouched. Returns whether the latched value changed.
    pub fn observe(&mut self, distance: f64, radius: f64) -> bool {
        let latched = match *self {
            ManeuverZone::NotEntered => radius,
            ManeuverZone::Latched(latched) => latched,
        };
        if distance < latched {
            *self = ManeuverZone::Latched(distance);
            true
        } else {
            let entered = matches!(self, ManeuverZone::NotEntered);
            *self = ManeuverZone::Latched(latched);
            entered
        }
    }

    #[inline]
    pub fn distance(&self) -> Option<f64> {
        match self {
            ManeuverZone::NotEntered => None,
            ManeuverZone::Latched(distance) => Some(*distance),
        }
    }
}

/// Ratio guarded against zero-length denominators (an empty leg or an arrival step)
fn fraction(traveled: f64, total: f64) -> f64 {
    if total > 0.0 { traveled / total } else { 1.0 }
}

/// Progress along the current step
#[derive(Clone, Debug)]
pub struct RouteStepProgress {
    route: Arc<Route>,
    leg_index: usize,
    step_index: usize,
    distance_traveled: f64,
    maneuver_zone: ManeuverZone,
}

impl RouteStepProgress {
    fn new(route: Arc<Route>, leg_index: usize, step_index: usize) -> Self {
        Self {
            route,
            leg_index,
            step_index,
            distance_traveled: 0.0,
            maneuver_zone: ManeuverZone::NotEntered,
        }
    }

    #[inline]
    pub fn step(&self) -> &RouteStep {
        &self.route.legs()[self.leg_index].steps()[self.step_index]
    }

    /// Meters traveled along the current step
    #[inline]
    pub fn distance_traveled(&self) -> f64 {
        self.distance_traveled
    }

    pub(crate) fn set_distance_traveled(&mut self, distance: f64) {
        debug_assert!(distance >= 0.0);
        self.distance_traveled = distance;
    }

    /// Meters left until the end of the step
    ///
    /// Traveled distance is measured on the step shape while the total may be
    /// a routing-service value, so the result is clamped at zero.
    pub fn distance_remaining(&self) -> f64 {
        (self.step().distance() - self.distance_traveled).max(0.0)
    }

    /// Fraction of the step traveled, 0 at the maneuver and 1 at the next one
    pub fn fraction_traveled(&self) -> f64 {
        fraction(self.distance_traveled, self.step().distance()).min(1.0)
    }

    /// Seconds remaining on the step, scaled from its expected travel time
    pub fn duration_remaining(&self) -> f64 {
        (1.0 - self.fraction_traveled()) * self.step().expected_travel_time()
    }

    #[inline]
    pub fn maneuver_zone(&self) -> ManeuverZone {
        self.maneuver_zone
    }

    pub(crate) fn maneuver_zone_mut(&mut self) -> &mut ManeuverZone {
        &mut self.maneuver_zone
    }

    /// Closest straight-line distance to the maneuver location since entering the zone
    #[inline]
    pub fn user_distance_to_maneuver_location(&self) -> Option<f64> {
        self.maneuver_zone.distance()
    }
}

/// Progress along the current leg
#[derive(Clone, Debug)]
pub struct RouteLegProgress {
    route: Arc<Route>,
    leg_index: usize,
    step_index: usize,
    alert_level: AlertLevel,
    current_step_progress: RouteStepProgress,
}

impl RouteLegProgress {
    fn new(route: Arc<Route>, leg_index: usize, alert_level: AlertLevel) -> Self {
        let current_step_progress = RouteStepProgress::new(route.clone(), leg_index, 0);
        Self {
            route,
            leg_index,
            step_index: 0,
            alert_level,
            current_step_progress,
        }
    }

    #[inline]
    pub fn leg(&self) -> &RouteLeg {
        &self.route.legs()[self.leg_index]
    }

    #[inline]
    pub fn step_index(&self) -> usize {
        self.step_index
    }

    #[inline]
    pub fn alert_level(&self) -> AlertLevel {
        self.alert_level
    }

    pub(crate) fn set_alert_level(&mut self, alert_level: AlertLevel) {
        self.alert_level = alert_level;
    }

    /// Move to the next step, starting fresh step progress
    ///
    /// Fails without changing anything when the current step is the last one.
    pub(crate) fn advance_step(&mut self) -> Result<()> {
        let next = self.step_index + 1;
        if next >= self.leg().steps().len() {
            return Err(TrackingError::StepOutOfRange {
                leg_index: self.leg_index,
                step_index: next,
            });
        }
        self.step_index = next;
        self.current_step_progress = RouteStepProgress::new(self.route.clone(), self.leg_index, next);
        Ok(())
    }

    #[inline]
    pub fn current_step_progress(&self) -> &RouteStepProgress {
        &self.current_step_progress
    }

    pub(crate) fn current_step_progress_mut(&mut self) -> &mut RouteStepProgress {
        &mut self.current_step_progress
    }

    #[inline]
    pub fn current_step(&self) -> &RouteStep {
        &self.leg().steps()[self.step_index]
    }

    /// Step right after the current one
    pub fn upcoming_step(&self) -> Option<&RouteStep> {
        self.leg().steps().get(self.step_index + 1)
    }

    /// Step two ahead of the current one
    pub fn follow_on_step(&self) -> Option<&RouteStep> {
        self.leg().steps().get(self.step_index + 2)
    }

    /// Step right before the current one
    pub fn prior_step(&self) -> Option<&RouteStep> {
        self.step_index
            .checked_sub(1)
            .and_then(|index| self.leg().steps().get(index))
    }

    pub fn step_before(&self, step_index: usize) -> Option<&RouteStep> {
        step_index
            .checked_sub(1)
            .and_then(|index| self.leg().steps().get(index))
    }

    pub fn step_after(&self, step_index: usize) -> Option<&RouteStep> {
        self.leg().steps().get(step_index + 1)
    }

    /// Meters traveled along the leg
    pub fn distance_traveled(&self) -> f64 {
        self.leg().steps()[..self.step_index]
            .iter()
            .map(RouteStep::distance)
            .sum::<f64>()
            + self.current_step_progress.distance_traveled()
    }

    pub fn distance_remaining(&self) -> f64 {
        (self.leg().distance() - self.distance_traveled()).max(0.0)
    }

    /// Seconds remaining on the leg
    pub fn duration_remaining(&self) -> f64 {
        self.leg().steps()[self.step_index + 1..]
            .iter()
            .map(RouteStep::expected_travel_time)
            .sum::<f64>()
            + self.current_step_progress.duration_remaining()
    }

    pub fn fraction_traveled(&self) -> f64 {
        fraction(self.distance_traveled(), self.leg().distance())
    }

    /// The user has reached the final waypoint of this leg
    #[inline]
    pub fn user_has_arrived_at_waypoint(&self) -> bool {
        self.alert_level == AlertLevel::Arrive
    }

    /// Shapes of the prior, current and upcoming steps joined together
    pub fn nearby_coordinates(&self) -> Vec<Coordinate> {
        let prior = self.prior_step().map(RouteStep::coordinates).unwrap_or_default();
        let upcoming = self
            .upcoming_step()
            .map(RouteStep::coordinates)
            .unwrap_or_default();
        [prior, self.current_step().coordinates(), upcoming].concat()
    }
}

/// Where along the route the user is
#[derive(Clone, Debug)]
pub struct RouteProgress {
    route: Arc<Route>,
    leg_index: usize,
    current_leg_progress: RouteLegProgress,
}

impl RouteProgress {
    /// Start at the first step of the first leg
    pub fn new(route: Arc<Route>) -> Self {
        let current_leg_progress = RouteLegProgress::new(route.clone(), 0, AlertLevel::None);
        Self {
            route,
            leg_index: 0,
            current_leg_progress,
        }
    }

    /// Start at the first step of `leg_index` with an initial alert level
    pub fn with_leg(route: Arc<Route>, leg_index: usize, alert_level: AlertLevel) -> Result<Self> {
        if leg_index >= route.legs().len() {
            return Err(TrackingError::NoRemainingLegs);
        }
        let current_leg_progress = RouteLegProgress::new(route.clone(), leg_index, alert_level);
        Ok(Self {
            route,
            leg_index,
            current_leg_progress,
        })
    }

    #[inline]
    pub fn route(&self) -> &Arc<Route> {
        &self.route
    }

    #[inline]
    pub fn leg_index(&self) -> usize {
        self.leg_index
    }

    #[inline]
    pub fn current_leg(&self) -> &RouteLeg {
        &self.route.legs()[self.leg_index]
    }

    #[inline]
    pub fn current_leg_progress(&self) -> &RouteLegProgress {
        &self.current_leg_progress
    }

    pub(crate) fn current_leg_progress_mut(&mut self) -> &mut RouteLegProgress {
        &mut self.current_leg_progress
    }

    #[inline]
    pub fn is_final_leg(&self) -> bool {
        self.leg_index + 1 == self.route.legs().len()
    }

    /// Move to the first step of the next leg with the alert level reset
    pub(crate) fn advance_leg(&mut self) -> Result<()> {
        if self.is_final_leg() {
            return Err(TrackingError::NoRemainingLegs);
        }
        self.leg_index += 1;
        self.current_leg_progress =
            RouteLegProgress::new(self.route.clone(), self.leg_index, AlertLevel::None);
        Ok(())
    }

    /// Meters traveled along the whole route
    pub fn distance_traveled(&self) -> f64 {
        self.route.legs()[..self.leg_index]
            .iter()
            .map(RouteLeg::distance)
            .sum::<f64>()
            + self.current_leg_progress.distance_traveled()
    }

    pub fn distance_remaining(&self) -> f64 {
        (self.route.distance() - self.distance_traveled()).max(0.0)
    }

    /// Seconds remaining on the whole route
    pub fn duration_remaining(&self) -> f64 {
        self.route.legs()[self.leg_index + 1..]
            .iter()
            .map(RouteLeg::expected_travel_time)
            .sum::<f64>()
            + self.current_leg_progress.duration_remaining()
    }

    pub fn fraction_traveled(&self) -> f64 {
        fraction(self.distance_traveled(), self.route.distance())
    }

    /// Destinations of the current and following legs
    pub fn remaining_waypoints(&self) -> Vec<Coordinate> {
        self.route.legs()[self.leg_index..]
            .iter()
            .filter_map(RouteLeg::destination)
            .collect()
    }
}
