//! Route model: a route is an ordered list of legs, a leg an ordered list of steps
//!
//! Routes are immutable once built and are shared behind an [`Arc`] between
//! the tracking engine and every progress snapshot it hands out.

use crate::geometry::{Coordinate, difference_between_angles, direction, wrap};
use crate::polyline::polyline_length;
use crate::{Result, TrackingError};
use geo::LineString;
use rayon::prelude::*;
use std::sync::Arc;

/// Bearing change in degrees above which a vertex starts a new step
const MINIMUM_TURN_ANGLE: f64 = 25.0;

/// Kind of maneuver performed at the start of a step
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ManeuverType {
    Depart,
    Turn,
    Continue,
    Merge,
    Fork,
    Roundabout,
    Arrive,
}

/// Direction of the maneuver relative to the approach heading
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ManeuverDirection {
    Straight,
    SlightLeft,
    Left,
    SharpLeft,
    SlightRight,
    Right,
    SharpRight,
    UTurn,
}

impl ManeuverDirection {
    /// Classify a signed turn angle in degrees (positive = right)
    pub fn from_turn_angle(angle: f64) -> Self {
        let angle = wrap(angle, -180.0, 180.0);
        let magnitude = angle.abs();
        if magnitude > 170.0 {
            Self::UTurn
        } else if magnitude > 120.0 {
            if angle > 0.0 { Self::SharpRight } else { Self::SharpLeft }
        } else if magnitude > 60.0 {
            if angle > 0.0 { Self::Right } else { Self::Left }
        } else if magnitude > 20.0 {
            if angle > 0.0 { Self::SlightRight } else { Self::SlightLeft }
        } else {
            Self::Straight
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Self::Straight => "continue straight",
            Self::SlightLeft => "bear left",
            Self::Left => "turn left",
            Self::SharpLeft => "turn sharp left",
            Self::SlightRight => "bear right",
            Self::Right => "turn right",
            Self::SharpRight => "turn sharp right",
            Self::UTurn => "make a U-turn",
        }
    }
}

/// The smallest routable unit: one maneuver followed by the path to the next one
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RouteStep {
    coordinates: Vec<Coordinate>,
    distance: f64,
    expected_travel_time: f64,
    maneuver_location: Coordinate,
    maneuver_type: ManeuverType,
    maneuver_direction: Option<ManeuverDirection>,
    initial_heading: Option<f64>,
    final_heading: Option<f64>,
    instructions: String,
}

impl RouteStep {
    /// Create a step from its shape
    ///
    /// The maneuver location is the first coordinate, the distance is the
    /// haversine length of the shape and the final heading is the bearing of
    /// the first non-degenerate segment. Use the `with_*` builders to
    /// override them with values supplied by a routing service.
    pub fn new(coordinates: Vec<Coordinate>, maneuver_type: ManeuverType) -> Self {
        let distance = polyline_length(&coordinates);
        let maneuver_location = coordinates.first().copied().unwrap_or_default();
        let final_heading = match maneuver_type {
            ManeuverType::Arrive => None,
            _ => coordinates
                .windows(2)
                .find(|pair| pair[0] != pair[1])
                .map(|pair| direction(pair[0], pair[1])),
        };
        Self {
            coordinates,
            distance,
            expected_travel_time: 0.0,
            maneuver_location,
            maneuver_type,
            maneuver_direction: None,
            initial_heading: None,
            final_heading,
            instructions: String::new(),
        }
    }

    pub fn with_distance(mut self, distance: f64) -> Self {
        self.distance = distance;
        self
    }

    pub fn with_expected_travel_time(mut self, seconds: f64) -> Self {
        self.expected_travel_time = seconds;
        self
    }

    pub fn with_maneuver_location(mut self, location: Coordinate) -> Self {
        self.maneuver_location = location;
        self
    }

    pub fn with_maneuver_direction(mut self, maneuver_direction: ManeuverDirection) -> Self {
        self.maneuver_direction = Some(maneuver_direction);
        self
    }

    pub fn with_initial_heading(mut self, heading: Option<f64>) -> Self {
        self.initial_heading = heading;
        self
    }

    pub fn with_final_heading(mut self, heading: Option<f64>) -> Self {
        self.final_heading = heading;
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    /// Shape of the step
    #[inline]
    pub fn coordinates(&self) -> &[Coordinate] {
        &self.coordinates
    }

    /// Length of the step in meters
    #[inline]
    pub fn distance(&self) -> f64 {
        self.distance
    }

    /// Expected travel time in seconds
    #[inline]
    pub fn expected_travel_time(&self) -> f64 {
        self.expected_travel_time
    }

    #[inline]
    pub fn maneuver_location(&self) -> Coordinate {
        self.maneuver_location
    }

    #[inline]
    pub fn maneuver_type(&self) -> ManeuverType {
        self.maneuver_type
    }

    #[inline]
    pub fn maneuver_direction(&self) -> Option<ManeuverDirection> {
        self.maneuver_direction
    }

    /// Heading in degrees when approaching the maneuver
    #[inline]
    pub fn initial_heading(&self) -> Option<f64> {
        self.initial_heading
    }

    /// Heading in degrees right after completing the maneuver
    #[inline]
    pub fn final_heading(&self) -> Option<f64> {
        self.final_heading
    }

    #[inline]
    pub fn instructions(&self) -> &str {
        &self.instructions
    }
}

/// The part of a route between two consecutive waypoints
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RouteLeg {
    name: Option<String>,
    steps: Vec<RouteStep>,
}

impl RouteLeg {
    pub fn new(steps: Vec<RouteStep>) -> Self {
        Self { name: None, steps }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Split a raw path into steps
    ///
    /// A new step starts at every vertex where the path bends by more than
    /// a few tens of degrees. The first step departs, the last one is a
    /// zero-length arrival at the final coordinate. Expected travel times
    /// assume a constant `nominal_speed` in m/s.
    ///
    /// Consecutive duplicate coordinates are dropped first; fewer than two
    /// distinct coordinates produce an empty leg.
    pub fn from_coordinates(coordinates: &[Coordinate], nominal_speed: f64) -> Self {
        let mut path: Vec<Coordinate> = Vec::with_capacity(coordinates.len());
        for &coordinate in coordinates {
            if path.last() != Some(&coordinate) {
                path.push(coordinate);
            }
        }
        if path.len() < 2 {
            return Self::new(Vec::new());
        }

        let travel_time = |distance: f64| {
            if nominal_speed > 0.0 {
                distance / nominal_speed
            } else {
                0.0
            }
        };

        let mut steps = Vec::new();
        let mut step_start = 0;
        let mut approach: Option<(f64, ManeuverDirection)> = None;

        for vertex in 1..path.len() {
            let is_last = vertex == path.len() - 1;
            let turn = if is_last {
                None
            } else {
                let incoming = direction(path[vertex - 1], path[vertex]);
                let outgoing = direction(path[vertex], path[vertex + 1]);
                (difference_between_angles(incoming, outgoing) > MINIMUM_TURN_ANGLE)
                    .then_some((incoming, outgoing))
            };
            if !is_last && turn.is_none() {
                continue;
            }

            let shape = path[step_start..=vertex].to_vec();
            let (maneuver_type, instructions) = match approach {
                None => (ManeuverType::Depart, "Depart".to_string()),
                Some((_, maneuver_direction)) => {
                    let text = maneuver_direction.describe();
                    let mut chars = text.chars();
                    let capitalized = chars
                        .next()
                        .map(|c| c.to_uppercase().collect::<String>() + chars.as_str())
                        .unwrap_or_default();
                    (ManeuverType::Turn, capitalized)
                }
            };
            let mut step = RouteStep::new(shape, maneuver_type).with_instructions(instructions);
            if let Some((incoming, maneuver_direction)) = approach {
                step = step
                    .with_initial_heading(Some(incoming))
                    .with_maneuver_direction(maneuver_direction);
            }
            let expected_travel_time = travel_time(step.distance());
            steps.push(step.with_expected_travel_time(expected_travel_time));

            approach = turn.map(|(incoming, outgoing)| {
                (
                    incoming,
                    ManeuverDirection::from_turn_angle(outgoing - incoming),
                )
            });
            step_start = vertex;
        }

        let destination = path[path.len() - 1];
        let arrival_heading = direction(path[path.len() - 2], destination);
        steps.push(
            RouteStep::new(vec![destination, destination], ManeuverType::Arrive)
                .with_initial_heading(Some(arrival_heading))
                .with_instructions("You have arrived at your destination"),
        );

        Self::new(steps)
    }

    /// Build a leg from a `geo` line string (x = longitude, y = latitude)
    pub fn from_line_string(line: &LineString<f64>, nominal_speed: f64) -> Self {
        let coordinates: Vec<Coordinate> = line.coords().copied().map(Coordinate::from).collect();
        Self::from_coordinates(&coordinates, nominal_speed)
    }

    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[inline]
    pub fn steps(&self) -> &[RouteStep] {
        &self.steps
    }

    /// Total leg length in meters
    pub fn distance(&self) -> f64 {
        self.steps.iter().map(RouteStep::distance).sum()
    }

    /// Total expected travel time in seconds
    pub fn expected_travel_time(&self) -> f64 {
        self.steps.iter().map(RouteStep::expected_travel_time).sum()
    }

    /// Waypoint the leg ends at
    pub fn destination(&self) -> Option<Coordinate> {
        self.steps
            .last()
            .and_then(|step| step.coordinates().last().copied())
    }
}

/// A complete route produced by a routing collaborator
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Route {
    legs: Vec<RouteLeg>,
    /// Cached total distance in meters (computed once during construction)
    cached_distance: f64,
    /// Cached expected travel time in seconds (computed once during construction)
    cached_expected_travel_time: f64,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl Route {
    /// Create a new route from its legs
    ///
    /// # Returns
    /// An `Arc<Route>` on success, or an error when the route has no legs,
    /// a leg has no steps, or a step has no shape.
    pub fn new(legs: Vec<RouteLeg>) -> Result<Arc<Self>> {
        let cached_distance = legs.iter().map(RouteLeg::distance).sum();
        let cached_expected_travel_time = legs.iter().map(RouteLeg::expected_travel_time).sum();
        let route = Route {
            legs,
            cached_distance,
            cached_expected_travel_time,
        };
        route.validate()?;
        Ok(Arc::new(route))
    }

    /// Skip validation; lets tests hand malformed routes to the tracker
    #[cfg(test)]
    pub(crate) fn new_unchecked(legs: Vec<RouteLeg>) -> Arc<Self> {
        Arc::new(Route {
            legs,
            cached_distance: 0.0,
            cached_expected_travel_time: 0.0,
        })
    }

    /// Check the structural preconditions of tracking: at least one leg,
    /// at least one step per leg and a non-empty shape for every step
    pub fn validate(&self) -> Result<()> {
        if self.legs.is_empty() {
            return Err(TrackingError::EmptyRoute);
        }
        for (leg_index, leg) in self.legs.iter().enumerate() {
            if leg.steps.is_empty() {
                return Err(TrackingError::EmptyLeg { leg_index });
            }
            if let Some(step_index) = leg
                .steps
                .iter()
                .position(|step| step.coordinates.is_empty())
            {
                return Err(TrackingError::MissingStepShape {
                    leg_index,
                    step_index,
                });
            }
        }
        Ok(())
    }

    /// Build a route from GPX data
    ///
    /// Every `<rte>` becomes one leg; legs are segmented in parallel. When
    /// the file has no routes, each `<trk>` (segments concatenated) becomes
    /// a leg instead. Paths that cannot form a leg are skipped with a warning.
    pub fn from_gpx(gpx: &gpx::Gpx, nominal_speed: f64) -> Result<Arc<Self>> {
        let paths: Vec<(Option<String>, Vec<Coordinate>)> = if !gpx.routes.is_empty() {
            gpx.routes
                .iter()
                .map(|route| {
                    let coordinates = route
                        .points
                        .iter()
                        .map(|waypoint| Coordinate::from(waypoint.point()))
                        .collect();
                    (route.name.clone(), coordinates)
                })
                .collect()
        } else {
            gpx.tracks
                .iter()
                .map(|track| {
                    let coordinates = track
                        .segments
                        .iter()
                        .flat_map(|segment| segment.points.iter())
                        .map(|waypoint| Coordinate::from(waypoint.point()))
                        .collect();
                    (track.name.clone(), coordinates)
                })
                .collect()
        };

        let legs: Vec<RouteLeg> = paths
            .into_par_iter()
            .enumerate()
            .filter_map(|(index, (name, coordinates))| {
                let leg = RouteLeg::from_coordinates(&coordinates, nominal_speed);
                if leg.steps.is_empty() {
                    tracing::warn!(
                        "Skipping GPX path {} with fewer than two distinct points",
                        index
                    );
                    return None;
                }
                Some(match name {
                    Some(name) => leg.with_name(name),
                    None => leg,
                })
            })
            .collect();

        Self::new(legs)
    }

    /// Parse GPX from a reader and build a route from it
    pub fn read_gpx<R: std::io::Read>(reader: R, nominal_speed: f64) -> Result<Arc<Self>> {
        let gpx = gpx::read(reader)?;
        Self::from_gpx(&gpx, nominal_speed)
    }

    #[inline]
    pub fn legs(&self) -> &[RouteLeg] {
        &self.legs
    }

    /// Total route length in meters
    ///
    /// This is O(1) as the value is cached during construction.
    #[inline]
    pub fn distance(&self) -> f64 {
        self.cached_distance
    }

    /// Total expected travel time in seconds
    ///
    /// This is O(1) as the value is cached during construction.
    #[inline]
    pub fn expected_travel_time(&self) -> f64 {
        self.cached_expected_travel_time
    }

    /// Every step shape joined into one path, without repeated joints
    pub fn coordinates(&self) -> Vec<Coordinate> {
        let mut coordinates: Vec<Coordinate> = Vec::new();
        for step in self.legs.iter().flat_map(|leg| leg.steps.iter()) {
            for &coordinate in &step.coordinates {
                if coordinates.last() != Some(&coordinate) {
                    coordinates.push(coordinate);
                }
            }
        }
        coordinates
    }

    /// Get a specific step by leg and step indices
    #[inline]
    pub fn get_step(&self, leg_index: usize, step_index: usize) -> Option<&RouteStep> {
        self.legs.get(leg_index)?.steps.get(step_index)
    }
}
