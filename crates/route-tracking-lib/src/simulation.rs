//! Synthetic location fixes along a path
//!
//! Turns a polyline into the fixes a vehicle driving along it would report:
//! full speed on straights, slowing down for sharp turns, with points
//! inserted so consecutive fixes are close together in time.

use crate::controller::Location;
use crate::geometry::{Coordinate, difference_between_angles, direction, haversine_distance, wrap};
use std::time::{Duration, SystemTime};

/// Speed in m/s on a straight path (~108 km/h)
const MAXIMUM_SPEED: f64 = 30.0;
/// Speed in m/s at a turn of `MAXIMUM_TURN_PENALTY` degrees or more (~18 km/h)
const MINIMUM_SPEED: f64 = 5.0;
const MAXIMUM_TURN_PENALTY: f64 = 90.0;
const MINIMUM_TURN_PENALTY: f64 = 0.0;
/// Spacing in meters of interpolated fixes
const INTERPOLATION_STEP: f64 = (MAXIMUM_SPEED - MINIMUM_SPEED) / 2.0;

#[derive(Clone, Copy, Debug, PartialEq)]
struct SimulatedFix {
    coordinate: Coordinate,
    course: f64,
    turn_penalty: f64,
}

impl SimulatedFix {
    /// Speed scaled linearly from the maximum (no turn) to the minimum (sharpest turn)
    fn speed(&self) -> f64 {
        let reversed_penalty = MAXIMUM_TURN_PENALTY - self.turn_penalty;
        (MAXIMUM_SPEED - MINIMUM_SPEED) * (reversed_penalty - MINIMUM_TURN_PENALTY)
            / (MAXIMUM_TURN_PENALTY - MINIMUM_TURN_PENALTY)
            + MINIMUM_SPEED
    }
}

fn course(from: Coordinate, to: Coordinate) -> f64 {
    wrap(direction(from, to).floor(), 0.0, 360.0)
}

/// A drive along a polyline, precomputed as a list of fixes
#[derive(Clone, Debug)]
pub struct SimulatedRoute {
    polyline: Vec<Coordinate>,
    fixes: Vec<SimulatedFix>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl SimulatedRoute {
    /// Simulate a drive along `polyline`
    ///
    /// Returns `None` for fewer than three coordinates.
    pub fn new(polyline: &[Coordinate]) -> Option<Self> {
        if polyline.len() < 3 {
            return None;
        }
        let fixes = Self::interpolated(&Self::with_turn_penalties(polyline));
        tracing::debug!(
            "Simulating {} fixes along {} coordinates",
            fixes.len(),
            polyline.len()
        );
        Some(Self {
            polyline: polyline.to_vec(),
            fixes,
        })
    }

    /// One fix per vertex, penalized by how sharply the path bends there
    fn with_turn_penalties(polyline: &[Coordinate]) -> Vec<SimulatedFix> {
        let mut fixes: Vec<SimulatedFix> = Vec::with_capacity(polyline.len());
        for (index, pair) in polyline.windows(2).enumerate() {
            let (coordinate, next) = (pair[0], pair[1]);
            let outgoing = direction(coordinate, next);
            let turn_penalty = match index.checked_sub(1).map(|previous| polyline[previous]) {
                Some(previous) => {
                    difference_between_angles(direction(previous, coordinate), outgoing).floor()
                }
                None => MINIMUM_TURN_PENALTY,
            };
            fixes.push(SimulatedFix {
                coordinate,
                course: course(coordinate, next),
                turn_penalty: turn_penalty.clamp(MINIMUM_TURN_PENALTY, MAXIMUM_TURN_PENALTY),
            });
        }

        let last_course = fixes.last().map(|fix| fix.course).unwrap_or_default();
        if let Some(&last) = polyline.last() {
            fixes.push(SimulatedFix {
                coordinate: last,
                course: last_course,
                turn_penalty: MINIMUM_TURN_PENALTY,
            });
        }
        fixes
    }

    /// Fill gaps so no two consecutive fixes are more than one interpolation step apart
    fn interpolated(fixes: &[SimulatedFix]) -> Vec<SimulatedFix> {
        let mut result = Vec::with_capacity(fixes.len());
        for pair in fixes.windows(2) {
            let (fix, next) = (pair[0], pair[1]);
            result.push(fix);

            let mut current = fix.coordinate;
            while haversine_distance(current, next.coordinate).floor() / INTERPOLATION_STEP > 1.0 {
                current = current.coordinate_at(INTERPOLATION_STEP, direction(current, next.coordinate));
                result.push(SimulatedFix {
                    coordinate: current,
                    course: course(current, next.coordinate),
                    turn_penalty: MINIMUM_TURN_PENALTY,
                });
            }
        }
        if let Some(&last) = fixes.last() {
            result.push(last);
        }
        result
    }

    #[inline]
    pub fn polyline(&self) -> &[Coordinate] {
        &self.polyline
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.fixes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fixes.is_empty()
    }

    /// The simulated fixes, the first one stamped at `start`
    ///
    /// Each following fix is stamped after the time needed to cover the gap
    /// from the previous one at its own speed.
    pub fn locations(&self, start: SystemTime) -> Vec<Location> {
        let mut elapsed = 0.0;
        let mut previous: Option<Coordinate> = None;
        self.fixes
            .iter()
            .map(|fix| {
                let speed = fix.speed();
                if let Some(previous) = previous {
                    elapsed += haversine_distance(previous, fix.coordinate) / speed;
                }
                previous = Some(fix.coordinate);
                Location::new(
                    fix.coordinate,
                    speed,
                    fix.course,
                    start + Duration::from_secs_f64(elapsed),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrackerConfig;
    use crate::controller::{ControllerState, RouteController, RouteControllerEvent};
    use crate::progress::AlertLevel;
    use crate::route::{Route, RouteLeg};
    use std::time::UNIX_EPOCH;

    fn l_shaped_path() -> Vec<Coordinate> {
        let start = Coordinate::new(48.85, 2.35);
        let corner = start.coordinate_at(500.0, 0.0);
        let end = corner.coordinate_at(500.0, 90.0);
        vec![start, corner, end]
    }

    #[test]
    fn test_needs_three_coordinates() {
        let path = l_shaped_path();
        assert!(SimulatedRoute::new(&path[..2]).is_none());
        assert!(SimulatedRoute::new(&[]).is_none());
        let simulated = SimulatedRoute::new(&path).unwrap();
        assert_eq!(simulated.polyline(), path.as_slice());
        assert!(!simulated.is_empty());
    }

    #[test]
    fn test_fixes_are_densely_spaced() {
        let simulated = SimulatedRoute::new(&l_shaped_path()).unwrap();
        let locations = simulated.locations(UNIX_EPOCH);
        assert_eq!(locations.len(), simulated.len());
        // 1000 m at one fix every ~12.5 m
        assert!(locations.len() >= 80);

        for pair in locations.windows(2) {
            let gap = haversine_distance(pair[0].coordinate, pair[1].coordinate);
            assert!(gap < INTERPOLATION_STEP + 1.0, "gap was {gap}");
        }
        assert_eq!(locations.first().unwrap().coordinate, l_shaped_path()[0]);
        assert_eq!(locations.last().unwrap().coordinate, l_shaped_path()[2]);
    }

    #[test]
    fn test_speed_drops_at_turns() {
        let path = l_shaped_path();
        let locations = SimulatedRoute::new(&path).unwrap().locations(UNIX_EPOCH);

        let corner = locations
            .iter()
            .find(|location| location.coordinate == path[1])
            .unwrap();
        assert!(corner.speed < MINIMUM_SPEED + 1.0, "speed was {}", corner.speed);
        assert!((corner.course - 89.0).abs() <= 1.0);

        assert_eq!(locations[0].speed, MAXIMUM_SPEED);
        assert!(difference_between_angles(locations[0].course, 0.0) <= 1.0);
        for location in &locations {
            assert!((MINIMUM_SPEED..=MAXIMUM_SPEED).contains(&location.speed));
            assert!((0.0..360.0).contains(&location.course));
        }
    }

    #[test]
    fn test_timestamps_follow_distance_over_speed() {
        let locations = SimulatedRoute::new(&l_shaped_path())
            .unwrap()
            .locations(UNIX_EPOCH);
        assert_eq!(locations[0].timestamp, UNIX_EPOCH);

        for pair in locations.windows(2) {
            let elapsed = pair[1]
                .timestamp
                .duration_since(pair[0].timestamp)
                .unwrap()
                .as_secs_f64();
            let expected = haversine_distance(pair[0].coordinate, pair[1].coordinate) / pair[1].speed;
            assert!((elapsed - expected).abs() < 1e-3);
        }
    }

    #[test]
    fn test_simulated_drive_reaches_arrival() {
        let path = l_shaped_path();
        let route = Route::new(vec![RouteLeg::from_coordinates(&path, 20.0)]).unwrap();
        let mut reroutes = 0;
        let mut controller = RouteController::new(
            route,
            TrackerConfig::default(),
            |event: RouteControllerEvent| {
                if matches!(event, RouteControllerEvent::ShouldReroute { .. }) {
                    reroutes += 1;
                }
            },
        )
        .unwrap();

        let mut reached_turn = false;
        for location in SimulatedRoute::new(&path).unwrap().locations(UNIX_EPOCH) {
            controller.update(location).unwrap();
            reached_turn |= controller.route_progress().current_leg_progress().step_index() == 1;
        }

        assert!(reached_turn);
        assert_eq!(
            controller.route_progress().current_leg_progress().alert_level(),
            AlertLevel::Arrive
        );
        assert_eq!(controller.state(), ControllerState::Suspended);
        drop(controller);
        assert_eq!(reroutes, 0);
    }
}
