//! Queries over an ordered sequence of coordinates (a route or step shape)
//!
//! All path lengths are accumulated with [`haversine_distance`] and every
//! interpolated point is produced by [`destination`] using the bearing
//! between the adjacent vertices.

use crate::geometry::{Coordinate, destination, direction, haversine_distance, intersection};

/// A point lying on a polyline
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CoordinateAlongPolyline {
    /// The point on the polyline (a vertex or an interpolated point)
    pub coordinate: Coordinate,
    /// Index of the vertex at or immediately before `coordinate`
    pub index: usize,
    /// Distance in meters from the queried coordinate to `coordinate`
    pub distance: f64,
}

/// Closest point on `polyline` to `coordinate`, as the crow flies
///
/// For every segment the foot of the perpendicular is found by casting a
/// ray across the segment through `coordinate` and intersecting it with the
/// segment. Both endpoints and the foot are candidates; the global minimum
/// wins, with the earliest candidate kept on ties.
///
/// Returns `None` for an empty polyline. A single-point polyline yields
/// the point itself.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn closest_coordinate(
    polyline: &[Coordinate],
    coordinate: Coordinate,
) -> Option<CoordinateAlongPolyline> {
    let first = *polyline.first()?;
    if polyline.len() == 1 {
        return Some(CoordinateAlongPolyline {
            coordinate: first,
            index: 0,
            distance: haversine_distance(coordinate, first),
        });
    }

    let mut closest: Option<CoordinateAlongPolyline> = None;
    let mut consider = |candidate: CoordinateAlongPolyline| {
        if closest.is_none_or(|best| candidate.distance < best.distance) {
            closest = Some(candidate);
        }
    };

    for (index, pair) in polyline.windows(2).enumerate() {
        let (start, end) = (pair[0], pair[1]);
        let start_distance = haversine_distance(coordinate, start);
        let end_distance = haversine_distance(coordinate, end);

        consider(CoordinateAlongPolyline {
            coordinate: start,
            index,
            distance: start_distance,
        });
        consider(CoordinateAlongPolyline {
            coordinate: end,
            index: index + 1,
            distance: end_distance,
        });

        // The ray only has to reach past the segment, so its half-length is the
        // farther endpoint distance. Longer rays bend away from the planar
        // approximation used by `intersection`.
        let ray_length = start_distance.max(end_distance);
        if ray_length == 0.0 {
            continue;
        }
        let bearing = direction(start, end);
        let ray = (
            destination(coordinate, ray_length, bearing + 90.0),
            destination(coordinate, ray_length, bearing - 90.0),
        );
        if let Some(foot) = intersection(ray, (start, end)) {
            consider(CoordinateAlongPolyline {
                coordinate: foot,
                index,
                distance: haversine_distance(coordinate, foot),
            });
        }
    }

    closest
}

/// Sub-polyline between the projections of `from` and `to`
///
/// Missing endpoints default to the first and last vertices. The result
/// always starts and ends with the projected points, ordered along the
/// polyline.
pub fn polyline_slice(
    polyline: &[Coordinate],
    from: Option<Coordinate>,
    to: Option<Coordinate>,
) -> Vec<Coordinate> {
    let (Some(&first), Some(&last)) = (polyline.first(), polyline.last()) else {
        return Vec::new();
    };

    let start = from
        .and_then(|c| closest_coordinate(polyline, c))
        .unwrap_or(CoordinateAlongPolyline {
            coordinate: first,
            index: 0,
            distance: 0.0,
        });
    let end = to
        .and_then(|c| closest_coordinate(polyline, c))
        .unwrap_or(CoordinateAlongPolyline {
            coordinate: last,
            index: polyline.len() - 1,
            distance: 0.0,
        });
    let (start, end) = if start.index <= end.index {
        (start, end)
    } else {
        (end, start)
    };

    let mut coordinates = Vec::with_capacity(end.index - start.index + 2);
    coordinates.push(start.coordinate);
    if start.index < end.index {
        coordinates.extend_from_slice(&polyline[start.index + 1..=end.index]);
    }
    coordinates.push(end.coordinate);
    coordinates
}

/// Total haversine length of a polyline in meters
pub fn polyline_length(polyline: &[Coordinate]) -> f64 {
    polyline
        .windows(2)
        .map(|pair| haversine_distance(pair[0], pair[1]))
        .sum()
}

/// Path length in meters between the projections of `from` and `to`
///
/// Missing endpoints default to the polyline's first and last vertices.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn distance_along(
    polyline: &[Coordinate],
    from: Option<Coordinate>,
    to: Option<Coordinate>,
) -> f64 {
    if polyline.is_empty() {
        return 0.0;
    }
    polyline_length(&polyline_slice(polyline, from, to))
}

/// Point `distance` meters along the polyline from its first vertex
///
/// Distances at or below zero give the first vertex; distances beyond the
/// end give the last one.
pub fn coordinate_at_distance(polyline: &[Coordinate], distance: f64) -> Option<Coordinate> {
    let first = *polyline.first()?;
    if distance <= 0.0 {
        return Some(first);
    }

    let mut traveled = 0.0;
    for pair in polyline.windows(2) {
        let segment_length = haversine_distance(pair[0], pair[1]);
        if traveled + segment_length >= distance {
            let remainder = distance - traveled;
            return Some(destination(
                pair[0],
                remainder,
                direction(pair[0], pair[1]),
            ));
        }
        traveled += segment_length;
    }

    polyline.last().copied()
}

/// Portion of the polyline within `distance` meters of `coordinate`'s
/// closest point, walking forward for positive distances and backward for
/// negative ones
///
/// The walk stops with one interpolated vertex placed exactly at the limit.
/// If the path runs out first, the whole remaining path is returned without
/// an overshoot vertex. A zero distance or empty polyline gives an empty
/// result.
pub fn polyline_within(
    polyline: &[Coordinate],
    distance: f64,
    coordinate: Coordinate,
) -> Vec<Coordinate> {
    let Some(start) = closest_coordinate(polyline, coordinate) else {
        return Vec::new();
    };
    if distance == 0.0 {
        return Vec::new();
    }

    let limit = distance.abs();
    let mut vertices = vec![start.coordinate];
    let mut cumulative = 0.0;

    let mut add_vertex = |vertex: Coordinate| -> bool {
        let last = vertices[vertices.len() - 1];
        let increment = haversine_distance(last, vertex);
        if cumulative + increment <= limit {
            vertices.push(vertex);
            cumulative += increment;
            true
        } else {
            let remaining = limit - cumulative;
            vertices.push(destination(last, remaining, direction(last, vertex)));
            cumulative += remaining;
            false
        }
    };

    if distance > 0.0 {
        for &vertex in &polyline[(start.index + 1).min(polyline.len())..] {
            if !add_vertex(vertex) {
                break;
            }
        }
    } else {
        let behind = if polyline[start.index] == start.coordinate {
            &polyline[..start.index]
        } else {
            &polyline[..=start.index]
        };
        for &vertex in behind.iter().rev() {
            if !add_vertex(vertex) {
                break;
            }
        }
    }

    debug_assert!(cumulative <= limit + 1e-6);
    vertices
}

/// Whether `coordinate` lies strictly closer than `maximum_distance` meters to the polyline
///
/// An empty polyline has nothing to be away from, so it always counts as within.
pub fn is_within(coordinate: Coordinate, maximum_distance: f64, polyline: &[Coordinate]) -> bool {
    closest_coordinate(polyline, coordinate)
        .is_none_or(|closest| closest.distance < maximum_distance)
}
