//! Geodesic primitives on a spherical Earth
//!
//! Coordinates are stored in degrees and converted to radians for the
//! trigonometric work. Every function here is total: degenerate input
//! (coincident points, zero distances, parallel segments) yields a
//! well-defined sentinel instead of an error.

use geo::{Coord, Point};

/// Mean Earth radius in meters used by every distance and projection
pub const METERS_PER_RADIAN: f64 = 6_373_000.0;

/// A latitude/longitude pair in degrees
#[derive(Clone, Copy, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

/// The same point as [`Coordinate`], expressed in radians
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RadianCoordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    #[inline]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Both components are finite and inside the valid degree ranges
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Initial bearing in degrees [0, 360) from `self` towards `to`
    #[inline]
    pub fn direction(&self, to: &Coordinate) -> f64 {
        direction(*self, *to)
    }

    /// Coordinate reached after `distance` meters along `bearing` degrees
    #[inline]
    pub fn coordinate_at(&self, distance: f64, bearing: f64) -> Coordinate {
        destination(*self, distance, bearing)
    }

    /// Haversine distance in meters
    #[inline]
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        haversine_distance(*self, *other)
    }
}

impl From<Coordinate> for RadianCoordinate {
    fn from(coordinate: Coordinate) -> Self {
        Self {
            latitude: coordinate.latitude.to_radians(),
            longitude: coordinate.longitude.to_radians(),
        }
    }
}

impl From<RadianCoordinate> for Coordinate {
    fn from(radians: RadianCoordinate) -> Self {
        Self {
            latitude: radians.latitude.to_degrees(),
            longitude: radians.longitude.to_degrees(),
        }
    }
}

// geo uses x = longitude, y = latitude
impl From<Point<f64>> for Coordinate {
    fn from(point: Point<f64>) -> Self {
        Self::new(point.y(), point.x())
    }
}

impl From<Coordinate> for Point<f64> {
    fn from(coordinate: Coordinate) -> Self {
        Point::new(coordinate.longitude, coordinate.latitude)
    }
}

impl From<Coord<f64>> for Coordinate {
    fn from(coord: Coord<f64>) -> Self {
        Self::new(coord.y, coord.x)
    }
}

impl From<Coordinate> for Coord<f64> {
    fn from(coordinate: Coordinate) -> Self {
        Coord {
            x: coordinate.longitude,
            y: coordinate.latitude,
        }
    }
}

impl RadianCoordinate {
    /// Initial bearing in radians (-π, π]
    pub fn direction(&self, to: &RadianCoordinate) -> f64 {
        let a = (to.longitude - self.longitude).sin() * to.latitude.cos();
        let b = self.latitude.cos() * to.latitude.sin()
            - self.latitude.sin() * to.latitude.cos() * (to.longitude - self.longitude).cos();
        a.atan2(b)
    }

    /// Point at an angular `distance` (radians) along the great circle facing `direction` (radians)
    pub fn coordinate_at(&self, distance: f64, direction: f64) -> RadianCoordinate {
        let latitude = (self.latitude.sin() * distance.cos()
            + self.latitude.cos() * distance.sin() * direction.cos())
        .asin();
        let longitude = self.longitude
            + (direction.sin() * distance.sin() * self.latitude.cos())
                .atan2(distance.cos() - self.latitude.sin() * latitude.sin());
        RadianCoordinate {
            latitude,
            longitude,
        }
    }

    /// Central angle between two points (haversine formula)
    pub fn angular_distance(&self, other: &RadianCoordinate) -> f64 {
        let a = ((other.latitude - self.latitude) / 2.0).sin().powi(2)
            + ((other.longitude - self.longitude) / 2.0).sin().powi(2)
                * self.latitude.cos()
                * other.latitude.cos();
        2.0 * a.sqrt().atan2((1.0 - a).sqrt())
    }
}

/// Initial bearing in degrees [0, 360) from one coordinate to another
///
/// A coordinate's direction to itself is 0.
pub fn direction(from: Coordinate, to: Coordinate) -> f64 {
    if from == to {
        return 0.0;
    }
    let bearing = RadianCoordinate::from(from)
        .direction(&RadianCoordinate::from(to))
        .to_degrees();
    wrap(bearing, 0.0, 360.0)
}

/// Coordinate reached by travelling `distance` meters along the great circle
/// starting at `bearing` degrees
///
/// A zero distance returns `from` unchanged.
pub fn destination(from: Coordinate, distance: f64, bearing: f64) -> Coordinate {
    if distance == 0.0 {
        return from;
    }
    let reached = RadianCoordinate::from(from)
        .coordinate_at(distance / METERS_PER_RADIAN, bearing.to_radians());
    let mut coordinate = Coordinate::from(reached);
    coordinate.longitude = wrap(coordinate.longitude, -180.0, 180.0);
    coordinate
}

/// Haversine distance between two coordinates in meters
pub fn haversine_distance(a: Coordinate, b: Coordinate) -> f64 {
    RadianCoordinate::from(a).angular_distance(&RadianCoordinate::from(b)) * METERS_PER_RADIAN
}

/// Normalize `value` into the half-open range [min, max)
///
/// Handles negative values and values several periods away,
/// e.g. `wrap(-10.0, 0.0, 360.0) == 350.0` and `wrap(725.0, 0.0, 360.0) == 5.0`.
#[inline]
pub fn wrap(value: f64, min: f64, max: f64) -> f64 {
    let d = max - min;
    let wrapped = ((value - min) % d + d) % d + min;
    // (x % d + d) % d can round up to exactly d for tiny negative x
    if wrapped >= max { min } else { wrapped }
}

/// Smallest absolute angle in degrees [0, 180] between two bearings
#[inline]
pub fn difference_between_angles(alpha: f64, beta: f64) -> f64 {
    let phi = (beta - alpha).abs() % 360.0;
    if phi > 180.0 { 360.0 - phi } else { phi }
}

/// A finite line segment between two coordinates
pub type LineSegment = (Coordinate, Coordinate);

/// Intersection of two finite segments, treating latitude/longitude as planar
///
/// Returns `None` unless the crossing lies strictly inside both segments.
/// Parallel or degenerate segments never intersect.
pub fn intersection(line1: LineSegment, line2: LineSegment) -> Option<Coordinate> {
    let (a0, a1) = line1;
    let (b0, b1) = line2;

    let denominator = (b1.latitude - b0.latitude) * (a1.longitude - a0.longitude)
        - (b1.longitude - b0.longitude) * (a1.latitude - a0.latitude);
    if denominator == 0.0 || !denominator.is_finite() {
        return None;
    }

    let d_start_y = a0.latitude - b0.latitude;
    let d_start_x = a0.longitude - b0.longitude;
    let numerator1 =
        (b1.longitude - b0.longitude) * d_start_y - (b1.latitude - b0.latitude) * d_start_x;
    let numerator2 =
        (a1.longitude - a0.longitude) * d_start_y - (a1.latitude - a0.latitude) * d_start_x;
    let a = numerator1 / denominator;
    let b = numerator2 / denominator;

    let within_line1 = a > 0.0 && a < 1.0;
    let within_line2 = b > 0.0 && b < 1.0;
    if !(within_line1 && within_line2) {
        return None;
    }

    Some(Coordinate::new(
        a0.latitude + a * (a1.latitude - a0.latitude),
        a0.longitude + a * (a1.longitude - a0.longitude),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_coordinates() -> Vec<Coordinate> {
        vec![
            Coordinate::new(0.0, 0.0),
            Coordinate::new(51.5074, -0.1278),
            Coordinate::new(37.7749, -122.4194),
            Coordinate::new(-33.8688, 151.2093),
            Coordinate::new(64.1466, -21.9426),
        ]
    }

    #[test]
    fn test_self_direction_and_distance_are_zero() {
        for a in sample_coordinates() {
            assert_eq!(direction(a, a), 0.0);
            assert_eq!(haversine_distance(a, a), 0.0);
        }
    }

    #[test]
    fn test_destination_zero_distance_is_identity() {
        let a = Coordinate::new(51.5074, -0.1278);
        assert_eq!(destination(a, 0.0, 123.0), a);
    }

    #[test]
    fn test_destination_roundtrip() {
        let a = Coordinate::new(51.5074, -0.1278);
        let targets = [
            Coordinate::new(51.5174, -0.1278),
            Coordinate::new(51.4974, -0.1078),
            Coordinate::new(51.6, -0.3),
            Coordinate::new(51.2, 0.2),
        ];
        for b in targets {
            let reached = destination(a, haversine_distance(a, b), direction(a, b));
            assert!(
                haversine_distance(reached, b) < 0.5,
                "roundtrip missed {b:?} by {}",
                haversine_distance(reached, b)
            );
        }
    }

    #[test]
    fn test_direction_cardinal() {
        let origin = Coordinate::new(0.0, 0.0);
        assert!((direction(origin, Coordinate::new(1.0, 0.0)) - 0.0).abs() < 1e-9);
        assert!((direction(origin, Coordinate::new(0.0, 1.0)) - 90.0).abs() < 1e-9);
        assert!((direction(origin, Coordinate::new(-1.0, 0.0)) - 180.0).abs() < 1e-9);
        assert!((direction(origin, Coordinate::new(0.0, -1.0)) - 270.0).abs() < 1e-9);
    }

    #[test]
    fn test_haversine_one_degree_latitude() {
        let d = haversine_distance(Coordinate::new(0.0, 0.0), Coordinate::new(1.0, 0.0));
        let expected = METERS_PER_RADIAN * std::f64::consts::PI / 180.0;
        assert!((d - expected).abs() < 1e-6);
    }

    #[test]
    fn test_wrap() {
        assert_eq!(wrap(-10.0, 0.0, 360.0), 350.0);
        assert_eq!(wrap(725.0, 0.0, 360.0), 5.0);
        assert_eq!(wrap(360.0, 0.0, 360.0), 0.0);
        assert_eq!(wrap(0.0, 0.0, 360.0), 0.0);
        assert_eq!(wrap(190.0, -180.0, 180.0), -170.0);
        for x in [-1e6, -721.5, -0.0001, 0.5, 359.9999, 1e9] {
            let w = wrap(x, 0.0, 360.0);
            assert!((0.0..360.0).contains(&w), "wrap({x}) = {w}");
        }
    }

    #[test]
    fn test_difference_between_angles() {
        assert_eq!(difference_between_angles(359.0, 1.0), 2.0);
        assert_eq!(difference_between_angles(90.0, 270.0), 180.0);
        assert_eq!(difference_between_angles(10.0, 40.0), 30.0);
        assert_eq!(difference_between_angles(-10.0, 10.0), 20.0);
    }

    #[test]
    fn test_intersection_crossing() {
        let line1 = (Coordinate::new(-1.0, 0.0), Coordinate::new(1.0, 0.0));
        let line2 = (Coordinate::new(0.0, -1.0), Coordinate::new(0.0, 1.0));
        let crossing = intersection(line1, line2).unwrap();
        assert!(crossing.latitude.abs() < 1e-12);
        assert!(crossing.longitude.abs() < 1e-12);
    }

    #[test]
    fn test_intersection_outside_segments() {
        let line1 = (Coordinate::new(1.0, 0.0), Coordinate::new(2.0, 0.0));
        let line2 = (Coordinate::new(0.0, -1.0), Coordinate::new(0.0, 1.0));
        assert!(intersection(line1, line2).is_none());
    }

    #[test]
    fn test_intersection_parallel_and_degenerate() {
        let line1 = (Coordinate::new(0.0, 0.0), Coordinate::new(1.0, 0.0));
        let line2 = (Coordinate::new(0.0, 1.0), Coordinate::new(1.0, 1.0));
        assert!(intersection(line1, line2).is_none());

        let point = Coordinate::new(0.5, 0.5);
        assert!(intersection(line1, (point, point)).is_none());
    }

    #[test]
    fn test_geo_conversions() {
        let c = Coordinate::new(51.5, -0.12);
        let p: Point<f64> = c.into();
        assert_eq!(p.x(), -0.12);
        assert_eq!(p.y(), 51.5);
        assert_eq!(Coordinate::from(p), c);
        let coord: Coord<f64> = c.into();
        assert_eq!(Coordinate::from(coord), c);
    }

    #[test]
    fn test_is_valid() {
        assert!(Coordinate::new(45.0, 90.0).is_valid());
        assert!(!Coordinate::new(91.0, 0.0).is_valid());
        assert!(!Coordinate::new(0.0, f64::NAN).is_valid());
    }
}
