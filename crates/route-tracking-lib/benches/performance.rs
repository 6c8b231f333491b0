//! Performance benchmarks for route-tracking-lib
//!
//! Run with: cargo bench --package route-tracking-lib

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use geo::Point;
use gpx::{Gpx, Waypoint};
use route_tracking_lib::polyline::{closest_coordinate, distance_along};
use route_tracking_lib::{
    Coordinate, Route, RouteController, RouteControllerEvent, RouteLeg, SimulatedRoute,
    TrackerConfig,
};
use std::hint::black_box;
use std::time::UNIX_EPOCH;

/// Generate a realistic winding path with the specified number of points.
fn generate_path(num_points: usize, base_lat: f64, base_lon: f64) -> Vec<Coordinate> {
    (0..num_points)
        .map(|i| {
            let t = i as f64 / num_points as f64;
            let lat = base_lat + t * 0.1 + (t * 50.0).sin() * 0.001;
            let lon = base_lon + t * 0.1 + (t * 30.0).cos() * 0.001;
            Coordinate::new(lat, lon)
        })
        .collect()
}

/// A path of straight blocks joined by right-angle turns
fn generate_city_path(blocks: usize, base_lat: f64, base_lon: f64) -> Vec<Coordinate> {
    let mut path = vec![Coordinate::new(base_lat, base_lon)];
    for i in 0..blocks {
        let bearing = if i % 2 == 0 { 0.0 } else { 90.0 };
        let last = path[path.len() - 1];
        path.push(last.coordinate_at(400.0, bearing));
    }
    path
}

/// Generate a GPX file with one `<rte>` per leg
fn generate_gpx_routes(num_routes: usize, points_per_route: usize) -> Gpx {
    let mut gpx = Gpx::default();
    for i in 0..num_routes {
        let mut route = gpx::Route::default();
        for c in generate_path(points_per_route, 51.5 + i as f64 * 0.1, -0.1) {
            route
                .points
                .push(Waypoint::new(Point::new(c.longitude, c.latitude)));
        }
        gpx.routes.push(route);
    }
    gpx
}

// ============================================================================
// Core Benchmarks - Key performance indicators
// ============================================================================

fn bench_polyline_queries(c: &mut Criterion) {
    let mut group = c.benchmark_group("polyline");

    for num_points in [100, 1_000, 10_000] {
        let path = generate_path(num_points, 51.5, -0.1);
        let query = Coordinate::new(51.55, -0.05);

        group.throughput(Throughput::Elements(num_points as u64));
        group.bench_with_input(
            BenchmarkId::new("closest_coordinate", num_points),
            &path,
            |b, path| b.iter(|| closest_coordinate(black_box(path), black_box(query))),
        );
        group.bench_with_input(
            BenchmarkId::new("distance_along", num_points),
            &path,
            |b, path| b.iter(|| distance_along(black_box(path), Some(query), None)),
        );
    }

    group.finish();
}

fn bench_controller_updates(c: &mut Criterion) {
    let mut group = c.benchmark_group("controller");
    group.sample_size(20);

    // 20 blocks of 400 m, driven end to end
    let path = generate_city_path(20, 51.5, -0.1);
    let route = Route::new(vec![RouteLeg::from_coordinates(&path, 13.0)]).unwrap();
    let locations = SimulatedRoute::new(&path).unwrap().locations(UNIX_EPOCH);

    group.throughput(Throughput::Elements(locations.len() as u64));
    group.bench_function("simulated_drive_8km", |b| {
        b.iter(|| {
            let mut controller = RouteController::new(
                route.clone(),
                TrackerConfig::default(),
                |event: RouteControllerEvent| {
                    black_box(event);
                },
            )
            .unwrap();
            for location in &locations {
                controller.update(*location).unwrap();
            }
        });
    });

    group.finish();
}

fn bench_construction(c: &mut Criterion) {
    let mut group = c.benchmark_group("construction");
    group.sample_size(20);

    // Parallel leg segmentation benchmark
    let gpx = generate_gpx_routes(50, 1_000);
    let total_points = 50 * 1_000;

    group.throughput(Throughput::Elements(total_points as u64));
    group.bench_function("from_gpx_50x1k", |b| {
        b.iter(|| Route::from_gpx(black_box(&gpx), 13.0).unwrap());
    });

    group.finish();
}

// ============================================================================
// Criterion Configuration
// ============================================================================

criterion_group!(
    benches,
    bench_polyline_queries,
    bench_controller_updates,
    bench_construction,
);

criterion_main!(benches);
