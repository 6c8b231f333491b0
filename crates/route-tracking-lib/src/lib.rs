//! Route Tracking Library - Turn-by-turn progress along a precomputed route
//!
//! This library follows a user along a route made of legs and steps, one
//! location fix at a time. It decides how far along the current step the
//! user is, when an announcement should be made, when a maneuver has been
//! completed and when the user has left the route.
//!
//! # Architecture
//!
//! - **[`geometry`]**: Spherical-earth primitives (distance, bearing, destination, intersection)
//! - **[`polyline`]**: Closest point, slicing and length queries over coordinate sequences
//! - **[`Route`]**: Immutable legs and steps, buildable from raw paths or GPX
//! - **[`RouteProgress`]**: Route, leg and step progress with derived aggregates
//! - **[`RouteController`]**: The per-fix state machine emitting [`RouteControllerEvent`]s
//! - **[`TrackingSession`]**: A tokio task that feeds a controller from a command queue
//! - **[`SimulatedRoute`]**: Synthetic fixes along a path for demos and tests
//!
//! # Performance Characteristics
//!
//! - **Per fix**: O(S) where S = vertices of the current step shape
//! - **Snapshots**: O(1); the route is shared behind an `Arc`

mod config;
mod controller;
pub mod geometry;
pub mod polyline;
mod progress;
mod route;
mod session;
mod simulation;

// Public API exports
pub use config::{TrackerConfig, TravelProfile};
pub use controller::{
    ControllerState, EventSink, FixOutcome, Location, RouteController, RouteControllerEvent,
};
pub use geometry::Coordinate;
pub use polyline::CoordinateAlongPolyline;
pub use progress::{AlertLevel, ManeuverZone, RouteLegProgress, RouteProgress, RouteStepProgress};
pub use route::{ManeuverDirection, ManeuverType, Route, RouteLeg, RouteStep};
pub use session::{SessionCommand, TrackingSession};
pub use simulation::SimulatedRoute;

/// Error types for route tracking
#[derive(Debug, thiserror::Error)]
pub enum TrackingError {
    #[error("Route has no legs")]
    EmptyRoute,

    #[error("Leg {leg_index} has no steps")]
    EmptyLeg { leg_index: usize },

    #[error("Step {step_index} of leg {leg_index} has no coordinates")]
    MissingStepShape { leg_index: usize, step_index: usize },

    #[error("Step {step_index} is out of range for leg {leg_index}")]
    StepOutOfRange { leg_index: usize, step_index: usize },

    #[error("No legs remaining on the route")]
    NoRemainingLegs,

    #[error("Invalid location: {0}")]
    InvalidLocation(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("GPX parsing error: {0}")]
    Gpx(#[from] gpx::errors::GpxError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Tracking session is closed")]
    SessionClosed,
}

pub type Result<T> = std::result::Result<T, TrackingError>;
