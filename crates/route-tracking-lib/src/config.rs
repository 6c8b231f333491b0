//! Tunable thresholds for the tracking state machine

use crate::{Result, TrackingError};

/// Mode of travel, used to pick step-length guards for alerts
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TravelProfile {
    #[default]
    Automobile,
    Cycling,
    Walking,
}

impl TravelProfile {
    /// Minimum step length in meters for a `high` alert
    pub fn minimum_distance_for_high_alert(self) -> f64 {
        match self {
            TravelProfile::Automobile => 100.0,
            TravelProfile::Cycling => 60.0,
            TravelProfile::Walking => 20.0,
        }
    }

    /// Minimum step length in meters for a `medium` alert
    pub fn minimum_distance_for_medium_alert(self) -> f64 {
        match self {
            TravelProfile::Automobile => 400.0,
            TravelProfile::Cycling => 200.0,
            TravelProfile::Walking => 100.0,
        }
    }
}

/// Configuration for the route controller
///
/// The defaults target driving. Every field can be overridden; use
/// [`TrackerConfig::for_profile`] to get guards suited to cycling or walking.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TrackerConfig {
    /// Seconds of travel along the current course used to project each fix
    /// forward before the off-route check (compensates GPS lag).
    /// Default: 1.0
    pub dead_reckoning_interval: f64,
    /// Distance in meters from the current step beyond which the user is off route.
    /// Default: 50.0
    pub maximum_distance_before_recalculating: f64,
    /// Remaining distance in meters on a step below which heading-based
    /// step completion applies.
    /// Default: 40.0
    pub maneuver_zone_radius: f64,
    /// Seconds to the end of the step at which a `high` alert fires.
    /// Default: 15.0
    pub high_alert_interval: f64,
    /// Seconds to the end of the step at which a `medium` alert fires.
    /// Default: 70.0
    pub medium_alert_interval: f64,
    /// Steps no longer than this (meters) never get a `high` alert.
    /// Default: 100.0
    pub minimum_distance_for_high_alert: f64,
    /// Steps no longer than this (meters) never get a `medium` alert.
    /// Default: 400.0
    pub minimum_distance_for_medium_alert: f64,
    /// Largest difference in degrees between the user's course and the
    /// upcoming step's final heading that still completes the maneuver.
    /// Default: 30.0
    pub maximum_allowed_degree_offset_for_turn_completion: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self::for_profile(TravelProfile::Automobile)
    }
}

impl TrackerConfig {
    pub fn for_profile(profile: TravelProfile) -> Self {
        Self {
            dead_reckoning_interval: 1.0,
            maximum_distance_before_recalculating: 50.0,
            maneuver_zone_radius: 40.0,
            high_alert_interval: 15.0,
            medium_alert_interval: 70.0,
            minimum_distance_for_high_alert: profile.minimum_distance_for_high_alert(),
            minimum_distance_for_medium_alert: profile.minimum_distance_for_medium_alert(),
            maximum_allowed_degree_offset_for_turn_completion: 30.0,
        }
    }

    /// Reject values that would make the state machine meaningless
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("dead_reckoning_interval", self.dead_reckoning_interval),
            (
                "maximum_distance_before_recalculating",
                self.maximum_distance_before_recalculating,
            ),
            ("maneuver_zone_radius", self.maneuver_zone_radius),
            ("high_alert_interval", self.high_alert_interval),
            ("medium_alert_interval", self.medium_alert_interval),
            (
                "minimum_distance_for_high_alert",
                self.minimum_distance_for_high_alert,
            ),
            (
                "minimum_distance_for_medium_alert",
                self.minimum_distance_for_medium_alert,
            ),
            (
                "maximum_allowed_degree_offset_for_turn_completion",
                self.maximum_allowed_degree_offset_for_turn_completion,
            ),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(TrackingError::InvalidConfig(format!(
                    "{name} must be a finite, non-negative number (got {value})"
                )));
            }
        }
        if self.maximum_distance_before_recalculating == 0.0 {
            return Err(TrackingError::InvalidConfig(
                "maximum_distance_before_recalculating must be positive".to_string(),
            ));
        }
        if self.maximum_allowed_degree_offset_for_turn_completion > 180.0 {
            return Err(TrackingError::InvalidConfig(format!(
                "maximum_allowed_degree_offset_for_turn_completion must be at most 180 (got {})",
                self.maximum_allowed_degree_offset_for_turn_completion
            )));
        }
        Ok(())
    }
}
