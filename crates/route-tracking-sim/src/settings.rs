use clap::{Parser, ValueEnum};
use route_tracking_lib::{TrackerConfig, TravelProfile};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
/// Route Tracking Simulator - Drive along a GPX route and log the guidance events
pub struct Settings {
    /// GPX file holding the route (one leg per <rte>, or per <trk> when there are none)
    #[clap(value_name = "FILE")]
    pub gpx_file: PathBuf,

    /// Travel profile, selects the minimum step lengths for alerts
    #[clap(short, long, value_enum, default_value_t = Profile::Automobile)]
    pub profile: Profile,

    /// Nominal speed in m/s used for the expected travel time of each step
    #[clap(long, default_value = "13.9")]
    pub nominal_speed: f64,

    /// JSON file with a full tracker configuration (flags below still override it)
    #[clap(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Seconds a fix is projected forward before the off-route check
    #[clap(long)]
    pub dead_reckoning_interval: Option<f64>,

    /// Distance in meters from the current step that counts as off route
    #[clap(long)]
    pub max_off_route_distance: Option<f64>,

    /// Remaining distance in meters on a step where heading-based completion applies
    #[clap(long)]
    pub maneuver_zone_radius: Option<f64>,

    /// Seconds to the maneuver at which the high alert fires
    #[clap(long)]
    pub high_alert_interval: Option<f64>,

    /// Seconds to the maneuver at which the medium alert fires
    #[clap(long)]
    pub medium_alert_interval: Option<f64>,

    /// Largest course offset in degrees that still completes a maneuver
    #[clap(long)]
    pub heading_tolerance: Option<f64>,

    /// Print events as JSON lines on stdout instead of logging them
    #[clap(long, default_value = "false")]
    pub json: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Automobile,
    Cycling,
    Walking,
}

impl From<Profile> for TravelProfile {
    fn from(profile: Profile) -> Self {
        match profile {
            Profile::Automobile => TravelProfile::Automobile,
            Profile::Cycling => TravelProfile::Cycling,
            Profile::Walking => TravelProfile::Walking,
        }
    }
}

impl Settings {
    pub fn from_cli() -> Self {
        match Settings::try_parse() {
            Ok(args) => args,
            Err(e) => e.exit(),
        }
    }

    /// Apply the command-line overrides on top of `base`
    pub fn apply_overrides(&self, mut base: TrackerConfig) -> TrackerConfig {
        let overrides = [
            (self.dead_reckoning_interval, &mut base.dead_reckoning_interval),
            (
                self.max_off_route_distance,
                &mut base.maximum_distance_before_recalculating,
            ),
            (self.maneuver_zone_radius, &mut base.maneuver_zone_radius),
            (self.high_alert_interval, &mut base.high_alert_interval),
            (self.medium_alert_interval, &mut base.medium_alert_interval),
            (
                self.heading_tolerance,
                &mut base.maximum_allowed_degree_offset_for_turn_completion,
            ),
        ];
        for (value, field) in overrides {
            if let Some(value) = value {
                *field = value;
            }
        }
        base
    }

    /// Configuration from the profile (or the config file) plus overrides
    pub fn tracker_config(&self) -> crate::Result<TrackerConfig> {
        let base = match &self.config {
            Some(path) => {
                let file = std::fs::File::open(path)?;
                serde_json::from_reader(std::io::BufReader::new(file))?
            }
            None => TrackerConfig::for_profile(self.profile.into()),
        };
        let config = self.apply_overrides(base);
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_defaults() {
        let settings = Settings::try_parse_from(["route-tracking-sim", "drive.gpx"]).unwrap();
        assert_eq!(settings.gpx_file, PathBuf::from("drive.gpx"));
        assert_eq!(settings.profile, Profile::Automobile);
        assert!(!settings.json);
        assert_eq!(settings.tracker_config().unwrap(), TrackerConfig::default());
    }

    #[test]
    fn test_overrides_apply_on_profile() {
        let settings = Settings::try_parse_from([
            "route-tracking-sim",
            "walk.gpx",
            "--profile",
            "walking",
            "--maneuver-zone-radius",
            "15",
            "--heading-tolerance",
            "45",
        ])
        .unwrap();
        let config = settings.tracker_config().unwrap();
        assert_eq!(config.maneuver_zone_radius, 15.0);
        assert_eq!(config.maximum_allowed_degree_offset_for_turn_completion, 45.0);
        assert_eq!(config.minimum_distance_for_high_alert, 20.0);
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let settings = Settings::try_parse_from([
            "route-tracking-sim",
            "drive.gpx",
            "--max-off-route-distance",
            "0",
        ])
        .unwrap();
        assert!(settings.tracker_config().is_err());
    }
}
