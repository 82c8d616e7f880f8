//! Steering control parameters
//!
//! The parameter record uses the key names of the vehicle model files the
//! controllers are usually tuned with:
//!
//! ```toml
//! "Lookahead Distance" = 5.0
//!
//! [Gains]
//! Kp = 0.8
//! Ki = 0.0
//! Kd = 0.0
//! ```
//!
//! Every value is optional. Missing values take the controller's default and
//! values of the wrong type are reported with a warning and then treated as
//! missing, so a malformed entry never stops a run.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::warn;
use serde::{Deserialize, Deserializer, de::IgnoredAny};

// Internal
use crate::world::WorldFrame;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for steering control
#[derive(Deserialize, Debug, Clone, Default)]
pub struct Params {
    #[serde(rename = "Gains", default, deserialize_with = "lenient_gains")]
    pub gains: GainParams,

    /// Distance of the sentinel point ahead of the vehicle.
    ///
    /// Units: meters
    #[serde(rename = "Lookahead Distance", default, deserialize_with = "lenient_f64")]
    pub lookahead_dist_m: Option<f64>,

    /// Preview horizon of the SR controller.
    ///
    /// Units: seconds
    #[serde(rename = "Preview Time", default, deserialize_with = "lenient_f64")]
    pub preview_time_s: Option<f64>,

    /// Half width of the Stanley controller's lateral dead zone.
    ///
    /// Units: meters
    #[serde(rename = "Dead Zone", default, deserialize_with = "lenient_f64")]
    pub dead_zone_m: Option<f64>,

    /// Maximum road wheel steering angle.
    ///
    /// Units: radians
    #[serde(rename = "Max Steering Angle", default, deserialize_with = "lenient_f64")]
    pub max_steer_angle_rad: Option<f64>,

    /// Vehicle wheelbase, used by the SR controller's single track model.
    ///
    /// Units: meters
    #[serde(rename = "Wheelbase", default, deserialize_with = "lenient_f64")]
    pub wheelbase_m: Option<f64>,

    /// Speed below which the SR controller freezes its steering angle and
    /// the Stanley controller stops scaling by speed.
    ///
    /// Units: meters/second
    #[serde(rename = "Min Speed", default, deserialize_with = "lenient_f64")]
    pub min_speed_ms: Option<f64>,

    #[serde(rename = "World Frame", default, deserialize_with = "lenient_world")]
    pub world_frame: Option<WorldFrame>,
}

/// The `[Gains]` table
#[derive(Deserialize, Debug, Clone, Default)]
pub struct GainParams {
    /// Proportional gain
    #[serde(rename = "Kp", default, deserialize_with = "lenient_f64")]
    pub k_p: Option<f64>,

    /// Integral gain
    #[serde(rename = "Ki", default, deserialize_with = "lenient_f64")]
    pub k_i: Option<f64>,

    /// Derivative gain
    #[serde(rename = "Kd", default, deserialize_with = "lenient_f64")]
    pub k_d: Option<f64>,

    /// XT lateral error channel weight
    #[serde(rename = "Wy", default, deserialize_with = "lenient_f64")]
    pub w_y: Option<f64>,

    /// XT heading error channel weight
    #[serde(rename = "Wh", default, deserialize_with = "lenient_f64")]
    pub w_h: Option<f64>,

    /// XT Ackermann angle channel weight
    #[serde(rename = "Wa", default, deserialize_with = "lenient_f64")]
    pub w_a: Option<f64>,

    /// SR lateral error integration gain
    #[serde(rename = "Klat", default, deserialize_with = "lenient_f64")]
    pub k_lat: Option<f64>,

    /// SR understeer gradient.
    ///
    /// Units: degrees/g
    #[serde(rename = "Kug", default, deserialize_with = "lenient_f64")]
    pub k_ug: Option<f64>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Either a value of the expected type or anything else, which is skipped.
#[derive(Deserialize)]
#[serde(untagged)]
enum Lenient<T> {
    Valid(T),
    Invalid(IgnoredAny),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Params {
    /// The world frame, ISO if not given.
    pub fn world(&self) -> WorldFrame {
        self.world_frame.unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Accept any finite number, warn about and drop anything else.
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>
{
    Ok(match Option::<Lenient<f64>>::deserialize(deserializer)? {
        Some(Lenient::Valid(f)) if f.is_finite() => Some(f),
        Some(Lenient::Valid(f)) => {
            warn!("Found {} for a steering parameter, using the default", f);
            None
        },
        Some(Lenient::Invalid(_)) => {
            warn!("Expected a number for a steering parameter, using the default");
            None
        },
        None => None
    })
}

/// Accept a known frame name, warn about and drop anything else.
fn lenient_world<'de, D>(deserializer: D) -> Result<Option<WorldFrame>, D::Error>
where
    D: Deserializer<'de>
{
    Ok(match Option::<Lenient<WorldFrame>>::deserialize(deserializer)? {
        Some(Lenient::Valid(frame)) => Some(frame),
        Some(Lenient::Invalid(_)) => {
            warn!("Unknown world frame, using the ISO frame");
            None
        },
        None => None
    })
}

/// Accept a gains table, treating anything else as an empty one.
fn lenient_gains<'de, D>(deserializer: D) -> Result<GainParams, D::Error>
where
    D: Deserializer<'de>
{
    Ok(match Option::<Lenient<GainParams>>::deserialize(deserializer)? {
        Some(Lenient::Valid(gains)) => gains,
        Some(Lenient::Invalid(_)) => {
            warn!("Expected a table for the steering gains, using the defaults");
            GainParams::default()
        },
        None => GainParams::default()
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_toml_keys() {
        let params: Params = util::params::from_toml_str(
            r#"
            "Lookahead Distance" = 4.5
            "Preview Time" = 1.0
            "Dead Zone" = 0.05
            "Max Steering Angle" = 0.5
            "Wheelbase" = 3
            "Min Speed" = 1.5
            "World Frame" = "y_up"

            [Gains]
            Kp = 0.8
            Ki = 0.1
            Kd = 0.2
            Wy = 1.0
            Wh = 0.5
            Wa = 0.25
            Klat = 0.05
            Kug = 2
            "#
        ).unwrap();

        assert_eq!(params.lookahead_dist_m, Some(4.5));
        assert_eq!(params.preview_time_s, Some(1.0));
        assert_eq!(params.dead_zone_m, Some(0.05));
        assert_eq!(params.max_steer_angle_rad, Some(0.5));
        assert_eq!(params.wheelbase_m, Some(3.0));
        assert_eq!(params.min_speed_ms, Some(1.5));
        assert_eq!(params.world(), WorldFrame::y_up());

        assert_eq!(params.gains.k_p, Some(0.8));
        assert_eq!(params.gains.k_i, Some(0.1));
        assert_eq!(params.gains.k_d, Some(0.2));
        assert_eq!(params.gains.w_y, Some(1.0));
        assert_eq!(params.gains.w_h, Some(0.5));
        assert_eq!(params.gains.w_a, Some(0.25));
        assert_eq!(params.gains.k_lat, Some(0.05));
        assert_eq!(params.gains.k_ug, Some(2.0));
    }

    #[test]
    fn test_json_keys() {
        let params: Params = util::params::from_json_str(
            r#"{
                "Gains": { "Kp": 0.4, "Ki": 0, "Kd": null },
                "Lookahead Distance": 6.0
            }"#
        ).unwrap();

        assert_eq!(params.gains.k_p, Some(0.4));
        assert_eq!(params.gains.k_i, Some(0.0));
        assert_eq!(params.gains.k_d, None);
        assert_eq!(params.lookahead_dist_m, Some(6.0));
        assert_eq!(params.world(), WorldFrame::iso());
    }

    #[test]
    fn test_empty_record() {
        let params: Params = util::params::from_toml_str("").unwrap();
        assert!(params.gains.k_p.is_none());
        assert!(params.lookahead_dist_m.is_none());
        assert!(params.world_frame.is_none());
    }

    #[test]
    fn test_malformed_values_fall_back() {
        let params: Params = util::params::from_toml_str(
            r#"
            "Lookahead Distance" = "far"
            "World Frame" = "z_down"

            [Gains]
            Kp = true
            Ki = 0.3
            Kd = [1.0]
            "#
        ).unwrap();

        assert_eq!(params.lookahead_dist_m, None);
        assert_eq!(params.world_frame, None);
        assert_eq!(params.gains.k_p, None);
        assert_eq!(params.gains.k_i, Some(0.3));
        assert_eq!(params.gains.k_d, None);
    }

    #[test]
    fn test_malformed_gains_table_falls_back() {
        let params: Params = util::params::from_toml_str(
            "\"Lookahead Distance\" = 4.0\nGains = 5"
        ).unwrap();
        assert_eq!(params.lookahead_dist_m, Some(4.0));
        assert!(params.gains.k_p.is_none());

        let params: Params = util::params::from_json_str(
            r#"{ "Gains": null, "Dead Zone": 0.1 }"#
        ).unwrap();
        assert_eq!(params.dead_zone_m, Some(0.1));
        assert!(params.gains.k_p.is_none());
    }

    #[test]
    fn test_malformed_json_leaves_fall_back() {
        let params: Params = util::params::from_json_str(
            r#"{
                "Gains": { "Kp": [1.0, null], "Ki": 0.2, "Kd": 18446744073709551615 },
                "World Frame": { "kind": 3 }
            }"#
        ).unwrap();

        assert_eq!(params.gains.k_p, None);
        assert_eq!(params.gains.k_i, Some(0.2));
        assert!(params.gains.k_d.map_or(false, |k| k > 1e19));
        assert_eq!(params.world_frame, None);
    }

    #[test]
    fn test_non_finite_value_falls_back() {
        let params: Params = util::params::from_toml_str(
            "\"Lookahead Distance\" = inf\n\"Preview Time\" = nan"
        ).unwrap();

        assert_eq!(params.lookahead_dist_m, None);
        assert_eq!(params.preview_time_s, None);
    }
}
