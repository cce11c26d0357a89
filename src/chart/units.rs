//! Unit conversion helpers.
//!
//! Angular telemetry arrives in radians; the panel can display degrees.
//! Conversion happens once, at write time, based on the unit setting in
//! effect when the sample arrives. History already stored is never
//! re-converted; collaborators clear the chart on a unit switch.

/// Converts radians to degrees.
pub fn rad_to_deg(rad: f64) -> f64 {
    rad * 180.0 / std::f64::consts::PI
}

/// Converts degrees back to radians.
pub fn deg_to_rad(deg: f64) -> f64 {
    deg * std::f64::consts::PI / 180.0
}

/// Rounds to three decimal digits, the precision stored per sample.
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_round_trips_within_tolerance() {
        for rad in [-3.2, -1.0, 0.0, 0.5, 1.570796, 3.141592] {
            let back = deg_to_rad(rad_to_deg(rad));
            assert!((back - rad).abs() < 1e-9, "round trip failed for {rad}");
        }
    }

    #[test]
    fn right_angle_is_ninety_degrees() {
        let deg = rad_to_deg(std::f64::consts::FRAC_PI_2);
        assert!((deg - 90.0).abs() < 1e-9);
    }

    #[test]
    fn rounding_keeps_three_decimals() {
        assert_eq!(round3(1.23456), 1.235);
        assert_eq!(round3(-0.0004), -0.0);
        assert_eq!(round3(2.0005), 2.001);
    }
}
