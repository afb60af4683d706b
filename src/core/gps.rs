//! GPS position commands
//!
//! The device takes its position as a short configuration block. The
//! location itself comes from outside the crate.

/// Whether a coordinate pair is a usable position
pub fn is_valid_position(latitude: f64, longitude: f64) -> bool {
    latitude.is_finite()
        && longitude.is_finite()
        && (-90.0..=90.0).contains(&latitude)
        && (-180.0..=180.0).contains(&longitude)
}

/// Command block that sets the device position
pub fn position_commands(latitude: f64, longitude: f64) -> [String; 4] {
    [
        "configure terminal".to_string(),
        format!("gps latitude north {latitude:.6}"),
        format!("gps longitude east {longitude:.6}"),
        "exit".to_string(),
    ]
}
