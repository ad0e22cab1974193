//! Range checks shared by the solver settings records.
use crate::error::{ErosionError, Result};

/// Rates, time deltas and scales: finite and non-negative.
pub(crate) fn non_negative(name: &'static str, value: f32) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ErosionError::InvalidSetting {
            name,
            value: value as f64,
            reason: "must be finite and non-negative",
        })
    }
}

/// Headings and other signed values.
pub(crate) fn finite(name: &'static str, value: f32) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ErosionError::InvalidSetting {
            name,
            value: value as f64,
            reason: "must be finite",
        })
    }
}

/// Spatial scales: finite and strictly positive.
pub(crate) fn positive(name: &'static str, value: f32) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ErosionError::InvalidSetting {
            name,
            value: value as f64,
            reason: "must be finite and positive",
        })
    }
}

/// Angles in degrees: within [0, 90).
pub(crate) fn angle(name: &'static str, value: f32) -> Result<()> {
    if value.is_finite() && (0.0..90.0).contains(&value) {
        Ok(())
    } else {
        Err(ErosionError::InvalidSetting {
            name,
            value: value as f64,
            reason: "must lie in [0°, 90°)",
        })
    }
}

/// Fractions applied per step: within [0, 1].
pub(crate) fn fraction(name: &'static str, value: f32) -> Result<()> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ErosionError::InvalidSetting {
            name,
            value: value as f64,
            reason: "must lie in [0, 1]",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_values() {
        assert!(non_negative("rate", -0.1).is_err());
        assert!(non_negative("rate", f32::NAN).is_err());
        assert!(non_negative("rate", 0.0).is_ok());
        assert!(positive("scale", 0.0).is_err());
        assert!(angle("repose", 90.0).is_err());
        assert!(angle("repose", 0.0).is_ok());
        assert!(fraction("evaporation", 1.5).is_err());
        assert!(finite("direction", -270.0).is_ok());
        assert!(finite("direction", f32::INFINITY).is_err());
    }
}
