use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::settings;

/// Tunables of the standalone talus-relaxation solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThermalSettings {
    /// Time step of one pass.  Above `THERMAL_STABLE_DT` (0.01) passes
    /// overshoot and oscillate.
    pub time_delta: f32,
    pub iterations: u32,
    /// Angle of repose, degrees in [0, 90).
    pub angle_of_repose: f32,
    /// Full width of the per-iteration repose jitter, degrees.
    pub repose_jitter: f32,
    /// Seed for the jitter sequence.
    pub seed: u64,
}

impl Default for ThermalSettings {
    fn default() -> Self {
        Self {
            time_delta: 0.005,
            iterations: 50,
            angle_of_repose: 33.0,
            repose_jitter: 0.0,
            seed: 0,
        }
    }
}

impl ThermalSettings {
    pub fn validate(&self) -> Result<()> {
        settings::non_negative("time_delta", self.time_delta)?;
        settings::angle("angle_of_repose", self.angle_of_repose)?;
        settings::angle("repose_jitter", self.repose_jitter)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(ThermalSettings::default().validate().is_ok());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let s: ThermalSettings = serde_json::from_str(r#"{ "iterations": 80 }"#).unwrap();
        assert_eq!(s.iterations, 80);
        assert_eq!(s.time_delta, ThermalSettings::default().time_delta);
    }

    #[test]
    fn steep_repose_rejected() {
        let s = ThermalSettings { angle_of_repose: 95.0, ..ThermalSettings::default() };
        assert!(s.validate().is_err());
    }
}
