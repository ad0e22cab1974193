use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::settings;

// UI-facing rates are kept in human-friendly ranges (roughly 0–10) and
// scaled down before they reach the kernels.
const PRECIPITATION_SCALE: f32 = 0.0001;
const EVAPORATION_SCALE: f32 = 0.1;
const FLOW_SCALE: f32 = 0.001;
const CAPACITY_SCALE: f32 = 0.01;

/// Tunables of the shallow-water hydraulic solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HydraulicSettings {
    /// Multiplier on texel size when deriving `dx`, `dy`.
    pub sim_scale: f32,
    pub time_delta: f32,
    pub iterations: u32,
    pub precipitation_rate: f32,
    /// Fraction of water removed per unit time, in [0, 10].
    pub evaporation_rate: f32,
    /// Virtual pipe cross-section.
    pub flow_rate: f32,
    pub gravitational_constant: f32,
    pub sediment_capacity: f32,
    pub sediment_dissolve_rate: f32,
    pub sediment_deposit_rate: f32,
    /// Multipliers on steep (bank) cells.
    pub riverbank_dissolve_rate: f32,
    pub riverbank_deposit_rate: f32,
    /// Multipliers on gently sloped (bed) cells.
    pub riverbed_dissolve_rate: f32,
    pub riverbed_deposit_rate: f32,
    /// Talus passes per outer iteration; 0 disables the relaxation.
    pub thermal_iterations: u32,
    /// Talus time step as a fraction of `time_delta`.
    pub thermal_time_delta: f32,
    pub angle_of_repose: f32,
}

impl Default for HydraulicSettings {
    fn default() -> Self {
        Self {
            sim_scale: 1.0,
            time_delta: 0.1,
            iterations: 100,
            precipitation_rate: 0.5,
            evaporation_rate: 0.5,
            flow_rate: 0.5,
            gravitational_constant: 9.81,
            sediment_capacity: 0.5,
            sediment_dissolve_rate: 0.5,
            sediment_deposit_rate: 0.8,
            riverbank_dissolve_rate: 1.0,
            riverbank_deposit_rate: 0.5,
            riverbed_dissolve_rate: 0.5,
            riverbed_deposit_rate: 1.0,
            thermal_iterations: 2,
            thermal_time_delta: 0.05,
            angle_of_repose: 33.0,
        }
    }
}

/// Kernel-side constants derived from `HydraulicSettings`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HydraulicKernelParams {
    pub dt: f32,
    pub precipitation: f32,
    pub evaporation: f32,
    /// `flow_rate × gravitational_constant`, scaled.
    pub pipe: f32,
    pub capacity: f32,
    pub dissolve: f32,
    pub deposit: f32,
    pub bank_dissolve: f32,
    pub bank_deposit: f32,
    pub bed_dissolve: f32,
    pub bed_deposit: f32,
}

impl HydraulicSettings {
    pub fn validate(&self) -> Result<()> {
        settings::positive("sim_scale", self.sim_scale)?;
        for (name, v) in [
            ("time_delta", self.time_delta),
            ("precipitation_rate", self.precipitation_rate),
            ("flow_rate", self.flow_rate),
            ("gravitational_constant", self.gravitational_constant),
            ("sediment_capacity", self.sediment_capacity),
            ("sediment_dissolve_rate", self.sediment_dissolve_rate),
            ("sediment_deposit_rate", self.sediment_deposit_rate),
            ("riverbank_dissolve_rate", self.riverbank_dissolve_rate),
            ("riverbank_deposit_rate", self.riverbank_deposit_rate),
            ("riverbed_dissolve_rate", self.riverbed_dissolve_rate),
            ("riverbed_deposit_rate", self.riverbed_deposit_rate),
            ("thermal_time_delta", self.thermal_time_delta),
        ] {
            settings::non_negative(name, v)?;
        }
        settings::fraction("evaporation_rate", self.evaporation_rate * EVAPORATION_SCALE)?;
        settings::angle("angle_of_repose", self.angle_of_repose)?;
        Ok(())
    }

    pub fn kernel_params(&self) -> HydraulicKernelParams {
        HydraulicKernelParams {
            dt: self.time_delta,
            precipitation: self.precipitation_rate * PRECIPITATION_SCALE,
            evaporation: self.evaporation_rate * EVAPORATION_SCALE,
            pipe: self.flow_rate * self.gravitational_constant * FLOW_SCALE,
            capacity: self.sediment_capacity * CAPACITY_SCALE,
            dissolve: self.sediment_dissolve_rate,
            deposit: self.sediment_deposit_rate,
            bank_dissolve: self.riverbank_dissolve_rate,
            bank_deposit: self.riverbank_deposit_rate,
            bed_dissolve: self.riverbed_dissolve_rate,
            bed_deposit: self.riverbed_deposit_rate,
        }
    }

    /// Time step of the embedded talus passes.
    pub fn thermal_dt(&self) -> f32 {
        self.thermal_time_delta * self.time_delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(HydraulicSettings::default().validate().is_ok());
    }

    #[test]
    fn negative_rate_rejected() {
        let s = HydraulicSettings { sediment_deposit_rate: -1.0, ..Default::default() };
        assert!(s.validate().is_err());
    }

    #[test]
    fn kernel_params_are_scaled_down() {
        let s = HydraulicSettings::default();
        let k = s.kernel_params();
        assert!(k.precipitation < s.precipitation_rate);
        assert!(k.pipe < s.flow_rate * s.gravitational_constant);
        assert_eq!(k.dt, s.time_delta);
        assert!((s.thermal_dt() - 0.005).abs() < 1e-7);
    }

    #[test]
    fn settings_round_trip_through_json() {
        let s = HydraulicSettings { iterations: 12, flow_rate: 2.0, ..Default::default() };
        let json = serde_json::to_string(&s).unwrap();
        let back: HydraulicSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }
}
