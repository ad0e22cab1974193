use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::settings;

// Pickup and settling rates are scaled the same way the hydraulic rates are.
const SUSPENSION_SCALE: f32 = 0.00001;
const DEPOSITION_SCALE: f32 = 0.1;
const ABRASION_SCALE: f32 = 0.01;

/// Tunables of the aeolian solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindSettings {
    pub sim_scale: f32,
    pub time_delta: f32,
    /// Each outer iteration is a full fluid solve, so counts stay small.
    pub iterations: u32,
    /// Ambient wind speed, world units per unit time.
    pub wind_speed: f32,
    /// Half-width of the per-iteration speed jitter.
    pub wind_speed_jitter: f32,
    /// Wind heading in degrees; 0 blows toward `+x`, 90 toward increasing rows.
    pub direction: f32,
    pub drag_coefficient: f32,
    pub viscosity: f32,
    pub diffuse_steps: u32,
    pub projection_steps: u32,
    pub advection_vel_scale: f32,
    pub suspension_rate: f32,
    pub deposition_rate: f32,
    /// Extra pickup on slopes facing the wind, extra settling in their lee.
    pub slope_factor: f32,
    /// Extra pickup proportional to the load already carried.
    pub abrasiveness_coefficient: f32,
    pub thermal_time_delta: f32,
    pub thermal_iterations: u32,
    pub angle_of_repose: f32,
    pub seed: u64,
}

impl Default for WindSettings {
    fn default() -> Self {
        Self {
            sim_scale: 1.0,
            time_delta: 0.1,
            iterations: 8,
            wind_speed: 20.0,
            wind_speed_jitter: 0.0,
            direction: 0.0,
            drag_coefficient: 1.0,
            viscosity: 0.5,
            diffuse_steps: 4,
            projection_steps: 16,
            advection_vel_scale: 1.0,
            suspension_rate: 1.0,
            deposition_rate: 0.5,
            slope_factor: 1.0,
            abrasiveness_coefficient: 0.5,
            thermal_time_delta: 0.05,
            thermal_iterations: 2,
            angle_of_repose: 33.0,
            seed: 0,
        }
    }
}

/// Kernel-side constants derived from `WindSettings`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindKernelParams {
    pub dt: f32,
    pub drag: f32,
    /// Implicit diffusion weight, `viscosity × dt`.
    pub diffusion: f32,
    pub advection: f32,
    pub suspension: f32,
    pub deposition: f32,
    pub slope_factor: f32,
    pub abrasion: f32,
}

impl WindSettings {
    pub fn validate(&self) -> Result<()> {
        settings::positive("sim_scale", self.sim_scale)?;
        for (name, v) in [
            ("time_delta", self.time_delta),
            ("wind_speed", self.wind_speed),
            ("wind_speed_jitter", self.wind_speed_jitter),
            ("drag_coefficient", self.drag_coefficient),
            ("viscosity", self.viscosity),
            ("advection_vel_scale", self.advection_vel_scale),
            ("suspension_rate", self.suspension_rate),
            ("deposition_rate", self.deposition_rate),
            ("slope_factor", self.slope_factor),
            ("abrasiveness_coefficient", self.abrasiveness_coefficient),
            ("thermal_time_delta", self.thermal_time_delta),
        ] {
            settings::non_negative(name, v)?;
        }
        settings::finite("direction", self.direction)?;
        settings::angle("angle_of_repose", self.angle_of_repose)?;
        Ok(())
    }

    pub fn kernel_params(&self) -> WindKernelParams {
        WindKernelParams {
            dt: self.time_delta,
            drag: self.drag_coefficient,
            diffusion: self.viscosity * self.time_delta,
            advection: self.advection_vel_scale,
            suspension: self.suspension_rate * SUSPENSION_SCALE,
            deposition: self.deposition_rate * DEPOSITION_SCALE,
            slope_factor: self.slope_factor,
            abrasion: self.abrasiveness_coefficient * ABRASION_SCALE,
        }
    }

    /// Unit heading `[x, y]` of the ambient wind.
    pub fn heading(&self) -> [f32; 2] {
        let rad = self.direction.to_radians();
        [rad.cos(), rad.sin()]
    }

    pub fn thermal_dt(&self) -> f32 {
        self.thermal_time_delta * self.time_delta
    }
}
