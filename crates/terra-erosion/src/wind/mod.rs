//! Aeolian erosion: a stable-fluids wind field carrying airborne sediment.
//!
//! Per iteration the wind is forced, dragged by the terrain, diffused,
//! projected and self-advected; the suspended load is then diffused and
//! advected along it, exchanged with the ground, and finally the surface is
//! relaxed by a few talus passes.
pub mod fluid;
pub mod settings;
pub mod suspension;

use log::{debug, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::eroder::{apply_invert, prepare, ErodeParams, Eroder, InputFields, OutputFields, HEIGHT};
use crate::error::Result;
use crate::fields::{Element, FieldData, FieldKind, FieldSpec, FieldStore};
use crate::kernel::{dispatch, Spacing};
use crate::thermal::talus::{relax, talus_net, TalusFields, TalusParams, THERMAL_STABLE_DT};
use crate::thermal::THERMAL_OUTFLOW;
pub use settings::{WindKernelParams, WindSettings};

pub const WIND_VELOCITY: &str = "Wind Velocity";
pub const DIVERGENCE: &str = "Divergence";
pub const PRESSURE: &str = "Pressure";
pub const SEDIMENT: &str = "Sediment";
pub const THERMAL_SEDIMENT: &str = "Thermal Sediment";
const VELOCITY_SOURCE: &str = "Velocity Source";
const SEDIMENT_SOURCE: &str = "Sediment Source";
const EXCHANGE: &str = "Suspension Exchange";

static FIELDS: &[FieldSpec] = &[
    FieldSpec::ping_pong(HEIGHT, FieldKind::Scalar),
    FieldSpec::ping_pong(WIND_VELOCITY, FieldKind::Vector),
    FieldSpec::ping_pong(SEDIMENT, FieldKind::Scalar),
    FieldSpec::ping_pong(PRESSURE, FieldKind::Scalar),
    FieldSpec::ping_pong(THERMAL_SEDIMENT, FieldKind::Scalar),
    FieldSpec::single(DIVERGENCE, FieldKind::Scalar),
    FieldSpec::single(THERMAL_OUTFLOW, FieldKind::Flux8),
    FieldSpec::single(VELOCITY_SOURCE, FieldKind::Vector),
    FieldSpec::single(SEDIMENT_SOURCE, FieldKind::Scalar),
    FieldSpec::single(EXCHANGE, FieldKind::Scalar),
];

const TALUS: TalusFields = TalusFields {
    height: HEIGHT,
    outflow: THERMAL_OUTFLOW,
    hardness: None,
    repose: None,
    collision: None,
};

const OUTPUTS: [&str; 5] = [HEIGHT, WIND_VELOCITY, DIVERGENCE, THERMAL_SEDIMENT, SEDIMENT];

pub struct WindEroder {
    pub settings: WindSettings,
    inputs: InputFields,
    outputs: OutputFields,
    store: FieldStore,
}

/// Copy the front buffer of `from` into single-buffered `to`.
fn snapshot_into<T: Element>(store: &mut FieldStore, from: &str, to: &str) {
    store.write::<T, _>(to, |s, out| out.data.copy_from_slice(&s.front::<T>(from).data));
}

impl WindEroder {
    pub fn new(settings: WindSettings) -> Self {
        Self {
            settings,
            inputs: InputFields::default(),
            outputs: OutputFields::default(),
            store: FieldStore::new(FIELDS),
        }
    }

    fn wind_step(&mut self, wind: [f32; 2], spacing: &Spacing, p: &WindKernelParams) {
        let diffuse_steps = self.settings.diffuse_steps;
        let projection_steps = self.settings.projection_steps;
        let store = &mut self.store;

        store.step::<[f32; 2], _>(WIND_VELOCITY, |s, out| {
            let v = s.front::<[f32; 2]>(WIND_VELOCITY);
            dispatch("force", out, |r, c| fluid::force(v, r, c, wind, p.dt));
        });
        store.step::<[f32; 2], _>(WIND_VELOCITY, |s, out| {
            let v = s.front::<[f32; 2]>(WIND_VELOCITY);
            let h = s.front::<f32>(HEIGHT);
            dispatch("drag", out, |r, c| fluid::drag(v, h, r, c, spacing, p));
        });

        snapshot_into::<[f32; 2]>(store, WIND_VELOCITY, VELOCITY_SOURCE);
        for _ in 0..diffuse_steps {
            store.step::<[f32; 2], _>(WIND_VELOCITY, |s, out| {
                let src = s.front::<[f32; 2]>(VELOCITY_SOURCE);
                let v = s.front::<[f32; 2]>(WIND_VELOCITY);
                dispatch("diffuse", out, |r, c| fluid::diffuse(src, v, r, c, p.diffusion));
            });
        }

        store.write::<f32, _>(DIVERGENCE, |s, out| {
            let v = s.front::<[f32; 2]>(WIND_VELOCITY);
            dispatch("divergence", out, |r, c| fluid::divergence(v, r, c, spacing));
        });
        for _ in 0..projection_steps {
            store.step::<f32, _>(PRESSURE, |s, out| {
                let pr = s.front::<f32>(PRESSURE);
                let div = s.front::<f32>(DIVERGENCE);
                dispatch("pressure", out, |r, c| fluid::pressure(pr, div, r, c, spacing));
            });
        }
        if projection_steps > 0 {
            store.step::<[f32; 2], _>(WIND_VELOCITY, |s, out| {
                let v = s.front::<[f32; 2]>(WIND_VELOCITY);
                let pr = s.front::<f32>(PRESSURE);
                dispatch("subtract_gradient", out, |r, c| fluid::subtract_gradient(v, pr, r, c, spacing));
            });
        }

        store.step::<[f32; 2], _>(WIND_VELOCITY, |s, out| {
            let v = s.front::<[f32; 2]>(WIND_VELOCITY);
            dispatch("advect_velocity", out, |r, c| fluid::advect(v, v, r, c, spacing, p));
        });
    }

    fn sediment_step(&mut self, spacing: &Spacing, p: &WindKernelParams) {
        let diffuse_steps = self.settings.diffuse_steps;
        let store = &mut self.store;

        snapshot_into::<f32>(store, SEDIMENT, SEDIMENT_SOURCE);
        for _ in 0..diffuse_steps {
            store.step::<f32, _>(SEDIMENT, |s, out| {
                let src = s.front::<f32>(SEDIMENT_SOURCE);
                let load = s.front::<f32>(SEDIMENT);
                dispatch("diffuse_sediment", out, |r, c| fluid::diffuse(src, load, r, c, p.diffusion));
            });
        }
        store.step::<f32, _>(SEDIMENT, |s, out| {
            let load = s.front::<f32>(SEDIMENT);
            let v = s.front::<[f32; 2]>(WIND_VELOCITY);
            dispatch("advect_sediment", out, |r, c| fluid::advect(load, v, r, c, spacing, p).max(0.0));
        });

        store.write::<f32, _>(EXCHANGE, |s, out| {
            let h = s.front::<f32>(HEIGHT);
            let load = s.front::<f32>(SEDIMENT);
            let v = s.front::<[f32; 2]>(WIND_VELOCITY);
            dispatch("suspend", out, |r, c| suspension::suspend(h, load, v, r, c, spacing, p));
        });
        store.step::<f32, _>(HEIGHT, |s, out| {
            let h = s.front::<f32>(HEIGHT);
            let ex = s.front::<f32>(EXCHANGE);
            dispatch("apply_height", out, |r, c| h.get(r, c) - ex.get(r, c));
        });
        store.step::<f32, _>(SEDIMENT, |s, out| {
            let load = s.front::<f32>(SEDIMENT);
            let ex = s.front::<f32>(EXCHANGE);
            dispatch("apply_sediment", out, |r, c| load.get(r, c) + ex.get(r, c));
        });
    }

    /// Talus passes, accumulating what each one moved into `Thermal Sediment`.
    fn settle(&mut self, spacing: &Spacing, talus: &TalusParams) {
        for _ in 0..self.settings.thermal_iterations {
            relax(&mut self.store, &TALUS, spacing, talus);
            self.store.step::<f32, _>(THERMAL_SEDIMENT, |s, out| {
                let acc = s.front::<f32>(THERMAL_SEDIMENT);
                let outflow = s.front::<[f32; 8]>(THERMAL_OUTFLOW);
                dispatch("accumulate_talus", out, |r, c| acc.get(r, c) + talus_net(outflow, r, c));
            });
        }
    }
}

impl Default for WindEroder {
    fn default() -> Self {
        Self::new(WindSettings::default())
    }
}

impl Eroder for WindEroder {
    fn name(&self) -> &'static str {
        "wind"
    }

    fn inputs_mut(&mut self) -> &mut InputFields {
        &mut self.inputs
    }

    fn erode(&mut self, params: &ErodeParams) -> Result<()> {
        let patch = prepare(&self.inputs, params)?;
        self.settings.validate()?;
        let p = self.settings.kernel_params();
        let heading = self.settings.heading();
        let talus = TalusParams::new(
            self.settings.thermal_dt(),
            [self.settings.angle_of_repose, self.settings.angle_of_repose],
        );
        if self.settings.thermal_iterations > 0 && talus.dt > THERMAL_STABLE_DT {
            warn!(
                "wind: thermal step {} exceeds stable bound {THERMAL_STABLE_DT}; expect oscillation",
                talus.dt
            );
        }

        let (w, h) = (patch.height.width, patch.height.height);
        self.store.ensure(w, h);
        self.store.clear_all();
        self.store.load(HEIGHT, &patch.height);

        let spacing = Spacing::new(params.terrain_dimensions, params.texel_size, self.settings.sim_scale);
        let mut rng = StdRng::seed_from_u64(self.settings.seed);
        let iterations = self.settings.iterations;
        for _ in 0..iterations {
            let jitter = self.settings.wind_speed_jitter;
            let speed = if jitter > 0.0 {
                (self.settings.wind_speed + rng.gen_range(-jitter..=jitter)).max(0.0)
            } else {
                self.settings.wind_speed
            };
            let wind = [heading[0] * speed, heading[1] * speed];

            self.wind_step(wind, &spacing, &p);
            self.sediment_step(&spacing, &p);
            self.settle(&spacing, &talus);
        }

        self.outputs.clear();
        for name in OUTPUTS {
            self.outputs.insert(name, self.store.snapshot(name));
        }
        let eroded = self.store.front::<f32>(HEIGHT).clone();
        let height = apply_invert(&patch.height, eroded, params.invert_effect);
        debug!(
            "wind: {w}×{h} patch, {iterations} iterations, heading {:.1}°, mean Δh {:.3e}",
            self.settings.direction,
            height.mean() - patch.height.mean()
        );
        self.outputs.insert(HEIGHT, FieldData::Scalar(height));
        Ok(())
    }

    fn outputs(&self) -> &OutputFields {
        &self.outputs
    }

    fn release(&mut self) {
        self.store.release();
        self.outputs.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErosionError;
    use crate::grid::{HeightField, Rect};
    use crate::synthetic;
    use approx::assert_abs_diff_eq;

    const DIMS: [f64; 3] = [100.0, 50.0, 100.0];
    const TEXEL: [f64; 2] = [1.5625, 1.5625];

    fn run(eroder: &mut WindEroder, hf: &HeightField, params: &ErodeParams) -> HeightField {
        eroder.set_input(HEIGHT, hf.clone());
        eroder.erode(params).unwrap();
        eroder.outputs().scalar(HEIGHT).unwrap().clone()
    }

    #[test]
    fn zero_iterations_is_identity() {
        let hf = synthetic::fbm(24, 24, 3, 0.1, 0.4);
        let mut eroder = WindEroder::new(WindSettings { iterations: 0, ..Default::default() });
        assert_eq!(run(&mut eroder, &hf, &ErodeParams::for_patch(24, 24, DIMS, TEXEL)), hf);
    }

    #[test]
    fn calm_air_over_gentle_terrain_changes_nothing() {
        let hf = synthetic::ridge(24, 24, 0.2, 0.22, 6.0);
        let mut eroder = WindEroder::new(WindSettings { wind_speed: 0.0, ..Default::default() });
        let out = run(&mut eroder, &hf, &ErodeParams::for_patch(24, 24, DIMS, TEXEL));
        assert_eq!(out, hf);
        assert_eq!(eroder.outputs().scalar(SEDIMENT).unwrap().max_value(), 0.0);
    }

    #[test]
    fn wind_across_a_ridge_lifts_sediment() {
        let hf = synthetic::ridge(32, 32, 0.2, 0.3, 5.0);
        let mut eroder = WindEroder::default();
        let out = run(&mut eroder, &hf, &ErodeParams::for_patch(32, 32, DIMS, TEXEL));
        assert!(out.is_finite());
        assert_ne!(out, hf);
        let outputs = eroder.outputs();
        assert!(outputs.scalar(SEDIMENT).unwrap().max_value() > 0.0);
        let wind = outputs.vector(WIND_VELOCITY).unwrap();
        assert!(wind.data.iter().all(|v| v[0].is_finite() && v[1].is_finite()));
        assert!(wind.get(16, 16)[0] > 0.0, "wind keeps blowing toward +x");
    }

    #[test]
    fn thermal_sediment_tracks_talus_changes() {
        // Without wind only the talus passes move material.
        let hf = synthetic::spike(24, 24, 0.2, 0.6);
        let settings = WindSettings { wind_speed: 0.0, iterations: 4, thermal_iterations: 3, ..Default::default() };
        let mut eroder = WindEroder::new(settings);
        let out = run(&mut eroder, &hf, &ErodeParams::for_patch(24, 24, DIMS, TEXEL));
        let moved = eroder.outputs().scalar(THERMAL_SEDIMENT).unwrap();
        assert!(moved.get(12, 12) < 0.0);
        for i in 0..hf.len() {
            assert_abs_diff_eq!(moved.data[i], out.data[i] - hf.data[i], epsilon = 1e-5);
        }
    }

    #[test]
    fn talus_conserves_mass_off_workgroup_multiple() {
        let mut hf = synthetic::flat(20, 13, 0.2);
        hf.set(12, 19, 0.6);
        hf.set(11, 19, 0.5);
        let settings = WindSettings { wind_speed: 0.0, iterations: 6, thermal_iterations: 3, ..Default::default() };
        let out = run(&mut WindEroder::new(settings), &hf, &ErodeParams::for_patch(20, 13, DIMS, TEXEL));
        assert_ne!(out, hf);
        assert_abs_diff_eq!(out.sum(), hf.sum(), epsilon = 1e-4);
    }

    #[test]
    fn invert_negates_height_change() {
        let hf = synthetic::ridge(24, 24, 0.2, 0.3, 4.0);
        let params = ErodeParams::for_patch(24, 24, DIMS, TEXEL);
        let mut eroder = WindEroder::default();
        let fwd = run(&mut eroder, &hf, &params);
        let inv = run(&mut eroder, &hf, &params.inverted(true));
        for i in 0..hf.len() {
            assert_abs_diff_eq!(fwd.data[i] - hf.data[i], -(inv.data[i] - hf.data[i]), epsilon = 1e-6);
        }
    }

    #[test]
    fn jittered_runs_are_reproducible() {
        let hf = synthetic::fbm(16, 16, 8, 0.2, 0.2);
        let settings = WindSettings { wind_speed_jitter: 10.0, seed: 42, iterations: 3, ..Default::default() };
        let params = ErodeParams::for_patch(16, 16, DIMS, TEXEL);
        let a = run(&mut WindEroder::new(settings.clone()), &hf, &params);
        let b = run(&mut WindEroder::new(settings), &hf, &params);
        assert_eq!(a, b);
    }

    #[test]
    fn every_output_is_cropped_to_domain() {
        let hf = synthetic::ridge(30, 20, 0.2, 0.3, 4.0);
        let mut eroder = WindEroder::new(WindSettings { iterations: 2, ..Default::default() });
        let mut params = ErodeParams::for_patch(30, 20, DIMS, TEXEL);
        params.domain = Rect::new(2, 3, 25, 13);
        eroder.set_input(HEIGHT, hf);
        eroder.erode(&params).unwrap();
        for name in OUTPUTS {
            assert_eq!(eroder.outputs().get(name).unwrap().dims(), (25, 13), "{name}");
        }
    }

    #[test]
    fn missing_height_is_fatal() {
        let mut eroder = WindEroder::default();
        let err = eroder.erode(&ErodeParams::for_patch(8, 8, DIMS, TEXEL)).unwrap_err();
        assert_eq!(err, ErosionError::MissingInput(HEIGHT));
    }
}
