//! Hydraulic erosion: shallow-water flow coupled to sediment transport, with
//! optional talus relaxation after every outer iteration.
//!
//! Per iteration:
//!   1. FlowStep: precipitation → flux → water (+ evaporation) → velocity.
//!   2. SedimentStep: exchange with the bed → height, sediment and eroded
//!      accumulators → transport along the velocity field.
//!   3. ThermalRelax: `thermal_iterations` talus passes.
pub mod flow;
pub mod sediment;
pub mod settings;

use log::{debug, warn};

use crate::eroder::{apply_invert, prepare, ErodeParams, Eroder, InputFields, OutputFields, HARDNESS, HEIGHT};
use crate::error::Result;
use crate::fields::{FieldData, FieldKind, FieldSpec, FieldStore};
use crate::kernel::{dispatch, Spacing};
use crate::thermal::talus::{relax, TalusFields, TalusParams, THERMAL_STABLE_DT};
use crate::thermal::THERMAL_OUTFLOW;
pub use settings::{HydraulicKernelParams, HydraulicSettings};

pub const WATER_LEVEL: &str = "Water Level";
pub const WATER_VELOCITY: &str = "Water Velocity";
pub const WATER_FLUX: &str = "Water Flux";
pub const SEDIMENT: &str = "Sediment";
pub const ERODED_SEDIMENT: &str = "Eroded Sediment";
const EXCHANGE: &str = "Sediment Exchange";

static FIELDS: &[FieldSpec] = &[
    FieldSpec::ping_pong(HEIGHT, FieldKind::Scalar),
    FieldSpec::ping_pong(WATER_LEVEL, FieldKind::Scalar),
    FieldSpec::ping_pong(WATER_VELOCITY, FieldKind::Vector),
    FieldSpec::ping_pong(WATER_FLUX, FieldKind::Flux4),
    FieldSpec::ping_pong(SEDIMENT, FieldKind::Scalar),
    FieldSpec::ping_pong(ERODED_SEDIMENT, FieldKind::Scalar),
    FieldSpec::single(EXCHANGE, FieldKind::Scalar),
    FieldSpec::single(HARDNESS, FieldKind::Scalar),
    FieldSpec::single(THERMAL_OUTFLOW, FieldKind::Flux8),
];

const TALUS: TalusFields = TalusFields {
    height: HEIGHT,
    outflow: THERMAL_OUTFLOW,
    hardness: Some(HARDNESS),
    repose: None,
    collision: None,
};

/// Fields copied to the caller after each stamp.
const OUTPUTS: [&str; 6] = [HEIGHT, SEDIMENT, WATER_LEVEL, WATER_VELOCITY, WATER_FLUX, ERODED_SEDIMENT];

pub struct HydraulicEroder {
    pub settings: HydraulicSettings,
    inputs: InputFields,
    outputs: OutputFields,
    store: FieldStore,
}

impl HydraulicEroder {
    pub fn new(settings: HydraulicSettings) -> Self {
        Self {
            settings,
            inputs: InputFields::default(),
            outputs: OutputFields::default(),
            store: FieldStore::new(FIELDS),
        }
    }

    fn flow_step(&mut self, spacing: &Spacing, p: &HydraulicKernelParams) {
        let store = &mut self.store;
        store.step::<f32, _>(WATER_LEVEL, |s, out| {
            let water = s.front::<f32>(WATER_LEVEL);
            dispatch("precipitation", out, |r, c| flow::precipitation(water, r, c, p));
        });
        store.step::<[f32; 4], _>(WATER_FLUX, |s, out| {
            let height = s.front::<f32>(HEIGHT);
            let water = s.front::<f32>(WATER_LEVEL);
            let prev = s.front::<[f32; 4]>(WATER_FLUX);
            dispatch("flux", out, |r, c| flow::flux(height, water, prev, r, c, spacing, p));
        });
        store.step::<f32, _>(WATER_LEVEL, |s, out| {
            let water = s.front::<f32>(WATER_LEVEL);
            let flux = s.front::<[f32; 4]>(WATER_FLUX);
            dispatch("water", out, |r, c| flow::water(water, flux, r, c, p));
        });
        store.step::<[f32; 2], _>(WATER_VELOCITY, |s, out| {
            let water = s.front::<f32>(WATER_LEVEL);
            let flux = s.front::<[f32; 4]>(WATER_FLUX);
            dispatch("velocity", out, |r, c| flow::velocity(water, flux, r, c));
        });
    }

    fn sediment_step(&mut self, spacing: &Spacing, p: &HydraulicKernelParams) {
        let store = &mut self.store;
        store.write::<f32, _>(EXCHANGE, |s, out| {
            let height = s.front::<f32>(HEIGHT);
            let load = s.front::<f32>(SEDIMENT);
            let velocity = s.front::<[f32; 2]>(WATER_VELOCITY);
            let hardness = s.front::<f32>(HARDNESS);
            dispatch("erode_deposit", out, |r, c| {
                sediment::exchange(height, load, velocity, hardness, r, c, spacing, p)
            });
        });
        store.step::<f32, _>(HEIGHT, |s, out| {
            let height = s.front::<f32>(HEIGHT);
            let ex = s.front::<f32>(EXCHANGE);
            dispatch("apply_height", out, |r, c| height.get(r, c) - ex.get(r, c));
        });
        store.step::<f32, _>(SEDIMENT, |s, out| {
            let load = s.front::<f32>(SEDIMENT);
            let ex = s.front::<f32>(EXCHANGE);
            dispatch("apply_sediment", out, |r, c| load.get(r, c) + ex.get(r, c));
        });
        store.step::<f32, _>(ERODED_SEDIMENT, |s, out| {
            let eroded = s.front::<f32>(ERODED_SEDIMENT);
            let ex = s.front::<f32>(EXCHANGE);
            dispatch("accumulate_eroded", out, |r, c| eroded.get(r, c) - ex.get(r, c));
        });
        store.step::<f32, _>(SEDIMENT, |s, out| {
            let load = s.front::<f32>(SEDIMENT);
            let velocity = s.front::<[f32; 2]>(WATER_VELOCITY);
            dispatch("transport", out, |r, c| sediment::transport(load, velocity, r, c, p.dt));
        });
    }
}

impl Default for HydraulicEroder {
    fn default() -> Self {
        Self::new(HydraulicSettings::default())
    }
}

impl Eroder for HydraulicEroder {
    fn name(&self) -> &'static str {
        "hydraulic"
    }

    fn inputs_mut(&mut self) -> &mut InputFields {
        &mut self.inputs
    }

    fn erode(&mut self, params: &ErodeParams) -> Result<()> {
        let patch = prepare(&self.inputs, params)?;
        self.settings.validate()?;
        let p = self.settings.kernel_params();
        let iterations = self.settings.iterations;
        let thermal_iterations = self.settings.thermal_iterations;
        let talus = TalusParams::new(
            self.settings.thermal_dt(),
            [self.settings.angle_of_repose, self.settings.angle_of_repose],
        );
        if thermal_iterations > 0 && talus.dt > THERMAL_STABLE_DT {
            warn!(
                "hydraulic: thermal step {} exceeds stable bound {THERMAL_STABLE_DT}; expect oscillation",
                talus.dt
            );
        }

        // Init: both height buffers hold the input so the first flow step
        // reads a valid previous state; every other field starts at zero.
        let (w, h) = (patch.height.width, patch.height.height);
        self.store.ensure(w, h);
        self.store.clear_all();
        self.store.load(HEIGHT, &patch.height);
        if let Some(hardness) = &patch.hardness {
            self.store.load(HARDNESS, hardness);
        }

        let spacing = Spacing::new(params.terrain_dimensions, params.texel_size, self.settings.sim_scale);
        for _ in 0..iterations {
            self.flow_step(&spacing, &p);
            self.sediment_step(&spacing, &p);
            for _ in 0..thermal_iterations {
                relax(&mut self.store, &TALUS, &spacing, &talus);
            }
        }

        // Finalize: expose the front buffer of every output.
        self.outputs.clear();
        for name in OUTPUTS {
            self.outputs.insert(name, self.store.snapshot(name));
        }
        let eroded = self.store.front::<f32>(HEIGHT).clone();
        let height = apply_invert(&patch.height, eroded, params.invert_effect);
        debug!(
            "hydraulic: {w}×{h} patch, {iterations} iterations, mean Δh {:.3e}, water {:.3e}",
            height.mean() - patch.height.mean(),
            self.outputs.scalar(WATER_LEVEL).map_or(0.0, |g| g.mean())
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
