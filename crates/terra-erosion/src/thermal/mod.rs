//! Standalone thermal erosion: iterated talus relaxation.
//!
//! Many small passes (default 50 at dt = 0.005) rather than one large one;
//! each pass is only locally conservative and overshoots above
//! `THERMAL_STABLE_DT`.
pub mod settings;
pub mod talus;

use log::{debug, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::eroder::{apply_invert, prepare, ErodeParams, Eroder, InputFields, OutputFields, HARDNESS, HEIGHT};
use crate::error::Result;
use crate::fields::{FieldData, FieldKind, FieldSpec, FieldStore};
use crate::kernel::Spacing;
pub use settings::ThermalSettings;
use talus::{jittered_repose, relax, TalusFields, TalusParams, THERMAL_STABLE_DT};

pub const THERMAL_OUTFLOW: &str = "Thermal Outflow";
pub const REPOSE_MASK: &str = "Repose Mask";
pub const COLLISION_MASK: &str = "Collision Mask";

static FIELDS: &[FieldSpec] = &[
    FieldSpec::ping_pong(HEIGHT, FieldKind::Scalar),
    FieldSpec::single(THERMAL_OUTFLOW, FieldKind::Flux8),
    FieldSpec::single(HARDNESS, FieldKind::Scalar),
    // Both masks stay zero for now; reserved for material-dependent thresholds.
    FieldSpec::single(REPOSE_MASK, FieldKind::Scalar),
    FieldSpec::single(COLLISION_MASK, FieldKind::Scalar),
];

const TALUS: TalusFields = TalusFields {
    height: HEIGHT,
    outflow: THERMAL_OUTFLOW,
    hardness: Some(HARDNESS),
    repose: Some(REPOSE_MASK),
    collision: Some(COLLISION_MASK),
};

pub struct ThermalEroder {
    pub settings: ThermalSettings,
    inputs: InputFields,
    outputs: OutputFields,
    store: FieldStore,
}

impl ThermalEroder {
    pub fn new(settings: ThermalSettings) -> Self {
        Self {
            settings,
            inputs: InputFields::default(),
            outputs: OutputFields::default(),
            store: FieldStore::new(FIELDS),
        }
    }
}

impl Default for ThermalEroder {
    fn default() -> Self {
        Self::new(ThermalSettings::default())
    }
}

impl Eroder for ThermalEroder {
    fn name(&self) -> &'static str {
        "thermal"
    }

    fn inputs_mut(&mut self) -> &mut InputFields {
        &mut self.inputs
    }

    fn erode(&mut self, params: &ErodeParams) -> Result<()> {
        let patch = prepare(&self.inputs, params)?;
        let s = &self.settings;
        s.validate()?;
        if s.time_delta > THERMAL_STABLE_DT {
            warn!(
                "thermal: time_delta {} exceeds stable bound {THERMAL_STABLE_DT}; expect oscillation",
                s.time_delta
            );
        }

        let (w, h) = (patch.height.width, patch.height.height);
        self.store.ensure(w, h);
        self.store.clear_all();
        self.store.load(HEIGHT, &patch.height);
        if let Some(hardness) = &patch.hardness {
            self.store.load(HARDNESS, hardness);
        }

        let spacing = Spacing::new(params.terrain_dimensions, params.texel_size, 1.0);
        let mut rng = StdRng::seed_from_u64(s.seed);
        for _ in 0..s.iterations {
            let repose = jittered_repose(&mut rng, s.angle_of_repose, s.repose_jitter);
            relax(&mut self.store, &TALUS, &spacing, &TalusParams::new(s.time_delta, repose));
        }

        let eroded = self.store.front::<f32>(HEIGHT).clone();
        let height = apply_invert(&patch.height, eroded, params.invert_effect);
        debug!(
            "thermal: {w}×{h} patch, {} iterations, mean Δh {:.3e}",
            s.iterations,
            height.mean() - patch.height.mean()
        );

        self.outputs.clear();
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
