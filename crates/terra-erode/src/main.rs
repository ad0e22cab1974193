//! Command-line driver: run one erosion stamp over a heightfield patch and
//! write the blended result as JSON.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use log::info;
use serde::de::DeserializeOwned;
use terra_erosion::{
    apply_stamp, synthetic, BrushMask, ErodeParams, Eroder, FieldData, HeightField, HydraulicEroder,
    HydraulicSettings, Rect, ThermalEroder, ThermalSettings, WindEroder, WindSettings,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Solver {
    Hydraulic,
    Thermal,
    Wind,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Terrain {
    Flat,
    Cone,
    Spike,
    Ridge,
    Fbm,
}

#[derive(Parser, Debug)]
#[command(name = "terra-erode", about = "Apply one erosion brush stamp to a heightfield patch")]
struct Args {
    /// Solver to run.
    #[arg(value_enum)]
    solver: Solver,

    /// Serialised HeightField JSON to erode.  Without it a synthetic patch is used.
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Synthetic terrain used when no --input is given.
    #[arg(long, value_enum, default_value = "cone")]
    synthetic: Terrain,

    /// Edge length of the synthetic patch, in texels.
    #[arg(long, default_value_t = 64)]
    size: usize,

    /// Seed of the synthetic fBm patch.
    #[arg(long, default_value_t = 42)]
    seed: u32,

    /// Optional hardness HeightField JSON, same size as the input.
    #[arg(long)]
    hardness: Option<PathBuf>,

    /// Solver settings JSON; missing keys take their defaults.
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Override the solver's iteration count.
    #[arg(long)]
    iterations: Option<u32>,

    /// Negate the height change (subtract mode).
    #[arg(long)]
    invert: bool,

    /// Terrain world size x,y,z; y is the height of a normalised 1.0.
    #[arg(long, value_delimiter = ',', num_args = 3, default_value = "100,50,100")]
    dims: Vec<f64>,

    /// World size of one texel x,z.
    #[arg(long, value_delimiter = ',', num_args = 2, default_value = "1.5625,1.5625")]
    texel: Vec<f64>,

    /// Brush strength; the mask weight is clamped to [0, 1].
    #[arg(long, default_value_t = 1.0)]
    strength: f32,

    /// Radial brush falloff radius in texels.  Uniform brush when omitted.
    #[arg(long)]
    radius: Option<f32>,

    /// Where to write the eroded HeightField JSON.
    #[arg(short, long, default_value = "eroded.json")]
    output: PathBuf,

    /// Also write every solver output field as a JSON map.
    #[arg(long)]
    fields: Option<PathBuf>,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn load_settings<T: DeserializeOwned + Default>(path: Option<&Path>) -> Result<T> {
    match path {
        Some(p) => read_json(p),
        None => Ok(T::default()),
    }
}

fn build_eroder(args: &Args) -> Result<Box<dyn Eroder>> {
    let path = args.settings.as_deref();
    Ok(match args.solver {
        Solver::Hydraulic => {
            let mut s: HydraulicSettings = load_settings(path)?;
            if let Some(n) = args.iterations {
                s.iterations = n;
            }
            Box::new(HydraulicEroder::new(s))
        }
        Solver::Thermal => {
            let mut s: ThermalSettings = load_settings(path)?;
            if let Some(n) = args.iterations {
                s.iterations = n;
            }
            Box::new(ThermalEroder::new(s))
        }
        Solver::Wind => {
            let mut s: WindSettings = load_settings(path)?;
            if let Some(n) = args.iterations {
                s.iterations = n;
            }
            Box::new(WindEroder::new(s))
        }
    })
}

fn synthetic_patch(kind: Terrain, size: usize, seed: u32) -> HeightField {
    let radius = size as f32 * 0.4;
    match kind {
        Terrain::Flat => synthetic::flat(size, size, 0.5),
        Terrain::Cone => synthetic::cone(size, size, 0.1, 0.6, radius),
        Terrain::Spike => synthetic::spike(size, size, 0.1, 0.6),
        Terrain::Ridge => synthetic::ridge(size, size, 0.1, 0.4, size as f32 * 0.1),
        Terrain::Fbm => synthetic::fbm(size, size, seed, 0.1, 0.5),
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let patch = match &args.input {
        Some(path) => read_json::<HeightField>(path)?,
        None => synthetic_patch(args.synthetic, args.size, args.seed),
    };
    if patch.is_empty() || patch.len() != patch.width * patch.height {
        bail!("input heightfield is {}×{} with {} samples", patch.width, patch.height, patch.len());
    }
    let hardness = args.hardness.as_deref().map(read_json::<HeightField>).transpose()?;

    let params = ErodeParams {
        terrain_dimensions: [args.dims[0], args.dims[1], args.dims[2]],
        domain: Rect::full(patch.width, patch.height),
        texel_size: [args.texel[0], args.texel[1]],
        invert_effect: args.invert,
    };
    let brush = match args.radius {
        Some(r) => BrushMask::radial(patch.width, patch.height, r, args.strength),
        None => BrushMask::uniform(patch.width, patch.height, args.strength),
    };

    let mut eroder = build_eroder(&args)?;
    info!(
        "running {} erosion on a {}×{} patch (dims {:?}, texel {:?})",
        eroder.name(),
        patch.width,
        patch.height,
        params.terrain_dimensions,
        params.texel_size
    );
    let result = apply_stamp(eroder.as_mut(), &patch, hardness.as_ref(), &brush, &params)
        .with_context(|| format!("{} stamp failed", eroder.name()))?;

    let delta: Vec<f32> = result.data.iter().zip(patch.data.iter()).map(|(a, b)| a - b).collect();
    let removed: f32 = delta.iter().filter(|d| **d < 0.0).sum();
    let added: f32 = delta.iter().filter(|d| **d > 0.0).sum();
    info!(
        "height range {:.4}..{:.4} -> {:.4}..{:.4}; removed {:.4e}, deposited {:.4e}",
        patch.min_value(),
        patch.max_value(),
        result.min_value(),
        result.max_value(),
        -removed,
        added
    );

    fs::write(&args.output, serde_json::to_string(&result)?)
        .with_context(|| format!("writing {}", args.output.display()))?;
    info!("wrote {}", args.output.display());

    if let Some(path) = &args.fields {
        let outputs = eroder.outputs();
        let fields: BTreeMap<&str, &FieldData> =
            outputs.names().filter_map(|n| outputs.get(n).map(|d| (n, d))).collect();
        fs::write(path, serde_json::to_string(&fields)?)
            .with_context(|| format!("writing {}", path.display()))?;
        info!("wrote {} output fields to {}", fields.len(), path.display());
    }

    eroder.release();
    Ok(())
}
