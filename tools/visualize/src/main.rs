//! Diagnostic visualizer: renders an eroded heightfield (and optionally its
//! change against the pre-stamp patch) as PNG images.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use clap::Parser;
use terra_erosion::kernel::{horn_gradient, Spacing};
use terra_erosion::HeightField;

#[derive(Parser, Debug)]
#[command(name = "visualize", about = "Render heightfield JSON as PNG debug images")]
struct Args {
    /// Eroded HeightField JSON (as written by terra-erode).
    input: PathBuf,

    /// Pre-stamp HeightField JSON; enables the erosion/deposition map.
    #[arg(long)]
    before: Option<PathBuf>,

    /// Output directory.
    #[arg(short, long, default_value = "data/debug")]
    out_dir: PathBuf,

    /// World height of a normalised 1.0, for hillshading.
    #[arg(long, default_value_t = 50.0)]
    height_scale: f64,

    /// World size of one texel, for hillshading.
    #[arg(long, default_value_t = 1.5625)]
    texel: f64,
}

// ── Colour helpers ────────────────────────────────────────────────────────────

/// Normalised value → grayscale.
fn gray(v: f32) -> [u8; 3] {
    let c = (v.clamp(0.0, 1.0) * 255.0) as u8;
    [c, c, c]
}

/// Signed change → diverging map: red where material was removed, blue
/// where it was deposited, white for no change.
fn diverging(d: f32, scale: f32) -> [u8; 3] {
    let t = (d / scale).clamp(-1.0, 1.0);
    let fade = (255.0 * (1.0 - t.abs())) as u8;
    if t < 0.0 {
        [255, fade, fade]
    } else {
        [fade, fade, 255]
    }
}

/// Lambertian shade of a unit surface normal, light from the north-west.
fn shade(gradient: [f32; 2]) -> f32 {
    let [gx, gy] = gradient;
    let norm = (1.0 + gx * gx + gy * gy).sqrt();
    let n = [-gx / norm, -gy / norm, 1.0 / norm];
    let l = [-0.5f32, -0.5, 0.7071];
    (n[0] * l[0] + n[1] * l[1] + n[2] * l[2]).max(0.0)
}

fn read_heightfield(path: &Path) -> Result<HeightField> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let hf: HeightField = serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    ensure!(
        !hf.is_empty() && hf.len() == hf.width * hf.height,
        "{} is {}×{} with {} samples",
        path.display(),
        hf.width,
        hf.height,
        hf.len()
    );
    Ok(hf)
}

fn save(img: image::RgbImage, dir: &Path, name: &str) -> Result<()> {
    let path = dir.join(name);
    img.save(&path).with_context(|| format!("failed to save {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn render<F: Fn(usize, usize) -> [u8; 3]>(hf: &HeightField, pixel: F) -> image::RgbImage {
    let mut img = image::RgbImage::new(hf.width as u32, hf.height as u32);
    for r in 0..hf.height {
        for c in 0..hf.width {
            img.put_pixel(c as u32, r as u32, image::Rgb(pixel(r, c)));
        }
    }
    img
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let args = Args::parse();
    let hf = read_heightfield(&args.input)?;
    fs::create_dir_all(&args.out_dir).with_context(|| format!("cannot create {}", args.out_dir.display()))?;

    // ── 1. height.png ────────────────────────────────────────────────────────
    let (lo, hi) = (hf.min_value(), hf.max_value());
    let range = (hi - lo).max(f32::EPSILON);
    save(render(&hf, |r, c| gray((hf.get(r, c) - lo) / range)), &args.out_dir, "height.png")?;

    // ── 2. hillshade.png ─────────────────────────────────────────────────────
    let spacing = Spacing::new([1.0, args.height_scale, 1.0], [args.texel, args.texel], 1.0);
    save(
        render(&hf, |r, c| gray(shade(horn_gradient(&hf, r, c, &spacing)))),
        &args.out_dir,
        "hillshade.png",
    )?;

    // ── 3. change.png ────────────────────────────────────────────────────────
    if let Some(before_path) = &args.before {
        let before = read_heightfield(before_path)?;
        ensure!(
            before.same_size(&hf),
            "before is {}×{}, eroded is {}×{}",
            before.width,
            before.height,
            hf.width,
            hf.height
        );
        let max_change = hf
            .data
            .iter()
            .zip(before.data.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0f32, f32::max)
            .max(f32::EPSILON);
        println!("Largest height change: {max_change:.4e}");
        save(
            render(&hf, |r, c| diverging(hf.get(r, c) - before.get(r, c), max_change)),
            &args.out_dir,
            "change.png",
        )?;
    }

    Ok(())
}
