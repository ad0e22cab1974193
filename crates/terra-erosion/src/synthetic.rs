//! Reproducible synthetic height patches for tests and the CLI.
//!
//! All generators return normalised heights in [0, 1].
use noise::{NoiseFn, Perlin};

use crate::grid::HeightField;

/// Fractional Brownian motion over Perlin noise.
///
/// Octave amplitude decays by `gain = lacunarity^(−H)`; for lacunarity 2 and
/// H = 0.75 that is ≈ 0.595.
pub struct Fbm {
    pub h: f32,
    pub octaves: u32,
    pub lacunarity: f32,
    noise: Perlin,
}

impl Fbm {
    /// Lacunarity is fixed at 2.0; gain is derived from `h`.
    pub fn new(seed: u32, h: f32, octaves: u32) -> Self {
        Self { h, octaves, lacunarity: 2.0, noise: Perlin::new(seed) }
    }

    #[inline]
    fn gain(&self) -> f64 {
        (self.lacunarity as f64).powf(-(self.h as f64))
    }

    /// Unscaled value at `(x, y)` in noise space, roughly ±1.
    pub fn sample(&self, x: f64, y: f64) -> f64 {
        let gain = self.gain();
        let mut value = 0.0f64;
        let mut amp = 1.0f64;
        let mut freq = 1.0f64;
        for _ in 0..self.octaves {
            value += amp * self.noise.get([x * freq, y * freq]);
            amp *= gain;
            freq *= self.lacunarity as f64;
        }
        value
    }
}

pub fn flat(width: usize, height: usize, value: f32) -> HeightField {
    HeightField::new(width, height, value)
}

/// Flat `base` with a single raised cell at the centre.
pub fn spike(width: usize, height: usize, base: f32, peak: f32) -> HeightField {
    let mut hf = flat(width, height, base);
    hf.set(height / 2, width / 2, peak);
    hf
}

/// Linear cone of the given peak, reaching `base` at `radius` cells.
pub fn cone(width: usize, height: usize, base: f32, peak: f32, radius: f32) -> HeightField {
    let (cy, cx) = ((height as f32 - 1.0) / 2.0, (width as f32 - 1.0) / 2.0);
    let mut hf = flat(width, height, base);
    for r in 0..height {
        for c in 0..width {
            let d = ((r as f32 - cy).powi(2) + (c as f32 - cx).powi(2)).sqrt();
            let t = (1.0 - d / radius).max(0.0);
            hf.set(r, c, base + (peak - base) * t);
        }
    }
    hf
}

/// A straight ridge running along the rows, with a gaussian cross-section.
pub fn ridge(width: usize, height: usize, base: f32, peak: f32, half_width: f32) -> HeightField {
    let cx = (width as f32 - 1.0) / 2.0;
    let mut hf = flat(width, height, base);
    for r in 0..height {
        for c in 0..width {
            let d = (c as f32 - cx) / half_width;
            hf.set(r, c, base + (peak - base) * (-d * d).exp());
        }
    }
    hf
}

/// fBm terrain remapped to `[base, base + amplitude]`.
pub fn fbm(width: usize, height: usize, seed: u32, base: f32, amplitude: f32) -> HeightField {
    let fbm = Fbm::new(seed, 0.75, 6);
    let base_freq = 4.0 / width.max(height).max(1) as f64;
    let mut hf = flat(width, height, 0.0);
    for r in 0..height {
        for c in 0..width {
            hf.set(r, c, fbm.sample(c as f64 * base_freq, r as f64 * base_freq) as f32);
        }
    }
    let (lo, hi) = (hf.min_value(), hf.max_value());
    let span = (hi - lo).max(f32::EPSILON);
    for v in hf.data.iter_mut() {
        *v = base + amplitude * (*v - lo) / span;
    }
    hf
}
