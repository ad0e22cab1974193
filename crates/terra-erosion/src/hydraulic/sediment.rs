//! Sediment stages: capacity-driven exchange with the bed, then transport
//! along the water velocity.
use crate::grid::Grid;
use crate::kernel::{back_trace, horn_gradient, length, smoothstep, Spacing};

use super::settings::HydraulicKernelParams;

/// Capacity never drops to zero on flat ground while water is moving.
const MIN_TILT: f32 = 0.05;

/// Below this sine of the local tilt a cell is pure riverbed, above
/// `RIVERBANK_SIN` pure riverbank; smoothstep in between.
pub const RIVERBED_SIN: f32 = 0.1;
pub const RIVERBANK_SIN: f32 = 0.6;

/// Sine of the local terrain tilt.
#[inline]
pub fn tilt_sin(height: &Grid<f32>, r: usize, c: usize, spacing: &Spacing) -> f32 {
    let g = length(horn_gradient(height, r, c, spacing));
    g / (1.0 + g * g).sqrt()
}

/// 0 on riverbeds, 1 on riverbanks.
#[inline]
pub fn bank_weight(sin_tilt: f32) -> f32 {
    smoothstep(RIVERBED_SIN, RIVERBANK_SIN, sin_tilt)
}

/// Height moved into suspension this step (negative when depositing).
#[allow(clippy::too_many_arguments)]
pub fn exchange(
    height: &Grid<f32>,
    sediment: &Grid<f32>,
    velocity: &Grid<[f32; 2]>,
    hardness: &Grid<f32>,
    r: usize,
    c: usize,
    spacing: &Spacing,
    p: &HydraulicKernelParams,
) -> f32 {
    let h = height.get(r, c);
    let s = sediment.get(r, c);
    let sin = tilt_sin(height, r, c, spacing);
    let capacity = p.capacity * length(velocity.get(r, c)) * sin.max(MIN_TILT);
    let t = bank_weight(sin);

    if capacity > s {
        let rate = p.dissolve * (p.bed_dissolve + (p.bank_dissolve - p.bed_dissolve) * t);
        let soft = 1.0 - hardness.get(r, c).clamp(0.0, 1.0);
        (p.dt * rate * soft * (capacity - s)).min(h.max(0.0))
    } else {
        let rate = p.deposit * (p.bed_deposit + (p.bank_deposit - p.bed_deposit) * t);
        -(p.dt * rate * (s - capacity)).min(s)
    }
}

/// Semi-Lagrangian advection of suspended sediment.
pub fn transport(sediment: &Grid<f32>, velocity: &Grid<[f32; 2]>, r: usize, c: usize, dt: f32) -> f32 {
    back_trace(sediment, r, c, velocity.get(r, c), dt).max(0.0)
}
