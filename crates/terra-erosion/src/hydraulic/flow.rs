//! Shallow-water flow stages (virtual pipe model).
//!
//! Water, flux and height share normalised height units.  Flux lanes are
//! `[left, right, top, bottom]`; lane `k` and `k ^ 1` face each other.
//! The domain edge is closed: lanes pointing off-grid stay zero.
use crate::grid::Grid;
use crate::kernel::Spacing;

use super::settings::HydraulicKernelParams;

/// `(d_row, d_col)` of each flux lane.
pub const FLUX_OFFSETS: [(isize, isize); 4] = [(0, -1), (0, 1), (-1, 0), (1, 0)];

/// Water below this depth is treated as dry when deriving velocity.
const MIN_DEPTH: f32 = 1e-6;

#[inline]
fn lane_length(k: usize, spacing: &Spacing) -> f32 {
    if k < 2 {
        spacing.dx
    } else {
        spacing.dy
    }
}

pub fn precipitation(water: &Grid<f32>, r: usize, c: usize, p: &HydraulicKernelParams) -> f32 {
    water.get(r, c) + p.precipitation * p.dt
}

/// Accelerate each outflow lane by the surface slope toward that neighbour,
/// then scale the lanes so one step never drains more water than the cell
/// holds.
pub fn flux(
    height: &Grid<f32>,
    water: &Grid<f32>,
    prev: &Grid<[f32; 4]>,
    r: usize,
    c: usize,
    spacing: &Spacing,
    p: &HydraulicKernelParams,
) -> [f32; 4] {
    let w = water.get(r, c);
    let surface = height.get(r, c) + w;
    let old = prev.get(r, c);
    let mut lanes = [0.0f32; 4];

    for (k, &(dr, dc)) in FLUX_OFFSETS.iter().enumerate() {
        let (nr, nc) = (r as isize + dr, c as isize + dc);
        let (Some(nh), Some(nw)) = (height.try_get(nr, nc), water.try_get(nr, nc)) else {
            continue;
        };
        let slope = spacing.slope(surface - (nh + nw), lane_length(k, spacing));
        lanes[k] = (old[k] + p.dt * p.pipe * slope).max(0.0);
    }

    let total = lanes.iter().sum::<f32>() * p.dt;
    if total > w && total > 0.0 {
        let k = w / total;
        lanes.iter_mut().for_each(|f| *f *= k);
    }
    lanes
}

/// Net inflow minus outflow over one step, then evaporation.
pub fn water(water: &Grid<f32>, flux: &Grid<[f32; 4]>, r: usize, c: usize, p: &HydraulicKernelParams) -> f32 {
    let out: f32 = flux.get(r, c).iter().sum();
    let mut inflow = 0.0f32;
    for (k, &(dr, dc)) in FLUX_OFFSETS.iter().enumerate() {
        if let Some(lanes) = flux.try_get(r as isize + dr, c as isize + dc) {
            inflow += lanes[k ^ 1];
        }
    }
    let w = (water.get(r, c) + p.dt * (inflow - out)).max(0.0);
    w * (1.0 - p.evaporation * p.dt).max(0.0)
}

/// Cell velocity in cells per unit time as `[x, y]`, from the mean flux
/// through the cell divided by its depth.
pub fn velocity(water: &Grid<f32>, flux: &Grid<[f32; 4]>, r: usize, c: usize) -> [f32; 2] {
    let (ri, ci) = (r as isize, c as isize);
    let f = flux.get(r, c);
    let lane = |dr: isize, dc: isize, k: usize| flux.try_get(ri + dr, ci + dc).map_or(0.0, |l| l[k]);

    // Rightward: left neighbour's right lane in, our right lane out, etc.
    let wx = 0.5 * (lane(0, -1, 1) - f[0] + f[1] - lane(0, 1, 0));
    let wy = 0.5 * (lane(-1, 0, 3) - f[2] + f[3] - lane(1, 0, 2));

    let d = water.get(r, c);
    if d < MIN_DEPTH {
        return [0.0, 0.0];
    }
    [wx / d, wy / d]
}
