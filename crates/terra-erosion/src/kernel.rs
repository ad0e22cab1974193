//! Per-cell stage dispatch and shared stencil helpers.
//!
//! A stage is a pure function of `(row, col)` that reads complete input grids
//! and produces one output cell.  `dispatch` evaluates it over the whole
//! output grid and returns only when every cell is written, so the next stage
//! always sees a finished grid.
use log::trace;

use crate::grid::{Cell, Grid};

/// D8 neighbour offsets as `(d_row, d_col)`.  Index `k` and `7 - k` are
/// opposite directions.
pub const D8_OFFSETS: [(isize, isize); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// Lane of the neighbour that sends material back along direction `k`.
#[inline]
pub const fn opposite(k: usize) -> usize {
    7 - k
}

/// Evaluate `stage(row, col)` for every cell of `out`.  Rows run on the
/// rayon pool with the `threading` feature.
pub fn dispatch<T, F>(name: &str, out: &mut Grid<T>, stage: F)
where
    T: Cell,
    F: Fn(usize, usize) -> T + Sync + Send,
{
    trace!("dispatch {name} over {}×{}", out.width, out.height);
    if out.is_empty() {
        return;
    }

    #[cfg(feature = "threading")]
    dispatch_parallel(out, &stage);

    #[cfg(not(feature = "threading"))]
    dispatch_serial(out, &stage);
}

#[cfg_attr(feature = "threading", allow(dead_code))]
fn dispatch_serial<T, F>(out: &mut Grid<T>, stage: &F)
where
    T: Cell,
    F: Fn(usize, usize) -> T,
{
    let width = out.width;
    for (r, row) in out.data.chunks_mut(width).enumerate() {
        for (c, cell) in row.iter_mut().enumerate() {
            *cell = stage(r, c);
        }
    }
}

#[cfg(feature = "threading")]
fn dispatch_parallel<T, F>(out: &mut Grid<T>, stage: &F)
where
    T: Cell,
    F: Fn(usize, usize) -> T + Sync + Send,
{
    use rayon::prelude::*;
    let width = out.width;
    out.data
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(r, row)| {
            for (c, cell) in row.iter_mut().enumerate() {
                *cell = stage(r, c);
            }
        });
}

/// World-space spacing of the simulation grid.
///
/// Heights are stored normalised; `height_scale` (the terrain's world height)
/// converts them to world units so slopes come out dimensionless.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spacing {
    pub dx: f32,
    pub dy: f32,
    pub height_scale: f32,
}

impl Spacing {
    pub fn new(terrain_dimensions: [f64; 3], texel_size: [f64; 2], sim_scale: f32) -> Self {
        Self {
            dx: (texel_size[0] * sim_scale as f64) as f32,
            dy: (texel_size[1] * sim_scale as f64) as f32,
            height_scale: terrain_dimensions[1] as f32,
        }
    }

    /// World distance to D8 neighbour `k`.
    #[inline]
    pub fn d8_distance(&self, k: usize) -> f32 {
        let (dr, dc) = D8_OFFSETS[k];
        let x = dc as f32 * self.dx;
        let y = dr as f32 * self.dy;
        (x * x + y * y).sqrt()
    }

    /// Dimensionless slope of a normalised height drop over `distance`.
    #[inline]
    pub fn slope(&self, dh: f32, distance: f32) -> f32 {
        dh * self.height_scale / distance
    }
}

/// Horn (1981) weighted 3×3 gradient of a normalised heightfield, in world
/// rise/run.  Edge cells read clamped neighbours.
///
/// ```text
///   NW(-1,-1)  N(-1, 0)  NE(-1,+1)
///   W ( 0,-1)  *         E ( 0,+1)
///   SW(+1,-1)  S(+1, 0)  SE(+1,+1)
/// ```
///
/// Returns `[dz/dx, dz/dy]` with `+y` pointing to increasing rows.
pub fn horn_gradient(h: &Grid<f32>, r: usize, c: usize, spacing: &Spacing) -> [f32; 2] {
    let (r, c) = (r as isize, c as isize);
    let at = |dr: isize, dc: isize| h.get_clamped(r + dr, c + dc);
    let nw = at(-1, -1);
    let n = at(-1, 0);
    let ne = at(-1, 1);
    let w = at(0, -1);
    let e = at(0, 1);
    let sw = at(1, -1);
    let s = at(1, 0);
    let se = at(1, 1);

    let k = spacing.height_scale;
    let dz_dx = ((ne + 2.0 * e + se) - (nw + 2.0 * w + sw)) * k / (8.0 * spacing.dx);
    let dz_dy = ((sw + 2.0 * s + se) - (nw + 2.0 * n + ne)) * k / (8.0 * spacing.dy);
    [dz_dx, dz_dy]
}

/// Semi-Lagrangian back-trace: the value of `src` at the point a particle
/// arriving at `(r, c)` occupied `dt` earlier.  `velocity` is in cells per
/// unit time as `[x, y]`.
#[inline]
pub fn back_trace<T: Cell>(src: &Grid<T>, r: usize, c: usize, velocity: [f32; 2], dt: f32) -> T {
    let y = r as f32 - velocity[1] * dt;
    let x = c as f32 - velocity[0] * dt;
    src.sample(y, x)
}

#[inline]
pub fn length(v: [f32; 2]) -> f32 {
    (v[0] * v[0] + v[1] * v[1]).sqrt()
}

#[inline]
pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_visits_every_cell_once() {
        let mut g: Grid<f32> = Grid::zeros(5, 3);
        dispatch("index", &mut g, |r, c| (r * 5 + c) as f32);
        for (i, &v) in g.data.iter().enumerate() {
            assert_eq!(v, i as f32);
        }
    }

    #[cfg(feature = "threading")]
    #[test]
    fn parallel_dispatch_matches_serial() {
        let stage = |r: usize, c: usize| [(r * 131 + c) as f32, (r as f32).sin() * c as f32];
        let mut serial: Grid<[f32; 2]> = Grid::zeros(97, 61);
        let mut parallel: Grid<[f32; 2]> = Grid::zeros(97, 61);
        dispatch_serial(&mut serial, &stage);
        dispatch_parallel(&mut parallel, &stage);
        assert_eq!(serial, parallel);
    }

    #[cfg(feature = "threading")]
    #[test]
    fn threaded_solver_is_deterministic() {
        use crate::{synthetic, ErodeParams, Eroder, HydraulicEroder, HEIGHT};
        let hf = synthetic::fbm(37, 29, 4, 0.1, 0.5);
        let params = ErodeParams::for_patch(37, 29, [100.0, 50.0, 100.0], [1.5625, 1.5625]);
        let mut runs = Vec::new();
        for _ in 0..2 {
            let mut eroder = HydraulicEroder::default();
            eroder.set_input(HEIGHT, hf.clone());
            eroder.erode(&params).unwrap();
            runs.push(eroder.outputs().scalar(HEIGHT).unwrap().clone());
        }
        assert_eq!(runs[0], runs[1]);
    }

    #[test]
    fn opposite_offsets_cancel() {
        for k in 0..8 {
            let (a, b) = (D8_OFFSETS[k], D8_OFFSETS[opposite(k)]);
            assert_eq!((a.0 + b.0, a.1 + b.1), (0, 0));
        }
    }

    #[test]
    fn horn_gradient_of_ramp() {
        // Rises 0.01 (normalised) per column; 100 m terrain, 2 m texels → slope 0.5.
        let mut h: Grid<f32> = Grid::zeros(6, 6);
        for r in 0..6 {
            for c in 0..6 {
                h.set(r, c, c as f32 * 0.01);
            }
        }
        let sp = Spacing { dx: 2.0, dy: 2.0, height_scale: 100.0 };
        let [gx, gy] = horn_gradient(&h, 3, 3, &sp);
        assert!((gx - 0.5).abs() < 1e-4, "gx = {gx}");
        assert!(gy.abs() < 1e-6);
    }

    #[test]
    fn back_trace_moves_against_velocity() {
        let mut g: Grid<f32> = Grid::zeros(8, 1);
        g.set(0, 2, 1.0);
        // Moving right at 2 cells/step: cell 4 receives what was at cell 2.
        assert!((back_trace(&g, 0, 4, [2.0, 0.0], 1.0) - 1.0).abs() < 1e-6);
        assert!(back_trace(&g, 0, 2, [2.0, 0.0], 1.0).abs() < 1e-6);
    }

    #[test]
    fn smoothstep_is_clamped() {
        assert_eq!(smoothstep(0.2, 0.8, 0.0), 0.0);
        assert_eq!(smoothstep(0.2, 0.8, 1.0), 1.0);
        assert!((smoothstep(0.2, 0.8, 0.5) - 0.5).abs() < 1e-6);
    }
}
