//! Stable-fluids stages for the 2D wind field.
//!
//! Velocity is stored in world units per unit time as `[x, y]`, with `+y`
//! toward increasing rows.  The patch edge is open: velocity is extended
//! unchanged past it and pressure is zero there, so a uniform wind blows
//! straight through.
use crate::grid::{Cell, Grid};
use crate::kernel::{back_trace, horn_gradient, length, Spacing};

use super::settings::WindKernelParams;

/// Add the ambient wind with a damping term: `v + k·(wind - v)` with
/// `k = min(dt, 1)`.  The `-k·v` part makes the velocity settle at the
/// ambient wind instead of growing by `k·wind` every iteration.
pub fn force(velocity: &Grid<[f32; 2]>, r: usize, c: usize, wind: [f32; 2], dt: f32) -> [f32; 2] {
    let v = velocity.get(r, c);
    let k = dt.min(1.0);
    [v[0] + (wind[0] - v[0]) * k, v[1] + (wind[1] - v[1]) * k]
}

/// Slow down air blowing up a slope, in proportion to how directly it hits it.
pub fn drag(
    velocity: &Grid<[f32; 2]>,
    height: &Grid<f32>,
    r: usize,
    c: usize,
    spacing: &Spacing,
    p: &WindKernelParams,
) -> [f32; 2] {
    let v = velocity.get(r, c);
    let speed = length(v);
    if speed <= 0.0 {
        return v;
    }
    let g = horn_gradient(height, r, c, spacing);
    let uphill = ((v[0] * g[0] + v[1] * g[1]) / speed).max(0.0);
    let k = 1.0 / (1.0 + p.drag * uphill * p.dt);
    [v[0] * k, v[1] * k]
}

/// One Jacobi pass of implicit diffusion, `(1 - a∇²) x = source`, with
/// `a` in cells² (clamped neighbours).
pub fn diffuse<T: Cell>(source: &Grid<T>, current: &Grid<T>, r: usize, c: usize, a: f32) -> T {
    let (ri, ci) = (r as isize, c as isize);
    let at = |dr: isize, dc: isize| current.get_clamped(ri + dr, ci + dc);
    let horizontal = T::lerp(at(0, -1), at(0, 1), 0.5);
    let vertical = T::lerp(at(-1, 0), at(1, 0), 0.5);
    let mean = T::lerp(horizontal, vertical, 0.5);
    T::lerp(source.get(r, c), mean, 4.0 * a / (1.0 + 4.0 * a))
}

/// Central-difference divergence in world units.
pub fn divergence(velocity: &Grid<[f32; 2]>, r: usize, c: usize, spacing: &Spacing) -> f32 {
    let (ri, ci) = (r as isize, c as isize);
    let at = |dr: isize, dc: isize| velocity.get_clamped(ri + dr, ci + dc);
    let du = (at(0, 1)[0] - at(0, -1)[0]) / (2.0 * spacing.dx);
    let dv = (at(1, 0)[1] - at(-1, 0)[1]) / (2.0 * spacing.dy);
    du + dv
}

/// One Jacobi pass of the pressure Poisson equation `∇²p = div`.
pub fn pressure(pressure: &Grid<f32>, divergence: &Grid<f32>, r: usize, c: usize, spacing: &Spacing) -> f32 {
    let (ri, ci) = (r as isize, c as isize);
    let at = |dr: isize, dc: isize| pressure.try_get(ri + dr, ci + dc).unwrap_or(0.0);
    let (ix2, iy2) = (1.0 / (spacing.dx * spacing.dx), 1.0 / (spacing.dy * spacing.dy));
    let sum = (at(0, -1) + at(0, 1)) * ix2 + (at(-1, 0) + at(1, 0)) * iy2;
    (sum - divergence.get(r, c)) / (2.0 * (ix2 + iy2))
}

/// Remove the pressure gradient from the velocity.
pub fn subtract_gradient(
    velocity: &Grid<[f32; 2]>,
    pressure: &Grid<f32>,
    r: usize,
    c: usize,
    spacing: &Spacing,
) -> [f32; 2] {
    let (ri, ci) = (r as isize, c as isize);
    let at = |dr: isize, dc: isize| pressure.try_get(ri + dr, ci + dc).unwrap_or(0.0);
    let v = velocity.get(r, c);
    [
        v[0] - (at(0, 1) - at(0, -1)) / (2.0 * spacing.dx),
        v[1] - (at(1, 0) - at(-1, 0)) / (2.0 * spacing.dy),
    ]
}

/// Velocity at `(r, c)` converted to cells per unit time and scaled for
/// advection.
#[inline]
pub fn cell_velocity(velocity: &Grid<[f32; 2]>, r: usize, c: usize, spacing: &Spacing, scale: f32) -> [f32; 2] {
    let v = velocity.get(r, c);
    [v[0] * scale / spacing.dx, v[1] * scale / spacing.dy]
}

/// Semi-Lagrangian advection of any field along the wind.
pub fn advect<T: Cell>(
    src: &Grid<T>,
    velocity: &Grid<[f32; 2]>,
    r: usize,
    c: usize,
    spacing: &Spacing,
    p: &WindKernelParams,
) -> T {
    back_trace(src, r, c, cell_velocity(velocity, r, c, spacing, p.advection), p.dt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::dispatch;
    use crate::wind::settings::WindSettings;

    fn unit() -> Spacing {
        Spacing { dx: 1.0, dy: 1.0, height_scale: 10.0 }
    }

    fn params() -> WindKernelParams {
        WindSettings::default().kernel_params()
    }

    #[test]
    fn force_approaches_ambient_wind() {
        let mut v = Grid::zeros(4, 4);
        for _ in 0..200 {
            let prev = v.clone();
            dispatch("force", &mut v, |r, c| force(&prev, r, c, [5.0, -2.0], 0.1));
        }
        let cell = v.get(2, 2);
        assert!((cell[0] - 5.0).abs() < 1e-3 && (cell[1] + 2.0).abs() < 1e-3);
    }

    #[test]
    fn drag_only_slows_uphill_flow() {
        let mut h = Grid::zeros(5, 5);
        for r in 0..5 {
            for c in 0..5 {
                h.set(r, c, c as f32 * 0.1);
            }
        }
        let p = params();
        let uphill = Grid::new(5, 5, [10.0, 0.0]);
        let downhill = Grid::new(5, 5, [-10.0, 0.0]);
        assert!(drag(&uphill, &h, 2, 2, &unit(), &p)[0] < 10.0);
        assert_eq!(drag(&downhill, &h, 2, 2, &unit(), &p), [-10.0, 0.0]);
    }

    #[test]
    fn diffusion_of_constant_field_is_identity() {
        let g = Grid::new(6, 6, [3.0f32, 1.0]);
        assert_eq!(diffuse(&g, &g, 0, 5, 0.4), [3.0, 1.0]);
        let s = Grid::new(6, 6, 2.0f32);
        assert!((diffuse(&s, &s, 3, 3, 2.0) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn diffusion_spreads_a_peak() {
        let mut g = Grid::zeros(5, 5);
        g.set(2, 2, 1.0f32);
        let mut out = Grid::zeros(5, 5);
        dispatch("diffuse", &mut out, |r, c| diffuse(&g, &g, r, c, 0.5));
        assert!(out.get(2, 2) < 1.0);
        assert!(out.get(2, 3) > 0.0);
    }

    #[test]
    fn uniform_wind_passes_through_open_edges() {
        let v = Grid::new(8, 8, [4.0, 1.0]);
        for (r, c) in [(4, 4), (4, 7), (0, 0), (7, 3)] {
            assert_eq!(divergence(&v, r, c, &unit()), 0.0);
        }
        let p = Grid::zeros(8, 8);
        assert_eq!(subtract_gradient(&v, &p, 0, 7, &unit()), [4.0, 1.0]);
    }

    #[test]
    fn projection_reduces_divergence() {
        let n = 24;
        let centre = (n as f32 - 1.0) / 2.0;
        let mut v: Grid<[f32; 2]> = Grid::zeros(n, n);
        for r in 0..n {
            for c in 0..n {
                let (x, y) = (c as f32 - centre, r as f32 - centre);
                let k = (-(x * x + y * y) / 8.0).exp();
                v.set(r, c, [x * k, y * k]);
            }
        }
        let sp = unit();
        let energy = |v: &Grid<[f32; 2]>| {
            let mut d = Grid::zeros(n, n);
            dispatch("divergence", &mut d, |r, c| divergence(v, r, c, &sp));
            d.data.iter().map(|x| x * x).sum::<f32>()
        };
        let before = energy(&v);

        let mut div = Grid::zeros(n, n);
        dispatch("divergence", &mut div, |r, c| divergence(&v, r, c, &sp));
        let mut p: Grid<f32> = Grid::zeros(n, n);
        for _ in 0..200 {
            let prev = p.clone();
            dispatch("pressure", &mut p, |r, c| pressure(&prev, &div, r, c, &sp));
        }
        let mut projected = Grid::zeros(n, n);
        dispatch("subtract_gradient", &mut projected, |r, c| subtract_gradient(&v, &p, r, c, &sp));

        let after = energy(&projected);
        assert!(after < 0.5 * before, "divergence energy {before} -> {after}");
    }

    #[test]
    fn advection_carries_values_downwind() {
        let mut s = Grid::zeros(8, 1);
        s.set(0, 2, 1.0f32);
        let v = Grid::new(8, 1, [10.0, 0.0]);
        let p = WindKernelParams { dt: 0.1, advection: 1.0, ..params() };
        // 10 units/time × 0.1 over 1-unit cells: one cell per step.
        assert!((advect(&s, &v, 0, 3, &unit(), &p) - 1.0).abs() < 1e-6);
        assert!(advect(&s, &v, 0, 2, &unit(), &p).abs() < 1e-6);
    }
}
